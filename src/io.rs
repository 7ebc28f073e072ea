use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::constants::Word;
use crate::error::{TraceError, VmError};
use crate::memory::FrameStore;
use crate::vm_manager::VmManager;

/// One line of a trace file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Read(u64),
    Write(u64, Word),
}

/// What a command produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Written,
    Value(Word),
    OutOfRange,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Written => write!(f, "ok"),
            Outcome::Value(value) => write!(f, "{value}"),
            Outcome::OutOfRange => write!(f, "out-of-range"),
        }
    }
}

/// Parse a trace: `r <address>` or `w <address> <value>` per line.
/// Blank lines and `#` comments are skipped.
pub fn parse_trace(content: &str) -> Result<Vec<Command>, TraceError> {
    let mut commands = Vec::new();
    for (number, raw) in content.lines().enumerate() {
        let line = number + 1;
        let text = raw.split('#').next().unwrap_or_default();
        let tokens: Vec<&str> = text.split_whitespace().collect();
        let Some((&command, operands)) = tokens.split_first() else {
            continue;
        };

        let parsed = match command {
            "r" | "read" => {
                expect_operands(line, operands, 1)?;
                Command::Read(parse_address(line, operands[0])?)
            }
            "w" | "write" => {
                expect_operands(line, operands, 2)?;
                let address = parse_address(line, operands[0])?;
                let value = operands[1].parse().map_err(|_| TraceError::InvalidNumber {
                    line,
                    what: "value",
                    token: operands[1].to_string(),
                })?;
                Command::Write(address, value)
            }
            other => {
                return Err(TraceError::UnknownCommand {
                    line,
                    command: other.to_string(),
                });
            }
        };
        commands.push(parsed);
    }
    Ok(commands)
}

fn expect_operands(line: usize, operands: &[&str], expected: usize) -> Result<(), TraceError> {
    if operands.len() != expected {
        return Err(TraceError::Arity {
            line,
            expected,
            found: operands.len(),
        });
    }
    Ok(())
}

fn parse_address(line: usize, token: &str) -> Result<u64, TraceError> {
    let parsed = match token.strip_prefix("0x") {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => token.parse(),
    };
    parsed.map_err(|_| TraceError::InvalidNumber {
        line,
        what: "address",
        token: token.to_string(),
    })
}

pub fn read_trace<P: AsRef<Path>>(path: P) -> Result<Vec<Command>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read trace file {}", path.display()))?;
    parse_trace(&content).with_context(|| format!("Invalid trace file {}", path.display()))
}

/// Apply every command in order. Out-of-range addresses do not stop the run.
pub fn run_trace<S: FrameStore>(vm: &mut VmManager<S>, commands: &[Command]) -> Vec<Outcome> {
    commands
        .iter()
        .map(|command| {
            let result = match *command {
                Command::Read(va) => vm.read(va).map(Outcome::Value),
                Command::Write(va, value) => vm.write(va, value).map(|()| Outcome::Written),
            };
            match result {
                Ok(outcome) => outcome,
                Err(VmError::AddressOutOfRange { .. }) => Outcome::OutOfRange,
            }
        })
        .collect()
}

pub fn format_results(results: &[Outcome]) -> String {
    let output: Vec<String> = results.iter().map(|r| r.to_string()).collect();
    output.join(" ")
}

pub fn write_results<P: AsRef<Path>>(path: P, results: &[Outcome]) -> Result<()> {
    let path = path.as_ref();
    fs::write(path, format_results(results))
        .with_context(|| format!("Failed to write output file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VmConfig;

    #[test]
    fn test_parse_trace() {
        let content = "# setup\nw 5 10\n\nr 5   # check\nr 0x3F\nwrite 1 -2\nread 1\n";
        assert_eq!(
            parse_trace(content).unwrap(),
            vec![
                Command::Write(5, 10),
                Command::Read(5),
                Command::Read(63),
                Command::Write(1, -2),
                Command::Read(1),
            ]
        );
    }

    #[test]
    fn test_parse_trace_errors_carry_line() {
        assert_eq!(
            parse_trace("r 1\nx 2").unwrap_err(),
            TraceError::UnknownCommand {
                line: 2,
                command: "x".to_string()
            }
        );
        assert_eq!(
            parse_trace("w 1").unwrap_err(),
            TraceError::Arity {
                line: 1,
                expected: 2,
                found: 1
            }
        );
        assert!(matches!(
            parse_trace("\nr abc"),
            Err(TraceError::InvalidNumber { line: 2, what: "address", .. })
        ));
        assert!(matches!(
            parse_trace("w 1 99999999999"),
            Err(TraceError::InvalidNumber { what: "value", .. })
        ));
    }

    #[test]
    fn test_run_trace() {
        let mut vm = VmManager::new(VmConfig::with_depth(2, 2, 4)).unwrap();
        let commands = parse_trace("w 3 7\nr 3\nr 64\nw 64 1\nr 40").unwrap();
        let results = run_trace(&mut vm, &commands);
        assert_eq!(
            results,
            vec![
                Outcome::Written,
                Outcome::Value(7),
                Outcome::OutOfRange,
                Outcome::OutOfRange,
                Outcome::Value(0),
            ]
        );
        assert_eq!(format_results(&results), "ok 7 out-of-range out-of-range 0");
    }

    #[test]
    fn test_trace_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("trace.txt");
        let output = dir.path().join("out.txt");
        fs::write(&input, "w 10 4\nr 10\n").unwrap();

        let commands = read_trace(&input).unwrap();
        let mut vm = VmManager::new(VmConfig::default()).unwrap();
        write_results(&output, &run_trace(&mut vm, &commands)).unwrap();

        assert_eq!(fs::read_to_string(&output).unwrap(), "ok 4");
    }

    #[test]
    fn test_read_trace_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_trace(dir.path().join("missing.txt")).unwrap_err();
        assert!(err.to_string().contains("Failed to read trace file"));
    }
}
