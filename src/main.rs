//! VM Manager - Main Entry Point
//!
//! Replays a trace of reads and writes against a simulated hierarchical page
//! table with demand paging, printing one result per command.
//!
//! Usage: vm_manager [OPTIONS] <TRACE> [OUTPUT]

mod logger;

use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use log::info;

use vm_manager::io::{format_results, read_trace, run_trace, write_results};
use vm_manager::{VmConfig, VmManager};

#[derive(Parser, Debug)]
#[command(name = "vm_manager")]
#[command(about = "Virtual Memory Manager - replays reads/writes through a multi-level page table")]
struct Cli {
    /// Trace file: one `r <address>` or `w <address> <value>` per line
    trace: PathBuf,

    /// Output file for results (stdout when omitted)
    output: Option<PathBuf>,

    /// JSON file with offset_width, virtual_address_width, tables_depth, num_frames
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Bits per table index and page offset
    #[arg(long)]
    offset_width: Option<u32>,

    /// Bits in a virtual address
    #[arg(long)]
    address_width: Option<u32>,

    /// Number of table levels (derived from the widths when omitted)
    #[arg(long)]
    depth: Option<u32>,

    /// Physical frames in the pool, root table included
    #[arg(long)]
    frames: Option<u64>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Print access statistics as JSON to stderr
    #[arg(long)]
    stats: bool,

    /// Print resident pages to stderr after the run
    #[arg(long)]
    dump: bool,
}

fn main() {
    let cli = Cli::parse();
    logger::init(logger::level_for(cli.verbose));

    // Run the VM manager and handle any errors
    if let Err(e) = run(&cli) {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

/// Start from the config file (or the built-in defaults) and apply flag overrides.
fn resolve_config(cli: &Cli) -> Result<VmConfig> {
    let mut config = match &cli.config {
        Some(path) => VmConfig::from_json_file(path)?,
        None => VmConfig::default(),
    };

    if let Some(offset_width) = cli.offset_width {
        config.offset_width = offset_width;
    }
    if let Some(address_width) = cli.address_width {
        config.virtual_address_width = address_width;
    }
    if let Some(frames) = cli.frames {
        config.num_frames = frames;
    }
    match cli.depth {
        Some(depth) => config.tables_depth = depth,
        None if config.offset_width > 0 && config.virtual_address_width > config.offset_width => {
            config.tables_depth =
                VmConfig::expected_depth(config.virtual_address_width, config.offset_width);
        }
        None => {}
    }

    config.validate().context("Invalid memory configuration")?;
    Ok(config)
}

/// Main logic separated from main() for cleaner error handling
fn run(cli: &Cli) -> Result<()> {
    let config = resolve_config(cli)?;
    info!("Trace file:  {}", cli.trace.display());
    info!(
        "Geometry:    {}-bit addresses, {}-bit offsets, depth {}, {} frames",
        config.virtual_address_width, config.offset_width, config.tables_depth, config.num_frames
    );

    let commands = read_trace(&cli.trace)?;
    info!("Commands to replay: {}", commands.len());

    let mut vm = VmManager::new(config)?;
    let results = run_trace(&mut vm, &commands);

    match &cli.output {
        Some(path) => {
            write_results(path, &results)?;
            info!("Results written to: {}", path.display());
        }
        None => println!("{}", format_results(&results)),
    }

    if cli.dump {
        for mapped in vm.mapped_pages() {
            eprintln!("page {:>6} -> frame {}", mapped.page, mapped.frame);
        }
    }
    if cli.stats {
        let stats = serde_json::to_string_pretty(&vm.stats())?;
        eprintln!("{stats}");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["vm_manager", "trace.txt"];
        argv.extend_from_slice(args);
        Cli::parse_from(argv)
    }

    #[test]
    fn test_defaults() {
        assert_eq!(resolve_config(&cli(&[])).unwrap(), VmConfig::default());
    }

    #[test]
    fn test_depth_follows_widths() {
        let config = resolve_config(&cli(&["--offset-width", "2", "--address-width", "6", "--frames", "4"])).unwrap();
        assert_eq!(config, VmConfig::with_depth(2, 2, 4));
    }

    #[test]
    fn test_explicit_depth_is_checked() {
        assert!(resolve_config(&cli(&["--depth", "3"])).is_err());
    }

    #[test]
    fn test_too_few_frames_rejected() {
        let err = resolve_config(&cli(&["--frames", "4"])).unwrap_err();
        assert!(format!("{err:#}").contains("frames"));
    }
}
