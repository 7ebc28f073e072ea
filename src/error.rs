//! Error types for the virtual memory manager.
//!
//! Only recoverable conditions live here. Broken tree invariants are bugs and
//! panic at the point of detection instead.

use std::path::PathBuf;
use thiserror::Error;

/// Errors returned by `read` / `write`.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmError {
    /// The virtual address lies outside the configured address space.
    #[error("virtual address {address} out of range (limit {limit})")]
    AddressOutOfRange { address: u64, limit: u64 },
}

/// Errors raised while building or loading a [`crate::config::VmConfig`].
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("offset width must be greater than zero")]
    ZeroOffsetWidth,

    #[error("tables depth must be at least 1")]
    ZeroDepth,

    #[error("virtual address width {width} exceeds the supported maximum of {max} bits")]
    AddressTooWide { width: u32, max: u32 },

    #[error("virtual address width {address_width} leaves no page number bits above offset width {offset_width}")]
    NoPageBits { address_width: u32, offset_width: u32 },

    #[error("tables depth {depth} does not match address width {address_width} / offset width {offset_width} (expected {expected})")]
    DepthMismatch {
        depth: u32,
        address_width: u32,
        offset_width: u32,
        expected: u32,
    },

    #[error("{frames} frames cannot hold a full path of depth {depth} (need at least {required})")]
    TooFewFrames { frames: u64, depth: u32, required: u64 },

    #[error("{frames} frames cannot be addressed by a table entry word")]
    TooManyFrames { frames: u64 },

    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors raised while parsing a trace file.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum TraceError {
    #[error("line {line}: unknown command '{command}'")]
    UnknownCommand { line: usize, command: String },

    #[error("line {line}: expected {expected} operand(s), found {found}")]
    Arity {
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("line {line}: invalid {what} '{token}'")]
    InvalidNumber {
        line: usize,
        what: &'static str,
        token: String,
    },
}
