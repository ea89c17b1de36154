//! Command orchestration for CLI subcommands.
//!
//! Provides execute functions for:
//! - `run` - Resolve interfaces, then sample, export and archive until shutdown
//! - `resolve` - Resolve and print the polled interfaces

pub mod resolve;
pub mod run;

pub use resolve::{execute_resolve, ResolveResult};
pub use run::{execute_run, RunResult};

use crate::cli::CliError;
use crate::config::ConfigError;
use crate::engine::EngineError;
use crate::exporter::ExporterError;
use crate::resolver::ResolveError;
use swtel_snmp::SnmpError;
use thiserror::Error;

/// Errors from command execution.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("invalid argument: {0}")]
    InvalidArgument(#[from] CliError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("SNMP error: {0}")]
    Snmp(#[from] SnmpError),

    #[error("interface resolution failed: {0}")]
    Resolve(#[from] ResolveError),

    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("metrics exporter error: {0}")]
    Exporter(#[from] ExporterError),
}

/// Result of command execution.
pub type CommandResult<T> = Result<T, CommandError>;
