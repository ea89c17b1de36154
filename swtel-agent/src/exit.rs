//! Exit codes for the swtel CLI.
//!
//! Following Unix conventions for exit codes.

use crate::commands::CommandError;
use crate::engine::EngineError;

/// Exit code constants.
pub mod codes {
    /// Successful execution.
    pub const SUCCESS: i32 = 0;
    /// Invalid arguments.
    pub const INVALID_ARGS: i32 = 1;
    /// Metric definition file missing or invalid.
    pub const CONFIG_ERROR: i32 = 2;
    /// SNMP session could not be set up.
    pub const SNMP_ERROR: i32 = 3;
    /// Machine or uplink interface not found.
    pub const RESOLVE_ERROR: i32 = 4;
    /// Interval archive could not be written.
    pub const ARCHIVE_ERROR: i32 = 5;
    /// Metrics registry or HTTP listener failed.
    pub const EXPORTER_ERROR: i32 = 6;
    /// Counter table could not be built.
    pub const ENGINE_ERROR: i32 = 7;
}

/// Map a CommandError to an exit code.
pub fn exit_code(error: &CommandError) -> i32 {
    match error {
        CommandError::InvalidArgument(_) => codes::INVALID_ARGS,
        CommandError::Config(_) => codes::CONFIG_ERROR,
        CommandError::Snmp(_) => codes::SNMP_ERROR,
        CommandError::Resolve(_) => codes::RESOLVE_ERROR,
        CommandError::Engine(EngineError::Archive(_)) => codes::ARCHIVE_ERROR,
        CommandError::Engine(_) => codes::ENGINE_ERROR,
        CommandError::Exporter(_) => codes::EXPORTER_ERROR,
    }
}
