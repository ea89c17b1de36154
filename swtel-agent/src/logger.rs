//! Logging setup.
//!
//! The agent logs through `tracing`. The subscriber writes to stderr and is
//! filtered by `RUST_LOG` when set, otherwise by the `-v` count.

use tracing_subscriber::EnvFilter;

/// Verbosity level selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    /// Normal output (info and above)
    Normal,
    /// Verbose output (-v flag)
    Verbose,
    /// Debug output (-vv flag)
    Debug,
}

impl Verbosity {
    /// Create verbosity from CLI flag count.
    pub fn from_count(count: u8) -> Self {
        match count {
            0 => Verbosity::Normal,
            1 => Verbosity::Verbose,
            _ => Verbosity::Debug,
        }
    }

    /// Filter directive for this level.
    pub fn directive(self) -> &'static str {
        match self {
            Verbosity::Normal => "info",
            Verbosity::Verbose => "swtel=debug,swtel_agent=debug,swtel_snmp=debug,info",
            Verbosity::Debug => "trace",
        }
    }
}

/// Build the filter: `RUST_LOG` wins over the verbosity flag.
pub fn env_filter(verbosity: Verbosity) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(verbosity.directive()))
}

/// Install the global subscriber. Calling it twice is harmless.
pub fn init_logging(verbosity: Verbosity) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(verbosity))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
