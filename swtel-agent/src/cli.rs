//! CLI argument parsing for the `swtel` binary.
//!
//! Every flag can also be supplied through an `SWTEL_*` environment
//! variable, which is how the agent is usually configured in a container.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Args, Parser, Subcommand};
use swtel_clock::NANOS_PER_SEC;
use swtel_snmp::{SessionConfig, DEFAULT_SNMP_PORT};
use thiserror::Error;

use crate::engine::ArchivePolicy;
use crate::node::NodeIdentity;

/// Default base directory for archives.
pub const DEFAULT_DATA_DIR: &str = "/var/spool/swtel";

/// Default seconds between archive flushes.
pub const DEFAULT_FLUSH_INTERVAL_SEC: u64 = 300;

/// Default address of the metrics endpoint.
pub const DEFAULT_LISTEN_ADDRESS: &str = "0.0.0.0:9990";

/// Default per-request SNMP timeout in seconds.
pub const DEFAULT_SNMP_TIMEOUT_SEC: u64 = 5;

/// Default SNMP retransmissions.
pub const DEFAULT_SNMP_RETRIES: u32 = 1;

/// Errors from CLI argument validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CliError {
    #[error("community string must not be empty")]
    EmptyCommunity,

    #[error("hostname must not be empty")]
    EmptyHostname,

    #[error("hostname {0:?} is not of the form <machine>-<site>.<domain>")]
    InvalidHostname(String),

    #[error("snmp-port must be between 1 and 65535, got {0}")]
    InvalidSnmpPort(u16),

    #[error("snmp-timeout-sec must be at least 1, got {0}")]
    InvalidSnmpTimeout(u64),

    #[error("flush-interval-sec must be at least 1, got {0}")]
    InvalidFlushInterval(u64),

    #[error("flush-interval-sec {0} is too large")]
    FlushIntervalTooLarge(u64),
}

/// Switch telemetry agent - polls interface counters over SNMP, exports
/// them to Prometheus and archives per-interval deltas.
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "swtel")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Poll, export and archive until SIGINT/SIGTERM.
    Run(RunArgs),
    /// Resolve the machine and uplink interfaces, print them and exit.
    Resolve(ResolveArgs),
}

/// Switch connection and node identity flags.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct SwitchArgs {
    /// Switch FQDN to poll. Derived from the hostname when omitted.
    #[arg(long, env = "SWTEL_TARGET")]
    pub target: Option<String>,

    /// SNMP community string.
    #[arg(long, env = "SWTEL_COMMUNITY", hide_env_values = true)]
    pub community: String,

    /// FQDN of this node.
    #[arg(long, env = "SWTEL_HOSTNAME")]
    pub hostname: String,

    /// SNMP agent port on the switch.
    #[arg(long, env = "SWTEL_SNMP_PORT", default_value_t = DEFAULT_SNMP_PORT)]
    pub snmp_port: u16,

    /// Per-request SNMP timeout in seconds.
    #[arg(long, env = "SWTEL_SNMP_TIMEOUT_SEC", default_value_t = DEFAULT_SNMP_TIMEOUT_SEC)]
    pub snmp_timeout_sec: u64,

    /// SNMP retransmissions after the first attempt.
    #[arg(long, env = "SWTEL_SNMP_RETRIES", default_value_t = DEFAULT_SNMP_RETRIES)]
    pub snmp_retries: u32,
}

impl SwitchArgs {
    /// Validate the arguments.
    pub fn validate(&self) -> Result<(), CliError> {
        if self.community.trim().is_empty() {
            return Err(CliError::EmptyCommunity);
        }
        if self.hostname.trim().is_empty() {
            return Err(CliError::EmptyHostname);
        }
        if self.snmp_port == 0 {
            return Err(CliError::InvalidSnmpPort(self.snmp_port));
        }
        if self.snmp_timeout_sec == 0 {
            return Err(CliError::InvalidSnmpTimeout(self.snmp_timeout_sec));
        }
        Ok(())
    }

    /// Node identity from `--hostname` and `--target`.
    pub fn identity(&self) -> Result<NodeIdentity, CliError> {
        NodeIdentity::new(&self.hostname, self.target.as_deref())
    }

    /// Session parameters for polling `target`.
    pub fn session_config(&self, target: &str) -> SessionConfig {
        let mut config = SessionConfig::new(target, self.community.trim());
        config.port = self.snmp_port;
        config.timeout = Duration::from_secs(self.snmp_timeout_sec);
        config.retries = self.snmp_retries;
        config
    }
}

/// Arguments for the run command.
#[derive(Args, Debug, Clone, PartialEq)]
pub struct RunArgs {
    #[command(flatten)]
    pub switch: SwitchArgs,

    /// Path to the YAML file defining the metrics to poll.
    #[arg(long, env = "SWTEL_METRICS")]
    pub metrics: PathBuf,

    /// Base directory for archive files.
    #[arg(long, env = "SWTEL_DATA_DIR", default_value = DEFAULT_DATA_DIR)]
    pub data_dir: PathBuf,

    /// Seconds between archive flushes.
    #[arg(long, env = "SWTEL_FLUSH_INTERVAL_SEC", default_value_t = DEFAULT_FLUSH_INTERVAL_SEC)]
    pub flush_interval_sec: u64,

    /// Address to serve /metrics on.
    #[arg(long, env = "SWTEL_LISTEN_ADDRESS", default_value = DEFAULT_LISTEN_ADDRESS)]
    pub listen_address: SocketAddr,

    /// What to do when an archive cannot be written.
    #[arg(long, env = "SWTEL_ARCHIVE_POLICY", value_enum, default_value_t = ArchivePolicy::Abort)]
    pub archive_policy: ArchivePolicy,
}

impl RunArgs {
    /// Validate the arguments.
    pub fn validate(&self) -> Result<(), CliError> {
        self.switch.validate()?;
        if self.flush_interval_sec == 0 {
            return Err(CliError::InvalidFlushInterval(self.flush_interval_sec));
        }
        if self.flush_interval_sec.checked_mul(NANOS_PER_SEC).is_none() {
            return Err(CliError::FlushIntervalTooLarge(self.flush_interval_sec));
        }
        Ok(())
    }
}

/// Arguments for the resolve command.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct ResolveArgs {
    #[command(flatten)]
    pub switch: SwitchArgs,
}

impl ResolveArgs {
    /// Validate the arguments.
    pub fn validate(&self) -> Result<(), CliError> {
        self.switch.validate()
    }
}

/// Parse CLI arguments from an iterator of strings.
/// Useful for testing.
pub fn parse_from<I, T>(iter: I) -> Result<Cli, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    Cli::try_parse_from(iter)
}
