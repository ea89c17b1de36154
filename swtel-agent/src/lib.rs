//! Switch telemetry agent.
//!
//! Polls interface counters from a switch over SNMP, exports running totals
//! as Prometheus metrics, and archives per-interval deltas as JSONL.

pub mod cli;
pub mod commands;
pub mod config;
pub mod decode;
pub mod engine;
pub mod exit;
pub mod exporter;
pub mod logger;
pub mod metrics;
pub mod node;
pub mod resolver;
pub mod scheduler;
pub mod signal;
pub mod sleeper;

pub use cli::{parse_from, Cli, CliError, Command, ResolveArgs, RunArgs, SwitchArgs};
pub use commands::{execute_resolve, execute_run, CommandError, CommandResult, ResolveResult, RunResult};
pub use config::{load_metrics, parse_metrics, ConfigError, MetricDefinition};
pub use engine::{
    ArchivePolicy, CounterView, Engine, EngineConfig, EngineError, FlushReport, SampleReport,
};
pub use exporter::{serve_metrics, ExporterError, MetricsServer};
pub use logger::{init_logging, Verbosity};
pub use metrics::AgentMetrics;
pub use node::NodeIdentity;
pub use resolver::{resolve_interfaces, InterfaceBinding, Interfaces, ResolveError, Role};
pub use scheduler::{run_schedule, RunSummary, Schedule, SAMPLE_INTERVAL_SECS};
pub use signal::{ShutdownCheck, ShutdownFlag};
pub use sleeper::{RealSleeper, Sleeper};
