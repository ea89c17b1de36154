//! Run command orchestration.
//!
//! Startup is all or nothing: the metric file, both interfaces and the
//! metrics listener must be available before the first sampling cycle.

use std::net::SocketAddr;
use std::sync::Arc;

use swtel_clock::Clock;
use swtel_fs::{Filesystem, JsonlArchiveWriter};
use swtel_snmp::SnmpClient;
use tracing::info;

use crate::cli::RunArgs;
use crate::config::load_metrics;
use crate::engine::{Engine, EngineConfig};
use crate::exporter::serve_metrics;
use crate::metrics::AgentMetrics;
use crate::node::NodeIdentity;
use crate::resolver::{resolve_interfaces, Interfaces};
use crate::scheduler::{run_schedule, RunSummary, Schedule};
use crate::signal::ShutdownCheck;
use crate::sleeper::Sleeper;

use super::CommandResult;

/// Result of run command execution.
#[derive(Debug)]
pub struct RunResult {
    pub identity: NodeIdentity,
    pub interfaces: Interfaces,
    /// Number of tracked counters.
    pub counters: usize,
    /// Address `/metrics` was served on.
    pub metrics_addr: SocketAddr,
    pub summary: RunSummary,
}

/// Execute the run command.
///
/// `client` must already be connected to the switch named by the identity
/// derived from `args`. Returns once `shutdown` fires and the final flush
/// has been attempted.
pub fn execute_run<S, F, C, L, H>(
    args: &RunArgs,
    client: S,
    fs: &F,
    clock: &C,
    sleeper: &L,
    shutdown: &H,
) -> CommandResult<RunResult>
where
    S: SnmpClient,
    F: Filesystem + Clone,
    C: Clock,
    L: Sleeper,
    H: ShutdownCheck,
{
    args.validate()?;
    let identity = args.switch.identity()?;
    info!(
        hostname = %identity.hostname,
        machine = %identity.machine,
        target = %identity.target,
        "starting"
    );

    let definitions = load_metrics(fs, &args.metrics)?;
    info!(definitions = definitions.len(), path = %args.metrics.display(), "loaded metric definitions");

    let interfaces = resolve_interfaces(&client, &identity.machine)?;

    let metrics = Arc::new(AgentMetrics::new(&identity.hostname, &definitions)?);
    let server = serve_metrics(metrics.clone(), args.listen_address)?;
    let metrics_addr = server.local_addr();

    let writer = JsonlArchiveWriter::new(fs.clone(), args.data_dir.clone());
    let engine = Engine::new(
        client,
        writer,
        clock,
        metrics,
        EngineConfig::new(&identity, args.archive_policy),
        &definitions,
        &interfaces,
    )?;
    let counters = engine.tracked().len();
    info!(
        counters,
        data_dir = %args.data_dir.display(),
        archive_policy = %args.archive_policy,
        "engine ready"
    );

    let summary = run_schedule(
        &engine,
        &Schedule::new(args.flush_interval_sec),
        clock,
        sleeper,
        shutdown,
    );
    server.shutdown();
    let summary = summary?;

    Ok(RunResult {
        identity,
        interfaces,
        counters,
        metrics_addr,
        summary,
    })
}
