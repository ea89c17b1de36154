//! Counter aggregation engine.
//!
//! The engine owns one `CounterState` per tracked OID (metric definition ×
//! interface role) and runs two operations against it:
//!
//! - `sample` fetches every tracked counter in one request and turns raw
//!   readings into per-cycle deltas.
//! - `flush` drains the accumulated deltas into an `IntervalBatch` and hands
//!   it to the archive writer.
//!
//! Both take the table lock. `sample` holds it across the network round trip
//! so that a delta is always computed against the previous *completed*
//! cycle; `flush` holds it only while draining, and archive I/O happens after
//! it is released.

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::mem;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use swtel_clock::{Clock, NANOS_PER_SEC};
use swtel_fs::{ArchiveWriter, FsError};
use swtel_schema::{IntervalBatch, IntervalDocument, Sample};
use swtel_snmp::{Oid, SnmpClient, SnmpError};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::MetricDefinition;
use crate::decode::{decode_counters, DecodeError};
use crate::metrics::AgentMetrics;
use crate::node::NodeIdentity;
use crate::resolver::{Interfaces, Role};

/// Failed batches kept for retry under [`ArchivePolicy::Retain`]: one hour
/// of five-minute intervals.
pub const DEFAULT_RETAIN_LIMIT: usize = 12;

/// What to do when an interval archive cannot be written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ArchivePolicy {
    /// Return the error; the agent stops.
    #[default]
    Abort,
    /// Keep the batch in memory and retry it before the next one.
    Retain,
}

impl fmt::Display for ArchivePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArchivePolicy::Abort => f.write_str("abort"),
            ArchivePolicy::Retain => f.write_str("retain"),
        }
    }
}

/// Errors from engine construction and its cycles.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("fetch failed: {0}")]
    Fetch(#[source] SnmpError),

    #[error("unusable response: {0}")]
    Decode(#[from] DecodeError),

    #[error("archive write failed: {0}")]
    Archive(#[source] FsError),

    #[error("OID {0} is tracked more than once")]
    DuplicateCounter(Oid),
}

/// Static settings of an engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Node FQDN; archive path component and document `hostname`.
    pub hostname: String,
    /// Switch name; document `experiment`.
    pub experiment: String,
    pub archive_policy: ArchivePolicy,
    /// Bound of the retry queue under `Retain`.
    pub retain_limit: usize,
}

impl EngineConfig {
    pub fn new(identity: &NodeIdentity, archive_policy: ArchivePolicy) -> Self {
        Self {
            hostname: identity.hostname.clone(),
            experiment: identity.target.clone(),
            archive_policy,
            retain_limit: DEFAULT_RETAIN_LIMIT,
        }
    }
}

#[derive(Debug)]
struct CounterState {
    name: Oid,
    metric: String,
    role: Role,
    interface: String,
    output_name: String,
    previous: Option<u64>,
    pending: Vec<Sample>,
}

#[derive(Debug)]
struct Table {
    counters: Vec<CounterState>,
    cycles: u64,
    interval_start: u64,
}

/// Read-only copy of one counter's state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterView {
    pub name: Oid,
    pub metric: String,
    pub role: Role,
    pub interface: String,
    pub output_name: String,
    pub previous: Option<u64>,
    pub pending: Vec<Sample>,
}

/// Outcome of a successful sampling cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SampleReport {
    /// Counters observed for the first time.
    pub bootstrapped: usize,
    /// Samples appended.
    pub samples: usize,
    /// Counters that went backwards and were restarted.
    pub resets: usize,
    pub collect_start: u64,
    pub collect_end: u64,
}

/// Outcome of a flush.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub start: u64,
    pub end: u64,
    pub documents: usize,
    pub samples: usize,
    /// Archives written by this flush, oldest first.
    pub written: Vec<PathBuf>,
    /// Batches still waiting for a retry.
    pub retained: usize,
    /// Batches discarded because the retry queue was full.
    pub dropped: usize,
}

/// The counter aggregation engine.
pub struct Engine<S, W, C> {
    client: S,
    writer: W,
    clock: C,
    metrics: Arc<AgentMetrics>,
    config: EngineConfig,
    names: Vec<Oid>,
    table: Mutex<Table>,
    retained: Mutex<VecDeque<IntervalBatch>>,
}

impl<S, W, C> Engine<S, W, C>
where
    S: SnmpClient,
    W: ArchiveWriter,
    C: Clock,
{
    /// Build the counter table: one entry per definition and role, in
    /// definition order. The first interval starts now.
    pub fn new(
        client: S,
        writer: W,
        clock: C,
        metrics: Arc<AgentMetrics>,
        config: EngineConfig,
        definitions: &[MetricDefinition],
        interfaces: &Interfaces,
    ) -> Result<Self, EngineError> {
        let mut seen = HashSet::new();
        let mut counters = Vec::with_capacity(definitions.len() * Role::ALL.len());
        for def in definitions {
            for binding in interfaces.iter() {
                let name = def.oid_stub.child(binding.index);
                if !seen.insert(name.clone()) {
                    return Err(EngineError::DuplicateCounter(name));
                }
                counters.push(CounterState {
                    name,
                    metric: def.name.clone(),
                    role: binding.role,
                    interface: binding.description.clone(),
                    output_name: def.output_name(binding.role).to_string(),
                    previous: None,
                    pending: Vec::new(),
                });
            }
        }
        let names = counters.iter().map(|c| c.name.clone()).collect();
        let interval_start = clock.now_unix_sec();

        debug!(counters = counters.len(), interval_start, "engine ready");

        Ok(Self {
            client,
            writer,
            clock,
            metrics,
            config,
            names,
            table: Mutex::new(Table {
                counters,
                cycles: 0,
                interval_start,
            }),
            retained: Mutex::new(VecDeque::new()),
        })
    }

    /// Run one sampling cycle stamped with `now` (Unix seconds).
    ///
    /// On any fetch or decode failure the table is left exactly as it was
    /// and the error counter is incremented once.
    pub fn sample(&self, now: u64) -> Result<SampleReport, EngineError> {
        let mut table = self.lock_table();

        let collect_start = self.clock.now_unix_nanos();
        let fetched = self.client.get(&self.names);
        let collect_end = self.clock.now_unix_nanos();

        let values = match fetched
            .map_err(EngineError::Fetch)
            .and_then(|response| decode_counters(&self.names, &response).map_err(EngineError::from))
        {
            Ok(values) => values,
            Err(e) => {
                self.metrics.inc_collect_errors();
                warn!(error = %e, timestamp = now, "sampling cycle skipped");
                return Err(e);
            }
        };

        self.metrics
            .observe_collect_duration(collect_end.saturating_sub(collect_start) as f64 / NANOS_PER_SEC as f64);

        let mut report = SampleReport {
            collect_start,
            collect_end,
            ..SampleReport::default()
        };
        for counter in table.counters.iter_mut() {
            let Some(&current) = values.get(&counter.name) else {
                continue;
            };
            match counter.previous {
                None => report.bootstrapped += 1,
                Some(previous) if current < previous => {
                    warn!(
                        oid = %counter.name,
                        interface = %counter.interface,
                        previous,
                        current,
                        "counter went backwards, restarting from current value"
                    );
                    self.metrics.inc_counter_resets(&counter.interface);
                    report.resets += 1;
                }
                Some(previous) => {
                    let delta = current - previous;
                    counter.pending.push(Sample {
                        timestamp: now,
                        collect_start,
                        collect_end,
                        value: delta,
                    });
                    self.metrics
                        .add_delta(&counter.metric, &counter.interface, delta);
                    report.samples += 1;
                }
            }
            counter.previous = Some(current);
        }
        table.cycles += 1;

        debug!(
            timestamp = now,
            cycle = table.cycles,
            samples = report.samples,
            bootstrapped = report.bootstrapped,
            resets = report.resets,
            "sampling cycle complete"
        );
        Ok(report)
    }

    /// Drain every counter's pending samples and archive them as the
    /// interval ending at `now` (Unix seconds).
    pub fn flush(&self, now: u64) -> Result<FlushReport, EngineError> {
        let batch = self.drain(now);
        let mut report = FlushReport {
            start: batch.start,
            end: batch.end,
            documents: batch.documents.len(),
            samples: batch.sample_count(),
            ..FlushReport::default()
        };

        match self.config.archive_policy {
            ArchivePolicy::Abort => {
                let path = self.write_batch(&batch)?;
                report.written.push(path);
            }
            ArchivePolicy::Retain => self.write_retained(batch, &mut report),
        }
        Ok(report)
    }

    fn drain(&self, now: u64) -> IntervalBatch {
        let mut table = self.lock_table();
        let documents = table
            .counters
            .iter_mut()
            .map(|counter| IntervalDocument {
                experiment: self.config.experiment.clone(),
                hostname: self.config.hostname.clone(),
                metric: counter.output_name.clone(),
                samples: mem::take(&mut counter.pending),
            })
            .collect();
        let start = mem::replace(&mut table.interval_start, now);

        IntervalBatch {
            start,
            end: now,
            hostname: self.config.hostname.clone(),
            documents,
        }
    }

    fn write_batch(&self, batch: &IntervalBatch) -> Result<PathBuf, EngineError> {
        match self.writer.write(batch) {
            Ok(path) => {
                self.metrics.inc_archive_writes();
                info!(
                    path = %path.display(),
                    documents = batch.documents.len(),
                    samples = batch.sample_count(),
                    "interval archived"
                );
                Ok(path)
            }
            Err(e) => {
                self.metrics.inc_archive_errors();
                error!(
                    error = %e,
                    start = batch.start,
                    end = batch.end,
                    "failed to write interval archive"
                );
                Err(EngineError::Archive(e))
            }
        }
    }

    fn write_retained(&self, batch: IntervalBatch, report: &mut FlushReport) {
        let mut queue = self
            .retained
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        queue.push_back(batch);

        while let Some(oldest) = queue.front() {
            match self.write_batch(oldest) {
                Ok(path) => {
                    report.written.push(path);
                    queue.pop_front();
                }
                Err(_) => break,
            }
        }

        while queue.len() > self.config.retain_limit.max(1) {
            if let Some(dropped) = queue.pop_front() {
                warn!(
                    start = dropped.start,
                    end = dropped.end,
                    samples = dropped.sample_count(),
                    "retry queue full, dropping oldest interval"
                );
                report.dropped += 1;
            }
        }
        report.retained = queue.len();
        if report.retained > 0 {
            warn!(retained = report.retained, "intervals waiting for archive retry");
        }
    }

    /// Copy of every counter's state, in table order.
    pub fn snapshot(&self) -> Vec<CounterView> {
        self.lock_table()
            .counters
            .iter()
            .map(|c| CounterView {
                name: c.name.clone(),
                metric: c.metric.clone(),
                role: c.role,
                interface: c.interface.clone(),
                output_name: c.output_name.clone(),
                previous: c.previous,
                pending: c.pending.clone(),
            })
            .collect()
    }

    /// Successful sampling cycles so far.
    pub fn completed_cycles(&self) -> u64 {
        self.lock_table().cycles
    }

    /// True until the first successful sampling cycle.
    pub fn is_first_run(&self) -> bool {
        self.completed_cycles() == 0
    }

    /// Start of the interval the next flush will close.
    pub fn interval_start(&self) -> u64 {
        self.lock_table().interval_start
    }

    /// Batches waiting for an archive retry.
    pub fn retained_batches(&self) -> usize {
        self.retained
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Tracked OIDs in table order.
    pub fn tracked(&self) -> &[Oid] {
        &self.names
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn metrics(&self) -> &AgentMetrics {
        &self.metrics
    }

    // The table is only mutated in whole cycles, so a panic elsewhere while
    // the lock was held cannot leave it half-updated.
    fn lock_table(&self) -> MutexGuard<'_, Table> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
