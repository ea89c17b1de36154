//! Sampling and flushing drivers.
//!
//! The sampler ticks on 10-second wall-clock boundaries; the flusher ticks
//! every flush interval, counted from when the drivers start. Each runs on
//! its own thread and they meet only at the engine lock. Shutdown is checked
//! between cycles, and a final flush runs once both drivers have stopped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use swtel_clock::{Clock, NANOS_PER_SEC};
use swtel_fs::ArchiveWriter;
use swtel_snmp::SnmpClient;
use tracing::{debug, error, info, warn};

use crate::engine::{Engine, EngineError, FlushReport};
use crate::signal::ShutdownCheck;
use crate::sleeper::Sleeper;

/// Seconds between sampling cycles.
pub const SAMPLE_INTERVAL_SECS: u64 = 10;

/// Longest single sleep, so shutdown is noticed promptly.
pub const MAX_SLEEP: Duration = Duration::from_millis(500);

/// Driver periods in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    pub sample_interval_secs: u64,
    pub flush_interval_secs: u64,
}

impl Schedule {
    pub fn new(flush_interval_secs: u64) -> Self {
        Self {
            sample_interval_secs: SAMPLE_INTERVAL_SECS,
            flush_interval_secs,
        }
    }
}

/// Counters from the sampling driver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SamplerStats {
    pub cycles: u64,
    pub failed: u64,
    /// Ticks skipped because a cycle overran its slot.
    pub missed: u64,
}

/// Counters from the flushing driver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlusherStats {
    pub flushes: u64,
    pub archives: u64,
}

/// What a full run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub sampler: SamplerStats,
    pub flusher: FlusherStats,
    /// The flush performed after the drivers stopped, if it succeeded.
    pub final_flush: Option<FlushReport>,
}

/// External shutdown or a fatal error in either driver.
struct StopSignal<'a, H: ?Sized> {
    external: &'a H,
    fatal: AtomicBool,
}

impl<'a, H: ShutdownCheck + ?Sized> StopSignal<'a, H> {
    fn new(external: &'a H) -> Self {
        Self {
            external,
            fatal: AtomicBool::new(false),
        }
    }

    fn abort(&self) {
        self.fatal.store(true, Ordering::SeqCst);
    }
}

impl<H: ShutdownCheck + ?Sized> ShutdownCheck for StopSignal<'_, H> {
    fn should_stop(&self) -> bool {
        self.fatal.load(Ordering::SeqCst) || self.external.should_stop()
    }
}

/// First multiple of `step_nanos` at or after `now_nanos`.
pub fn align_up(now_nanos: u64, step_nanos: u64) -> u64 {
    if step_nanos == 0 {
        return now_nanos;
    }
    now_nanos.div_ceil(step_nanos).saturating_mul(step_nanos)
}

/// Length of an `interval_secs` tick in nanoseconds, saturating at `u64::MAX`.
pub fn interval_nanos(interval_secs: u64) -> u64 {
    interval_secs.max(1).saturating_mul(NANOS_PER_SEC)
}

/// Sleep until the clock reaches `deadline_nanos`.
///
/// Returns false if shutdown was requested first.
pub fn wait_until<C, S, H>(deadline_nanos: u64, clock: &C, sleeper: &S, shutdown: &H) -> bool
where
    C: Clock + ?Sized,
    S: Sleeper + ?Sized,
    H: ShutdownCheck + ?Sized,
{
    loop {
        if shutdown.should_stop() {
            return false;
        }
        let now = clock.now_unix_nanos();
        if now >= deadline_nanos {
            return true;
        }
        sleeper.sleep(Duration::from_nanos(deadline_nanos - now).min(MAX_SLEEP));
    }
}

/// Run sampling cycles on `interval_secs` boundaries until shutdown.
///
/// Each cycle is stamped with its scheduled boundary, not the time it
/// actually started. Failed cycles are counted and skipped.
pub fn run_sampler<S, W, C, K, L, H>(
    engine: &Engine<S, W, C>,
    interval_secs: u64,
    clock: &K,
    sleeper: &L,
    shutdown: &H,
) -> SamplerStats
where
    S: SnmpClient,
    W: ArchiveWriter,
    C: Clock,
    K: Clock + ?Sized,
    L: Sleeper + ?Sized,
    H: ShutdownCheck + ?Sized,
{
    let step = interval_nanos(interval_secs);
    let mut stats = SamplerStats::default();
    let mut deadline = align_up(clock.now_unix_nanos(), step);
    debug!(first_tick = deadline / NANOS_PER_SEC, "sampler started");

    while wait_until(deadline, clock, sleeper, shutdown) {
        match engine.sample(deadline / NANOS_PER_SEC) {
            Ok(_) => stats.cycles += 1,
            Err(_) => stats.failed += 1,
        }

        deadline = deadline.saturating_add(step);
        let now = clock.now_unix_nanos();
        if now >= deadline.saturating_add(step) {
            let skipped = (now - deadline) / step;
            warn!(skipped, "sampling cycle overran, skipping ticks");
            stats.missed += skipped;
            deadline = deadline.saturating_add(skipped.saturating_mul(step));
        }
    }

    debug!(cycles = stats.cycles, failed = stats.failed, "sampler stopped");
    stats
}

/// Flush every `interval_secs` until shutdown or an archive error.
pub fn run_flusher<S, W, C, K, L, H>(
    engine: &Engine<S, W, C>,
    interval_secs: u64,
    clock: &K,
    sleeper: &L,
    shutdown: &H,
) -> Result<FlusherStats, EngineError>
where
    S: SnmpClient,
    W: ArchiveWriter,
    C: Clock,
    K: Clock + ?Sized,
    L: Sleeper + ?Sized,
    H: ShutdownCheck + ?Sized,
{
    let step = interval_nanos(interval_secs);
    let mut stats = FlusherStats::default();
    let mut deadline = clock.now_unix_nanos().saturating_add(step);

    while wait_until(deadline, clock, sleeper, shutdown) {
        let report = engine.flush(clock.now_unix_sec())?;
        stats.flushes += 1;
        stats.archives += report.written.len() as u64;

        deadline = deadline.saturating_add(step);
        let now = clock.now_unix_nanos();
        if now >= deadline {
            deadline = now.saturating_add(step);
        }
    }

    debug!(flushes = stats.flushes, "flusher stopped");
    Ok(stats)
}

/// Run both drivers until `shutdown`, then flush once more.
///
/// A fatal archive error stops the sampler too and is returned after the
/// final flush has been attempted.
pub fn run_schedule<S, W, C, K, L, H>(
    engine: &Engine<S, W, C>,
    schedule: &Schedule,
    clock: &K,
    sleeper: &L,
    shutdown: &H,
) -> Result<RunSummary, EngineError>
where
    S: SnmpClient,
    W: ArchiveWriter,
    C: Clock,
    K: Clock + ?Sized,
    L: Sleeper + ?Sized,
    H: ShutdownCheck + ?Sized,
{
    let stop = StopSignal::new(shutdown);
    info!(
        sample_interval_secs = schedule.sample_interval_secs,
        flush_interval_secs = schedule.flush_interval_secs,
        "drivers starting"
    );

    let (sampler, flusher) = thread::scope(|s| {
        let sampler = s.spawn(|| {
            run_sampler(engine, schedule.sample_interval_secs, clock, sleeper, &stop)
        });
        let flusher = run_flusher(engine, schedule.flush_interval_secs, clock, sleeper, &stop);
        if let Err(e) = &flusher {
            error!(error = %e, "archive failure, stopping");
            stop.abort();
        }
        let sampler = sampler.join().unwrap_or_else(|_| {
            error!("sampler thread panicked");
            SamplerStats::default()
        });
        (sampler, flusher)
    });

    let final_flush = match engine.flush(clock.now_unix_sec()) {
        Ok(report) => {
            info!(samples = report.samples, "final flush complete");
            Some(report)
        }
        Err(e) => {
            warn!(error = %e, "final flush failed");
            None
        }
    };

    let flusher = flusher?;
    Ok(RunSummary {
        sampler,
        flusher,
        final_flush,
    })
}
