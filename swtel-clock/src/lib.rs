//! Clock abstraction for the switch telemetry agent.
//!
//! Sampling timestamps, collection latency bounds and archive interval ranges
//! all come from a [`Clock`], so every time-dependent path can be driven by a
//! mock in tests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Nanoseconds per second.
pub const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Trait for reading the current wall-clock time.
pub trait Clock: Send + Sync {
    /// Returns the current time as Unix nanoseconds since epoch.
    fn now_unix_nanos(&self) -> u64;

    /// Returns the current time as Unix seconds since epoch.
    fn now_unix_sec(&self) -> u64 {
        self.now_unix_nanos() / NANOS_PER_SEC
    }
}

impl<T: Clock + ?Sized> Clock for &T {
    fn now_unix_nanos(&self) -> u64 {
        (**self).now_unix_nanos()
    }
}

/// Real system clock implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix_nanos(&self) -> u64 {
        // A clock set before 1970 reads as the epoch itself.
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0)
    }
}

/// Mock clock for testing with a fixed timestamp.
#[derive(Debug, Clone, Copy)]
pub struct MockClock {
    nanos: u64,
}

impl MockClock {
    /// Create a mock clock fixed at `timestamp` Unix seconds.
    pub fn new(timestamp: u64) -> Self {
        Self {
            nanos: timestamp * NANOS_PER_SEC,
        }
    }

    /// Create a mock clock fixed at `nanos` Unix nanoseconds.
    pub fn from_nanos(nanos: u64) -> Self {
        Self { nanos }
    }
}

impl Clock for MockClock {
    fn now_unix_nanos(&self) -> u64 {
        self.nanos
    }
}

/// Mock clock that auto-advances time on each call.
///
/// Every read returns the current value and then moves it forward by the
/// configured increment, so loops that poll the clock make progress.
#[derive(Debug)]
pub struct AdvancingClock {
    nanos: AtomicU64,
    increment_nanos: u64,
}

impl AdvancingClock {
    /// Start at `timestamp` seconds and advance by `increment` seconds per read.
    pub fn new(timestamp: u64, increment: u64) -> Self {
        Self::from_nanos(timestamp * NANOS_PER_SEC, increment * NANOS_PER_SEC)
    }

    /// Start at `nanos` and advance by `increment_nanos` per read.
    pub fn from_nanos(nanos: u64, increment_nanos: u64) -> Self {
        Self {
            nanos: AtomicU64::new(nanos),
            increment_nanos,
        }
    }
}

impl Clock for AdvancingClock {
    fn now_unix_nanos(&self) -> u64 {
        self.nanos.fetch_add(self.increment_nanos, Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_clock_returns_fixed_timestamp() {
        let clock = MockClock::new(1234567890);
        assert_eq!(clock.now_unix_sec(), 1234567890);
        assert_eq!(clock.now_unix_nanos(), 1234567890 * NANOS_PER_SEC);
    }

    #[test]
    fn test_mock_clock_from_nanos_truncates_seconds() {
        let clock = MockClock::from_nanos(1_500_000_000);
        assert_eq!(clock.now_unix_sec(), 1);
        assert_eq!(clock.now_unix_nanos(), 1_500_000_000);
    }

    #[test]
    fn test_mock_clock_zero_timestamp() {
        let clock = MockClock::new(0);
        assert_eq!(clock.now_unix_sec(), 0);
    }

    #[test]
    fn test_system_clock_returns_reasonable_time() {
        let clock = SystemClock;
        let now = clock.now_unix_sec();

        // After 2020-01-01, before 2100-01-01.
        assert!(now > 1577836800);
        assert!(now < 4102444800);
    }

    #[test]
    fn test_system_clock_nanos_agree_with_seconds() {
        let clock = SystemClock;
        let nanos = clock.now_unix_nanos();
        let secs = clock.now_unix_sec();
        assert!(secs >= nanos / NANOS_PER_SEC);
        assert!(secs - nanos / NANOS_PER_SEC <= 1);
    }

    #[test]
    fn test_clock_trait_object() {
        let mock: Box<dyn Clock> = Box::new(MockClock::new(1234567890));
        assert_eq!(mock.now_unix_sec(), 1234567890);

        let system: Box<dyn Clock> = Box::new(SystemClock);
        assert!(system.now_unix_sec() > 1577836800);
    }

    #[test]
    fn test_advancing_clock_increments() {
        let clock = AdvancingClock::new(1000, 5);
        assert_eq!(clock.now_unix_sec(), 1000);
        assert_eq!(clock.now_unix_sec(), 1005);
        assert_eq!(clock.now_unix_sec(), 1010);
    }

    #[test]
    fn test_advancing_clock_sub_second_increment() {
        let clock = AdvancingClock::from_nanos(10 * NANOS_PER_SEC, NANOS_PER_SEC / 2);
        assert_eq!(clock.now_unix_nanos(), 10 * NANOS_PER_SEC);
        assert_eq!(clock.now_unix_sec(), 10);
        assert_eq!(clock.now_unix_sec(), 11);
    }

    #[test]
    fn test_advancing_clock_zero_increment() {
        let clock = AdvancingClock::new(1000, 0);
        assert_eq!(clock.now_unix_sec(), 1000);
        assert_eq!(clock.now_unix_sec(), 1000);
    }

    #[test]
    fn test_advancing_clock_debug() {
        let clock = AdvancingClock::new(1000, 1);
        let debug = format!("{:?}", clock);
        assert!(debug.contains("AdvancingClock"));
    }

    #[test]
    fn test_clock_by_reference() {
        fn read<C: Clock>(clock: C) -> u64 {
            clock.now_unix_sec()
        }
        let clock = MockClock::new(42);
        assert_eq!(read(&clock), 42);
    }
}
