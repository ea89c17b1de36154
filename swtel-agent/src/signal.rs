//! Signal handling for graceful shutdown.
//!
//! `ShutdownFlag` is set by SIGINT or SIGTERM. The sampling and flushing
//! drivers check it between cycles, so an in-flight cycle always completes.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Trait for checking shutdown status.
pub trait ShutdownCheck: Send + Sync {
    /// Returns true if shutdown has been requested.
    fn should_stop(&self) -> bool;
}

impl<T: ShutdownCheck + ?Sized> ShutdownCheck for &T {
    fn should_stop(&self) -> bool {
        (**self).should_stop()
    }
}

/// Flag that tracks whether shutdown has been requested.
#[derive(Debug, Clone)]
pub struct ShutdownFlag {
    flag: Arc<AtomicBool>,
}

impl Default for ShutdownFlag {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownFlag {
    /// Create a new shutdown flag and register the SIGINT/SIGTERM handler.
    ///
    /// If the handler cannot be registered (e.g., already registered), the
    /// returned flag still works when triggered manually.
    pub fn new() -> Self {
        let flag = Arc::new(AtomicBool::new(false));
        let flag_clone = flag.clone();

        if let Err(e) = ctrlc::set_handler(move || {
            flag_clone.store(true, Ordering::SeqCst);
        }) {
            tracing::debug!(error = %e, "signal handler not installed");
        }

        Self { flag }
    }

    /// Create a shutdown flag without registering a handler.
    pub fn manual() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Manually trigger shutdown.
    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }
}

impl ShutdownCheck for ShutdownFlag {
    fn should_stop(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Mock shutdown checker that always signals shutdown.
#[derive(Debug, Default, Clone)]
pub struct AlwaysShutdown;

impl AlwaysShutdown {
    pub fn new() -> Self {
        Self
    }
}

impl ShutdownCheck for AlwaysShutdown {
    fn should_stop(&self) -> bool {
        true
    }
}

/// Mock shutdown checker that allows a fixed number of checks to pass.
///
/// The first `allowed` calls return false, every later call returns true.
#[derive(Debug)]
pub struct CountingShutdown {
    allowed: usize,
    calls: AtomicUsize,
}

impl CountingShutdown {
    pub fn new(allowed: usize) -> Self {
        Self {
            allowed,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of times `should_stop` has been called.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ShutdownCheck for CountingShutdown {
    fn should_stop(&self) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst) >= self.allowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shutdown_flag_initially_false() {
        let flag = ShutdownFlag::manual();
        assert!(!flag.should_stop());
    }

    #[test]
    fn test_shutdown_flag_trigger() {
        let flag = ShutdownFlag::manual();
        flag.trigger();
        assert!(flag.should_stop());
    }

    #[test]
    fn test_shutdown_flag_clone_shares_state() {
        let flag1 = ShutdownFlag::manual();
        let flag2 = flag1.clone();
        flag1.trigger();
        assert!(flag2.should_stop());
    }

    #[test]
    fn test_shutdown_flag_new_does_not_panic() {
        let flag = ShutdownFlag::new();
        assert!(!flag.should_stop());
    }

    #[test]
    fn test_always_shutdown() {
        assert!(AlwaysShutdown::new().should_stop());
    }

    #[test]
    fn test_counting_shutdown() {
        let checker = CountingShutdown::new(2);
        assert!(!checker.should_stop());
        assert!(!checker.should_stop());
        assert!(checker.should_stop());
        assert!(checker.should_stop());
        assert_eq!(checker.calls(), 4);
    }

    #[test]
    fn test_counting_shutdown_zero_stops_immediately() {
        assert!(CountingShutdown::new(0).should_stop());
    }

    #[test]
    fn test_reference_delegates() {
        fn check<H: ShutdownCheck>(h: H) -> bool {
            h.should_stop()
        }
        let flag = ShutdownFlag::manual();
        assert!(!check(&flag));
        flag.trigger();
        assert!(check(&flag));
    }
}
