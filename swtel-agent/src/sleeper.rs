//! Sleep abstraction for testable driver loops.

use std::time::Duration;

/// Trait for sleeping between driver checks.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// Real sleeper that uses `std::thread::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealSleeper;

impl RealSleeper {
    pub fn new() -> Self {
        Self
    }
}

impl Sleeper for RealSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Mock sleeper for testing - returns immediately.
#[derive(Debug, Default, Clone, Copy)]
pub struct MockSleeper;

impl MockSleeper {
    pub fn new() -> Self {
        Self
    }
}

impl Sleeper for MockSleeper {
    fn sleep(&self, _duration: Duration) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_sleeper_returns_immediately() {
        let start = std::time::Instant::now();
        MockSleeper::new().sleep(Duration::from_secs(100));
        assert!(start.elapsed().as_millis() < 10);
    }

    #[test]
    fn test_real_sleeper_sleeps() {
        let start = std::time::Instant::now();
        RealSleeper::new().sleep(Duration::from_millis(20));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_sleeper_trait_object() {
        let sleeper: Box<dyn Sleeper> = Box::new(MockSleeper::new());
        sleeper.sleep(Duration::from_secs(1));
    }
}
