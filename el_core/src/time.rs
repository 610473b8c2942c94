// ABOUTME: Monotonic timing helpers for measuring pipeline stages.
// ABOUTME: Used to record per-provider attempt latency and sampling duration.
use std::time::{Duration, Instant};

/// Monotonic duration measurer
///
/// # Examples
///
/// ```
/// use el_core::MonotonicTimer;
/// use std::thread;
/// use std::time::Duration;
///
/// let timer = MonotonicTimer::new();
/// thread::sleep(Duration::from_millis(1));
/// assert!(timer.elapsed() >= Duration::from_millis(1));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct MonotonicTimer {
    start: Instant,
}

impl MonotonicTimer {
    /// Create a new timer starting now
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get elapsed time since creation
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Elapsed whole milliseconds, saturating at `u64::MAX`
    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.start.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    /// Reset the timer to now
    pub fn reset(&mut self) {
        self.start = Instant::now();
    }
}

impl Default for MonotonicTimer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_monotonic_timer() {
        let timer = MonotonicTimer::new();
        thread::sleep(Duration::from_millis(1));
        let elapsed = timer.elapsed();
        assert!(elapsed < Duration::from_secs(1));
        assert!(timer.elapsed_ms() >= 1);
    }

    #[test]
    fn test_monotonic_timer_reset() {
        let mut timer = MonotonicTimer::new();
        thread::sleep(Duration::from_millis(2));
        let first_elapsed = timer.elapsed();
        timer.reset();
        let second_elapsed = timer.elapsed();
        assert!(second_elapsed < first_elapsed);
    }
}
