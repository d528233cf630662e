//! # Logging Utilities
//!
//! `env_logger` initialisation for applications embedding the driver, plus the
//! rate limiter used on the radio hot paths (dropped frames, full event queue)
//! so a noisy channel cannot flood the log.

use log::LevelFilter;
use std::time::Instant;

/// Initializes the logger with the `env_logger` crate (honours `RUST_LOG`).
///
/// Safe to call more than once; later calls are ignored.
pub fn init_logger() {
    let _ = env_logger::try_init();
}

/// Initializes `env_logger` with a fixed maximum level, ignoring `RUST_LOG`.
pub fn init_logger_with_level(level: LevelFilter) {
    let _ = env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp_micros()
        .try_init();
}

/// Throttling structure for rate-limiting log messages
#[derive(Debug)]
pub struct LogThrottle {
    /// Time window for throttling (in milliseconds)
    window_ms: u64,
    /// Maximum messages allowed per window
    cap: u32,
    count: u32,
    suppressed: u32,
    t0: Instant,
}

impl LogThrottle {
    /// Create new throttle with window and message cap
    pub fn new(window_ms: u64, cap: u32) -> Self {
        Self {
            window_ms,
            cap,
            count: 0,
            suppressed: 0,
            t0: Instant::now(),
        }
    }

    /// Check if logging is allowed (resets counter after window expires)
    pub fn allow(&mut self) -> bool {
        let now = Instant::now();
        let elapsed_ms = now.duration_since(self.t0).as_millis() as u64;

        if elapsed_ms > self.window_ms {
            if self.suppressed > 0 {
                log::debug!("{} log messages suppressed in the last window", self.suppressed);
            }
            self.t0 = now;
            self.count = 0;
            self.suppressed = 0;
        }

        self.count += 1;
        if self.count <= self.cap {
            true
        } else {
            self.suppressed += 1;
            false
        }
    }

    /// Messages swallowed in the current window
    pub fn suppressed(&self) -> u32 {
        self.suppressed
    }
}

impl Default for LogThrottle {
    /// Five messages per second
    fn default() -> Self {
        Self::new(1000, 5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_throttle_cap() {
        let mut throttle = LogThrottle::new(1000, 3);

        assert!(throttle.allow());
        assert!(throttle.allow());
        assert!(throttle.allow());
        assert!(!throttle.allow());
        assert!(!throttle.allow());
        assert_eq!(throttle.suppressed(), 2);
    }

    #[test]
    fn test_log_throttle_window_reset() {
        let mut throttle = LogThrottle::new(0, 1);
        assert!(throttle.allow());
        std::thread::sleep(std::time::Duration::from_millis(2));
        assert!(throttle.allow());
    }

    #[test]
    fn test_init_logger_twice() {
        init_logger_with_level(LevelFilter::Debug);
        init_logger();
    }
}
