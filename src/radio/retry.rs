//! # Retry-with-timeout combinator
//!
//! Hardware that "becomes ready after a while" (calibration finishing, the
//! crystal settling after wake up, RSSI becoming valid) is polled through
//! [`Retry`] instead of ad hoc loops, so the polling policy is visible at the
//! call site and a simulated chip can decide after how many polls it is ready.

use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Outcome of a single polling attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt<T> {
    /// Condition reached
    Done(T),
    /// Not yet, poll again
    Again,
}

/// A bounded poll gave up
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{what} did not complete after {attempts} attempts")]
pub struct Exhausted {
    pub what: &'static str,
    pub attempts: u32,
}

/// Polling policy: how many attempts and how long to wait between them
#[derive(Debug, Clone, Copy)]
pub struct Retry {
    what: &'static str,
    max_attempts: Option<u32>,
    delay: Duration,
}

impl Retry {
    /// Give up with [`Exhausted`] after `max_attempts` failed polls
    pub fn bounded(what: &'static str, max_attempts: u32, delay: Duration) -> Self {
        Self {
            what,
            max_attempts: Some(max_attempts.max(1)),
            delay,
        }
    }

    /// Poll until the condition is reached; for completions the chip guarantees
    pub fn unbounded(what: &'static str, delay: Duration) -> Self {
        Self {
            what,
            max_attempts: None,
            delay,
        }
    }

    fn exhausted(&self, attempt: u32) -> bool {
        matches!(self.max_attempts, Some(max) if attempt >= max)
    }

    /// Run `op` until it returns [`Attempt::Done`], sleeping `delay` between
    /// attempts. `op` receives the zero-based attempt number. Errors returned
    /// by `op` abort the loop immediately.
    pub async fn run<T, E, F, Fut>(&self, mut op: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<Attempt<T>, E>>,
        E: From<Exhausted>,
    {
        let mut attempt = 0u32;
        loop {
            if let Attempt::Done(value) = op(attempt).await? {
                return Ok(value);
            }
            attempt = attempt.saturating_add(1);
            if self.exhausted(attempt) {
                return Err(Exhausted {
                    what: self.what,
                    attempts: attempt,
                }
                .into());
            }
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
        }
    }

    /// Synchronous variant for tight polls done while the bus is held.
    /// The delay is ignored: nothing may sleep with the bus locked.
    pub fn spin<T, E, F>(&self, mut op: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Result<Attempt<T>, E>,
        E: From<Exhausted>,
    {
        let mut attempt = 0u32;
        loop {
            if let Attempt::Done(value) = op(attempt)? {
                return Ok(value);
            }
            attempt = attempt.saturating_add(1);
            if self.exhausted(attempt) {
                return Err(Exhausted {
                    what: self.what,
                    attempts: attempt,
                }
                .into());
            }
            std::hint::spin_loop();
        }
    }
}
