// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Fixed-interval retry for the "wait until the device answers" loops.

use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::trace;

/// Interval between attempts when polling a device.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("gave up after {attempts} attempts")]
pub struct RetryExhausted {
    pub attempts: u32,
}

/// Fixed interval, no backoff. Unbounded unless a limit is set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub interval: Duration,
    pub max_attempts: Option<u32>,
    pub deadline: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::forever(DEFAULT_POLL_INTERVAL)
    }
}

impl RetryPolicy {
    /// Retry until success, sleeping `interval` between attempts.
    pub const fn forever(interval: Duration) -> Self {
        Self {
            interval,
            max_attempts: None,
            deadline: None,
        }
    }

    /// At most `max_attempts` attempts, back to back.
    pub const fn immediate(max_attempts: u32) -> Self {
        Self {
            interval: Duration::ZERO,
            max_attempts: Some(max_attempts),
            deadline: None,
        }
    }

    pub const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Stop once another attempt would start after `deadline` has passed.
    pub const fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Call `attempt` with the 1-based attempt number until it returns
    /// `Some`, or the policy runs out.
    pub fn run<T>(&self, mut attempt: impl FnMut(u32) -> Option<T>) -> Result<T, RetryExhausted> {
        let started = Instant::now();
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            if let Some(value) = attempt(attempts) {
                return Ok(value);
            }
            trace!(attempts, "attempt failed");

            if self.max_attempts.is_some_and(|max| attempts >= max) {
                return Err(RetryExhausted { attempts });
            }
            if self
                .deadline
                .is_some_and(|deadline| started.elapsed() + self.interval > deadline)
            {
                return Err(RetryExhausted { attempts });
            }
            if !self.interval.is_zero() {
                thread::sleep(self.interval);
            }
        }
    }
}
