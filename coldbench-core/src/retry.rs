// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Bounded retry policies with exponential backoff.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Bounded retry schedule.
///
/// `backoff(n)` is the delay before attempt `n + 1`:
/// `min(initial * multiplier^n, max_backoff)`. Retrying stops after
/// `max_attempts` attempts or once the cumulative wait would exceed `max_wait`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub multiplier: f64,
    pub max_backoff: Duration,
    pub max_wait: Option<Duration>,
}

impl RetryPolicy {
    /// Default readiness polling: 20 polls, 2s doubling to 60s, 10 minutes overall.
    pub fn readiness() -> Self {
        Self {
            max_attempts: 20,
            initial_backoff: Duration::from_secs(2),
            multiplier: 2.0,
            max_backoff: Duration::from_secs(60),
            max_wait: Some(Duration::from_secs(600)),
        }
    }

    /// Default deployment retries on transient errors: 30s, 90s, 120s.
    pub fn deployment() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(30),
            multiplier: 3.0,
            max_backoff: Duration::from_secs(120),
            max_wait: None,
        }
    }

    /// A single attempt, never retried.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            multiplier: 1.0,
            max_backoff: Duration::ZERO,
            max_wait: None,
        }
    }

    /// Delay after the `retry`-th failed attempt (0-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        let scaled = self.initial_backoff.as_secs_f64() * self.multiplier.powi(retry as i32);
        let capped = scaled.min(self.max_backoff.as_secs_f64());
        if capped.is_finite() && capped > 0.0 {
            Duration::from_secs_f64(capped)
        } else {
            Duration::ZERO
        }
    }

    /// Whether another attempt is allowed after `attempts_made`, given the
    /// time already spent waiting and the next delay.
    pub fn allows(&self, attempts_made: u32, waited: Duration, next_delay: Duration) -> bool {
        if attempts_made >= self.max_attempts {
            return false;
        }
        match self.max_wait {
            Some(limit) => waited + next_delay <= limit,
            None => true,
        }
    }

    /// The full backoff schedule this policy can produce.
    pub fn schedule(&self) -> Vec<Duration> {
        let mut delays = Vec::new();
        let mut waited = Duration::ZERO;
        for retry in 0..self.max_attempts.saturating_sub(1) {
            let delay = self.backoff(retry);
            if !self.allows(retry + 1, waited, delay) {
                break;
            }
            waited += delay;
            delays.push(delay);
        }
        delays
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::readiness()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_backoff_capped() {
        let policy = RetryPolicy::readiness();
        assert_eq!(policy.backoff(0), Duration::from_secs(2));
        assert_eq!(policy.backoff(1), Duration::from_secs(4));
        assert_eq!(policy.backoff(4), Duration::from_secs(32));
        assert_eq!(policy.backoff(5), Duration::from_secs(60));
        assert_eq!(policy.backoff(12), Duration::from_secs(60));
    }

    #[test]
    fn test_deployment_schedule() {
        let schedule = RetryPolicy::deployment().schedule();
        assert_eq!(
            schedule,
            vec![Duration::from_secs(30), Duration::from_secs(90)]
        );
    }

    #[test]
    fn test_schedule_bounded_by_max_wait() {
        let policy = RetryPolicy {
            max_attempts: 100,
            initial_backoff: Duration::from_secs(10),
            multiplier: 1.0,
            max_backoff: Duration::from_secs(10),
            max_wait: Some(Duration::from_secs(35)),
        };
        assert_eq!(policy.schedule().len(), 3);
    }

    #[test]
    fn test_none_never_retries() {
        let policy = RetryPolicy::none();
        assert!(policy.schedule().is_empty());
        assert!(!policy.allows(1, Duration::ZERO, Duration::ZERO));
    }
}
