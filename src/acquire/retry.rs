//! Bounded polling for transient "not ready yet" page states.
//!
//! A probe is re-checked until it reports ready or the deadline passes.
//! The sleep between checks grows geometrically from `initial_delay` up to
//! `max_delay` and is always clipped to the time remaining, so a poll never
//! overshoots its deadline by more than one probe call.

use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use super::driver::DriverResult;

/// Backoff between readiness checks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Sleep before the second check.
    #[serde(with = "millis")]
    pub initial_delay: Duration,
    /// Growth factor applied after each failed check.
    pub multiplier: f64,
    /// Upper bound on a single sleep.
    #[serde(with = "millis")]
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(250),
            multiplier: 1.5,
            max_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// A policy that re-checks immediately. Used by tests.
    #[must_use]
    pub const fn immediate() -> Self {
        Self {
            initial_delay: Duration::ZERO,
            multiplier: 1.0,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay to use after `delay`.
    #[must_use]
    pub fn next_delay(&self, delay: Duration) -> Duration {
        let grown = delay.mul_f64(self.multiplier.max(1.0));
        grown.min(self.max_delay)
    }

    /// Call `probe` until it returns `Ok(true)` or `timeout` elapses.
    ///
    /// The probe always runs at least once. Returns `Ok(false)` on timeout.
    ///
    /// # Errors
    ///
    /// Returns the first driver error raised by `probe`.
    pub fn poll_until<F>(&self, timeout: Duration, mut probe: F) -> DriverResult<bool>
    where
        F: FnMut() -> DriverResult<bool>,
    {
        let started = Instant::now();
        let mut delay = self.initial_delay;
        loop {
            if probe()? {
                return Ok(true);
            }
            let elapsed = started.elapsed();
            if elapsed >= timeout {
                return Ok(false);
            }
            let remaining = timeout - elapsed;
            thread::sleep(delay.min(remaining));
            delay = self.next_delay(delay);
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquire::driver::DriverError;

    #[test]
    fn test_next_delay_grows_and_caps() {
        let policy = RetryPolicy {
            initial_delay: Duration::from_millis(100),
            multiplier: 2.0,
            max_delay: Duration::from_millis(300),
        };
        let d1 = policy.next_delay(policy.initial_delay);
        assert_eq!(d1, Duration::from_millis(200));
        assert_eq!(policy.next_delay(d1), Duration::from_millis(300));
    }

    #[test]
    fn test_poll_until_succeeds_after_retries() {
        let mut calls = 0;
        let ready = RetryPolicy::immediate()
            .poll_until(Duration::from_secs(5), || {
                calls += 1;
                Ok(calls == 3)
            })
            .unwrap();
        assert!(ready);
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_poll_until_times_out() {
        let policy = RetryPolicy {
            initial_delay: Duration::from_millis(5),
            multiplier: 1.0,
            max_delay: Duration::from_millis(5),
        };
        let started = Instant::now();
        let ready = policy
            .poll_until(Duration::from_millis(30), || Ok(false))
            .unwrap();
        assert!(!ready);
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_poll_until_zero_timeout_probes_once() {
        let mut calls = 0;
        let ready = RetryPolicy::immediate()
            .poll_until(Duration::ZERO, || {
                calls += 1;
                Ok(false)
            })
            .unwrap();
        assert!(!ready);
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_poll_until_propagates_driver_error() {
        let err = RetryPolicy::immediate()
            .poll_until(Duration::from_secs(1), || {
                Err(DriverError::Script("boom".into()))
            })
            .unwrap_err();
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn test_policy_serde_in_millis() {
        let policy: RetryPolicy =
            serde_json::from_str(r#"{"initial_delay": 100, "max_delay": 400}"#).unwrap();
        assert_eq!(policy.initial_delay, Duration::from_millis(100));
        assert_eq!(policy.max_delay, Duration::from_millis(400));
        assert!((policy.multiplier - 1.5).abs() < f64::EPSILON);
    }
}
