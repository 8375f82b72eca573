use std::time::Duration;

use log::{info, warn};
use serde::Deserialize;

use super::SensorError;

/// Reconnect policy for the sensor link. Delays double from
/// `initial_delay_ms` up to `max_delay_ms`.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RetryPolicy {
    /// Zero retries forever.
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 0,
            initial_delay_ms: 1_000,
            max_delay_ms: 30_000,
        }
    }
}

impl RetryPolicy {
    pub fn allows(&self, attempt: u32) -> bool {
        self.max_attempts == 0 || attempt <= self.max_attempts
    }

    /// Delay after the failed `attempt` (1-based).
    pub fn delay_ms(&self, attempt: u32) -> u64 {
        let doublings = attempt.saturating_sub(1).min(32);
        self.initial_delay_ms
            .saturating_mul(1u64 << doublings)
            .min(self.max_delay_ms)
    }
}

pub fn connect_with_retry<T, F, S>(
    policy: RetryPolicy,
    target: &str,
    mut open: F,
    mut sleep: S,
) -> Result<T, SensorError>
where
    F: FnMut() -> Result<T, SensorError>,
    S: FnMut(Duration),
{
    let mut attempt = 1u32;
    loop {
        match open() {
            Ok(link) => {
                if attempt > 1 {
                    info!("{target} connected after {attempt} attempts");
                }
                return Ok(link);
            }
            Err(err) => {
                if !policy.allows(attempt.saturating_add(1)) {
                    warn!("{target}: {err}");
                    return Err(SensorError::RetriesExhausted {
                        target: target.to_string(),
                        attempts: attempt,
                    });
                }
                let delay_ms = policy.delay_ms(attempt);
                warn!("{target}: {err}; retrying in {delay_ms}ms");
                sleep(Duration::from_millis(delay_ms));
                attempt = attempt.saturating_add(1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn refused() -> SensorError {
        SensorError::Open {
            target: "/dev/ttyACM0".to_string(),
            reason: "no such device".to_string(),
        }
    }

    #[test]
    fn delay_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 0,
            initial_delay_ms: 500,
            max_delay_ms: 3_000,
        };
        let delays: Vec<u64> = (1..=5).map(|attempt| policy.delay_ms(attempt)).collect();
        assert_eq!(delays, vec![500, 1_000, 2_000, 3_000, 3_000]);
        assert_eq!(policy.delay_ms(200), 3_000);
    }

    #[test]
    fn bounded_policy_gives_up() {
        let policy = RetryPolicy {
            max_attempts: 3,
            initial_delay_ms: 10,
            max_delay_ms: 40,
        };
        let mut calls = 0;
        let mut slept = Vec::new();

        let result: Result<(), SensorError> = connect_with_retry(
            policy,
            "sensor",
            || {
                calls += 1;
                Err(refused())
            },
            |delay| slept.push(delay.as_millis() as u64),
        );

        assert!(matches!(
            result,
            Err(SensorError::RetriesExhausted { attempts: 3, .. })
        ));
        assert_eq!(calls, 3);
        assert_eq!(slept, vec![10, 20]);
    }

    #[test]
    fn succeeds_after_transient_failures() {
        let mut calls = 0;
        let result = connect_with_retry(
            RetryPolicy::default(),
            "sensor",
            || {
                calls += 1;
                if calls < 4 {
                    Err(refused())
                } else {
                    Ok(calls)
                }
            },
            |_| {},
        );

        assert_eq!(result.unwrap(), 4);
    }
}
