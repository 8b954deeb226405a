use std::time::Duration;

use crate::cancellable::{CancellableResult, CancellationToken};
use crate::run::ModelRun;
use crate::trigger::{ActivityError, TriggerActivity, TriggerParams};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            interval: Duration::from_secs(1),
        }
    }
}

/// In-process stand-in for a durable execution engine: at-least-once
/// execution of an activity with bounded retries.
#[derive(Debug, Clone, Default)]
pub struct LocalActivityExecutor {
    policy: RetryPolicy,
}

impl LocalActivityExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Runs `activity` until it succeeds, fails with a non-retryable error,
    /// runs out of attempts or the token is cancelled. The closure receives
    /// the 1-based attempt number.
    pub fn execute<T, F>(
        &self,
        name: &str,
        token: &CancellationToken,
        mut activity: F,
    ) -> Result<T, ActivityError>
    where
        F: FnMut(u32) -> Result<T, ActivityError>,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            log::debug!("Running {name}, attempt {attempt}/{max_attempts}");
            let error = match activity(attempt) {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if !error.is_retryable() {
                log::error!("{name} failed with a non-retryable error: {error}");
                return Err(error);
            }
            if attempt >= max_attempts {
                log::error!("{name} failed after {attempt} attempts: {error}");
                return Err(error);
            }

            log::warn!(
                "{name} attempt {attempt} failed, retrying in {:?}: {error}",
                self.policy.interval
            );
            match token.sleep(self.policy.interval) {
                CancellableResult::Completed(()) => attempt += 1,
                CancellableResult::Cancelled | CancellableResult::TimedOut => {
                    log::warn!("{name} stopped before attempt {}", attempt + 1);
                    return Err(error);
                }
            }
        }
    }

    pub fn run_trigger(
        &self,
        activity: &TriggerActivity,
        params: &TriggerParams,
        token: &CancellationToken,
    ) -> Result<ModelRun, ActivityError> {
        let name = format!("Trigger {}", params.trigger_id);
        self.execute(&name, token, |_| activity.execute(params, token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageError;
    use crate::trigger::TriggerError;
    use crate::usage::UsageError;

    fn executor(max_attempts: u32) -> LocalActivityExecutor {
        LocalActivityExecutor::new(RetryPolicy {
            max_attempts,
            interval: Duration::from_millis(1),
        })
    }

    fn transient() -> ActivityError {
        ActivityError {
            model_id: "m".to_string(),
            source: TriggerError::Storage(StorageError::NotFound("inputs/x".to_string())),
        }
    }

    fn quota() -> ActivityError {
        ActivityError {
            model_id: "m".to_string(),
            source: TriggerError::Usage(UsageError::QuotaExceeded {
                requester: "u".to_string(),
                used_ms: 10,
                limit_ms: 10,
            }),
        }
    }

    #[test]
    fn test_retries_until_success() {
        let mut calls = 0;
        let result = executor(3).execute("job", &CancellationToken::new(), |attempt| {
            calls += 1;
            if attempt < 3 { Err(transient()) } else { Ok(attempt) }
        });
        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_attempts_are_bounded() {
        let mut calls = 0;
        let result: Result<(), _> = executor(3).execute("job", &CancellationToken::new(), |_| {
            calls += 1;
            Err(transient())
        });
        assert!(result.is_err());
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_non_retryable_stops_immediately() {
        let mut calls = 0;
        let result: Result<(), _> = executor(5).execute("job", &CancellationToken::new(), |_| {
            calls += 1;
            Err(quota())
        });
        assert!(matches!(
            result.unwrap_err().source,
            TriggerError::Usage(UsageError::QuotaExceeded { .. })
        ));
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_cancellation_stops_retries() {
        let token = CancellationToken::new();
        let mut calls = 0;
        let result: Result<(), _> = executor(5).execute("job", &token, |_| {
            calls += 1;
            token.cancel();
            Err(transient())
        });
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_zero_attempts_runs_once() {
        let mut calls = 0;
        let _: Result<(), _> = executor(0).execute("job", &CancellationToken::new(), |_| {
            calls += 1;
            Err(transient())
        });
        assert_eq!(calls, 1);
    }
}
