//! The collection task runner - one supervised adapter invocation
//!
//! The runner turns an adapter call into exactly one `RawSourceResult`
//! even when the adapter fails or hangs instead of returning. Failed
//! attempts retry with exponential backoff while budget remains; a
//! timeout, whether the adapter's own or the runner's, is terminal and
//! never retried. Retrying a call that already burned its deadline once
//! would just burn it again.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::time::Instant;
use tracing::{debug, warn};

use magpie_core::{RawSourceResult, Target};
use magpie_sources::SourceAdapter;

/// Retry behavior for failed (not timed-out) attempts
#[derive(Debug, Clone, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, the first one included
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Backoff before the second attempt, milliseconds
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    /// Multiplier applied to the backoff per subsequent attempt
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
}

fn default_max_attempts() -> u32 {
    2
}

fn default_backoff_base_ms() -> u64 {
    200
}

fn default_backoff_factor() -> f64 {
    2.0
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_factor: default_backoff_factor(),
        }
    }
}

impl RetryPolicy {
    /// Delay before the given attempt number. The first attempt never
    /// waits; attempt 2 waits the base, each attempt after that scales
    /// by the factor.
    pub fn backoff_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let exponent = attempt.saturating_sub(2) as i32;
        let millis = self.backoff_base_ms as f64 * self.backoff_factor.powi(exponent);
        Duration::from_millis(millis as u64)
    }
}

/// Supervise one adapter invocation within a wall-clock budget.
///
/// Always returns a result; the adapter's fault modes map onto the
/// result status:
/// - an `Ok` fetch finalizes the task as `Ok`, entities attached
/// - an error retries (with backoff) until attempts or budget run out,
///   then finalizes as `Error` carrying the last error's detail
/// - a timeout, adapter-internal or the budget elapsing mid-attempt,
///   finalizes as `Timeout` immediately
pub async fn run_collection_task(
    adapter: Arc<dyn SourceAdapter>,
    target: &Target,
    budget: Duration,
    policy: &RetryPolicy,
) -> RawSourceResult {
    let module = adapter.module().to_string();
    let started = Instant::now();
    let deadline = started + budget;
    let max_attempts = policy.max_attempts.max(1);
    let mut last_error: Option<String> = None;

    for attempt in 1..=max_attempts {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }

        match tokio::time::timeout(remaining, adapter.fetch(target)).await {
            Ok(Ok(entities)) => {
                debug!(
                    module = %module,
                    attempt,
                    count = entities.len(),
                    "module returned"
                );
                return RawSourceResult::ok(&module, entities, started.elapsed());
            }
            Ok(Err(e)) if e.is_timeout() => {
                warn!(module = %module, attempt, error = %e, "module timed out internally");
                return RawSourceResult::timeout(&module, &e.to_string(), started.elapsed());
            }
            Ok(Err(e)) => {
                warn!(module = %module, attempt, error = %e, "module attempt failed");
                last_error = Some(e.to_string());
            }
            Err(_) => {
                warn!(module = %module, attempt, "task budget elapsed mid-attempt");
                return RawSourceResult::timeout(
                    &module,
                    &format!(
                        "task budget of {}ms elapsed during attempt {}",
                        budget.as_millis(),
                        attempt
                    ),
                    started.elapsed(),
                );
            }
        }

        if attempt < max_attempts {
            let backoff = policy.backoff_before(attempt + 1);
            let remaining = deadline.saturating_duration_since(Instant::now());
            let wait = backoff.min(remaining);
            if !wait.is_zero() {
                tokio::time::sleep(wait).await;
            }
        }
    }

    match last_error {
        Some(detail) => RawSourceResult::error(&module, &detail, started.elapsed()),
        None => RawSourceResult::timeout(
            &module,
            "task budget exhausted before any attempt",
            started.elapsed(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use magpie_core::{EntityKind, RawEntity, SourceStatus, TargetKind};
    use magpie_sources::SourceError;
    use std::sync::atomic::{AtomicU32, Ordering};

    enum Behavior {
        Succeed,
        Fail,
        FailTimes(u32),
        Hang,
        InternalTimeout,
    }

    struct ScriptedAdapter {
        behavior: Behavior,
        calls: AtomicU32,
    }

    impl ScriptedAdapter {
        fn new(behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                behavior,
                calls: AtomicU32::new(0),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SourceAdapter for ScriptedAdapter {
        fn module(&self) -> &str {
            "scripted"
        }

        async fn fetch(&self, _target: &Target) -> Result<Vec<RawEntity>, SourceError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            match &self.behavior {
                Behavior::Succeed => Ok(vec![RawEntity::new(
                    EntityKind::Ip,
                    "192.0.2.1",
                    "scripted",
                )]),
                Behavior::Fail => Err(SourceError::Api {
                    status: 500,
                    detail: "internal error".to_string(),
                }),
                Behavior::FailTimes(n) => {
                    if call <= *n {
                        Err(SourceError::Api {
                            status: 503,
                            detail: format!("flaky failure {}", call),
                        })
                    } else {
                        Ok(vec![RawEntity::new(EntityKind::Ip, "192.0.2.1", "scripted")])
                    }
                }
                Behavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(Vec::new())
                }
                Behavior::InternalTimeout => Err(SourceError::Timeout(1)),
            }
        }
    }

    fn target() -> Target {
        Target::new(TargetKind::Domain, "example.com")
            .unwrap()
            .with_module("scripted")
    }

    fn quick_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            backoff_base_ms: 5,
            backoff_factor: 2.0,
        }
    }

    #[test]
    fn test_backoff_schedule() {
        let policy = RetryPolicy {
            max_attempts: 4,
            backoff_base_ms: 100,
            backoff_factor: 2.0,
        };
        assert_eq!(policy.backoff_before(1), Duration::ZERO);
        assert_eq!(policy.backoff_before(2), Duration::from_millis(100));
        assert_eq!(policy.backoff_before(3), Duration::from_millis(200));
        assert_eq!(policy.backoff_before(4), Duration::from_millis(400));
    }

    #[tokio::test]
    async fn test_success_first_attempt() {
        let adapter = ScriptedAdapter::new(Behavior::Succeed);
        let result = run_collection_task(
            adapter.clone(),
            &target(),
            Duration::from_secs(5),
            &quick_policy(3),
        )
        .await;

        assert_eq!(result.status, SourceStatus::Ok);
        assert_eq!(result.entities.len(), 1);
        assert_eq!(adapter.calls(), 1);
    }

    #[tokio::test]
    async fn test_retry_then_success() {
        let adapter = ScriptedAdapter::new(Behavior::FailTimes(1));
        let result = run_collection_task(
            adapter.clone(),
            &target(),
            Duration::from_secs(5),
            &quick_policy(3),
        )
        .await;

        assert_eq!(result.status, SourceStatus::Ok);
        assert_eq!(adapter.calls(), 2);
    }

    #[tokio::test]
    async fn test_error_after_exhausting_attempts() {
        let adapter = ScriptedAdapter::new(Behavior::Fail);
        let result = run_collection_task(
            adapter.clone(),
            &target(),
            Duration::from_secs(5),
            &quick_policy(2),
        )
        .await;

        assert_eq!(result.status, SourceStatus::Error);
        assert_eq!(adapter.calls(), 2);
        assert!(result.error_detail.as_deref().unwrap().contains("500"));
    }

    #[tokio::test]
    async fn test_budget_timeout_is_terminal() {
        let adapter = ScriptedAdapter::new(Behavior::Hang);
        let result = run_collection_task(
            adapter.clone(),
            &target(),
            Duration::from_millis(50),
            &quick_policy(3),
        )
        .await;

        // No retry after the budget fires, even with attempts left
        assert_eq!(result.status, SourceStatus::Timeout);
        assert_eq!(adapter.calls(), 1);
        assert!(result.duration >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_internal_timeout_is_terminal() {
        let adapter = ScriptedAdapter::new(Behavior::InternalTimeout);
        let result = run_collection_task(
            adapter.clone(),
            &target(),
            Duration::from_secs(5),
            &quick_policy(3),
        )
        .await;

        assert_eq!(result.status, SourceStatus::Timeout);
        assert_eq!(adapter.calls(), 1);
    }

    #[tokio::test]
    async fn test_zero_budget_yields_timeout_without_attempt() {
        let adapter = ScriptedAdapter::new(Behavior::Succeed);
        let result =
            run_collection_task(adapter.clone(), &target(), Duration::ZERO, &quick_policy(2))
                .await;

        assert_eq!(result.status, SourceStatus::Timeout);
        assert_eq!(adapter.calls(), 0);
    }

    #[tokio::test]
    async fn test_single_attempt_policy_never_retries() {
        let adapter = ScriptedAdapter::new(Behavior::Fail);
        let result = run_collection_task(
            adapter.clone(),
            &target(),
            Duration::from_secs(5),
            &quick_policy(1),
        )
        .await;

        assert_eq!(result.status, SourceStatus::Error);
        assert_eq!(adapter.calls(), 1);
    }
}
