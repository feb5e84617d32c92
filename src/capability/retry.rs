//! 适配器调用的超时与重试
//!
//! 每次调用独立计时；失败后交给 RecoveryEngine：瞬时错误（Timeout / ServiceUnavailable）按线性退避重试，
//! 其余错误原样返回给回退链。

use std::future::Future;
use std::time::{Duration, Instant};

use crate::core::{CapabilityError, RecoveryAction, RecoveryEngine};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub timeout: Duration,
    pub max_retries: u32,
    backoff: Duration,
    engine: RecoveryEngine,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(30), 1, Duration::from_millis(500))
    }
}

impl RetryPolicy {
    pub fn new(timeout: Duration, max_retries: u32, backoff: Duration) -> Self {
        Self {
            timeout,
            max_retries,
            backoff,
            engine: RecoveryEngine::new(backoff),
        }
    }

    /// 单个适配器的最长耗时：每次尝试都超时，再加上全部线性退避
    pub fn worst_case(&self) -> Duration {
        let backoff_steps: u32 = (1..=self.max_retries).sum();
        self.timeout * (self.max_retries + 1) + self.backoff * backoff_steps
    }

    /// 不重试，仅超时
    pub fn no_retry(timeout: Duration) -> Self {
        Self::new(timeout, 0, Duration::ZERO)
    }
}

/// 带超时与重试执行 op；label 仅用于日志
pub async fn call_with_retry<T, F, Fut>(
    label: &str,
    policy: &RetryPolicy,
    mut op: F,
) -> Result<T, CapabilityError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CapabilityError>>,
{
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        let start = Instant::now();
        let result = match tokio::time::timeout(policy.timeout, op()).await {
            Ok(r) => r,
            Err(_) => Err(CapabilityError::timeout(label, policy.timeout)),
        };
        let err = match result {
            Ok(v) => return Ok(v),
            Err(e) => e,
        };
        match policy.engine.handle(&err, attempt, policy.max_retries) {
            RecoveryAction::Retry { after } => {
                tracing::warn!(
                    adapter = label,
                    attempt,
                    kind = %err.kind,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "adapter call failed, retrying"
                );
                tokio::time::sleep(after).await;
            }
            RecoveryAction::Fallback | RecoveryAction::Report => {
                tracing::debug!(adapter = label, attempt, error = %err, "adapter call failed");
                return Err(err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::core::ErrorKind;

    fn policy() -> RetryPolicy {
        RetryPolicy::new(Duration::from_millis(200), 1, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_retry_once_on_timeout_then_succeed() {
        let calls = AtomicU32::new(0);
        let out = call_with_retry("t", &policy(), || async {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(CapabilityError::new(ErrorKind::Timeout, "slow"))
            } else {
                Ok(7)
            }
        })
        .await;
        assert_eq!(out.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retry_budget_exhausted() {
        let calls = AtomicU32::new(0);
        let out: Result<(), _> = call_with_retry("t", &policy(), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(CapabilityError::unavailable("503"))
        })
        .await;
        assert_eq!(out.unwrap_err().kind, ErrorKind::ServiceUnavailable);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_no_retry_on_malformed_output() {
        let calls = AtomicU32::new(0);
        let out: Result<(), _> = call_with_retry("t", &policy(), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(CapabilityError::malformed("not json"))
        })
        .await;
        assert_eq!(out.unwrap_err().kind, ErrorKind::MalformedOutput);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_worst_case_covers_retries_and_backoff() {
        let policy = RetryPolicy::new(Duration::from_secs(30), 1, Duration::from_millis(500));
        assert_eq!(policy.worst_case(), Duration::from_millis(60_500));
        let policy = RetryPolicy::new(Duration::from_secs(10), 2, Duration::from_secs(1));
        assert_eq!(policy.worst_case(), Duration::from_secs(33));
        assert_eq!(RetryPolicy::no_retry(Duration::from_secs(5)).worst_case(), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_slow_call_times_out() {
        let out: Result<(), _> = call_with_retry(
            "slow",
            &RetryPolicy::no_retry(Duration::from_millis(10)),
            || async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok(())
            },
        )
        .await;
        assert_eq!(out.unwrap_err().kind, ErrorKind::Timeout);
    }
}
