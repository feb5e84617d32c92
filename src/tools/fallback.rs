//! 回退链：按顺序尝试的适配器列表（数据而非控制流）
//!
//! 每个被尝试的节点记录一条 ToolInvocation。首节点成功 → ok；后续节点成功 → degraded；
//! 全部失败或结果都不可用 → failed。RecoveryAction::Report 立即终止整条链。

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use serde_json::Value;

use crate::core::{CapabilityError, RecoveryAction, RecoveryEngine};
use crate::domain::{InvocationOutcome, ToolInvocation, ToolStatus};

pub struct ChainLink<A: ?Sized> {
    pub label: String,
    pub adapter: Arc<A>,
}

pub struct FallbackChain<A: ?Sized> {
    tool: &'static str,
    links: Vec<ChainLink<A>>,
    recovery: RecoveryEngine,
}

/// 回退链执行结果
#[derive(Debug)]
pub struct ChainOutcome<T> {
    pub value: Option<T>,
    pub status: ToolStatus,
    pub invocations: Vec<ToolInvocation>,
    pub last_error: Option<CapabilityError>,
}

impl<A: ?Sized + Send + Sync> FallbackChain<A> {
    pub fn new(tool: &'static str) -> Self {
        Self {
            tool,
            links: Vec::new(),
            recovery: RecoveryEngine::default(),
        }
    }

    pub fn link(mut self, label: impl Into<String>, adapter: Arc<A>) -> Self {
        self.links.push(ChainLink {
            label: label.into(),
            adapter,
        });
        self
    }

    pub fn labels(&self) -> Vec<&str> {
        self.links.iter().map(|l| l.label.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// 依次调用各节点；accept 为 false 的结果（如空列表）视为不可用，继续下一个节点
    pub async fn run<T, F, Fut, P>(&self, input: &Value, mut call: F, accept: P) -> ChainOutcome<T>
    where
        T: Serialize,
        F: FnMut(Arc<A>) -> Fut,
        Fut: Future<Output = Result<T, CapabilityError>>,
        P: Fn(&T) -> bool,
    {
        let mut invocations = Vec::with_capacity(self.links.len());
        let mut last_error = None;

        for (idx, link) in self.links.iter().enumerate() {
            let start = Instant::now();
            let result = call(link.adapter.clone()).await;
            let latency_ms = start.elapsed().as_millis() as u64;

            match result {
                Ok(value) => {
                    let usable = accept(&value);
                    let status = match (usable, idx) {
                        (true, 0) => ToolStatus::Ok,
                        (true, _) => ToolStatus::Degraded,
                        (false, _) => ToolStatus::Failed,
                    };
                    invocations.push(ToolInvocation {
                        tool: self.tool.to_string(),
                        adapter: link.label.clone(),
                        input: input.clone(),
                        outcome: InvocationOutcome::Success(
                            serde_json::to_value(&value).unwrap_or(Value::Null),
                        ),
                        status,
                        latency_ms,
                    });
                    if usable {
                        if idx > 0 {
                            tracing::warn!(tool = self.tool, adapter = %link.label, "served by fallback");
                        }
                        return ChainOutcome {
                            value: Some(value),
                            status,
                            invocations,
                            last_error,
                        };
                    }
                    tracing::debug!(tool = self.tool, adapter = %link.label, "empty result, trying next link");
                }
                Err(err) => {
                    invocations.push(ToolInvocation {
                        tool: self.tool.to_string(),
                        adapter: link.label.clone(),
                        input: input.clone(),
                        outcome: InvocationOutcome::Error {
                            kind: err.kind,
                            message: err.message.clone(),
                        },
                        status: ToolStatus::Failed,
                        latency_ms,
                    });
                    // 适配器内部的重试预算已用尽，这里只决定回退还是终止
                    let action = self.recovery.handle(&err, 1, 0);
                    tracing::warn!(tool = self.tool, adapter = %link.label, kind = %err.kind, "link failed");
                    last_error = Some(err);
                    if action == RecoveryAction::Report {
                        break;
                    }
                }
            }
        }

        ChainOutcome {
            value: None,
            status: ToolStatus::Failed,
            invocations,
            last_error,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::core::ErrorKind;

    #[async_trait]
    trait Lookup: Send + Sync {
        async fn get(&self) -> Result<Vec<u32>, CapabilityError>;
    }

    struct Fixed(Result<Vec<u32>, CapabilityError>, AtomicUsize);

    impl Fixed {
        fn new(r: Result<Vec<u32>, CapabilityError>) -> Arc<Self> {
            Arc::new(Self(r, AtomicUsize::new(0)))
        }
    }

    #[async_trait]
    impl Lookup for Fixed {
        async fn get(&self) -> Result<Vec<u32>, CapabilityError> {
            self.1.fetch_add(1, Ordering::SeqCst);
            self.0.clone()
        }
    }

    fn chain(a: Arc<Fixed>, b: Arc<Fixed>) -> FallbackChain<dyn Lookup> {
        FallbackChain::new("lookup")
            .link("primary", a as Arc<dyn Lookup>)
            .link("secondary", b as Arc<dyn Lookup>)
    }

    #[tokio::test]
    async fn test_primary_ok() {
        let out = chain(Fixed::new(Ok(vec![1])), Fixed::new(Ok(vec![2])))
            .run(&Value::Null, |a| async move { a.get().await }, |v| !v.is_empty())
            .await;
        assert_eq!(out.value, Some(vec![1]));
        assert_eq!(out.status, ToolStatus::Ok);
        assert_eq!(out.invocations.len(), 1);
    }

    #[tokio::test]
    async fn test_secondary_is_degraded() {
        let out = chain(Fixed::new(Err(CapabilityError::new(ErrorKind::QuotaExceeded, "q"))), Fixed::new(Ok(vec![2])))
            .run(&Value::Null, |a| async move { a.get().await }, |v| !v.is_empty())
            .await;
        assert_eq!(out.value, Some(vec![2]));
        assert_eq!(out.status, ToolStatus::Degraded);
        assert_eq!(out.invocations.len(), 2);
        assert_eq!(out.invocations[0].error_kind(), Some(ErrorKind::QuotaExceeded));
    }

    #[tokio::test]
    async fn test_empty_results_fail() {
        let out = chain(Fixed::new(Ok(vec![])), Fixed::new(Ok(vec![])))
            .run(&Value::Null, |a| async move { a.get().await }, |v| !v.is_empty())
            .await;
        assert!(out.value.is_none());
        assert_eq!(out.status, ToolStatus::Failed);
        assert_eq!(out.invocations.len(), 2);
    }

    #[tokio::test]
    async fn test_report_stops_chain() {
        let second = Fixed::new(Ok(vec![2]));
        let out = chain(Fixed::new(Err(CapabilityError::precondition("nope"))), second.clone())
            .run(&Value::Null, |a| async move { a.get().await }, |v| !v.is_empty())
            .await;
        assert_eq!(out.status, ToolStatus::Failed);
        assert_eq!(second.1.load(Ordering::SeqCst), 0);
    }
}
