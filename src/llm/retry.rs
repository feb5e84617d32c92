//! 重试装饰器：为任意 LlmClient 加上单次调用超时与瞬时错误重试

use std::sync::Arc;

use async_trait::async_trait;

use super::{LlmClient, LlmError, Message};
use crate::capability::retry::{call_with_retry, RetryPolicy};

pub struct RetryingLlmClient {
    inner: Arc<dyn LlmClient>,
    policy: RetryPolicy,
}

impl RetryingLlmClient {
    pub fn new(inner: Arc<dyn LlmClient>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl LlmClient for RetryingLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        let inner = self.inner.clone();
        call_with_retry(self.inner.name(), &self.policy, || {
            let inner = inner.clone();
            async move { inner.complete(messages).await.map_err(Into::into) }
        })
        .await
        .map_err(LlmError::from)
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    fn token_usage(&self) -> (u64, u64, u64) {
        self.inner.token_usage()
    }
}
