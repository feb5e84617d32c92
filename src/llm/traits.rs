//! LLM 客户端抽象
//!
//! 所有后端（OpenAI 兼容 / Gemini / Mock）实现 LlmClient::complete；错误统一为 LlmError，
//! 可无损映射到 CapabilityError 供恢复引擎决策。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::{CapabilityError, ErrorKind};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LlmError {
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),
    #[error("service unavailable: {0}")]
    Unavailable(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("api error: {0}")]
    ApiError(String),
}

impl LlmError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LlmError::Timeout(_) => ErrorKind::Timeout,
            LlmError::RateLimited(_) => ErrorKind::RateLimited,
            LlmError::QuotaExceeded(_) => ErrorKind::QuotaExceeded,
            LlmError::Unavailable(_) => ErrorKind::ServiceUnavailable,
            LlmError::InvalidResponse(_) => ErrorKind::MalformedOutput,
            LlmError::ApiError(_) => ErrorKind::Unknown,
        }
    }

    /// 按 HTTP 状态码 / 错误文本归类（供各后端复用）
    pub fn classify(status: Option<u16>, message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();
        match status {
            Some(429) if lower.contains("quota") => LlmError::QuotaExceeded(message),
            Some(429) => LlmError::RateLimited(message),
            Some(408) | Some(504) => LlmError::Timeout(message),
            Some(s) if s >= 500 => LlmError::Unavailable(message),
            _ if lower.contains("quota") || lower.contains("resource_exhausted") => {
                LlmError::QuotaExceeded(message)
            }
            _ if lower.contains("rate limit") || lower.contains("429") => LlmError::RateLimited(message),
            _ if lower.contains("timed out") || lower.contains("timeout") => LlmError::Timeout(message),
            _ if lower.contains("connect") || lower.contains("503") || lower.contains("unavailable") => {
                LlmError::Unavailable(message)
            }
            _ => LlmError::ApiError(message),
        }
    }
}

impl From<LlmError> for CapabilityError {
    fn from(e: LlmError) -> Self {
        CapabilityError::new(e.kind(), e.to_string())
    }
}

impl From<CapabilityError> for LlmError {
    fn from(e: CapabilityError) -> Self {
        match e.kind {
            ErrorKind::Timeout => LlmError::Timeout(e.message),
            ErrorKind::RateLimited => LlmError::RateLimited(e.message),
            ErrorKind::QuotaExceeded => LlmError::QuotaExceeded(e.message),
            ErrorKind::ServiceUnavailable => LlmError::Unavailable(e.message),
            ErrorKind::MalformedOutput => LlmError::InvalidResponse(e.message),
            _ => LlmError::ApiError(e.message),
        }
    }
}

/// LLM 客户端 trait：非流式完成
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError>;

    /// 用于日志与审计的后端名
    fn name(&self) -> &str {
        "llm"
    }

    /// 累计 token 使用统计：(prompt_tokens, completion_tokens, total_tokens)，默认 (0, 0, 0)
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}
