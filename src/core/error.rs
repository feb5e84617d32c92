//! 错误分类与恢复动作
//!
//! 所有外部能力（视觉 / 语言 / 菜谱库 / 相似度）的失败统一为 CapabilityError { kind, message }；
//! 与 RecoveryEngine 配合：根据 ErrorKind 决定 Retry / Fallback / Report。

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 错误分类（封闭集合）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Timeout,
    ServiceUnavailable,
    QuotaExceeded,
    RateLimited,
    InvalidImage,
    MalformedOutput,
    PreconditionFailed,
    Unknown,
}

impl ErrorKind {
    /// 瞬时错误：允许在适配器内部重试一次
    pub fn is_transient(self) -> bool {
        matches!(self, ErrorKind::Timeout | ErrorKind::ServiceUnavailable)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Timeout => "timeout",
            ErrorKind::ServiceUnavailable => "service_unavailable",
            ErrorKind::QuotaExceeded => "quota_exceeded",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::InvalidImage => "invalid_image",
            ErrorKind::MalformedOutput => "malformed_output",
            ErrorKind::PreconditionFailed => "precondition_failed",
            ErrorKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 外部能力调用失败：kind 用于决策，message 仅用于日志与审计，不会到达用户
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{kind}: {message}")]
pub struct CapabilityError {
    pub kind: ErrorKind,
    pub message: String,
}

impl CapabilityError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn timeout(label: &str, after: Duration) -> Self {
        Self::new(
            ErrorKind::Timeout,
            format!("{label} timed out after {}ms", after.as_millis()),
        )
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ServiceUnavailable, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedOutput, message)
    }

    pub fn invalid_image(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidImage, message)
    }

    pub fn precondition(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::PreconditionFailed, message)
    }

    pub fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }
}

/// 恢复引擎根据错误类型给出的建议动作
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryAction {
    /// 同一适配器在 after 之后重试（仅瞬时错误，且预算未用尽）
    Retry { after: Duration },
    /// 放弃当前链节点，交给 Tool 的下一个回退节点
    Fallback,
    /// 立即上报，不重试、不回退（调用方时序错误）
    Report,
}
