//! 错误恢复引擎
//!
//! 根据 CapabilityError 的类型与已用重试次数返回 RecoveryAction，
//! 供适配器重试装饰器与 Tool 回退链决定是重试、回退还是立即上报。

use std::time::Duration;

use crate::core::{CapabilityError, ErrorKind, RecoveryAction};

/// 语义化错误恢复：瞬时错误线性退避重试，其余交给回退链；PreconditionFailed 立即上报
#[derive(Debug, Clone)]
pub struct RecoveryEngine {
    backoff: Duration,
}

impl Default for RecoveryEngine {
    fn default() -> Self {
        Self::new(Duration::from_millis(500))
    }
}

impl RecoveryEngine {
    pub fn new(backoff: Duration) -> Self {
        Self { backoff }
    }

    /// attempt 为已完成的尝试次数（首次调用失败后为 1）
    pub fn handle(&self, err: &CapabilityError, attempt: u32, max_retries: u32) -> RecoveryAction {
        match err.kind {
            ErrorKind::PreconditionFailed => RecoveryAction::Report,
            kind if kind.is_transient() && attempt <= max_retries => RecoveryAction::Retry {
                after: self.backoff * attempt,
            },
            _ => RecoveryAction::Fallback,
        }
    }
}
