//! 对话轮次与工具调用审计记录
//!
//! Turn 追加进 MemoryStore 后只读；ToolInvocation 创建后不再修改。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::ErrorKind;
use crate::intent::Intent;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    User,
    Assistant,
}

/// 图片引用：只保留指纹与元信息，不在记忆中保存原始字节
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImageRef {
    pub fingerprint: String,
    pub mime: String,
    pub size_bytes: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TurnContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageRef>,
}

impl TurnContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            image: None,
        }
    }

    /// 用于摘要与字数估算的单行文本
    pub fn render(&self) -> String {
        match (&self.text, &self.image) {
            (Some(t), Some(_)) => format!("[image] {t}"),
            (Some(t), None) => t.clone(),
            (None, Some(_)) => "[image]".to_string(),
            (None, None) => String::new(),
        }
    }
}

/// 工具执行状态
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    Ok,
    Degraded,
    Failed,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationOutcome {
    Success(serde_json::Value),
    Error { kind: ErrorKind, message: String },
}

/// 单次适配器调用的审计记录
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub tool: String,
    /// 回退链中实际执行的节点（如 vision:primary）
    pub adapter: String,
    pub input: serde_json::Value,
    pub outcome: InvocationOutcome,
    pub status: ToolStatus,
    pub latency_ms: u64,
}

impl ToolInvocation {
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match &self.outcome {
            InvocationOutcome::Error { kind, .. } => Some(*kind),
            InvocationOutcome::Success(_) => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    pub content: TurnContent,
    pub timestamp: DateTime<Utc>,
    pub intent: Intent,
    #[serde(default)]
    pub invocations: Vec<ToolInvocation>,
}

impl Turn {
    pub fn user(content: TurnContent, intent: Intent) -> Self {
        Self {
            role: TurnRole::User,
            content,
            timestamp: Utc::now(),
            intent,
            invocations: Vec::new(),
        }
    }

    pub fn assistant(text: impl Into<String>, intent: Intent, invocations: Vec<ToolInvocation>) -> Self {
        Self {
            role: TurnRole::Assistant,
            content: TurnContent::text(text),
            timestamp: Utc::now(),
            intent,
            invocations,
        }
    }

    /// 摘要用：「user: ...」/「assistant: ...」
    pub fn transcript_line(&self) -> String {
        let role = match self.role {
            TurnRole::User => "user",
            TurnRole::Assistant => "assistant",
        };
        format!("{role} ({}): {}", self.intent.as_str(), self.content.render())
    }
}
