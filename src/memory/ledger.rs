//! 尝试记录：本会话内已尝试的工具路径与失败原因
//!
//! 每轮工具执行后（无论成功与否）写入一条记录。确定性失败（如同一张图片 InvalidImage）会被标记为已知坏路径，
//! 同一输入再次出现时直接跳过；瞬时失败不会污染后续重试。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::ErrorKind;
use crate::domain::{ToolInvocation, ToolStatus};

/// 最多保留的记录条数
const MAX_RECORDS: usize = 50;
/// 拼入 prompt 的最近失败条数
const PROMPT_FAILURES: usize = 5;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub tool: String,
    pub fingerprint: String,
    pub status: ToolStatus,
    pub kinds: Vec<ErrorKind>,
    pub at: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AttemptLedger {
    records: Vec<AttemptRecord>,
}

impl AttemptLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[AttemptRecord] {
        &self.records
    }

    pub fn record(
        &mut self,
        tool: &str,
        fingerprint: &str,
        status: ToolStatus,
        invocations: &[ToolInvocation],
    ) {
        self.records.push(AttemptRecord {
            tool: tool.to_string(),
            fingerprint: fingerprint.to_string(),
            status,
            kinds: invocations.iter().filter_map(ToolInvocation::error_kind).collect(),
            at: Utc::now(),
        });
        let n = self.records.len();
        if n > MAX_RECORDS {
            self.records.drain(0..n - MAX_RECORDS);
        }
    }

    /// 若同一工具 + 输入此前以确定性错误整体失败，返回该错误类型
    pub fn known_bad(&self, tool: &str, fingerprint: &str) -> Option<ErrorKind> {
        self.records
            .iter()
            .rev()
            .find(|r| r.tool == tool && r.fingerprint == fingerprint)
            .filter(|r| {
                r.status == ToolStatus::Failed
                    && !r.kinds.is_empty()
                    && r.kinds.iter().all(|k| *k == ErrorKind::InvalidImage)
            })
            .map(|_| ErrorKind::InvalidImage)
    }

    /// 构建 prompt 片段：最近几次失败
    pub fn to_prompt_section(&self) -> String {
        let failures: Vec<&AttemptRecord> = self
            .records
            .iter()
            .rev()
            .filter(|r| r.status != ToolStatus::Ok)
            .take(PROMPT_FAILURES)
            .collect();
        if failures.is_empty() {
            return String::new();
        }
        let mut s = String::from("What has been tried without full success:\n");
        for r in failures.into_iter().rev() {
            let kinds: Vec<&str> = r.kinds.iter().map(|k| k.as_str()).collect();
            s.push_str(&format!("- {} ({})\n", r.tool, kinds.join(", ")));
        }
        s
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::InvocationOutcome;

    fn failed(kind: ErrorKind) -> ToolInvocation {
        ToolInvocation {
            tool: "ingredient_recognition".into(),
            adapter: "vision:primary".into(),
            input: serde_json::Value::Null,
            outcome: InvocationOutcome::Error {
                kind,
                message: "x".into(),
            },
            status: ToolStatus::Failed,
            latency_ms: 1,
        }
    }

    #[test]
    fn test_invalid_image_is_known_bad() {
        let mut ledger = AttemptLedger::new();
        ledger.record(
            "ingredient_recognition",
            "abc",
            ToolStatus::Failed,
            &[failed(ErrorKind::InvalidImage), failed(ErrorKind::InvalidImage)],
        );
        assert_eq!(
            ledger.known_bad("ingredient_recognition", "abc"),
            Some(ErrorKind::InvalidImage)
        );
        assert_eq!(ledger.known_bad("ingredient_recognition", "other"), None);
    }

    #[test]
    fn test_transient_failure_does_not_poison() {
        let mut ledger = AttemptLedger::new();
        ledger.record(
            "ingredient_recognition",
            "abc",
            ToolStatus::Failed,
            &[failed(ErrorKind::Timeout), failed(ErrorKind::ServiceUnavailable)],
        );
        assert_eq!(ledger.known_bad("ingredient_recognition", "abc"), None);
        assert!(ledger.to_prompt_section().contains("timeout"));
    }

    #[test]
    fn test_ledger_is_bounded() {
        let mut ledger = AttemptLedger::new();
        for i in 0..(MAX_RECORDS + 10) {
            ledger.record("cooking_question", &i.to_string(), ToolStatus::Ok, &[]);
        }
        assert_eq!(ledger.records().len(), MAX_RECORDS);
    }
}
