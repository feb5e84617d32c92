//! 工具执行器
//!
//! 持有 ToolRegistry 与整体预算，execute(tool, session, input) 在预算内调用工具。
//! 预算由适配器重试策略推出，只兜底挂死的工具，不截断仍在进行的回退；
//! 超出预算转为 failed(Timeout)，并留下一条执行器级调用记录。每次调用输出结构化审计日志（JSON）。

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::timeout;

use super::{Tool, ToolInput, ToolRegistry, ToolResult};
use crate::capability::RetryPolicy;
use crate::core::ErrorKind;
use crate::domain::{InvocationOutcome, Session, ToolInvocation, ToolStatus};

/// 单个工具最多串行调用的适配器数（回退链两个节点 + 一次相似度重排）
pub const MAX_ADAPTER_CALLS_PER_TOOL: u32 = 3;

/// 工具整体预算：不小于串行适配器在各自策略下的最坏耗时之和；配置值只能放宽
pub fn tool_budget(policy: &RetryPolicy, configured_secs: u64) -> Duration {
    let derived = policy.worst_case() * MAX_ADAPTER_CALLS_PER_TOOL + Duration::from_secs(1);
    derived.max(Duration::from_secs(configured_secs))
}

pub struct ToolExecutor {
    registry: ToolRegistry,
    timeout: Duration,
}

impl ToolExecutor {
    pub fn new(registry: ToolRegistry, timeout: Duration) -> Self {
        Self { registry, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub async fn execute(&self, tool: &Arc<dyn Tool>, session: &Session, input: &ToolInput) -> ToolResult {
        let start = Instant::now();
        let result = match timeout(self.timeout, tool.execute(session, input)).await {
            Ok(result) => result,
            Err(_) => {
                let invocation = ToolInvocation {
                    tool: tool.name().to_string(),
                    adapter: "executor".to_string(),
                    input: input.preview(),
                    outcome: InvocationOutcome::Error {
                        kind: ErrorKind::Timeout,
                        message: format!("tool exceeded {}ms budget", self.timeout.as_millis()),
                    },
                    status: ToolStatus::Failed,
                    latency_ms: start.elapsed().as_millis() as u64,
                };
                ToolResult::failed(ErrorKind::Timeout, vec![invocation])
            }
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        let adapters: Vec<&str> = result.invocations.iter().map(|i| i.adapter.as_str()).collect();
        let audit = serde_json::json!({
            "event": "tool_audit",
            "session": session.id(),
            "tool": tool.name(),
            "status": result.status,
            "error": result.error,
            "adapters": adapters,
            "needs_input": result.is_needs_input(),
            "duration_ms": duration_ms,
            "input_preview": input.preview(),
        });
        tracing::info!(audit = %audit.to_string(), "tool");
        if result.status == ToolStatus::Failed {
            tracing::warn!(tool = tool.name(), error = ?result.error, "tool failed");
        }
        result
    }
}
