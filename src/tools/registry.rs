//! 工具注册表
//!
//! 所有工具实现 Tool trait（name / intent / execute），ToolRegistry 在构造时按 Intent 静态注册；
//! clarification / unknown 以及未注册的意图一律解析到澄清工具。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use super::{ToolInput, ToolResult};
use crate::domain::Session;
use crate::intent::Intent;

/// 工具 trait：只读访问会话，效果由 Orchestrator 在 UpdateMemory 阶段统一写回，因此可安全重试
#[async_trait]
pub trait Tool: Send + Sync {
    /// 工具名称（审计日志与尝试记录中的键）
    fn name(&self) -> &'static str;

    /// 工具描述
    fn description(&self) -> &str;

    async fn execute(&self, session: &Session, input: &ToolInput) -> ToolResult;
}

pub struct ToolRegistry {
    tools: HashMap<Intent, Arc<dyn Tool>>,
    clarify: Arc<dyn Tool>,
    best_effort: Arc<dyn Tool>,
}

impl ToolRegistry {
    /// clarify：追问工具；best_effort：澄清次数达到上限后的尽力回答工具
    pub fn new(clarify: Arc<dyn Tool>, best_effort: Arc<dyn Tool>) -> Self {
        let mut tools: HashMap<Intent, Arc<dyn Tool>> = HashMap::new();
        tools.insert(Intent::Clarification, clarify.clone());
        tools.insert(Intent::Unknown, clarify.clone());
        Self {
            tools,
            clarify,
            best_effort,
        }
    }

    pub fn register(mut self, intent: Intent, tool: Arc<dyn Tool>) -> Self {
        if intent.asks_clarification() {
            tracing::warn!(%intent, tool = tool.name(), "clarification intents always use the clarify tool");
            return self;
        }
        self.tools.insert(intent, tool);
        self
    }

    pub fn select(&self, intent: Intent) -> Arc<dyn Tool> {
        self.tools
            .get(&intent)
            .cloned()
            .unwrap_or_else(|| self.clarify.clone())
    }

    pub fn best_effort(&self) -> Arc<dyn Tool> {
        self.best_effort.clone()
    }

    /// 返回 (intent, tool name) 列表，按意图声明顺序
    pub fn describe(&self) -> Vec<(Intent, &'static str)> {
        Intent::ALL
            .iter()
            .map(|i| (*i, self.select(*i).name()))
            .collect()
    }
}
