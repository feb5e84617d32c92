//! 编排状态机的状态与单轮轨迹
//!
//! 每个请求从 ReceiveInput 出发，以 Done 或 ClarificationLoop 结束；轨迹只追加，供日志、测试与调试查看。

use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrchestratorState {
    ReceiveInput,
    Classify,
    SelectTool,
    ExecuteTool,
    UpdateMemory,
    ComposeResponse,
    /// 本请求终止并等待用户补充信息；下一轮从 ReceiveInput 重新进入
    ClarificationLoop,
    Done,
}

impl OrchestratorState {
    pub fn is_terminal(self) -> bool {
        matches!(self, OrchestratorState::Done | OrchestratorState::ClarificationLoop)
    }
}

/// 单轮状态轨迹
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct TurnTrace {
    states: Vec<OrchestratorState>,
}

impl TurnTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(&mut self, state: OrchestratorState) {
        tracing::trace!(?state, "orchestrator state");
        self.states.push(state);
    }

    pub fn states(&self) -> &[OrchestratorState] {
        &self.states
    }

    pub fn visited(&self, state: OrchestratorState) -> bool {
        self.states.contains(&state)
    }

    pub fn last(&self) -> Option<OrchestratorState> {
        self.states.last().copied()
    }
}
