//! 澄清工具：由语言模型起草一个追问；成功即表示「需要用户补充信息」

use std::sync::Arc;

use async_trait::async_trait;

use super::{FallbackChain, Tool, ToolInput, ToolResult};
use crate::capability::{prompts, LanguageGateway};
use crate::core::ErrorKind;
use crate::domain::Session;

pub const NAME: &str = "clarify";

pub struct ClarifyTool {
    chain: FallbackChain<LanguageGateway>,
}

impl ClarifyTool {
    pub fn new(gateway: LanguageGateway) -> Self {
        let label = format!("language:{}", gateway.name());
        Self {
            chain: FallbackChain::new(NAME).link(label, Arc::new(gateway)),
        }
    }
}

#[async_trait]
impl Tool for ClarifyTool {
    fn name(&self) -> &'static str {
        NAME
    }

    fn description(&self) -> &str {
        "Ask the user one clarifying question"
    }

    async fn execute(&self, session: &Session, input: &ToolInput) -> ToolResult {
        let memory = session.memory().summary().render();
        let pending = session
            .pending()
            .map(|p| p.intent.as_str())
            .unwrap_or("none");
        let text = if input.text().trim().is_empty() {
            "(no text provided)"
        } else {
            input.text()
        };
        let user = prompts::render(
            prompts::CLARIFY_USER,
            &[("memory", memory.as_str()), ("pending", pending), ("text", text)],
        );
        let snapshot = serde_json::json!({ "text": text, "pending": pending });
        let outcome = self
            .chain
            .run(
                &snapshot,
                |gateway| {
                    let user = &user;
                    async move { gateway.text(prompts::CLARIFY_SYSTEM, user).await }
                },
                |q: &String| !q.trim().is_empty(),
            )
            .await;

        match outcome.value {
            Some(question) => ToolResult::needs_input(question, outcome.invocations).with_status(outcome.status),
            None => {
                let kind = outcome.last_error.map(|e| e.kind).unwrap_or(ErrorKind::Unknown);
                ToolResult::failed(kind, outcome.invocations)
            }
        }
    }
}
