//! 烹饪问答工具：语言模型结合记忆摘要、当前菜谱与已知食材回答问题；无回退节点

use std::sync::Arc;

use async_trait::async_trait;

use super::{FallbackChain, Tool, ToolInput, ToolOutput, ToolResult};
use crate::capability::{prompts, LanguageGateway};
use crate::core::ErrorKind;
use crate::domain::Session;

pub const NAME: &str = "cooking_question";

/// 拼入 prompt 的最近原始轮次数
const RECENT_TURNS: usize = 6;

pub struct CookingQuestionTool {
    chain: FallbackChain<LanguageGateway>,
}

impl CookingQuestionTool {
    pub fn new(gateway: LanguageGateway) -> Self {
        let label = format!("language:{}", gateway.name());
        Self {
            chain: FallbackChain::new(NAME).link(label, Arc::new(gateway)),
        }
    }
}

/// 问答 prompt 的上下文段落
pub(crate) fn context_sections(session: &Session) -> (String, String, String) {
    let memory = session.memory().context_block(RECENT_TURNS);
    let recipe = session
        .current_recipe()
        .map(|r| {
            let lines: Vec<String> = r.ingredients.iter().map(|i| i.display_line()).collect();
            format!(
                "Current recipe: {}\nIngredients: {}\nSteps:\n{}\n",
                r.title,
                lines.join(", "),
                r.steps
                    .iter()
                    .enumerate()
                    .map(|(i, s)| format!("{}. {}", i + 1, s))
                    .collect::<Vec<_>>()
                    .join("\n")
            )
        })
        .unwrap_or_default();
    let ingredients = if session.known_ingredients().is_empty() {
        String::new()
    } else {
        format!("Ingredients at hand: {}\n", session.known_ingredients().names().join(", "))
    };
    (memory, recipe, ingredients)
}

#[async_trait]
impl Tool for CookingQuestionTool {
    fn name(&self) -> &'static str {
        NAME
    }

    fn description(&self) -> &str {
        "Answer a cooking question using the conversation context"
    }

    async fn execute(&self, session: &Session, input: &ToolInput) -> ToolResult {
        let text = input.text().trim();
        if text.is_empty() {
            return ToolResult::needs_input("What would you like to know about cooking?", Vec::new());
        }
        let (memory, recipe, ingredients) = context_sections(session);
        let user = prompts::render(
            prompts::ANSWER_USER,
            &[
                ("memory", memory.as_str()),
                ("recipe", recipe.as_str()),
                ("ingredients", ingredients.as_str()),
                ("text", text),
            ],
        );
        let snapshot = serde_json::json!({ "question": text });
        let outcome = self
            .chain
            .run(
                &snapshot,
                |gateway| {
                    let user = &user;
                    async move { gateway.text(prompts::ANSWER_SYSTEM, user).await }
                },
                |answer: &String| !answer.trim().is_empty(),
            )
            .await;

        match outcome.value {
            Some(answer) => ToolResult::new(outcome.status, ToolOutput::Answer(answer), outcome.invocations),
            None => {
                let kind = outcome.last_error.map(|e| e.kind).unwrap_or(ErrorKind::Unknown);
                ToolResult::failed(kind, outcome.invocations)
            }
        }
    }
}
