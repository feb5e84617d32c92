//! 食材识别工具：视觉主节点 → 视觉备用节点
//!
//! 低于置信度阈值的识别结果被丢弃，其余规范化、去重。两个节点都失败或都没有可用结果 → failed。
//! 同一张图片此前因 InvalidImage 整体失败时不再重复发送。

use std::sync::Arc;

use async_trait::async_trait;

use super::{FallbackChain, Tool, ToolInput, ToolOutput, ToolResult};
use crate::capability::{Recognition, VisionAdapter};
use crate::domain::{Ingredient, IngredientSet, IngredientSource, Session};

pub const NAME: &str = "ingredient_recognition";

pub struct IngredientRecognitionTool {
    chain: FallbackChain<dyn VisionAdapter>,
    min_confidence: f32,
}

impl IngredientRecognitionTool {
    pub fn new(chain: FallbackChain<dyn VisionAdapter>, min_confidence: f32) -> Self {
        Self {
            chain,
            min_confidence,
        }
    }
}

/// 过滤低置信度、规范化、去重
pub fn normalize_detections(detections: Vec<Recognition>, min_confidence: f32) -> Vec<Ingredient> {
    detections
        .into_iter()
        .filter(|r| r.confidence >= min_confidence)
        .map(|r| Ingredient::new(&r.name, IngredientSource::Image))
        .collect::<IngredientSet>()
        .into_vec()
}

#[async_trait]
impl Tool for IngredientRecognitionTool {
    fn name(&self) -> &'static str {
        NAME
    }

    fn description(&self) -> &str {
        "Identify ingredients in a photo"
    }

    async fn execute(&self, session: &Session, input: &ToolInput) -> ToolResult {
        let Some(image) = input.image.as_ref() else {
            return ToolResult::needs_input(
                "Please upload a photo of your ingredients and I'll identify them.",
                Vec::new(),
            );
        };

        if let Some(kind) = session.ledger().known_bad(NAME, image.fingerprint()) {
            tracing::info!(fingerprint = image.fingerprint(), %kind, "skipping known-bad image");
            return ToolResult::failed(kind, Vec::new());
        }

        let snapshot = serde_json::json!({
            "image": image.fingerprint(),
            "mime": image.mime(),
            "bytes": image.len(),
        });
        let min = self.min_confidence;
        let outcome = self
            .chain
            .run(
                &snapshot,
                |vision| async move {
                    vision
                        .recognize(image)
                        .await
                        .map(|d| normalize_detections(d, min))
                },
                |found: &Vec<Ingredient>| !found.is_empty(),
            )
            .await;

        match outcome.value {
            Some(found) => ToolResult::new(outcome.status, ToolOutput::Ingredients(found), outcome.invocations),
            None => {
                let kind = outcome
                    .last_error
                    .map(|e| e.kind)
                    .unwrap_or(crate::core::ErrorKind::Unknown);
                ToolResult::failed(kind, outcome.invocations)
            }
        }
    }
}

/// 按配置构造两节点视觉链
pub fn vision_chain(
    primary: Arc<dyn VisionAdapter>,
    secondary: Option<Arc<dyn VisionAdapter>>,
) -> FallbackChain<dyn VisionAdapter> {
    let chain = FallbackChain::new(NAME).link("vision:primary", primary);
    match secondary {
        Some(s) => chain.link("vision:secondary", s),
        None => chain,
    }
}
