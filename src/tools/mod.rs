//! 工具层：Intent → Tool 静态映射、回退链与五个烹饪工具
//!
//! Tool 只读会话、返回 ToolResult（状态 + 输出 + 调用记录）；效果由 Orchestrator 写回会话。

pub mod clarify;
pub mod cooking_question;
pub mod executor;
pub mod fallback;
pub mod ingredient_recognition;
pub mod recipe_search;
pub mod registry;
pub mod shopping_list;

use serde::Serialize;

pub use clarify::ClarifyTool;
pub use cooking_question::CookingQuestionTool;
pub use executor::ToolExecutor;
pub use fallback::{ChainOutcome, FallbackChain};
pub use ingredient_recognition::IngredientRecognitionTool;
pub use recipe_search::RecipeSearchTool;
pub use registry::{Tool, ToolRegistry};
pub use shopping_list::ShoppingListTool;

use crate::capability::ImageData;
use crate::core::ErrorKind;
use crate::domain::{Ingredient, Recipe, ToolInvocation, ToolStatus};

/// 工具输入：用户文本（可含追问合并后的文本）、可选图片、显式食材列表
#[derive(Clone, Debug, Default)]
pub struct ToolInput {
    pub text: Option<String>,
    pub image: Option<ImageData>,
    /// 非空时菜谱搜索直接按这些食材查询
    pub ingredients: Vec<String>,
}

impl ToolInput {
    pub fn text(&self) -> &str {
        self.text.as_deref().unwrap_or_default()
    }

    /// 审计用：文本前 120 字符 + 图片指纹
    pub fn preview(&self) -> serde_json::Value {
        serde_json::json!({
            "text": self.text.as_ref().map(|t| t.chars().take(120).collect::<String>()),
            "image": self.image.as_ref().map(|i| i.fingerprint().to_string()),
            "ingredients": self.ingredients,
        })
    }
}

/// 工具输出
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolOutput {
    Ingredients(Vec<Ingredient>),
    Recipes(Vec<Recipe>),
    Answer(String),
    /// 需要用户补充信息
    Question(String),
    ShoppingList { recipe: String, items: Vec<Ingredient> },
    Nothing,
}

#[derive(Clone, Debug)]
pub struct ToolResult {
    pub status: ToolStatus,
    pub output: ToolOutput,
    pub invocations: Vec<ToolInvocation>,
    pub error: Option<ErrorKind>,
}

impl ToolResult {
    pub fn new(status: ToolStatus, output: ToolOutput, invocations: Vec<ToolInvocation>) -> Self {
        Self {
            status,
            output,
            invocations,
            error: None,
        }
    }

    pub fn failed(kind: ErrorKind, invocations: Vec<ToolInvocation>) -> Self {
        Self {
            status: ToolStatus::Failed,
            output: ToolOutput::Nothing,
            invocations,
            error: Some(kind),
        }
    }

    pub fn needs_input(question: impl Into<String>, invocations: Vec<ToolInvocation>) -> Self {
        Self::new(ToolStatus::Ok, ToolOutput::Question(question.into()), invocations)
    }

    /// 成功但需要用户补充信息（触发澄清循环）
    pub fn is_needs_input(&self) -> bool {
        self.status != ToolStatus::Failed && matches!(self.output, ToolOutput::Question(_))
    }

    pub fn with_status(mut self, status: ToolStatus) -> Self {
        self.status = status;
        self
    }
}
