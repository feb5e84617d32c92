//! 意图：封闭枚举 + 分类器（模型主路径 + 关键词兜底）

pub mod classifier;
pub mod keywords;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use classifier::{ClassifierInput, IntentClassifier};
pub use keywords::KeywordMatcher;

/// 每个用户轮次恰好对应一个意图
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    IngredientRecognition,
    RecipeSearch,
    CookingQuestion,
    ShoppingList,
    Clarification,
    Unknown,
}

impl Intent {
    pub const ALL: [Intent; 6] = [
        Intent::IngredientRecognition,
        Intent::RecipeSearch,
        Intent::CookingQuestion,
        Intent::ShoppingList,
        Intent::Clarification,
        Intent::Unknown,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Intent::IngredientRecognition => "ingredient_recognition",
            Intent::RecipeSearch => "recipe_search",
            Intent::CookingQuestion => "cooking_question",
            Intent::ShoppingList => "shopping_list",
            Intent::Clarification => "clarification",
            Intent::Unknown => "unknown",
        }
    }

    /// 需要向用户追问的意图
    pub fn asks_clarification(self) -> bool {
        matches!(self, Intent::Clarification | Intent::Unknown)
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Intent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        Intent::ALL
            .into_iter()
            .find(|i| i.as_str() == s)
            .ok_or_else(|| format!("unknown intent: {s}"))
    }
}
