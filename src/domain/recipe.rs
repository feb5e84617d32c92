//! 菜谱值类型
//!
//! 一旦作为 currentRecipe 放入会话即不可变（Arc<Recipe>），只能整体替换。

use serde::{Deserialize, Serialize};

use super::Ingredient;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecipeSource {
    Database,
    Generated,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    pub ingredients: Vec<Ingredient>,
    pub steps: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<RecipeSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cooking_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub servings: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl Recipe {
    pub fn new(title: impl Into<String>, ingredients: Vec<Ingredient>, steps: Vec<String>) -> Self {
        Self {
            id: None,
            title: title.into(),
            ingredients,
            steps,
            source: None,
            cooking_time: None,
            servings: None,
            source_url: None,
            image: None,
        }
    }

    pub fn with_source(mut self, source: RecipeSource) -> Self {
        self.source = Some(source);
        self
    }

    pub fn ingredient_names(&self) -> Vec<String> {
        self.ingredients.iter().map(|i| i.name.clone()).collect()
    }
}

/// 将整段步骤文本切分为步骤列表："1. Heat oil\n2. Add garlic" → ["Heat oil", "Add garlic"]
pub fn split_steps(instructions: &str) -> Vec<String> {
    instructions
        .lines()
        .map(|line| {
            line.trim()
                .trim_start_matches(|c: char| c.is_ascii_digit())
                .trim_start_matches(['.', ')', ':'])
                .trim()
                .to_string()
        })
        .filter(|line| !line.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_steps_numbered() {
        let steps = split_steps("1. Heat oil\n2) Add garlic\n\n3: Serve");
        assert_eq!(steps, vec!["Heat oil", "Add garlic", "Serve"]);
    }

    #[test]
    fn test_split_steps_plain() {
        let steps = split_steps("Boil water\nCook pasta");
        assert_eq!(steps, vec!["Boil water", "Cook pasta"]);
    }
}
