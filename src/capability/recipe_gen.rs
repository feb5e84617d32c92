//! 生成式菜谱提供方
//!
//! 数据库无结果或不可用时由语言模型按 JSON 契约生成菜谱；契约的 JSON Schema 由 schemars 生成并嵌入 prompt。

use async_trait::async_trait;
use schemars::{schema_for, JsonSchema};
use serde::Deserialize;

use super::language::LanguageGateway;
use super::prompts;
use super::recipe_db::{RecipeDatabase, RecipeQuery};
use crate::core::CapabilityError;
use crate::domain::{split_steps, Ingredient, IngredientSource, Recipe, RecipeSource};

/// 生成契约：{"recipes": [...]}
#[derive(Debug, Deserialize, JsonSchema)]
pub struct GeneratedRecipes {
    pub recipes: Vec<GeneratedRecipe>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GeneratedRecipe {
    /// 菜名
    pub name: String,
    /// 每行一个食材，如 "2 cloves garlic, minced"
    #[serde(default)]
    pub ingredients: Vec<String>,
    /// 步骤列表或整段编号文本
    #[serde(default, alias = "steps")]
    pub instructions: Instructions,
    #[serde(default)]
    pub cooking_time: Option<String>,
    #[serde(default)]
    pub servings: Option<Servings>,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum Instructions {
    Steps(Vec<String>),
    Text(String),
}

impl Default for Instructions {
    fn default() -> Self {
        Instructions::Steps(Vec::new())
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum Servings {
    Number(u32),
    Text(String),
}

impl Servings {
    fn value(&self) -> Option<u32> {
        match self {
            Servings::Number(n) => Some(*n),
            Servings::Text(t) => {
                let digits: String = t.chars().skip_while(|c| !c.is_ascii_digit()).take_while(|c| c.is_ascii_digit()).collect();
                digits.parse().ok()
            }
        }
    }
}

impl GeneratedRecipe {
    fn into_recipe(self) -> Option<Recipe> {
        if self.name.trim().is_empty() || self.ingredients.is_empty() {
            return None;
        }
        let ingredients = self
            .ingredients
            .iter()
            .map(|line| Ingredient::parse_line(line, IngredientSource::Inferred))
            .filter(|i| !i.name.is_empty())
            .collect();
        let steps = match self.instructions {
            Instructions::Steps(steps) => steps
                .iter()
                .flat_map(|s| split_steps(s))
                .collect(),
            Instructions::Text(text) => split_steps(&text),
        };
        let mut recipe = Recipe::new(self.name.trim(), ingredients, steps).with_source(RecipeSource::Generated);
        recipe.cooking_time = self.cooking_time.filter(|t| !t.trim().is_empty());
        recipe.servings = self.servings.as_ref().and_then(Servings::value);
        Some(recipe)
    }
}

/// 契约 JSON Schema（嵌入生成 prompt）
pub fn recipe_contract_schema() -> String {
    let schema = schema_for!(GeneratedRecipes);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}

/// 把模型输出解析为菜谱；没有任何可用菜谱时视为 MalformedOutput
pub fn recipes_from_contract(contract: GeneratedRecipes, max: usize) -> Result<Vec<Recipe>, CapabilityError> {
    let recipes: Vec<Recipe> = contract
        .recipes
        .into_iter()
        .filter_map(GeneratedRecipe::into_recipe)
        .take(max.max(1))
        .collect();
    if recipes.is_empty() {
        return Err(CapabilityError::malformed("generated contract contains no usable recipe"));
    }
    Ok(recipes)
}

pub struct RecipeGenerator {
    gateway: LanguageGateway,
    schema: String,
}

impl RecipeGenerator {
    pub fn new(gateway: LanguageGateway) -> Self {
        Self {
            gateway,
            schema: recipe_contract_schema(),
        }
    }
}

fn or_none(items: &[String]) -> String {
    if items.is_empty() {
        "none".to_string()
    } else {
        items.join(", ")
    }
}

#[async_trait]
impl RecipeDatabase for RecipeGenerator {
    async fn search(&self, query: &RecipeQuery) -> Result<Vec<Recipe>, CapabilityError> {
        let max = query.max_results.max(1).to_string();
        let system = prompts::render(
            prompts::RECIPE_SYSTEM,
            &[("max", max.as_str()), ("schema", self.schema.as_str())],
        );
        let dish = query.dish.clone().unwrap_or_else(|| "anything that uses the available ingredients".to_string());
        let user = prompts::render(
            prompts::RECIPE_USER,
            &[
                ("memory", ""),
                ("dish", dish.as_str()),
                ("ingredients", or_none(&query.ingredients).as_str()),
                ("constraints", or_none(&query.constraints).as_str()),
            ],
        );
        let contract: GeneratedRecipes = self.gateway.json(&system, &user).await?;
        recipes_from_contract(contract, query.max_results)
    }

    fn name(&self) -> &str {
        "generator"
    }
}
