//! 菜谱提供方：查询构造、Spoonacular 数据库客户端、重试装饰器
//!
//! 空结果不是错误；429 → RateLimited，5xx / 连接失败 → ServiceUnavailable；未配置 API key 时返回空列表。

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::retry::{call_with_retry, RetryPolicy};
use crate::core::{CapabilityError, ErrorKind};
use crate::domain::{
    canonical_name, split_steps, Ingredient, IngredientSet, IngredientSource, Recipe, RecipeSource,
};

pub const SPOONACULAR_BASE_URL: &str = "https://api.spoonacular.com";

/// 查询文本中不构成菜名的填充词
const FILLER_WORDS: &[&str] = &[
    "find", "me", "a", "an", "the", "some", "recipe", "recipes", "for", "please", "can", "could",
    "would", "you", "i", "we", "i'm", "we're", "am", "are", "is", "want", "to", "make", "cook",
    "suggest", "show", "give", "what", "how", "about", "something", "dish", "idea", "ideas",
    "good", "nice", "like", "should", "tonight", "quick", "easy", "get", "do", "have", "with",
    "using", "and", "or", "any", "my", "our", "let's", "need",
];

/// 表示「用我已有的食材」的措辞
const INGREDIENT_MODE_CUES: &[&str] = &[
    "these",
    "what i have",
    "what we have",
    "my ingredients",
    "the ingredients",
    "in my fridge",
    "in the fridge",
    "leftover",
    "i have",
    "we have",
];

/// 菜谱查询：菜名模式（dish）或食材模式（dish 为 None）
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RecipeQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dish: Option<String>,
    pub ingredients: Vec<String>,
    pub constraints: Vec<String>,
    pub max_results: usize,
}

impl RecipeQuery {
    pub fn from_text(
        text: &str,
        known: &IngredientSet,
        constraints: &[String],
        max_results: usize,
    ) -> Self {
        let lower = text.to_lowercase();
        let cleaned: String = lower
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '\'' || c == '-' || c == ',' { c } else { ' ' })
            .collect();

        // "... with chicken, rice and peas" → 显式食材
        let (head, with_list) = match cleaned.split_once(" with ").or_else(|| cleaned.split_once(" using ")) {
            Some((head, tail)) => (head.to_string(), split_list(tail)),
            None => (cleaned.clone(), Vec::new()),
        };

        let constraint_words: Vec<String> = constraints
            .iter()
            .flat_map(|c| c.split([' ', '-']).map(String::from).collect::<Vec<_>>())
            .chain(constraints.iter().cloned())
            .collect();
        let dish: String = head
            .replace(',', " ")
            .split_whitespace()
            .filter(|w| !FILLER_WORDS.contains(w))
            .filter(|w| !constraint_words.iter().any(|c| c == w))
            .filter(|w| !matches!(*w, "vegetarian" | "vegan" | "gluten-free" | "dairy-free"))
            .collect::<Vec<_>>()
            .join(" ");

        let ingredient_mode = dish.is_empty() || INGREDIENT_MODE_CUES.iter().any(|c| lower.contains(c));

        let mut ingredients: Vec<String> = with_list.iter().map(|i| canonical_name(i)).collect();
        if ingredient_mode {
            for name in known.names() {
                if !ingredients.contains(&name) {
                    ingredients.push(name);
                }
            }
        }

        Self {
            dish: (!ingredient_mode && !dish.is_empty()).then_some(dish),
            ingredients,
            constraints: constraints.to_vec(),
            max_results,
        }
    }

    /// 显式食材列表查询（规范名去重，保持顺序），不看会话里的其他已知食材
    pub fn from_ingredients(names: &[String], constraints: &[String], max_results: usize) -> Self {
        let mut ingredients: Vec<String> = Vec::new();
        for name in names.iter().map(|n| canonical_name(n)).filter(|n| !n.is_empty()) {
            if !ingredients.contains(&name) {
                ingredients.push(name);
            }
        }
        Self {
            dish: None,
            ingredients,
            constraints: constraints.to_vec(),
            max_results,
        }
    }

    /// 既无菜名也无食材：无法查询
    pub fn is_empty(&self) -> bool {
        self.dish.is_none() && self.ingredients.is_empty()
    }

    /// 用于日志与相似度排序的描述
    pub fn describe(&self) -> String {
        match &self.dish {
            Some(d) if self.ingredients.is_empty() => d.clone(),
            Some(d) => format!("{d} with {}", self.ingredients.join(", ")),
            None => self.ingredients.join(", "),
        }
    }
}

fn split_list(tail: &str) -> Vec<String> {
    tail.split(',')
        .flat_map(|p| p.split(" and "))
        .map(|p| {
            p.split_whitespace()
                .filter(|w| !matches!(*w, "some" | "a" | "an" | "the" | "my" | "and"))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|p| !p.is_empty() && p.split_whitespace().count() <= 3)
        .filter(|p| {
            !matches!(
                p.as_str(),
                "these" | "those" | "them" | "it" | "what i have" | "what we have" | "ingredients"
            )
        })
        .collect()
}

/// 菜谱提供方（数据库或生成式）
#[async_trait]
pub trait RecipeDatabase: Send + Sync {
    async fn search(&self, query: &RecipeQuery) -> Result<Vec<Recipe>, CapabilityError>;

    fn name(&self) -> &str {
        "recipes"
    }
}

/// Spoonacular complexSearch 客户端
pub struct SpoonacularClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl SpoonacularClient {
    pub fn new(base_url: &str, api_key: Option<String>, request_timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        }
    }

    fn params(&self, api_key: &str, query: &RecipeQuery) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("apiKey", api_key.to_string()),
            ("number", query.max_results.max(1).to_string()),
            ("addRecipeInformation", "true".to_string()),
            ("fillIngredients", "true".to_string()),
            ("instructionsRequired", "true".to_string()),
        ];
        match &query.dish {
            Some(dish) => params.push(("query", dish.clone())),
            None => params.push(("sort", "max-used-ingredients".to_string())),
        }
        if !query.ingredients.is_empty() {
            params.push(("includeIngredients", query.ingredients.join(",")));
        }
        let (diets, intolerances) = spoonacular_filters(&query.constraints);
        if !diets.is_empty() {
            params.push(("diet", diets.join(",")));
        }
        if !intolerances.is_empty() {
            params.push(("intolerances", intolerances.join(",")));
        }
        params
    }
}

/// 约束 → (diet, intolerances)
fn spoonacular_filters(constraints: &[String]) -> (Vec<&'static str>, Vec<&'static str>) {
    let mut diets = Vec::new();
    let mut intolerances = Vec::new();
    for c in constraints {
        match c.as_str() {
            "vegetarian" => diets.push("vegetarian"),
            "vegan" => diets.push("vegan"),
            "pescatarian" => diets.push("pescetarian"),
            "ketogenic" => diets.push("ketogenic"),
            "paleo" => diets.push("paleo"),
            "gluten-free" => intolerances.push("gluten"),
            "dairy-free" => intolerances.push("dairy"),
            "nut-free" => intolerances.extend(["peanut", "tree nut"]),
            _ => {}
        }
    }
    (diets, intolerances)
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SpoonacularRecipe>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpoonacularRecipe {
    id: Option<u64>,
    #[serde(default)]
    title: String,
    image: Option<String>,
    ready_in_minutes: Option<u32>,
    servings: Option<u32>,
    source_url: Option<String>,
    #[serde(default)]
    extended_ingredients: Vec<ExtendedIngredient>,
    #[serde(default)]
    analyzed_instructions: Vec<AnalyzedInstruction>,
    instructions: Option<String>,
}

#[derive(Deserialize)]
struct ExtendedIngredient {
    #[serde(default)]
    name: String,
    #[serde(default)]
    amount: Option<f64>,
    #[serde(default)]
    unit: Option<String>,
}

#[derive(Deserialize)]
struct AnalyzedInstruction {
    #[serde(default)]
    steps: Vec<AnalyzedStep>,
}

#[derive(Deserialize)]
struct AnalyzedStep {
    #[serde(default)]
    step: String,
}

static TAG_RE: OnceLock<Regex> = OnceLock::new();

fn strip_html(s: &str) -> String {
    TAG_RE
        .get_or_init(|| Regex::new(r"<[^>]+>").unwrap())
        .replace_all(s, "\n")
        .to_string()
}

fn format_amount(amount: f64) -> Option<String> {
    if amount <= 0.0 {
        return None;
    }
    if amount.fract() == 0.0 {
        Some(format!("{}", amount as u64))
    } else {
        let s = format!("{amount:.2}");
        Some(s.trim_end_matches('0').trim_end_matches('.').to_string())
    }
}

impl SpoonacularRecipe {
    fn into_recipe(self) -> Option<Recipe> {
        if self.title.trim().is_empty() {
            return None;
        }
        let ingredients: Vec<Ingredient> = self
            .extended_ingredients
            .into_iter()
            .filter(|i| !i.name.trim().is_empty())
            .map(|i| {
                let mut ing = Ingredient::new(&i.name, IngredientSource::Inferred);
                ing.quantity = i.amount.and_then(format_amount);
                ing.unit = i.unit.filter(|u| !u.trim().is_empty());
                ing
            })
            .collect();
        let mut steps: Vec<String> = self
            .analyzed_instructions
            .into_iter()
            .flat_map(|g| g.steps)
            .map(|s| s.step.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if steps.is_empty() {
            if let Some(text) = self.instructions {
                steps = split_steps(&strip_html(&text));
            }
        }
        let mut recipe = Recipe::new(self.title.trim(), ingredients, steps).with_source(RecipeSource::Database);
        recipe.id = self.id.map(|id| id.to_string());
        recipe.image = self.image;
        recipe.servings = self.servings;
        recipe.source_url = self.source_url;
        recipe.cooking_time = self.ready_in_minutes.map(|m| format!("{m} minutes"));
        Some(recipe)
    }
}

fn map_status(status: reqwest::StatusCode) -> CapabilityError {
    let kind = match status.as_u16() {
        429 => ErrorKind::RateLimited,
        402 => ErrorKind::QuotaExceeded,
        408 | 504 => ErrorKind::Timeout,
        s if s >= 500 => ErrorKind::ServiceUnavailable,
        _ => ErrorKind::Unknown,
    };
    CapabilityError::new(kind, format!("recipe database http {status}"))
}

#[async_trait]
impl RecipeDatabase for SpoonacularClient {
    async fn search(&self, query: &RecipeQuery) -> Result<Vec<Recipe>, CapabilityError> {
        let Some(api_key) = self.api_key.as_deref() else {
            tracing::debug!("recipe database skipped: no api key");
            return Ok(Vec::new());
        };
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .client
            .get(format!("{}/recipes/complexSearch", self.base_url))
            .query(&self.params(api_key, query))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CapabilityError::new(ErrorKind::Timeout, e.to_string())
                } else {
                    CapabilityError::unavailable(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(map_status(response.status()));
        }
        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| CapabilityError::malformed(format!("recipe database response: {e}")))?;

        let recipes: Vec<Recipe> = body
            .results
            .into_iter()
            .filter_map(SpoonacularRecipe::into_recipe)
            .take(query.max_results)
            .collect();
        tracing::debug!(query = %query.describe(), found = recipes.len(), "recipe database search");
        Ok(recipes)
    }

    fn name(&self) -> &str {
        "spoonacular"
    }
}

/// 重试装饰器：单次超时 + 瞬时错误重试
pub struct RetryingRecipeDatabase {
    inner: Arc<dyn RecipeDatabase>,
    policy: RetryPolicy,
}

impl RetryingRecipeDatabase {
    pub fn new(inner: Arc<dyn RecipeDatabase>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl RecipeDatabase for RetryingRecipeDatabase {
    async fn search(&self, query: &RecipeQuery) -> Result<Vec<Recipe>, CapabilityError> {
        call_with_retry(self.inner.name(), &self.policy, || self.inner.search(query)).await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
