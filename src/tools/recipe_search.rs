//! 菜谱搜索工具：菜谱数据库 → 生成式提供方
//!
//! 数据库无结果或失败时退到生成（degraded）；两者都失败 → failed。结果按与已知食材的相似度重新排序，
//! 相似度失败时保持数据库顺序。既无菜名也无已知食材时直接追问，不调用任何适配器。

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;

use super::{FallbackChain, Tool, ToolInput, ToolOutput, ToolResult};
use crate::capability::similarity::rank_by_scores;
use crate::capability::{RecipeDatabase, RecipeQuery, SimilarityAdapter};
use crate::core::ErrorKind;
use crate::domain::{InvocationOutcome, Recipe, Session, ToolInvocation, ToolStatus};

pub const NAME: &str = "recipe_search";

pub struct RecipeSearchTool {
    chain: FallbackChain<dyn RecipeDatabase>,
    similarity: Arc<dyn SimilarityAdapter>,
    max_results: usize,
}

impl RecipeSearchTool {
    pub fn new(
        database: Arc<dyn RecipeDatabase>,
        generator: Arc<dyn RecipeDatabase>,
        similarity: Arc<dyn SimilarityAdapter>,
        max_results: usize,
    ) -> Self {
        Self {
            chain: FallbackChain::new(NAME)
                .link("recipes:database", database)
                .link("recipes:generated", generator),
            similarity,
            max_results: max_results.max(1),
        }
    }

    async fn rerank(
        &self,
        session: &Session,
        recipes: Vec<Recipe>,
        invocations: &mut Vec<ToolInvocation>,
    ) -> Vec<Recipe> {
        let known = session.known_ingredients().names();
        if known.is_empty() || recipes.len() < 2 {
            return recipes;
        }
        let query = known.join(", ");
        let candidates: Vec<String> = recipes.iter().map(|r| r.ingredient_names().join(", ")).collect();
        let start = Instant::now();
        let result = self.similarity.scores(&query, &candidates).await;
        let latency_ms = start.elapsed().as_millis() as u64;
        let adapter = format!("similarity:{}", self.similarity.name());
        match result {
            Ok(scores) => {
                invocations.push(ToolInvocation {
                    tool: NAME.to_string(),
                    adapter,
                    input: serde_json::json!({ "query": query }),
                    outcome: InvocationOutcome::Success(serde_json::json!(scores)),
                    status: ToolStatus::Ok,
                    latency_ms,
                });
                rank_by_scores(recipes, &scores)
            }
            Err(e) => {
                tracing::warn!(kind = %e.kind, "similarity failed, keeping database order");
                invocations.push(ToolInvocation {
                    tool: NAME.to_string(),
                    adapter,
                    input: serde_json::json!({ "query": query }),
                    outcome: InvocationOutcome::Error {
                        kind: e.kind,
                        message: e.message,
                    },
                    status: ToolStatus::Failed,
                    latency_ms,
                });
                recipes
            }
        }
    }
}

#[async_trait]
impl Tool for RecipeSearchTool {
    fn name(&self) -> &'static str {
        NAME
    }

    fn description(&self) -> &str {
        "Suggest recipes for a dish or for the ingredients at hand"
    }

    async fn execute(&self, session: &Session, input: &ToolInput) -> ToolResult {
        let constraints = session.memory().summary().constraints();
        let query = if input.ingredients.is_empty() {
            RecipeQuery::from_text(input.text(), session.known_ingredients(), constraints, self.max_results)
        } else {
            RecipeQuery::from_ingredients(&input.ingredients, constraints, self.max_results)
        };
        if query.is_empty() {
            return ToolResult::needs_input(
                "What would you like to cook? Tell me a dish or the ingredients you have.",
                Vec::new(),
            );
        }

        let snapshot = serde_json::to_value(&query).unwrap_or_default();
        let outcome = self
            .chain
            .run(
                &snapshot,
                |provider| {
                    let query = &query;
                    async move { provider.search(query).await }
                },
                |recipes: &Vec<Recipe>| !recipes.is_empty(),
            )
            .await;

        let mut invocations = outcome.invocations;
        match outcome.value {
            Some(recipes) => {
                let mut recipes = self.rerank(session, recipes, &mut invocations).await;
                recipes.truncate(self.max_results);
                ToolResult::new(outcome.status, ToolOutput::Recipes(recipes), invocations)
            }
            None => {
                let kind = outcome.last_error.map(|e| e.kind).unwrap_or(ErrorKind::Unknown);
                ToolResult::failed(kind, invocations)
            }
        }
    }
}
