//! 购物清单工具（纯计算）：当前菜谱食材 − 已知食材（规范名，大小写不敏感）

use async_trait::async_trait;

use super::{Tool, ToolInput, ToolOutput, ToolResult};
use crate::core::ErrorKind;
use crate::domain::{Ingredient, IngredientSet, InvocationOutcome, Recipe, Session, ToolInvocation, ToolStatus};

pub const NAME: &str = "shopping_list";

/// 菜谱中尚未拥有的食材（保持菜谱顺序，去重）
pub fn missing_ingredients(recipe: &Recipe, known: &IngredientSet) -> Vec<Ingredient> {
    recipe
        .ingredients
        .iter()
        .filter(|i| !known.contains(&i.name))
        .cloned()
        .collect::<IngredientSet>()
        .into_vec()
}

#[derive(Debug, Default)]
pub struct ShoppingListTool;

#[async_trait]
impl Tool for ShoppingListTool {
    fn name(&self) -> &'static str {
        NAME
    }

    fn description(&self) -> &str {
        "List the current recipe's ingredients the user does not have yet"
    }

    async fn execute(&self, session: &Session, _input: &ToolInput) -> ToolResult {
        let Some(recipe) = session.current_recipe() else {
            return ToolResult::failed(ErrorKind::PreconditionFailed, Vec::new());
        };
        let items = missing_ingredients(recipe, session.known_ingredients());
        let invocation = ToolInvocation {
            tool: NAME.to_string(),
            adapter: "local".to_string(),
            input: serde_json::json!({
                "recipe": recipe.title,
                "known": session.known_ingredients().names(),
            }),
            outcome: InvocationOutcome::Success(serde_json::json!({ "missing": items.len() })),
            status: ToolStatus::Ok,
            latency_ms: 0,
        };
        ToolResult::new(
            ToolStatus::Ok,
            ToolOutput::ShoppingList {
                recipe: recipe.title.clone(),
                items,
            },
            vec![invocation],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::IngredientSource;

    fn recipe() -> Recipe {
        Recipe::new(
            "Shakshuka",
            ["2 Tomatoes", "4 eggs", "1 onion", "2 cloves garlic", "1 tsp cumin"]
                .iter()
                .map(|l| Ingredient::parse_line(l, IngredientSource::Inferred))
                .collect(),
            vec![],
        )
    }

    #[test]
    fn test_missing_excludes_known_case_insensitively() {
        let known: IngredientSet = ["EGGS", "tomato"]
            .iter()
            .map(|n| Ingredient::new(n, IngredientSource::Image))
            .collect();
        let names: Vec<String> = missing_ingredients(&recipe(), &known)
            .into_iter()
            .map(|i| i.name)
            .collect();
        assert_eq!(names, vec!["onion", "garlic", "cumin"]);
    }

    #[test]
    fn test_missing_matches_es_plurals_against_singular() {
        let recipe = Recipe::new(
            "Peach Salad",
            ["4 peaches", "6 radishes", "1 bunch radish greens"]
                .iter()
                .map(|l| Ingredient::parse_line(l, IngredientSource::Inferred))
                .collect(),
            vec![],
        );
        let known: IngredientSet = ["Peach", "radish"]
            .iter()
            .map(|n| Ingredient::new(n, IngredientSource::Image))
            .collect();
        let names: Vec<String> = missing_ingredients(&recipe, &known)
            .into_iter()
            .map(|i| i.name)
            .collect();
        assert_eq!(names, vec!["radish greens"]);
    }

    #[test]
    fn test_missing_everything_known() {
        let known: IngredientSet = recipe().ingredients.into_iter().collect();
        assert!(missing_ingredients(&recipe(), &known).is_empty());
    }
}
