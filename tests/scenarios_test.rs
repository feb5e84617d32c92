//! 端到端场景：菜谱搜索、视觉回退、烹饪问答、无菜谱时的购物清单

mod common;

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use sous::core::{OrchestratorState, Payload};
    use sous::domain::{ToolStatus, TurnRole};
    use sous::intent::Intent;
    use sous::llm::ScriptedLlmClient;

    use super::common::{carbonara, detections, png_bytes, FakeRecipes, FakeVision, HarnessBuilder};

    #[tokio::test]
    async fn test_scenario_recipe_search_from_database() {
        let h = HarnessBuilder::new()
            .llm(ScriptedLlmClient::new().on("intent classifier", Ok("recipe_search")))
            .database(FakeRecipes::new(Ok(vec![carbonara()])))
            .build();

        let outcome = h.orchestrator.handle_text_query("a", "pasta carbonara").await;
        let env = &outcome.envelope;
        assert_eq!(env.status, ToolStatus::Ok);
        assert_eq!(env.intent, Intent::RecipeSearch);
        match &env.payload {
            Payload::Recipes { recipes } => {
                assert_eq!(recipes.len(), 1);
                assert_eq!(recipes[0].title, "Pasta Carbonara");
            }
            other => panic!("unexpected payload {other:?}"),
        }
        assert_eq!(h.database.calls(), 1);
        assert_eq!(h.database.queries()[0].dish.as_deref(), Some("pasta carbonara"));
        assert_eq!(h.llm.calls_matching("recipe generator"), 0);
        assert_eq!(
            outcome.trace.states(),
            &[
                OrchestratorState::ReceiveInput,
                OrchestratorState::Classify,
                OrchestratorState::SelectTool,
                OrchestratorState::ExecuteTool,
                OrchestratorState::UpdateMemory,
                OrchestratorState::ComposeResponse,
                OrchestratorState::Done,
            ]
        );

        // 第一条结果成为当前菜谱
        let handle = h.orchestrator.sessions().get_or_create("a").await;
        let session = handle.lock().await;
        assert_eq!(
            session.current_recipe().map(|r| r.title.as_str()),
            Some("Pasta Carbonara")
        );
    }

    #[tokio::test]
    async fn test_scenario_vision_primary_timeout_uses_secondary() {
        let h = HarnessBuilder::new()
            .primary(FakeVision::slow("primary", Duration::from_millis(500)))
            .secondary(FakeVision::new(
                "secondary",
                vec![Ok(detections(&["Chicken", "bell peppers", "onions"]))],
            ))
            .vision_timeout(Duration::from_millis(30))
            .build();

        let outcome = h.orchestrator.handle_ingredient_image("b", png_bytes(1)).await;
        let env = &outcome.envelope;
        assert_eq!(env.status, ToolStatus::Degraded);
        assert_eq!(env.intent, Intent::IngredientRecognition);
        match &env.payload {
            Payload::Ingredients { ingredients } => {
                let names: Vec<&str> = ingredients.iter().map(|i| i.name.as_str()).collect();
                assert_eq!(names, vec!["chicken", "bell pepper", "onion"]);
            }
            other => panic!("unexpected payload {other:?}"),
        }
        // 主适配器超时后重试一次，再回退
        assert_eq!(h.primary.calls(), 2);
        assert_eq!(h.secondary.calls(), 1);
        // 图片意图由快速规则确定，不调用模型
        assert_eq!(h.llm.calls(), 0);

        let handle = h.orchestrator.sessions().get_or_create("b").await;
        let session = handle.lock().await;
        assert!(session.known_ingredients().contains("Bell Peppers"));
        let assistant = session
            .memory()
            .turns()
            .iter()
            .find(|t| t.role == TurnRole::Assistant)
            .unwrap();
        let adapters: Vec<&str> = assistant.invocations.iter().map(|i| i.adapter.as_str()).collect();
        assert_eq!(adapters, vec!["vision:primary", "vision:secondary"]);
    }

    #[tokio::test]
    async fn test_scenario_cooking_question() {
        let h = HarnessBuilder::new()
            .llm(
                ScriptedLlmClient::new()
                    .on("intent classifier", Ok("cooking_question"))
                    .on("Question:", Ok("Blanching means boiling briefly, then plunging into ice water.")),
            )
            .build();

        let outcome = h
            .orchestrator
            .handle_text_query("c", "what does blanching mean?")
            .await;
        assert_eq!(outcome.envelope.status, ToolStatus::Ok);
        assert_eq!(outcome.envelope.intent, Intent::CookingQuestion);
        match &outcome.envelope.payload {
            Payload::Answer { answer } => assert!(answer.contains("ice water")),
            other => panic!("unexpected payload {other:?}"),
        }
        assert_eq!(h.database.calls(), 0);
    }

    #[tokio::test]
    async fn test_scenario_shopping_list_without_recipe() {
        let h = HarnessBuilder::new().build();

        let outcome = h.orchestrator.generate_shopping_list("d").await;
        let json = serde_json::to_value(&outcome.envelope).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["message"], "no active recipe");
        assert_eq!(h.llm.calls(), 0);
        assert_eq!(h.primary.calls() + h.secondary.calls() + h.database.calls(), 0);

        let history = h.orchestrator.conversation_history("d").await;
        assert!(history.turns.is_empty());
    }

    #[tokio::test]
    async fn test_shopping_list_after_search() {
        let h = HarnessBuilder::new()
            .llm(
                ScriptedLlmClient::new()
                    .on("intent classifier", Ok("recipe_search")),
            )
            .database(FakeRecipes::new(Ok(vec![carbonara()])))
            .build();

        h.orchestrator
            .handle_text_query("e", "I have eggs and spaghetti. find me a carbonara recipe")
            .await;
        let outcome = h.orchestrator.generate_shopping_list("e").await;
        assert_eq!(outcome.envelope.status, ToolStatus::Ok);
        assert_eq!(outcome.envelope.intent, Intent::ShoppingList);
        match &outcome.envelope.payload {
            Payload::ShoppingList { recipe, items, total_items } => {
                assert_eq!(recipe, "Pasta Carbonara");
                let names: Vec<&str> = items.iter().map(|i| i.name.as_str()).collect();
                assert_eq!(names, vec!["pancetta", "pecorino", "black pepper"]);
                assert_eq!(*total_items, 3);
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }
    #[tokio::test]
    async fn test_search_recipes_with_ingredient_list() {
        let h = HarnessBuilder::new()
            .database(FakeRecipes::new(Ok(vec![carbonara()])))
            .build();

        let outcome = h
            .orchestrator
            .search_recipes("f", vec!["Eggs".into(), " ".into(), "pancetta".into()])
            .await;
        assert_eq!(outcome.envelope.status, ToolStatus::Ok);
        assert_eq!(outcome.envelope.intent, Intent::RecipeSearch);
        assert!(!outcome.trace.visited(OrchestratorState::Classify));
        assert_eq!(h.llm.calls(), 0);

        let query = &h.database.queries()[0];
        assert!(query.dish.is_none());
        assert_eq!(query.ingredients, vec!["egg", "pancetta"]);

        // 列出的食材记为已有，购物清单只剩其余食材
        let outcome = h.orchestrator.generate_shopping_list("f").await;
        match &outcome.envelope.payload {
            Payload::ShoppingList { items, .. } => {
                let names: Vec<&str> = items.iter().map(|i| i.name.as_str()).collect();
                assert_eq!(names, vec!["spaghetti", "pecorino", "black pepper"]);
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_search_recipes_empty_list_is_rejected() {
        let h = HarnessBuilder::new().build();
        let outcome = h.orchestrator.search_recipes("g", vec!["  ".into()]).await;
        assert_eq!(outcome.envelope.status, ToolStatus::Failed);
        assert_eq!(h.database.calls(), 0);
        assert!(h.orchestrator.conversation_history("g").await.turns.is_empty());
    }

    #[tokio::test]
    async fn test_image_followed_by_recipe_suggestions() {
        let h = HarnessBuilder::new()
            .primary(FakeVision::new("primary", vec![Ok(detections(&["eggs", "pancetta"]))]))
            .database(FakeRecipes::new(Ok(vec![carbonara()])))
            .suggest_recipes(true)
            .build();

        let outcome = h.orchestrator.handle_ingredient_image("h", png_bytes(4)).await;
        assert_eq!(outcome.envelope.status, ToolStatus::Ok);
        assert_eq!(outcome.envelope.intent, Intent::IngredientRecognition);
        match &outcome.envelope.payload {
            Payload::IngredientsWithRecipes { ingredients, recipes } => {
                assert_eq!(ingredients.len(), 2);
                assert_eq!(recipes[0].title, "Pasta Carbonara");
            }
            other => panic!("unexpected payload {other:?}"),
        }
        assert_eq!(h.database.queries()[0].ingredients, vec!["egg", "pancetta"]);

        let handle = h.orchestrator.sessions().get_or_create("h").await;
        let session = handle.lock().await;
        assert_eq!(
            session.current_recipe().map(|r| r.title.as_str()),
            Some("Pasta Carbonara")
        );
    }

    #[tokio::test]
    async fn test_failed_suggestions_keep_ingredients() {
        let h = HarnessBuilder::new()
            .primary(FakeVision::new("primary", vec![Ok(detections(&["basil"]))]))
            .database(FakeRecipes::new(Err(super::common::unavailable())))
            .suggest_recipes(true)
            .build();

        let outcome = h.orchestrator.handle_ingredient_image("i", png_bytes(5)).await;
        assert_eq!(outcome.envelope.status, ToolStatus::Ok);
        assert!(matches!(outcome.envelope.payload, Payload::Ingredients { .. }));

        let handle = h.orchestrator.sessions().get_or_create("i").await;
        let session = handle.lock().await;
        assert!(session.known_ingredients().contains("basil"));
        assert!(session.current_recipe().is_none());
    }
}
