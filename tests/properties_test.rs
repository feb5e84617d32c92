//! 跨模块性质：意图封闭、澄清循环有界、降级不被抹平、记忆约束不丢失、已知坏路径、会话隔离

mod common;

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use sous::capability::Recognition;
    use sous::core::{CapabilityError, ErrorKind, OrchestratorState, Payload};
    use sous::domain::{RecipeSource, ToolStatus, TurnRole};
    use sous::intent::Intent;
    use sous::llm::{LlmError, ScriptedLlmClient};

    use super::common::{
        carbonara, detections, png_bytes, unavailable, FakeRecipes, FakeVision, HarnessBuilder,
    };

    const GENERATED: &str = r#"```json
{"recipes": [{"name": "Spinach Frittata", "ingredients": ["6 eggs", "2 cups spinach", "100 g feta"], "instructions": "1. Whisk eggs\n2. Wilt spinach\n3. Bake with feta", "servings": 4}]}
```"#;

    #[tokio::test]
    async fn test_intent_always_in_closed_set() {
        let h = HarnessBuilder::new()
            .llm(
                ScriptedLlmClient::new()
                    .on("intent classifier", Ok("I think the user wants dessert!"))
                    .on("Question:", Ok("ok"))
                    .on("clarifying question", Ok("Could you say more?")),
            )
            .build();
        for text in ["", "???", "🍝🍝", "recipe or technique", "x".repeat(500).as_str()] {
            let outcome = h.orchestrator.handle_text_query("p1", text).await;
            assert!(Intent::ALL.contains(&outcome.envelope.intent));
            assert!(outcome.trace.last().map(OrchestratorState::is_terminal).unwrap_or(false));
        }
    }

    #[tokio::test]
    async fn test_clarification_loop_terminates() {
        let h = HarnessBuilder::new()
            .llm(
                ScriptedLlmClient::new()
                    .on("intent classifier", Ok("clarification"))
                    .on("clarifying question", Ok("Which dish do you mean?"))
                    .on("Question:", Ok("Here is a general tip.")),
            )
            .max_clarification_loops(3)
            .build();

        let mut consecutive = 0;
        let mut max_consecutive = 0;
        for i in 0..10 {
            let outcome = h
                .orchestrator
                .handle_text_query("p2", &format!("hmm {i}"))
                .await;
            match outcome.trace.last() {
                Some(OrchestratorState::ClarificationLoop) => consecutive += 1,
                Some(OrchestratorState::Done) => {
                    assert_eq!(outcome.envelope.status, ToolStatus::Degraded);
                    consecutive = 0;
                }
                other => panic!("unexpected terminal state {other:?}"),
            }
            max_consecutive = max_consecutive.max(consecutive);
        }
        assert_eq!(max_consecutive, 3);
    }

    #[tokio::test]
    async fn test_pending_clarification_resumes_intent() {
        let h = HarnessBuilder::new()
            .llm(
                ScriptedLlmClient::new()
                    .on("intent classifier", Ok("recipe_search"))
                    .on("intent classifier", Ok("clarification")),
            )
            .database(FakeRecipes::new(Ok(vec![carbonara()])))
            .build();

        let first = h.orchestrator.handle_text_query("p3", "find me a recipe").await;
        assert_eq!(first.trace.last(), Some(OrchestratorState::ClarificationLoop));
        assert!(matches!(first.envelope.payload, Payload::Question { .. }));
        assert_eq!(h.database.calls(), 0);

        let second = h.orchestrator.handle_text_query("p3", "lasagna").await;
        assert_eq!(second.envelope.intent, Intent::RecipeSearch);
        assert_eq!(second.trace.last(), Some(OrchestratorState::Done));
        assert_eq!(h.database.queries()[0].dish.as_deref(), Some("lasagna"));
    }

    #[tokio::test]
    async fn test_generated_fallback_stays_degraded() {
        let h = HarnessBuilder::new()
            .llm(
                ScriptedLlmClient::new()
                    .on("intent classifier", Ok("recipe_search"))
                    .on("recipe generator", Ok(GENERATED)),
            )
            .database(FakeRecipes::new(Ok(Vec::new())))
            .build();

        let outcome = h.orchestrator.handle_text_query("p4", "spinach frittata").await;
        assert_eq!(outcome.envelope.status, ToolStatus::Degraded);
        match &outcome.envelope.payload {
            Payload::Recipes { recipes } => {
                assert_eq!(recipes[0].title, "Spinach Frittata");
                assert_eq!(recipes[0].source, Some(RecipeSource::Generated));
                assert_eq!(recipes[0].steps.len(), 3);
            }
            other => panic!("unexpected payload {other:?}"),
        }
        let json = serde_json::to_value(&outcome.envelope).unwrap();
        assert_eq!(json["status"], "degraded");
    }

    #[tokio::test]
    async fn test_all_providers_fail_is_generic() {
        let h = HarnessBuilder::new()
            .llm(
                ScriptedLlmClient::new()
                    .on("intent classifier", Ok("recipe_search"))
                    .on("recipe generator", Err(LlmError::QuotaExceeded("quota exhausted for key sk-123".into()))),
            )
            .database(FakeRecipes::new(Err(unavailable())))
            .build();

        let outcome = h.orchestrator.handle_text_query("p5", "beef stew").await;
        assert_eq!(outcome.envelope.status, ToolStatus::Failed);
        let message = outcome.envelope.message.unwrap_or_default();
        assert!(!message.contains("503"));
        assert!(!message.contains("sk-123"));
        assert_eq!(outcome.envelope.payload, Payload::Empty {});
    }

    #[tokio::test]
    async fn test_constraints_survive_compaction() {
        let h = HarnessBuilder::new()
            .llm(
                ScriptedLlmClient::new()
                    .on("intent classifier", Ok("cooking_question"))
                    .on("Question:", Ok("Sure thing.")),
            )
            .build();

        h.orchestrator
            .handle_text_query("p6", "I'm vegetarian, how long do I roast squash?")
            .await;
        for i in 0..20 {
            h.orchestrator
                .handle_text_query("p6", &format!("how do I chop onion number {i}?"))
                .await;
        }
        let history = h.orchestrator.conversation_history("p6").await;
        assert!(history.turns.len() <= 12);
        assert!(history.summary.constraints().contains(&"vegetarian".to_string()));
        assert!(!history.summary.notes().is_empty());
        // 约束会出现在后续问答的 prompt 中
        let prompts = h.llm.prompts();
        assert!(prompts.last().map(|p| p.contains("vegetarian")).unwrap_or(false));
    }

    #[tokio::test]
    async fn test_invalid_image_not_resent() {
        let invalid = || -> Result<Vec<Recognition>, CapabilityError> {
            Err(CapabilityError::new(ErrorKind::InvalidImage, "cannot decode"))
        };
        let h = HarnessBuilder::new()
            .primary(FakeVision::new("primary", vec![invalid()]))
            .secondary(FakeVision::new("secondary", vec![invalid()]))
            .build();

        let first = h.orchestrator.handle_ingredient_image("p7", png_bytes(7)).await;
        assert_eq!(first.envelope.status, ToolStatus::Failed);
        assert_eq!((h.primary.calls(), h.secondary.calls()), (1, 1));

        let again = h.orchestrator.handle_ingredient_image("p7", png_bytes(7)).await;
        assert_eq!(again.envelope.status, ToolStatus::Failed);
        assert_eq!((h.primary.calls(), h.secondary.calls()), (1, 1));

        h.orchestrator.handle_ingredient_image("p7", png_bytes(8)).await;
        assert_eq!(h.primary.calls(), 2);
    }

    #[tokio::test]
    async fn test_transient_failure_does_not_poison_retry() {
        let h = HarnessBuilder::new()
            .primary(FakeVision::new(
                "primary",
                vec![Err(unavailable()), Err(unavailable()), Ok(detections(&["tomato"]))],
            ))
            .secondary(FakeVision::new("secondary", vec![Err(unavailable())]))
            .build();

        let first = h.orchestrator.handle_ingredient_image("p8", png_bytes(3)).await;
        assert_eq!(first.envelope.status, ToolStatus::Failed);

        let second = h.orchestrator.handle_ingredient_image("p8", png_bytes(3)).await;
        assert_eq!(second.envelope.status, ToolStatus::Ok);
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let h = HarnessBuilder::new()
            .primary(FakeVision::new("primary", vec![Ok(detections(&["basil", "tomato"]))]))
            .build();

        let (a, b) = tokio::join!(
            h.orchestrator.handle_ingredient_image("alice", png_bytes(1)),
            h.orchestrator.handle_text_query("bob", "I have rice and beans, what is a roux?"),
        );
        assert_eq!(a.envelope.status, ToolStatus::Ok);
        assert!(b.trace.last().is_some());

        let alice = h.orchestrator.sessions().get_or_create("alice").await;
        let bob = h.orchestrator.sessions().get_or_create("bob").await;
        let alice = alice.lock().await;
        let bob = bob.lock().await;
        assert!(alice.known_ingredients().contains("basil"));
        assert!(!alice.known_ingredients().contains("rice"));
        assert!(bob.known_ingredients().contains("rice"));
        assert!(!bob.known_ingredients().contains("basil"));
    }

    #[tokio::test]
    async fn test_select_recipe_replaces_current() {
        let mut second = carbonara();
        second.title = "Cacio e Pepe".into();
        let h = HarnessBuilder::new()
            .llm(ScriptedLlmClient::new().on("intent classifier", Ok("recipe_search")))
            .database(FakeRecipes::new(Ok(vec![carbonara(), second])))
            .build();

        h.orchestrator.handle_text_query("p9", "roman pasta").await;
        let outcome = h.orchestrator.select_recipe("p9", 1).await;
        assert_eq!(outcome.envelope.status, ToolStatus::Ok);

        let handle = h.orchestrator.sessions().get_or_create("p9").await;
        let session = handle.lock().await;
        assert_eq!(session.current_recipe().map(|r| r.title.as_str()), Some("Cacio e Pepe"));
        drop(session);

        let outcome = h.orchestrator.select_recipe("p9", 5).await;
        assert_eq!(outcome.envelope.status, ToolStatus::Failed);
    }
    #[tokio::test]
    async fn test_same_session_requests_are_serialized() {
        let h = HarnessBuilder::new()
            .llm(ScriptedLlmClient::new().on("intent classifier", Ok("recipe_search")))
            .database(FakeRecipes::slow(Ok(vec![carbonara()]), Duration::from_millis(50)))
            .build();

        let (search, shop) = tokio::join!(
            h.orchestrator.handle_text_query("same", "pasta carbonara"),
            h.orchestrator.generate_shopping_list("same"),
        );
        assert_eq!(search.envelope.status, ToolStatus::Ok);

        // 只可能是两种串行顺序之一
        let shop_turns = match &shop.envelope.payload {
            Payload::ShoppingList { recipe, total_items, .. } => {
                assert_eq!(recipe, "Pasta Carbonara");
                assert_eq!(*total_items, 5);
                2
            }
            Payload::Empty {} => {
                assert_eq!(shop.envelope.message.as_deref(), Some("no active recipe"));
                0
            }
            other => panic!("unexpected payload {other:?}"),
        };

        let history = h.orchestrator.conversation_history("same").await;
        assert_eq!(history.turns.len(), 2 + shop_turns);
        for pair in history.turns.chunks(2) {
            assert_eq!(pair[0].role, TurnRole::User);
            assert_eq!(pair[1].role, TurnRole::Assistant);
            assert_eq!(pair[0].intent, pair[1].intent);
        }
    }
}
