//! 编排器：单轮请求的有界状态机
//!
//! ReceiveInput → Classify → SelectTool → ExecuteTool → UpdateMemory → ComposeResponse → Done；
//! 工具返回「需要更多输入」时以 ClarificationLoop 结束本轮，下一轮从 ReceiveInput 重新进入。
//! 连续澄清达到上限后改用尽力回答（degraded），保证循环有界。
//!
//! 每轮持有该会话的锁直到结束；工具只读会话，所有效果在 UpdateMemory 阶段统一写回。

use std::sync::Arc;

use serde::Serialize;

use super::composer::{ResponseComposer, ResponseEnvelope};
use super::sessions::SessionManager;
use super::state::{OrchestratorState, TurnTrace};
use crate::capability::{ImageData, DEFAULT_MAX_IMAGE_BYTES};
use crate::core::CapabilityError;
use crate::domain::{
    Ingredient, IngredientSource, PendingClarification, Session, ToolStatus, Turn, TurnContent,
};
use crate::intent::{ClassifierInput, Intent, IntentClassifier};
use crate::memory::{facts, MemorySummary, Summarizer};
use crate::tools::{recipe_search, Tool, ToolExecutor, ToolInput, ToolOutput, ToolResult};

/// 图片输入：原始字节或上传字符串（base64 / data URL）
#[derive(Clone, Debug)]
pub enum ImageInput {
    Bytes(Vec<u8>),
    Upload(String),
}

/// 一次用户请求：文本与图片至少其一
#[derive(Clone, Debug, Default)]
pub struct UserRequest {
    pub text: Option<String>,
    pub image: Option<ImageInput>,
}

impl UserRequest {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            image: None,
        }
    }

    pub fn image(bytes: Vec<u8>) -> Self {
        Self {
            text: None,
            image: Some(ImageInput::Bytes(bytes)),
        }
    }

    pub fn with_image(mut self, image: ImageInput) -> Self {
        self.image = Some(image);
        self
    }
}

/// 单轮结果：响应信封 + 状态轨迹
#[derive(Clone, Debug, Serialize)]
pub struct TurnOutcome {
    pub envelope: ResponseEnvelope,
    pub trace: TurnTrace,
}

/// 会话历史视图
#[derive(Clone, Debug, Serialize)]
pub struct ConversationHistory {
    pub session_id: String,
    pub summary: MemorySummary,
    pub turns: Vec<Turn>,
}

#[derive(Clone, Debug)]
pub struct OrchestratorSettings {
    pub max_clarification_loops: u8,
    pub max_image_bytes: usize,
    /// 食材识别成功后顺带按识别结果搜索菜谱
    pub suggest_recipes: bool,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            max_clarification_loops: 3,
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
            suggest_recipes: false,
        }
    }
}

/// ReceiveInput 之后的规范化输入
#[derive(Default)]
struct Normalized {
    text: Option<String>,
    image: Option<ImageData>,
    ingredients: Vec<String>,
}

pub struct Orchestrator {
    classifier: IntentClassifier,
    executor: ToolExecutor,
    composer: ResponseComposer,
    summarizer: Arc<dyn Summarizer>,
    sessions: Arc<SessionManager>,
    settings: OrchestratorSettings,
}

impl Orchestrator {
    pub fn new(
        classifier: IntentClassifier,
        executor: ToolExecutor,
        composer: ResponseComposer,
        summarizer: Arc<dyn Summarizer>,
        sessions: Arc<SessionManager>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            classifier,
            executor,
            composer,
            summarizer,
            sessions,
            settings,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    pub fn executor(&self) -> &ToolExecutor {
        &self.executor
    }

    pub async fn handle_text_query(&self, session_id: &str, text: &str) -> TurnOutcome {
        self.handle_request(session_id, UserRequest::text(text)).await
    }

    pub async fn handle_ingredient_image(&self, session_id: &str, bytes: Vec<u8>) -> TurnOutcome {
        self.handle_request(session_id, UserRequest::image(bytes)).await
    }

    /// 为当前菜谱生成购物清单；无当前菜谱时直接返回 "no active recipe"，不调用任何工具
    pub async fn generate_shopping_list(&self, session_id: &str) -> TurnOutcome {
        let mut session = self.sessions.lock_session(session_id).await;
        let mut trace = TurnTrace::new();
        trace.enter(OrchestratorState::ReceiveInput);
        let envelope = self
            .run(&mut session, Normalized::default(), Some(Intent::ShoppingList), &mut trace)
            .await;
        self.sessions.persist(&session);
        TurnOutcome { envelope, trace }
    }

    /// 按显式食材列表搜索菜谱（跳过 Classify）；列出的食材同时记为已有食材
    pub async fn search_recipes(&self, session_id: &str, ingredients: Vec<String>) -> TurnOutcome {
        let mut session = self.sessions.lock_session(session_id).await;
        let mut trace = TurnTrace::new();
        trace.enter(OrchestratorState::ReceiveInput);

        let ingredients: Vec<String> = ingredients
            .into_iter()
            .map(|i| i.trim().to_string())
            .filter(|i| !i.is_empty())
            .collect();
        if ingredients.is_empty() {
            trace.enter(OrchestratorState::ComposeResponse);
            trace.enter(OrchestratorState::Done);
            let envelope = self
                .composer
                .rejected(Intent::RecipeSearch, "Tell me at least one ingredient to search with.");
            return TurnOutcome { envelope, trace };
        }
        session.add_known_ingredients(
            ingredients
                .iter()
                .map(|name| Ingredient::new(name, IngredientSource::Text))
                .collect::<Vec<_>>(),
        );

        let input = Normalized {
            text: Some(format!("recipes with {}", ingredients.join(", "))),
            image: None,
            ingredients,
        };
        let envelope = self
            .run(&mut session, input, Some(Intent::RecipeSearch), &mut trace)
            .await;
        self.sessions.persist(&session);
        TurnOutcome { envelope, trace }
    }

    pub async fn handle_request(&self, session_id: &str, request: UserRequest) -> TurnOutcome {
        let mut session = self.sessions.lock_session(session_id).await;
        let mut trace = TurnTrace::new();
        trace.enter(OrchestratorState::ReceiveInput);

        let text = request
            .text
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        let image = match request.image.map(|i| self.decode_image(i)).transpose() {
            Ok(image) => image,
            Err(e) => {
                tracing::warn!(session = session_id, error = %e, "rejected image upload");
                trace.enter(OrchestratorState::ComposeResponse);
                trace.enter(OrchestratorState::Done);
                let envelope = self
                    .composer
                    .failed(Intent::IngredientRecognition, Some(e.kind));
                return TurnOutcome { envelope, trace };
            }
        };
        if text.is_none() && image.is_none() {
            tracing::debug!(session = session_id, "empty request");
        }

        let input = Normalized {
            text,
            image,
            ..Normalized::default()
        };
        let envelope = self.run(&mut session, input, None, &mut trace).await;
        self.sessions.persist(&session);
        TurnOutcome { envelope, trace }
    }

    /// 从上一轮搜索结果中选定当前菜谱（序号从 0 开始）
    pub async fn select_recipe(&self, session_id: &str, index: usize) -> TurnOutcome {
        let mut session = self.sessions.lock_session(session_id).await;
        let mut trace = TurnTrace::new();
        trace.enter(OrchestratorState::ReceiveInput);
        session.touch();

        let Some(recipe) = session.last_recipes().get(index).cloned() else {
            trace.enter(OrchestratorState::ComposeResponse);
            trace.enter(OrchestratorState::Done);
            let envelope = self
                .composer
                .rejected(Intent::RecipeSearch, "There is no recipe at that position. Search for recipes first.");
            return TurnOutcome { envelope, trace };
        };

        trace.enter(OrchestratorState::UpdateMemory);
        session.set_current_recipe(recipe.clone());
        let result = ToolResult::new(ToolStatus::Ok, ToolOutput::Recipes(vec![recipe]), Vec::new());
        let mut envelope = self.composer.compose(Intent::RecipeSearch, &result);
        if let ToolOutput::Recipes(recipes) = &result.output {
            envelope.message = recipes
                .first()
                .map(|r| format!("{} is now your current recipe.", r.title));
        }
        let user = Turn::user(
            TurnContent::text(format!("select recipe #{}", index + 1)),
            Intent::RecipeSearch,
        );
        let assistant = Turn::assistant(
            envelope.message.clone().unwrap_or_default(),
            Intent::RecipeSearch,
            Vec::new(),
        );
        session.memory_mut().append(user, self.summarizer.as_ref()).await;
        session.memory_mut().append(assistant, self.summarizer.as_ref()).await;

        trace.enter(OrchestratorState::ComposeResponse);
        trace.enter(OrchestratorState::Done);
        self.sessions.persist(&session);
        TurnOutcome { envelope, trace }
    }

    /// 显式结束会话：清空记忆、菜谱、食材与尝试记录
    pub async fn clear_session(&self, session_id: &str) {
        if let Some(handle) = self.sessions.get(session_id).await {
            let mut session = handle.lock().await;
            session.reset();
            self.sessions.persist(&session);
        }
        tracing::info!(session = session_id, "session cleared");
    }

    pub async fn conversation_history(&self, session_id: &str) -> ConversationHistory {
        let session = self.sessions.lock_session(session_id).await;
        ConversationHistory {
            session_id: session.id().to_string(),
            summary: session.memory().summary().clone(),
            turns: session.memory().turns().to_vec(),
        }
    }

    fn decode_image(&self, input: ImageInput) -> Result<ImageData, CapabilityError> {
        match input {
            ImageInput::Bytes(bytes) => ImageData::from_bytes(bytes, self.settings.max_image_bytes),
            ImageInput::Upload(upload) => ImageData::from_upload(&upload, self.settings.max_image_bytes),
        }
    }

    /// ReceiveInput 之后的主流程；forced 为边界操作固定的意图（跳过 Classify）
    async fn run(
        &self,
        session: &mut Session,
        input: Normalized,
        forced: Option<Intent>,
        trace: &mut TurnTrace,
    ) -> ResponseEnvelope {
        session.touch();
        if let Some(text) = input.text.as_deref() {
            absorb_facts(session, text);
        }

        // Classify
        let (intent, text) = match forced {
            Some(intent) => (intent, input.text.clone()),
            None => {
                trace.enter(OrchestratorState::Classify);
                let classified = self
                    .classifier
                    .classify(
                        &ClassifierInput::new(input.text.as_deref(), input.image.is_some()),
                        session.memory().summary(),
                    )
                    .await;
                resume_pending(session, classified, input.text.clone())
            }
        };
        tracing::info!(session = session.id(), %intent, "intent resolved");

        // SelectTool
        trace.enter(OrchestratorState::SelectTool);
        if intent == Intent::ShoppingList && session.current_recipe().is_none() {
            trace.enter(OrchestratorState::ComposeResponse);
            trace.enter(OrchestratorState::Done);
            return self.composer.precondition_failed(intent);
        }
        let at_cap = session.clarification_streak() >= self.settings.max_clarification_loops;
        let mut best_effort = at_cap && intent.asks_clarification();
        let mut tool: Arc<dyn Tool> = if best_effort {
            self.executor.registry().best_effort()
        } else {
            self.executor.registry().select(intent)
        };

        // ExecuteTool
        trace.enter(OrchestratorState::ExecuteTool);
        let tool_input = ToolInput {
            text: text.clone(),
            image: input.image.clone(),
            ingredients: input.ingredients.clone(),
        };
        let mut result = self.executor.execute(&tool, session, &tool_input).await;
        if at_cap && !best_effort && result.is_needs_input() {
            tracing::warn!(
                session = session.id(),
                streak = session.clarification_streak(),
                "clarification limit reached, answering best-effort"
            );
            best_effort = true;
            tool = self.executor.registry().best_effort();
            trace.enter(OrchestratorState::ExecuteTool);
            result = self.executor.execute(&tool, session, &tool_input).await;
        }
        let intent = if best_effort {
            if result.status == ToolStatus::Ok {
                result = result.with_status(ToolStatus::Degraded);
            }
            Intent::CookingQuestion
        } else {
            intent
        };
        let clarifying = !best_effort && result.is_needs_input();
        let suggestions = if intent == Intent::IngredientRecognition && self.settings.suggest_recipes {
            self.suggest_recipes(session, &result, trace).await
        } else {
            None
        };

        // UpdateMemory
        trace.enter(OrchestratorState::UpdateMemory);
        let mut draft = self.composer.compose(intent, &result);
        if let Some(ToolOutput::Recipes(recipes)) = suggestions.as_ref().map(|s| &s.output) {
            draft = self.composer.with_suggestions(draft, recipes);
        }
        self.update_memory(
            session,
            intent,
            &tool,
            &tool_input,
            &result,
            suggestions.as_ref(),
            clarifying,
            &draft,
        )
        .await;

        // ComposeResponse
        trace.enter(OrchestratorState::ComposeResponse);
        let envelope = self.composer.polish(draft).await;
        trace.enter(if clarifying {
            OrchestratorState::ClarificationLoop
        } else {
            OrchestratorState::Done
        });
        envelope
    }

    /// 识别出食材后按这些食材搜索菜谱；识别失败或为空时不搜索
    async fn suggest_recipes(
        &self,
        session: &Session,
        recognized: &ToolResult,
        trace: &mut TurnTrace,
    ) -> Option<ToolResult> {
        if recognized.status == ToolStatus::Failed {
            return None;
        }
        let ToolOutput::Ingredients(items) = &recognized.output else {
            return None;
        };
        if items.is_empty() {
            return None;
        }
        let tool = self.executor.registry().select(Intent::RecipeSearch);
        let input = ToolInput {
            ingredients: items.iter().map(|i| i.name.clone()).collect(),
            ..ToolInput::default()
        };
        trace.enter(OrchestratorState::ExecuteTool);
        let result = self.executor.execute(&tool, session, &input).await;
        if result.status == ToolStatus::Failed {
            tracing::debug!(session = session.id(), error = ?result.error, "recipe suggestions unavailable");
        }
        Some(result)
    }

    #[allow(clippy::too_many_arguments)]
    async fn update_memory(
        &self,
        session: &mut Session,
        intent: Intent,
        tool: &Arc<dyn Tool>,
        input: &ToolInput,
        result: &ToolResult,
        suggestions: Option<&ToolResult>,
        clarifying: bool,
        draft: &ResponseEnvelope,
    ) {
        for output in std::iter::once(&result.output).chain(suggestions.map(|s| &s.output)) {
            match output {
                ToolOutput::Ingredients(items) => {
                    let added = session.add_known_ingredients(items.iter().cloned());
                    tracing::debug!(added, total = session.known_ingredients().len(), "known ingredients updated");
                }
                ToolOutput::Recipes(recipes) if !recipes.is_empty() => {
                    session.set_last_recipes(recipes.clone());
                    session.set_current_recipe(recipes[0].clone());
                }
                _ => {}
            }
        }

        let fingerprint = input
            .image
            .as_ref()
            .map(|i| i.fingerprint().to_string())
            .unwrap_or_else(|| input.text().to_lowercase());
        session
            .ledger_mut()
            .record(tool.name(), &fingerprint, result.status, &result.invocations);
        if let Some(s) = suggestions {
            session
                .ledger_mut()
                .record(recipe_search::NAME, &fingerprint, s.status, &s.invocations);
        }

        if clarifying {
            session.bump_clarification(PendingClarification {
                intent,
                text: input.text().to_string(),
            });
        } else {
            session.settle_clarification();
        }

        let user = Turn::user(
            TurnContent {
                text: input.text.clone(),
                image: input.image.as_ref().map(ImageData::to_ref),
            },
            intent,
        );
        let mut invocations = result.invocations.clone();
        if let Some(s) = suggestions {
            invocations.extend(s.invocations.iter().cloned());
        }
        let assistant = Turn::assistant(draft.message.clone().unwrap_or_default(), intent, invocations);
        let summarizer = self.summarizer.as_ref();
        let memory = session.memory_mut();
        memory.append(user, summarizer).await;
        memory.append(assistant, summarizer).await;
    }
}

/// 把陈述的事实写入会话：饮食限制进入固定约束，已有食材进入已知食材
fn absorb_facts(session: &mut Session, text: &str) {
    for constraint in facts::dietary_constraints(text) {
        if session.memory_mut().summary_mut().add_constraint(&constraint) {
            tracing::info!(session = session.id(), %constraint, "dietary constraint noted");
        }
    }
    let stated: Vec<Ingredient> = facts::stated_ingredients(text)
        .iter()
        .map(|name| Ingredient::new(name, IngredientSource::Text))
        .collect();
    if !stated.is_empty() {
        session.add_known_ingredients(stated);
    }
}

/// 有挂起的澄清且新意图仍是澄清类时，恢复挂起的意图并合并文本
fn resume_pending(session: &Session, classified: Intent, text: Option<String>) -> (Intent, Option<String>) {
    let Some(pending) = session.pending() else {
        return (classified, text);
    };
    if !classified.asks_clarification() {
        return (classified, text);
    }
    let combined = match text {
        Some(t) if !pending.text.is_empty() => Some(format!("{} {}", pending.text, t)),
        Some(t) => Some(t),
        None => Some(pending.text.clone()).filter(|t| !t.is_empty()),
    };
    let intent = if pending.intent.asks_clarification() {
        classified
    } else {
        pending.intent
    };
    tracing::debug!(session = session.id(), %intent, "resuming pending clarification");
    (intent, combined)
}
