//! 集成测试共用的脚本化适配器与 Orchestrator 组装

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use sous::capability::{
    ImageData, LanguageGateway, LexicalSimilarity, RecipeDatabase, RecipeGenerator, RecipeQuery,
    Recognition, RetryPolicy, RetryingVision, VisionAdapter,
};
use sous::core::{
    CapabilityError, ErrorKind, Orchestrator, OrchestratorSettings, ResponseComposer,
    SessionManager,
};
use sous::domain::{Ingredient, IngredientSource, Recipe, RecipeSource};
use sous::intent::{Intent, IntentClassifier};
use sous::llm::ScriptedLlmClient;
use sous::memory::{CondensingSummarizer, MemoryLimits};
use sous::tools::ingredient_recognition::vision_chain;
use sous::tools::{
    ClarifyTool, CookingQuestionTool, IngredientRecognitionTool, RecipeSearchTool,
    ShoppingListTool, Tool, ToolExecutor, ToolRegistry,
};

/// 最小 PNG 文件头（视觉适配器为假实现，不解码像素）
pub fn png_bytes(seed: u8) -> Vec<u8> {
    let mut v = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    v.extend_from_slice(b"\x00\x00\x00\x0dIHDR");
    v.push(seed);
    v
}

pub fn detections(names: &[&str]) -> Vec<Recognition> {
    names
        .iter()
        .map(|n| Recognition {
            name: n.to_string(),
            confidence: 0.9,
        })
        .collect()
}

/// 依次返回预设结果的视觉适配器（最后一条重复使用）；delay 用于模拟超时
pub struct FakeVision {
    label: &'static str,
    replies: Mutex<VecDeque<Result<Vec<Recognition>, CapabilityError>>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl FakeVision {
    pub fn new(label: &'static str, replies: Vec<Result<Vec<Recognition>, CapabilityError>>) -> Self {
        Self {
            label,
            replies: Mutex::new(replies.into()),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn slow(label: &'static str, delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::new(label, vec![Ok(Vec::new())])
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VisionAdapter for FakeVision {
    async fn recognize(&self, _image: &ImageData) -> Result<Vec<Recognition>, CapabilityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let mut replies = self.replies.lock().unwrap();
        if replies.len() > 1 {
            replies.pop_front().unwrap()
        } else {
            replies
                .front()
                .cloned()
                .unwrap_or_else(|| Err(CapabilityError::unavailable("no reply scripted")))
        }
    }

    fn name(&self) -> &str {
        self.label
    }
}

/// 固定结果的菜谱数据库，记录收到的查询；delay 用于拉长一轮请求
pub struct FakeRecipes {
    reply: Result<Vec<Recipe>, CapabilityError>,
    queries: Mutex<Vec<RecipeQuery>>,
    delay: Option<Duration>,
}

impl FakeRecipes {
    pub fn new(reply: Result<Vec<Recipe>, CapabilityError>) -> Self {
        Self {
            reply,
            queries: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    pub fn slow(reply: Result<Vec<Recipe>, CapabilityError>, delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::new(reply)
        }
    }

    pub fn calls(&self) -> usize {
        self.queries.lock().unwrap().len()
    }

    pub fn queries(&self) -> Vec<RecipeQuery> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecipeDatabase for FakeRecipes {
    async fn search(&self, query: &RecipeQuery) -> Result<Vec<Recipe>, CapabilityError> {
        self.queries.lock().unwrap().push(query.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.reply.clone()
    }

    fn name(&self) -> &str {
        "fake-db"
    }
}

pub fn carbonara() -> Recipe {
    let ingredients = ["spaghetti", "eggs", "pancetta", "pecorino", "black pepper"]
        .iter()
        .map(|n| Ingredient::new(n, IngredientSource::Inferred))
        .collect();
    let mut recipe = Recipe::new(
        "Pasta Carbonara",
        ingredients,
        vec!["Boil pasta".into(), "Fry pancetta".into(), "Toss with eggs and cheese".into()],
    )
    .with_source(RecipeSource::Database);
    recipe.id = Some("715538".into());
    recipe
}

pub fn unavailable() -> CapabilityError {
    CapabilityError::new(ErrorKind::ServiceUnavailable, "upstream 503")
}

pub struct Harness {
    pub orchestrator: Orchestrator,
    pub llm: Arc<ScriptedLlmClient>,
    pub primary: Arc<FakeVision>,
    pub secondary: Arc<FakeVision>,
    pub database: Arc<FakeRecipes>,
}

pub struct HarnessBuilder {
    llm: ScriptedLlmClient,
    primary: FakeVision,
    secondary: FakeVision,
    database: FakeRecipes,
    vision_timeout: Duration,
    max_clarification_loops: u8,
    suggest_recipes: bool,
}

impl HarnessBuilder {
    pub fn new() -> Self {
        Self {
            llm: ScriptedLlmClient::new(),
            primary: FakeVision::new("primary", vec![Err(unavailable())]),
            secondary: FakeVision::new("secondary", vec![Err(unavailable())]),
            database: FakeRecipes::new(Ok(Vec::new())),
            vision_timeout: Duration::from_secs(5),
            max_clarification_loops: 3,
            suggest_recipes: false,
        }
    }

    pub fn llm(mut self, llm: ScriptedLlmClient) -> Self {
        self.llm = llm;
        self
    }

    pub fn primary(mut self, vision: FakeVision) -> Self {
        self.primary = vision;
        self
    }

    pub fn secondary(mut self, vision: FakeVision) -> Self {
        self.secondary = vision;
        self
    }

    pub fn database(mut self, database: FakeRecipes) -> Self {
        self.database = database;
        self
    }

    pub fn vision_timeout(mut self, timeout: Duration) -> Self {
        self.vision_timeout = timeout;
        self
    }

    pub fn max_clarification_loops(mut self, n: u8) -> Self {
        self.max_clarification_loops = n;
        self
    }

    pub fn suggest_recipes(mut self, enabled: bool) -> Self {
        self.suggest_recipes = enabled;
        self
    }

    pub fn build(self) -> Harness {
        let llm = Arc::new(self.llm);
        let primary = Arc::new(self.primary);
        let secondary = Arc::new(self.secondary);
        let database = Arc::new(self.database);
        let gateway = LanguageGateway::new(llm.clone());

        let policy = RetryPolicy::new(self.vision_timeout, 1, Duration::from_millis(1));
        let chain = vision_chain(
            Arc::new(RetryingVision::new(primary.clone(), policy.clone())),
            Some(Arc::new(RetryingVision::new(secondary.clone(), policy))),
        );
        let answer: Arc<dyn Tool> = Arc::new(CookingQuestionTool::new(gateway.clone()));
        let registry = ToolRegistry::new(Arc::new(ClarifyTool::new(gateway.clone())), answer.clone())
            .register(
                Intent::IngredientRecognition,
                Arc::new(IngredientRecognitionTool::new(chain, 0.5)),
            )
            .register(
                Intent::RecipeSearch,
                Arc::new(RecipeSearchTool::new(
                    database.clone(),
                    Arc::new(RecipeGenerator::new(gateway.clone())),
                    Arc::new(LexicalSimilarity),
                    5,
                )),
            )
            .register(Intent::CookingQuestion, answer)
            .register(Intent::ShoppingList, Arc::new(ShoppingListTool));

        let orchestrator = Orchestrator::new(
            IntentClassifier::new(gateway),
            ToolExecutor::new(registry, Duration::from_secs(30)),
            ResponseComposer::new(None),
            Arc::new(CondensingSummarizer),
            Arc::new(SessionManager::new(MemoryLimits::default(), 3600)),
            OrchestratorSettings {
                max_clarification_loops: self.max_clarification_loops,
                suggest_recipes: self.suggest_recipes,
                ..OrchestratorSettings::default()
            },
        );
        Harness {
            orchestrator,
            llm,
            primary,
            secondary,
            database,
        }
    }
}
