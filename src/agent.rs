//! 组装运行时
//!
//! 按 AppConfig 选择语言模型后端（gemini / openai / mock）、构造视觉回退链、菜谱数据库 + 生成式提供方、
//! 相似度适配器，并把它们注册进 ToolRegistry，最终得到可被 REPL / HTTP 共享的 Orchestrator。

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::capability::{
    EmbeddingSimilarity, LanguageGateway, LexicalSimilarity, OpenAiVision, RecipeDatabase,
    RecipeGenerator, RetryPolicy, RetryingRecipeDatabase, RetryingVision, SimilarityAdapter,
    SpoonacularClient, VisionAdapter,
};
use crate::config::{api_key, load_config_or_default, AppConfig, VisionProvider};
use crate::core::{
    JsonFileSessionPersistence, Orchestrator, OrchestratorSettings, ResponseComposer,
    SessionManager,
};
use crate::intent::{Intent, IntentClassifier};
use crate::llm::{
    create_gemini_client, LlmClient, MockLlmClient, OpenAiClient, OpenAiEmbedder,
    RetryingLlmClient,
};
use crate::tools::executor::tool_budget;
use crate::tools::ingredient_recognition::vision_chain;
use crate::tools::{
    ClarifyTool, CookingQuestionTool, IngredientRecognitionTool, RecipeSearchTool,
    ShoppingListTool, Tool, ToolExecutor, ToolRegistry,
};

/// 外部调用的超时与重试策略（[adapters] 段）
pub fn retry_policy(cfg: &AppConfig) -> RetryPolicy {
    RetryPolicy::new(
        Duration::from_secs(cfg.adapters.timeout_secs.max(1)),
        cfg.adapters.max_retries,
        Duration::from_millis(cfg.adapters.backoff_ms),
    )
}

/// 根据配置与环境变量选择 LLM 后端（Gemini / OpenAI 兼容 / Mock）
pub fn create_llm_from_config(cfg: &AppConfig) -> Arc<dyn LlmClient> {
    let provider = cfg.llm.provider.to_lowercase();
    let key = api_key(&cfg.llm.api_key_env);

    let client: Arc<dyn LlmClient> = match (provider.as_str(), key) {
        ("gemini", Some(_)) => {
            let client = create_gemini_client(cfg.llm.model.as_deref(), cfg.llm.base_url.as_deref());
            tracing::info!("Using Gemini LLM ({})", client.name());
            Arc::new(client)
        }
        ("openai", Some(key)) => {
            let model = cfg
                .llm
                .model
                .clone()
                .unwrap_or_else(|| "gpt-4o-mini".to_string());
            tracing::info!("Using OpenAI LLM ({})", model);
            Arc::new(OpenAiClient::new(cfg.llm.base_url.as_deref(), &model, Some(key.as_str())))
        }
        ("mock", _) => {
            tracing::info!("Using Mock LLM");
            return Arc::new(MockLlmClient);
        }
        (other, None) => {
            tracing::warn!(
                provider = other,
                env = %cfg.llm.api_key_env,
                "No API key set, using Mock LLM"
            );
            return Arc::new(MockLlmClient);
        }
        (other, Some(_)) => {
            tracing::warn!(provider = other, "Unknown LLM provider, using Mock LLM");
            return Arc::new(MockLlmClient);
        }
    };
    Arc::new(RetryingLlmClient::new(client, retry_policy(cfg)))
}

fn vision_adapter(provider: &VisionProvider, label: &str, cfg: &AppConfig) -> Arc<dyn VisionAdapter> {
    let timeout = Duration::from_secs(cfg.adapters.timeout_secs.max(1));
    let vision = OpenAiVision::new(
        &provider.base_url,
        &provider.model,
        api_key(&provider.api_key_env),
        timeout,
    )
    .with_label(format!("{label}:{}", provider.model));
    Arc::new(RetryingVision::new(Arc::new(vision), retry_policy(cfg)))
}

fn similarity_from_config(cfg: &AppConfig) -> Arc<dyn SimilarityAdapter> {
    if !cfg.embedding.enabled {
        return Arc::new(LexicalSimilarity);
    }
    match api_key(&cfg.embedding.api_key_env) {
        Some(key) => {
            tracing::info!(model = %cfg.embedding.model, "Using embedding similarity");
            let embedder = OpenAiEmbedder::new(
                cfg.embedding.base_url.as_deref(),
                &cfg.embedding.model,
                Some(key.as_str()),
            );
            Arc::new(EmbeddingSimilarity::new(embedder))
        }
        None => {
            tracing::warn!(env = %cfg.embedding.api_key_env, "embedding enabled but no API key, using lexical similarity");
            Arc::new(LexicalSimilarity)
        }
    }
}

/// 由配置构建 Orchestrator
pub fn create_orchestrator(cfg: &AppConfig) -> Orchestrator {
    let gateway = LanguageGateway::new(create_llm_from_config(cfg));

    let primary = vision_adapter(&cfg.vision.primary, "primary", cfg);
    let secondary = cfg
        .vision
        .secondary
        .as_ref()
        .map(|p| vision_adapter(p, "secondary", cfg));
    let recognition = IngredientRecognitionTool::new(vision_chain(primary, secondary), cfg.vision.min_confidence);

    let spoonacular_key = api_key(&cfg.recipes.api_key_env);
    if spoonacular_key.is_none() {
        tracing::warn!(env = %cfg.recipes.api_key_env, "no recipe database key, recipes will be generated");
    }
    let database: Arc<dyn RecipeDatabase> = Arc::new(RetryingRecipeDatabase::new(
        Arc::new(SpoonacularClient::new(
            &cfg.recipes.base_url,
            spoonacular_key,
            Duration::from_secs(cfg.adapters.timeout_secs.max(1)),
        )),
        retry_policy(cfg),
    ));
    let generator: Arc<dyn RecipeDatabase> = Arc::new(RecipeGenerator::new(gateway.clone()));
    let search = RecipeSearchTool::new(
        database,
        generator,
        similarity_from_config(cfg),
        cfg.recipes.max_results,
    );

    let answer: Arc<dyn Tool> = Arc::new(CookingQuestionTool::new(gateway.clone()));
    let registry = ToolRegistry::new(Arc::new(ClarifyTool::new(gateway.clone())), answer.clone())
        .register(Intent::IngredientRecognition, Arc::new(recognition))
        .register(Intent::RecipeSearch, Arc::new(search))
        .register(Intent::CookingQuestion, answer)
        .register(Intent::ShoppingList, Arc::new(ShoppingListTool));
    for (intent, tool) in registry.describe() {
        tracing::debug!(%intent, tool, "tool registered");
    }

    let mut sessions = SessionManager::new(cfg.memory.limits(), cfg.app.session_idle_timeout_secs);
    if let Some(dir) = &cfg.app.sessions_dir {
        tracing::info!(dir = %dir.display(), "session snapshots enabled");
        sessions = sessions.with_persistence(Arc::new(JsonFileSessionPersistence::new(dir)));
    }

    let composer = ResponseComposer::new(cfg.orchestrator.fluency_pass.then(|| gateway.clone()));

    Orchestrator::new(
        IntentClassifier::new(gateway.clone()),
        ToolExecutor::new(
            registry,
            tool_budget(&retry_policy(cfg), cfg.orchestrator.tool_timeout_secs),
        ),
        composer,
        Arc::new(gateway),
        Arc::new(sessions),
        OrchestratorSettings {
            max_clarification_loops: cfg.orchestrator.max_clarification_loops,
            max_image_bytes: cfg.vision.max_image_bytes,
            suggest_recipes: cfg.orchestrator.suggest_recipes,
        },
    )
}

/// 加载配置（失败时使用默认值）并构建 Orchestrator
pub fn create_orchestrator_from_path(config_path: Option<PathBuf>) -> (AppConfig, Orchestrator) {
    let cfg = load_config_or_default(config_path);
    let orchestrator = create_orchestrator(&cfg);
    (cfg, orchestrator)
}
