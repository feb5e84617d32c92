//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `SOUS__*` 覆盖（双下划线表示嵌套，如 `SOUS__LLM__PROVIDER=openai`）。
//! API Key 不写入配置文件，配置里只记录读取哪个环境变量。

use std::path::PathBuf;

use serde::Deserialize;

use crate::capability::DEFAULT_MAX_IMAGE_BYTES;
use crate::llm::{GEMINI_BASE_URL, GEMINI_FLASH};
use crate::memory::MemoryLimits;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub vision: VisionSection,
    pub recipes: RecipesSection,
    pub adapters: AdaptersSection,
    pub memory: MemorySection,
    pub orchestrator: OrchestratorSection,
    pub embedding: EmbeddingSection,
}

/// [app] 段：应用名、会话空闲超时、会话快照目录
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSection {
    pub name: String,
    pub session_idle_timeout_secs: u64,
    /// 设置后每轮结束保存 `<dir>/<session_id>.json`
    pub sessions_dir: Option<PathBuf>,
    /// sous-web 监听地址
    pub bind: String,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: "sous".to_string(),
            session_idle_timeout_secs: 3600,
            sessions_dir: None,
            bind: "127.0.0.1:8080".to_string(),
        }
    }
}

/// [llm] 段：语言模型后端
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// gemini / openai / mock
    pub provider: String,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub api_key_env: String,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            model: None,
            base_url: None,
            api_key_env: "GEMINI_API_KEY".to_string(),
        }
    }
}

/// 单个视觉提供方
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VisionProvider {
    pub base_url: String,
    pub model: String,
    pub api_key_env: String,
}

impl Default for VisionProvider {
    fn default() -> Self {
        Self {
            base_url: GEMINI_BASE_URL.to_string(),
            model: GEMINI_FLASH.to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
        }
    }
}

/// [vision] 段：主 / 备视觉提供方与识别阈值
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VisionSection {
    pub primary: VisionProvider,
    pub secondary: Option<VisionProvider>,
    pub min_confidence: f32,
    pub max_image_bytes: usize,
}

impl Default for VisionSection {
    fn default() -> Self {
        Self {
            primary: VisionProvider::default(),
            secondary: None,
            min_confidence: 0.5,
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
        }
    }
}

/// [recipes] 段：菜谱数据库
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RecipesSection {
    pub base_url: String,
    pub api_key_env: String,
    pub max_results: usize,
}

impl Default for RecipesSection {
    fn default() -> Self {
        Self {
            base_url: crate::capability::recipe_db::SPOONACULAR_BASE_URL.to_string(),
            api_key_env: "SPOONACULAR_API_KEY".to_string(),
            max_results: 5,
        }
    }
}

/// [adapters] 段：外部调用的超时与重试
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AdaptersSection {
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub backoff_ms: u64,
}

impl Default for AdaptersSection {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_retries: 1,
            backoff_ms: 500,
        }
    }
}

/// [memory] 段：原始轮次与摘要容量
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MemorySection {
    pub max_raw_turns: usize,
    pub keep_recent_turns: usize,
    pub max_raw_tokens: usize,
    pub max_summary_chars: usize,
}

impl Default for MemorySection {
    fn default() -> Self {
        let limits = MemoryLimits::default();
        Self {
            max_raw_turns: limits.max_raw_turns,
            keep_recent_turns: limits.keep_recent_turns,
            max_raw_tokens: limits.max_raw_tokens,
            max_summary_chars: limits.max_summary_chars,
        }
    }
}

impl MemorySection {
    pub fn limits(&self) -> MemoryLimits {
        MemoryLimits {
            max_raw_turns: self.max_raw_turns,
            keep_recent_turns: self.keep_recent_turns.min(self.max_raw_turns),
            max_raw_tokens: self.max_raw_tokens,
            max_summary_chars: self.max_summary_chars,
        }
    }
}

/// [orchestrator] 段：澄清上限、润色、单个工具整体预算（只能放宽由适配器策略推出的预算）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OrchestratorSection {
    pub max_clarification_loops: u8,
    pub fluency_pass: bool,
    pub tool_timeout_secs: u64,
    /// 食材识别成功后顺带给出菜谱建议
    pub suggest_recipes: bool,
}

impl Default for OrchestratorSection {
    fn default() -> Self {
        Self {
            max_clarification_loops: 3,
            fluency_pass: false,
            tool_timeout_secs: 90,
            suggest_recipes: true,
        }
    }
}

/// [embedding] 段：向量相似度（默认关闭，使用词法相似度）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmbeddingSection {
    pub enabled: bool,
    pub model: String,
    pub base_url: Option<String>,
    pub api_key_env: String,
}

impl Default for EmbeddingSection {
    fn default() -> Self {
        Self {
            enabled: false,
            model: "text-embedding-3-small".to_string(),
            base_url: None,
            api_key_env: "OPENAI_API_KEY".to_string(),
        }
    }
}

/// 读取配置中指定的环境变量；未设置或为空时返回 None
pub fn api_key(env_name: &str) -> Option<String> {
    std::env::var(env_name).ok().filter(|k| !k.trim().is_empty())
}

/// 从 config 目录加载配置，环境变量 SOUS__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 SOUS__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("SOUS")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

/// 加载失败时退回默认配置并记录告警
pub fn load_config_or_default(config_path: Option<PathBuf>) -> AppConfig {
    load_config(config_path).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        AppConfig::default()
    })
}
