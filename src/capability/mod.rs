//! 外部能力适配器：视觉识别、语言生成、菜谱库、相似度，以及图片归一化、提示词与重试
//!
//! 每个适配器声明输入 / 输出契约与失败类型（ErrorKind）；超时与重试由 Retrying* 装饰器统一处理。

pub mod image;
pub mod language;
pub mod prompts;
pub mod recipe_db;
pub mod recipe_gen;
pub mod retry;
pub mod similarity;
pub mod vision;

pub use image::{ImageData, DEFAULT_MAX_IMAGE_BYTES};
pub use language::{extract_json, LanguageGateway};
pub use recipe_db::{RecipeDatabase, RecipeQuery, RetryingRecipeDatabase, SpoonacularClient};
pub use recipe_gen::RecipeGenerator;
pub use retry::{call_with_retry, RetryPolicy};
pub use similarity::{EmbeddingSimilarity, LexicalSimilarity, SimilarityAdapter};
pub use vision::{OpenAiVision, Recognition, RetryingVision, VisionAdapter};
