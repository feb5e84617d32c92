//! LLM 层：客户端抽象与实现（OpenAI 兼容 / Gemini / Mock）及重试装饰器

pub mod embedding;
pub mod gemini;
pub mod mock;
pub mod openai;
pub mod retry;
pub mod traits;

pub use embedding::OpenAiEmbedder;
pub use gemini::{create_gemini_client, GEMINI_BASE_URL, GEMINI_FLASH};
pub use mock::{MockLlmClient, ScriptedLlmClient};
pub use openai::{OpenAiClient, TokenUsage};
pub use retry::RetryingLlmClient;
pub use traits::{LlmClient, LlmError, Message, Role};
