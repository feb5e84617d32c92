//! Sous - 多模态烹饪助手编排核心
//!
//! 模块划分：
//! - **agent**: 按配置组装 Orchestrator（供 REPL / HTTP 调用）
//! - **capability**: 外部能力适配器（视觉、语言、菜谱库、相似度）与超时重试
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 编排状态机、错误与恢复、会话管理、响应组装
//! - **domain**: 食材、菜谱、对话轮次、会话
//! - **intent**: 意图枚举与分类器
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Gemini / Mock）
//! - **memory**: 会话记忆、摘要压缩、尝试记录
//! - **tools**: 五个烹饪工具、回退链与执行器

pub mod agent;
pub mod capability;
pub mod config;
pub mod core;
pub mod domain;
pub mod intent;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod tools;

pub use crate::core::{Orchestrator, ResponseEnvelope, TurnOutcome, UserRequest};
pub use crate::intent::Intent;
