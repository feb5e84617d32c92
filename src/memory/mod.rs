//! 记忆层：会话原始轮次 + 追加式摘要、尝试记录、用户事实抽取

pub mod facts;
pub mod ledger;
pub mod store;
pub mod summary;

pub use ledger::{AttemptLedger, AttemptRecord};
pub use store::{CondensingSummarizer, MemoryLimits, MemoryStore, Summarizer};
pub use summary::MemorySummary;
