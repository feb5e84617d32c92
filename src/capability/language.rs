//! 语言生成网关
//!
//! 在 LlmClient 之上声明输出契约：自由文本、枚举之一（OneOf）、JSON。不满足契约 → MalformedOutput。
//! 同时实现 Summarizer，供记忆压缩调用。

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use super::prompts;
use crate::core::CapabilityError;
use crate::llm::{LlmClient, Message};
use crate::memory::{MemorySummary, Summarizer};

#[derive(Clone)]
pub struct LanguageGateway {
    llm: Arc<dyn LlmClient>,
}

impl LanguageGateway {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    pub fn name(&self) -> &str {
        self.llm.name()
    }

    pub fn client(&self) -> &Arc<dyn LlmClient> {
        &self.llm
    }

    /// 自由文本；空输出视为 MalformedOutput
    pub async fn text(&self, system: &str, user: &str) -> Result<String, CapabilityError> {
        let messages = [Message::system(system), Message::user(user)];
        let out = self.llm.complete(&messages).await?;
        let out = out.trim();
        if out.is_empty() {
            return Err(CapabilityError::malformed("empty text output"));
        }
        Ok(out.to_string())
    }

    /// 枚举契约：输出必须（规范化后）等于 choices 之一，或只包含其中一个
    pub async fn one_of(
        &self,
        system: &str,
        user: &str,
        choices: &[&str],
    ) -> Result<String, CapabilityError> {
        let raw = self.text(system, user).await?;
        match_choice(&raw, choices)
            .map(String::from)
            .ok_or_else(|| CapabilityError::malformed(format!("expected one of {choices:?}, got {raw:?}")))
    }

    /// JSON 契约：从围栏代码块或最外层 {...} 中提取后反序列化
    pub async fn json<T: DeserializeOwned>(&self, system: &str, user: &str) -> Result<T, CapabilityError> {
        let raw = self.text(system, user).await?;
        let body = extract_json(&raw).ok_or_else(|| CapabilityError::malformed("no json object in output"))?;
        serde_json::from_str(body).map_err(|e| CapabilityError::malformed(format!("json contract: {e}")))
    }
}

fn match_choice<'a>(raw: &str, choices: &[&'a str]) -> Option<&'a str> {
    let normalized = raw
        .trim()
        .trim_matches(|c: char| c == '`' || c == '"' || c == '\'' || c == '.' || c.is_whitespace())
        .to_lowercase()
        .replace([' ', '-'], "_");
    if let Some(c) = choices.iter().find(|c| **c == normalized) {
        return Some(c);
    }
    let mentioned: Vec<&&str> = choices.iter().filter(|c| normalized.contains(**c)).collect();
    match mentioned.as_slice() {
        [only] => Some(only),
        _ => None,
    }
}

/// 提取 JSON 文本：优先 ```json 围栏，其次最外层 {...} 或 [...]
pub fn extract_json(raw: &str) -> Option<&str> {
    if let Some(start) = raw.find("```") {
        let after = &raw[start + 3..];
        let after = after.strip_prefix("json").unwrap_or(after);
        if let Some(end) = after.find("```") {
            let inner = after[..end].trim();
            if !inner.is_empty() {
                return Some(inner);
            }
        }
    }
    let object = raw.find('{').zip(raw.rfind('}'));
    let array = raw.find('[').zip(raw.rfind(']'));
    let (start, end) = match (object, array) {
        (Some(o), Some(a)) => {
            if a.0 < o.0 {
                a
            } else {
                o
            }
        }
        (Some(o), None) => o,
        (None, Some(a)) => a,
        (None, None) => return None,
    };
    (end > start).then(|| &raw[start..=end])
}

#[async_trait]
impl Summarizer for LanguageGateway {
    async fn summarize(
        &self,
        existing: &MemorySummary,
        transcript: &str,
    ) -> Result<String, CapabilityError> {
        let existing = existing.render();
        let user = prompts::render(
            prompts::SUMMARIZE_USER,
            &[
                ("summary", if existing.is_empty() { "(none)" } else { existing.as_str() }),
                ("transcript", transcript),
            ],
        );
        self.text(prompts::SUMMARIZE_SYSTEM, &user).await
    }
}
