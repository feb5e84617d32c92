//! Mock LLM 客户端（用于测试与离线运行，无需 API）
//!
//! - MockLlmClient：回显最后一条 User 消息；分类等结构化契约会因此走确定性兜底
//! - ScriptedLlmClient：按 prompt 中的关键片段返回预设结果，并记录调用次数

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{LlmClient, LlmError, Message, Role};

/// Mock 客户端：回显用户最后一条消息
#[derive(Debug, Default)]
pub struct MockLlmClient;

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.lines().last().unwrap_or_default())
            .unwrap_or("(no input)");
        Ok(format!("(offline) {last_user}"))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

struct Rule {
    needle: String,
    responses: VecDeque<Result<String, LlmError>>,
}

/// 脚本化客户端：第一个 needle 命中的规则依次弹出响应，最后一条响应会重复使用
pub struct ScriptedLlmClient {
    rules: Mutex<Vec<Rule>>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl Default for ScriptedLlmClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedLlmClient {
    pub fn new() -> Self {
        Self {
            rules: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// prompt（所有消息拼接）包含 needle 时返回 response
    pub fn on(self, needle: &str, response: Result<&str, LlmError>) -> Self {
        if let Ok(mut rules) = self.rules.lock() {
            let response = response.map(String::from);
            match rules.iter_mut().find(|r| r.needle == needle) {
                Some(rule) => rule.responses.push_back(response),
                None => rules.push(Rule {
                    needle: needle.to_string(),
                    responses: VecDeque::from([response]),
                }),
            }
        }
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// 包含 needle 的调用次数
    pub fn calls_matching(&self, needle: &str) -> usize {
        self.prompts
            .lock()
            .map(|p| p.iter().filter(|p| p.contains(needle)).count())
            .unwrap_or(0)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let prompt = messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.clone());
        }
        let mut rules = self
            .rules
            .lock()
            .map_err(|_| LlmError::ApiError("script poisoned".to_string()))?;
        let rule = rules
            .iter_mut()
            .find(|r| prompt.contains(&r.needle))
            .ok_or_else(|| LlmError::Unavailable("no scripted response".to_string()))?;
        let next = if rule.responses.len() > 1 {
            rule.responses.pop_front()
        } else {
            rule.responses.front().cloned()
        };
        next.unwrap_or_else(|| Err(LlmError::Unavailable("script exhausted".to_string())))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
