//! 会话记忆：原始轮次 + 摘要
//!
//! 原始轮次超出阈值（轮数或估算 token 数）时，最旧的轮次交给 Summarizer 压缩为一条新笔记追加进摘要，
//! 然后从原始历史中移除。压缩失败时退化为确定性的逐行摘录，压缩本身永不失败。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::MemorySummary;
use crate::core::CapabilityError;
use crate::domain::Turn;

/// 每行摘录最大字符数（确定性压缩）
const CONDENSE_LINE_CHARS: usize = 120;

/// 压缩器：把最旧的对话片段压缩为一条笔记（只产生新增内容，不改写已有摘要）
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(
        &self,
        existing: &MemorySummary,
        transcript: &str,
    ) -> Result<String, CapabilityError>;
}

/// 不调用模型的确定性压缩器
#[derive(Debug, Default, Clone)]
pub struct CondensingSummarizer;

#[async_trait]
impl Summarizer for CondensingSummarizer {
    async fn summarize(
        &self,
        _existing: &MemorySummary,
        transcript: &str,
    ) -> Result<String, CapabilityError> {
        Ok(condense(transcript.lines()))
    }
}

fn condense<'a>(lines: impl Iterator<Item = &'a str>) -> String {
    lines
        .map(|l| {
            let l = l.trim();
            if l.chars().count() > CONDENSE_LINE_CHARS {
                format!("{}...", l.chars().take(CONDENSE_LINE_CHARS).collect::<String>())
            } else {
                l.to_string()
            }
        })
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("; ")
}

/// 记忆容量限制（由 config [memory] 映射而来）
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MemoryLimits {
    pub max_raw_turns: usize,
    pub keep_recent_turns: usize,
    pub max_raw_tokens: usize,
    pub max_summary_chars: usize,
}

impl Default for MemoryLimits {
    fn default() -> Self {
        Self {
            max_raw_turns: 12,
            keep_recent_turns: 6,
            max_raw_tokens: 3000,
            max_summary_chars: 4000,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MemoryStore {
    turns: Vec<Turn>,
    summary: MemorySummary,
    limits: MemoryLimits,
    compactions: u32,
}

impl MemoryStore {
    pub fn new(limits: MemoryLimits) -> Self {
        Self {
            turns: Vec::new(),
            summary: MemorySummary::new(),
            limits,
            compactions: 0,
        }
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn summary(&self) -> &MemorySummary {
        &self.summary
    }

    pub(crate) fn summary_mut(&mut self) -> &mut MemorySummary {
        &mut self.summary
    }

    pub fn compactions(&self) -> u32 {
        self.compactions
    }

    /// 粗略 token 估算：字符数 / 4
    pub fn estimate_tokens(&self) -> usize {
        self.turns
            .iter()
            .map(|t| t.content.render().chars().count())
            .sum::<usize>()
            / 4
    }

    pub fn needs_compaction(&self) -> bool {
        self.turns.len() > self.limits.keep_recent_turns
            && (self.turns.len() > self.limits.max_raw_turns
                || self.estimate_tokens() > self.limits.max_raw_tokens)
    }

    /// 追加轮次；超出阈值时压缩
    pub async fn append(&mut self, turn: Turn, summarizer: &dyn Summarizer) {
        self.turns.push(turn);
        if self.needs_compaction() {
            self.compact(summarizer).await;
        }
    }

    /// 将超出 keep_recent_turns 的最旧轮次压缩进摘要
    pub async fn compact(&mut self, summarizer: &dyn Summarizer) {
        let keep = self.limits.keep_recent_turns.min(self.turns.len());
        let split = self.turns.len() - keep;
        if split == 0 {
            return;
        }
        let oldest: Vec<Turn> = self.turns.drain(..split).collect();
        let transcript = oldest
            .iter()
            .map(Turn::transcript_line)
            .collect::<Vec<_>>()
            .join("\n");

        let note = match summarizer.summarize(&self.summary, &transcript).await {
            Ok(note) if !note.trim().is_empty() => note,
            Ok(_) => condense(transcript.lines()),
            Err(e) => {
                tracing::warn!(error = %e, "memory summarization failed, condensing locally");
                condense(transcript.lines())
            }
        };
        self.summary.append_note(&note, self.limits.max_summary_chars);
        self.compactions += 1;
        tracing::debug!(
            dropped = split,
            compactions = self.compactions,
            "memory compacted"
        );
    }

    /// 供 prompt 使用：摘要 + 最近 recent 轮原文
    pub fn context_block(&self, recent: usize) -> String {
        let mut s = self.summary.render();
        let start = self.turns.len().saturating_sub(recent);
        let lines: Vec<String> = self.turns[start..]
            .iter()
            .map(Turn::transcript_line)
            .collect();
        if !lines.is_empty() {
            s.push_str("Recent turns:\n");
            s.push_str(&lines.join("\n"));
            s.push('\n');
        }
        s
    }

    /// 清空原始历史与摘要（仅在显式结束会话时调用）
    pub fn clear(&mut self) {
        self.turns.clear();
        self.summary.clear();
        self.compactions = 0;
    }
}
