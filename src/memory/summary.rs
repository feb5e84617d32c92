//! 记忆摘要：固定约束 + 追加式压缩笔记
//!
//! 约束（饮食限制等）一旦写入不会被隐式丢弃；笔记只追加，超出字数预算时显式淘汰最旧的笔记。

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MemorySummary {
    constraints: Vec<String>,
    notes: Vec<String>,
    /// 因字数预算被淘汰的笔记条数
    evicted: usize,
}

impl MemorySummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn constraints(&self) -> &[String] {
        &self.constraints
    }

    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    pub fn evicted(&self) -> usize {
        self.evicted
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty() && self.notes.is_empty()
    }

    /// 记录约束（小写去重）；新增返回 true
    pub fn add_constraint(&mut self, constraint: &str) -> bool {
        let c = constraint.trim().to_lowercase();
        if c.is_empty() || self.constraints.contains(&c) {
            return false;
        }
        self.constraints.push(c);
        true
    }

    /// 追加一条压缩笔记；超出 max_chars 时从最旧的笔记开始淘汰（至少保留最新一条）
    pub fn append_note(&mut self, note: &str, max_chars: usize) {
        let note = note.trim();
        if note.is_empty() {
            return;
        }
        self.notes.push(note.to_string());
        while self.notes_chars() > max_chars && self.notes.len() > 1 {
            self.notes.remove(0);
            self.evicted += 1;
        }
    }

    fn notes_chars(&self) -> usize {
        self.notes.iter().map(|n| n.chars().count()).sum()
    }

    /// 大小写不敏感的事实检索
    pub fn contains(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.constraints.iter().any(|c| c.contains(&needle))
            || self.notes.iter().any(|n| n.to_lowercase().contains(&needle))
    }

    /// 渲染为 prompt 片段；空摘要返回空字符串
    pub fn render(&self) -> String {
        let mut s = String::new();
        if !self.constraints.is_empty() {
            s.push_str(&format!("Dietary constraints: {}\n", self.constraints.join(", ")));
        }
        if !self.notes.is_empty() {
            s.push_str("Earlier conversation:\n");
            for n in &self.notes {
                s.push_str(&format!("- {}\n", n));
            }
        }
        s
    }

    pub(crate) fn clear(&mut self) {
        self.constraints.clear();
        self.notes.clear();
        self.evicted = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constraints_dedup() {
        let mut s = MemorySummary::new();
        assert!(s.add_constraint("Vegetarian"));
        assert!(!s.add_constraint("vegetarian "));
        assert_eq!(s.constraints(), &["vegetarian".to_string()]);
    }

    #[test]
    fn test_append_note_evicts_oldest_only() {
        let mut s = MemorySummary::new();
        s.add_constraint("vegan");
        s.append_note("aaaaaaaaaa", 25);
        s.append_note("bbbbbbbbbb", 25);
        s.append_note("cccccccccc", 25);
        assert_eq!(s.notes(), &["bbbbbbbbbb".to_string(), "cccccccccc".to_string()]);
        assert_eq!(s.evicted(), 1);
        // 约束不受淘汰影响
        assert!(s.contains("vegan"));
    }

    #[test]
    fn test_render_empty() {
        assert_eq!(MemorySummary::new().render(), "");
    }
}
