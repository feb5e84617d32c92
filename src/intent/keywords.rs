//! 关键词兜底分类器
//!
//! 模型不可用或输出不合约时使用：按意图累计短语命中分（强短语 2 分，单词 1 分，按词边界匹配）。
//! 有图片 → ingredient_recognition；前两名同分 → clarification；无任何命中 → cooking_question。

use super::Intent;

struct KeywordTable {
    intent: Intent,
    strong: &'static [&'static str],
    words: &'static [&'static str],
}

const TABLES: &[KeywordTable] = &[
    KeywordTable {
        intent: Intent::IngredientRecognition,
        strong: &[
            "what is in this photo",
            "identify ingredients",
            "identify the ingredients",
            "what ingredients do i have",
            "this photo",
            "this picture",
        ],
        words: &["photo", "picture", "image", "identify", "recognize", "recognise"],
    },
    KeywordTable {
        intent: Intent::RecipeSearch,
        strong: &[
            "what can i make",
            "what can i cook",
            "what should i cook",
            "recipe for",
            "recipes with",
            "recipes for",
            "find me",
            "something to cook",
        ],
        words: &[
            "recipe", "recipes", "cook", "make", "dish", "meal", "dinner", "lunch", "breakfast",
            "ingredients",
        ],
    },
    KeywordTable {
        intent: Intent::CookingQuestion,
        strong: &[
            "how do i",
            "how long",
            "how to",
            "what is",
            "what does",
            "substitute for",
            "instead of",
        ],
        words: &[
            "how", "what", "why", "technique", "substitute", "mean", "temperature", "blanch",
            "simmer", "knead",
        ],
    },
    KeywordTable {
        intent: Intent::ShoppingList,
        strong: &[
            "shopping list",
            "grocery list",
            "what do i need to buy",
            "what should i buy",
            "what am i missing",
        ],
        words: &["shopping", "groceries", "grocery", "buy", "missing"],
    },
];

/// 确定性关键词匹配器（无状态）
#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordMatcher;

impl KeywordMatcher {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, text: &str, has_image: bool) -> Intent {
        if has_image {
            return Intent::IngredientRecognition;
        }
        let mut scored = self.scores(text);
        scored.sort_by(|a, b| b.1.cmp(&a.1));
        match scored.as_slice() {
            [(_, 0), ..] | [] => Intent::CookingQuestion,
            [(_, top), (_, second), ..] if top == second => Intent::Clarification,
            [(intent, _), ..] => *intent,
        }
    }

    /// 每个可由关键词命中的意图的得分（保持表顺序）
    pub fn scores(&self, text: &str) -> Vec<(Intent, u32)> {
        let haystack = normalize(text);
        TABLES
            .iter()
            .map(|t| {
                let strong = t.strong.iter().filter(|p| hit(&haystack, p)).count() as u32;
                let words = t.words.iter().filter(|w| hit(&haystack, w)).count() as u32;
                (t.intent, strong * 2 + words)
            })
            .collect()
    }
}

/// 小写、非字母数字替换为空格、两端补空格，便于按词边界匹配
fn normalize(text: &str) -> String {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '\'' { c } else { ' ' })
        .collect();
    format!(" {} ", cleaned.split_whitespace().collect::<Vec<_>>().join(" "))
}

fn hit(haystack: &str, phrase: &str) -> bool {
    haystack.contains(&format!(" {phrase} "))
}
