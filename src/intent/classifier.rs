//! 意图分类器：快速规则 → 语言模型（OneOf 契约）→ 关键词兜底
//!
//! 签名不可失败：模型超时、配额耗尽或输出不合约时一律退到 KeywordMatcher，结果永远在 Intent 枚举之内。

use super::{Intent, KeywordMatcher};
use crate::capability::{prompts, LanguageGateway};
use crate::memory::MemorySummary;

/// 分类输入：文本（可空）+ 是否附带图片
#[derive(Clone, Debug, Default)]
pub struct ClassifierInput<'a> {
    pub text: Option<&'a str>,
    pub has_image: bool,
}

impl<'a> ClassifierInput<'a> {
    pub fn new(text: Option<&'a str>, has_image: bool) -> Self {
        Self {
            text: text.filter(|t| !t.trim().is_empty()),
            has_image,
        }
    }
}

pub struct IntentClassifier {
    gateway: LanguageGateway,
    keywords: KeywordMatcher,
}

impl IntentClassifier {
    pub fn new(gateway: LanguageGateway) -> Self {
        Self {
            gateway,
            keywords: KeywordMatcher::new(),
        }
    }

    /// 无需模型即可确定的情况
    pub fn fast_match(&self, input: &ClassifierInput<'_>) -> Option<Intent> {
        match (input.text, input.has_image) {
            (None, true) => Some(Intent::IngredientRecognition),
            (None, false) => Some(Intent::Clarification),
            _ => None,
        }
    }

    pub async fn classify(&self, input: &ClassifierInput<'_>, summary: &MemorySummary) -> Intent {
        if let Some(intent) = self.fast_match(input) {
            return intent;
        }
        let text = input.text.unwrap_or_default();
        match self.llm_classify(text, input.has_image, summary).await {
            Ok(intent) => intent,
            Err(e) => {
                let intent = self.keywords.classify(text, input.has_image);
                tracing::warn!(kind = %e.kind, fallback = %intent, "intent model unavailable, using keywords");
                intent
            }
        }
    }

    async fn llm_classify(
        &self,
        text: &str,
        has_image: bool,
        summary: &MemorySummary,
    ) -> Result<Intent, crate::core::CapabilityError> {
        let memory = summary.render();
        let user = prompts::render(
            prompts::CLASSIFY_USER,
            &[
                ("memory", memory.as_str()),
                ("has_image", if has_image { "yes" } else { "no" }),
                ("text", text),
            ],
        );
        let choices: Vec<&str> = Intent::ALL.iter().map(|i| i.as_str()).collect();
        let answer = self
            .gateway
            .one_of(prompts::CLASSIFY_SYSTEM, &user, &choices)
            .await?;
        answer
            .parse::<Intent>()
            .map_err(crate::core::CapabilityError::malformed)
    }
}
