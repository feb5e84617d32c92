//! 视觉识别适配器
//!
//! OpenAiVision 向 OpenAI 兼容的 chat/completions 端点发送 data URL 图片（Gemini 兼容端点为默认主节点），
//! 要求模型按 JSON 契约返回食材与置信度。错误统一映射为 ErrorKind。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::image::ImageData;
use super::language::extract_json;
use super::prompts;
use super::retry::{call_with_retry, RetryPolicy};
use crate::core::{CapabilityError, ErrorKind};

/// 单个识别结果
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Recognition {
    pub name: String,
    pub confidence: f32,
}

#[async_trait]
pub trait VisionAdapter: Send + Sync {
    async fn recognize(&self, image: &ImageData) -> Result<Vec<Recognition>, CapabilityError>;

    fn name(&self) -> &str {
        "vision"
    }
}

/// 模型未给置信度时使用的默认值
const DEFAULT_CONFIDENCE: f32 = 0.8;

pub struct OpenAiVision {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    label: String,
}

impl OpenAiVision {
    /// base_url 形如 `https://api.openai.com/v1`；api_key 为 None 时调用直接返回 ServiceUnavailable
    pub fn new(base_url: &str, model: &str, api_key: Option<String>, request_timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            model: model.to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            label: format!("vision:{model}"),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: Vec<ContentPart>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// 模型输出契约：对象列表，或兼容纯名字列表
#[derive(Deserialize)]
#[serde(untagged)]
enum VisionReply {
    Detailed { ingredients: Vec<DetectedItem> },
    Names { ingredients: Vec<String> },
    Bare(Vec<String>),
}

#[derive(Deserialize)]
struct DetectedItem {
    name: String,
    #[serde(default)]
    confidence: Option<f32>,
}

/// 解析视觉模型输出
pub fn parse_vision_reply(raw: &str) -> Result<Vec<Recognition>, CapabilityError> {
    let json = extract_json(raw).ok_or_else(|| CapabilityError::malformed("vision reply is not json"))?;
    let reply: VisionReply = serde_json::from_str(json)
        .map_err(|e| CapabilityError::malformed(format!("vision reply: {e}")))?;
    let items = match reply {
        VisionReply::Detailed { ingredients } => ingredients
            .into_iter()
            .map(|i| Recognition {
                name: i.name,
                confidence: i.confidence.unwrap_or(DEFAULT_CONFIDENCE).clamp(0.0, 1.0),
            })
            .collect(),
        VisionReply::Names { ingredients } | VisionReply::Bare(ingredients) => ingredients
            .into_iter()
            .map(|name| Recognition {
                name,
                confidence: DEFAULT_CONFIDENCE,
            })
            .collect(),
    };
    Ok(items)
}

fn map_status(status: reqwest::StatusCode, body: &str) -> CapabilityError {
    let kind = match status.as_u16() {
        429 | 402 => ErrorKind::QuotaExceeded,
        400 | 413 | 415 | 422 => ErrorKind::InvalidImage,
        408 | 504 => ErrorKind::Timeout,
        s if s >= 500 => ErrorKind::ServiceUnavailable,
        _ => ErrorKind::Unknown,
    };
    let snippet: String = body.chars().take(200).collect();
    CapabilityError::new(kind, format!("vision http {status}: {snippet}"))
}

fn map_reqwest(err: reqwest::Error) -> CapabilityError {
    if err.is_timeout() {
        CapabilityError::new(ErrorKind::Timeout, err.to_string())
    } else if err.is_connect() || err.is_request() {
        CapabilityError::unavailable(err.to_string())
    } else {
        CapabilityError::new(ErrorKind::Unknown, err.to_string())
    }
}

#[async_trait]
impl VisionAdapter for OpenAiVision {
    async fn recognize(&self, image: &ImageData) -> Result<Vec<Recognition>, CapabilityError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| CapabilityError::unavailable(format!("{}: no api key configured", self.label)))?;

        let body = ChatRequest {
            model: &self.model,
            temperature: 0.1,
            messages: vec![ChatMessage {
                role: "user",
                content: vec![
                    ContentPart::Text {
                        text: prompts::VISION_INGREDIENTS.to_string(),
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: image.to_data_url(),
                        },
                    },
                ],
            }],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(map_reqwest)?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(map_status(status, &text));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| CapabilityError::malformed(format!("vision response: {e}")))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| CapabilityError::malformed("vision response has no content"))?;

        let items = parse_vision_reply(&content)?;
        tracing::debug!(adapter = %self.label, detected = items.len(), "vision recognized");
        Ok(items)
    }

    fn name(&self) -> &str {
        &self.label
    }
}

/// 重试装饰器：单次超时 + 瞬时错误重试
pub struct RetryingVision {
    inner: Arc<dyn VisionAdapter>,
    policy: RetryPolicy,
}

impl RetryingVision {
    pub fn new(inner: Arc<dyn VisionAdapter>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl VisionAdapter for RetryingVision {
    async fn recognize(&self, image: &ImageData) -> Result<Vec<Recognition>, CapabilityError> {
        call_with_retry(self.inner.name(), &self.policy, || self.inner.recognize(image)).await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_detailed_reply() {
        let raw = "```json\n{\"ingredients\": [{\"name\": \"Tomato\", \"confidence\": 0.92}, {\"name\": \"basil\"}]}\n```";
        let items = parse_vision_reply(raw).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].name, "Tomato");
        assert!((items[1].confidence - DEFAULT_CONFIDENCE).abs() < f32::EPSILON);
    }

    #[test]
    fn test_parse_name_list_reply() {
        let items = parse_vision_reply(r#"{"ingredients": ["egg", "milk"]}"#).unwrap();
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn test_parse_garbage_is_malformed() {
        let err = parse_vision_reply("I see a kitchen").unwrap_err();
        assert_eq!(err.kind, ErrorKind::MalformedOutput);
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(map_status(reqwest::StatusCode::TOO_MANY_REQUESTS, "").kind, ErrorKind::QuotaExceeded);
        assert_eq!(map_status(reqwest::StatusCode::BAD_REQUEST, "").kind, ErrorKind::InvalidImage);
        assert_eq!(
            map_status(reqwest::StatusCode::SERVICE_UNAVAILABLE, "").kind,
            ErrorKind::ServiceUnavailable
        );
    }

    #[tokio::test]
    async fn test_missing_key_is_unavailable() {
        let vision = OpenAiVision::new("http://localhost:9", "m", None, Duration::from_secs(1));
        let img = ImageData::from_bytes(crate::capability::image::tests::tiny_png(), 1024).unwrap();
        let err = vision.recognize(&img).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::ServiceUnavailable);
    }
}
