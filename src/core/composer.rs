//! 响应组装：统一的 ResponseEnvelope
//!
//! degraded 原样保留；failed 只携带与意图相关的通用致歉（错误细节只进日志）；
//! 前置条件失败的消息固定为 "no active recipe"。可选润色只改写 message。

use serde::Serialize;

use crate::capability::{prompts, LanguageGateway};
use crate::core::ErrorKind;
use crate::domain::{Ingredient, Recipe, RecipeSource, ToolStatus};
use crate::intent::Intent;
use crate::tools::{ToolOutput, ToolResult};

pub const NO_ACTIVE_RECIPE: &str = "no active recipe";

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    Ingredients { ingredients: Vec<Ingredient> },
    /// 识别食材后顺带给出的菜谱建议
    IngredientsWithRecipes { ingredients: Vec<Ingredient>, recipes: Vec<Recipe> },
    Recipes { recipes: Vec<Recipe> },
    Answer { answer: String },
    Question { question: String },
    ShoppingList { recipe: String, items: Vec<Ingredient>, total_items: usize },
    Empty {},
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ResponseEnvelope {
    pub status: ToolStatus,
    pub intent: Intent,
    pub payload: Payload,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ResponseEnvelope {
    pub fn is_failed(&self) -> bool {
        self.status == ToolStatus::Failed
    }
}

fn apology(intent: Intent, kind: Option<ErrorKind>) -> String {
    match (intent, kind) {
        (_, Some(ErrorKind::PreconditionFailed)) => NO_ACTIVE_RECIPE.to_string(),
        (Intent::IngredientRecognition, Some(ErrorKind::InvalidImage)) => {
            "Sorry, that file doesn't look like a photo I can read. Please send a JPEG, PNG, WebP or GIF image within the upload size limit.".to_string()
        }
        (Intent::IngredientRecognition, _) => {
            "Sorry, I couldn't identify any ingredients in that photo. Could you try a clearer picture?".to_string()
        }
        (Intent::RecipeSearch, _) => {
            "Sorry, I couldn't find recipes right now. Please try again in a moment.".to_string()
        }
        (Intent::CookingQuestion, _) => {
            "Sorry, I can't answer that right now. Please try again shortly.".to_string()
        }
        (Intent::ShoppingList, _) => "Sorry, I couldn't build the shopping list.".to_string(),
        (Intent::Clarification | Intent::Unknown, _) => {
            "Sorry, I didn't quite catch that. Could you rephrase your request?".to_string()
        }
    }
}

fn recipes_message(recipes: &[Recipe], status: ToolStatus) -> String {
    let Some(first) = recipes.first() else {
        return "I couldn't find any recipes for that.".to_string();
    };
    let generated = recipes.iter().all(|r| r.source == Some(RecipeSource::Generated));
    let count = match recipes.len() {
        1 => "1 recipe".to_string(),
        n => format!("{n} recipes"),
    };
    if status == ToolStatus::Degraded && generated {
        format!("The recipe database didn't have anything, so I came up with {count}. Top pick: {}.", first.title)
    } else {
        format!("I found {count}. Top pick: {}.", first.title)
    }
}

pub struct ResponseComposer {
    fluency: Option<LanguageGateway>,
}

impl ResponseComposer {
    pub fn new(fluency: Option<LanguageGateway>) -> Self {
        Self { fluency }
    }

    pub fn compose(&self, intent: Intent, result: &ToolResult) -> ResponseEnvelope {
        if result.status == ToolStatus::Failed {
            return self.failed(intent, result.error);
        }
        let (payload, message) = match &result.output {
            ToolOutput::Ingredients(items) => {
                let names: Vec<&str> = items.iter().map(|i| i.name.as_str()).collect();
                (
                    Payload::Ingredients {
                        ingredients: items.clone(),
                    },
                    format!("I can see: {}. Want some recipe ideas?", names.join(", ")),
                )
            }
            ToolOutput::Recipes(recipes) => (
                Payload::Recipes {
                    recipes: recipes.clone(),
                },
                recipes_message(recipes, result.status),
            ),
            ToolOutput::Answer(answer) => (
                Payload::Answer {
                    answer: answer.clone(),
                },
                answer.clone(),
            ),
            ToolOutput::Question(question) => (
                Payload::Question {
                    question: question.clone(),
                },
                question.clone(),
            ),
            ToolOutput::ShoppingList { recipe, items } => {
                let message = match items.len() {
                    0 => format!("You already have everything for {recipe}."),
                    1 => format!("You need 1 more item for {recipe}."),
                    n => format!("You need {n} more items for {recipe}."),
                };
                (
                    Payload::ShoppingList {
                        recipe: recipe.clone(),
                        items: items.clone(),
                        total_items: items.len(),
                    },
                    message,
                )
            }
            ToolOutput::Nothing => (Payload::Empty {}, String::new()),
        };
        ResponseEnvelope {
            status: result.status,
            intent,
            payload,
            message: (!message.is_empty()).then_some(message),
        }
    }

    /// 把菜谱建议并入食材识别的信封；非食材信封或空建议原样返回
    pub fn with_suggestions(&self, mut envelope: ResponseEnvelope, recipes: &[Recipe]) -> ResponseEnvelope {
        let Some(first) = recipes.first() else {
            return envelope;
        };
        if let Payload::Ingredients { ingredients } = &envelope.payload {
            let names: Vec<&str> = ingredients.iter().map(|i| i.name.as_str()).collect();
            envelope.message = Some(format!(
                "I can see: {}. You could make {} ({} idea{} in total).",
                names.join(", "),
                first.title,
                recipes.len(),
                if recipes.len() == 1 { "" } else { "s" }
            ));
            envelope.payload = Payload::IngredientsWithRecipes {
                ingredients: ingredients.clone(),
                recipes: recipes.to_vec(),
            };
        }
        envelope
    }

    pub fn failed(&self, intent: Intent, kind: Option<ErrorKind>) -> ResponseEnvelope {
        ResponseEnvelope {
            status: ToolStatus::Failed,
            intent,
            payload: Payload::Empty {},
            message: Some(apology(intent, kind)),
        }
    }

    /// 边界校验失败（如菜谱序号越界），消息由调用方给出，不含内部细节
    pub fn rejected(&self, intent: Intent, message: impl Into<String>) -> ResponseEnvelope {
        ResponseEnvelope {
            status: ToolStatus::Failed,
            intent,
            payload: Payload::Empty {},
            message: Some(message.into()),
        }
    }

    pub fn precondition_failed(&self, intent: Intent) -> ResponseEnvelope {
        self.failed(intent, Some(ErrorKind::PreconditionFailed))
    }

    /// 可选润色：只改写 message；失败时保留原文。failed 信封不润色
    pub async fn polish(&self, mut envelope: ResponseEnvelope) -> ResponseEnvelope {
        let (Some(gateway), Some(message)) = (&self.fluency, envelope.message.as_ref()) else {
            return envelope;
        };
        if envelope.is_failed() {
            return envelope;
        }
        match gateway.text(prompts::POLISH_SYSTEM, message).await {
            Ok(polished) => envelope.message = Some(polished),
            Err(e) => tracing::debug!(kind = %e.kind, "fluency pass failed, keeping original message"),
        }
        envelope
    }
}
