//! 领域模型：食材、菜谱、对话轮次、会话

pub mod ingredient;
pub mod recipe;
pub mod session;
pub mod turn;

pub use ingredient::{canonical_name, Ingredient, IngredientSet, IngredientSource};
pub use recipe::{split_steps, Recipe, RecipeSource};
pub use session::{PendingClarification, Session, SessionId};
pub use turn::{ImageRef, InvocationOutcome, ToolInvocation, ToolStatus, Turn, TurnContent, TurnRole};
