//! 会话：记忆、当前菜谱、已知食材
//!
//! 只由持有该会话锁的 Orchestrator 修改；Tool 只读访问。可序列化，供持久化层保存 / 恢复。

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Ingredient, IngredientSet, Recipe};
use crate::intent::Intent;
use crate::memory::{AttemptLedger, MemoryLimits, MemoryStore};

/// 会话 ID（由传输层提供或首次请求时生成）
pub type SessionId = String;

/// 上一轮因「需要更多输入」而挂起的意图及其原始文本
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PendingClarification {
    pub intent: Intent,
    pub text: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Session {
    id: SessionId,
    memory: MemoryStore,
    current_recipe: Option<Arc<Recipe>>,
    known_ingredients: IngredientSet,
    last_recipes: Vec<Recipe>,
    ledger: AttemptLedger,
    clarification_streak: u8,
    pending: Option<PendingClarification>,
    created_at: DateTime<Utc>,
    last_active: DateTime<Utc>,
}

impl Session {
    pub fn new(id: impl Into<SessionId>, limits: MemoryLimits) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            memory: MemoryStore::new(limits),
            current_recipe: None,
            known_ingredients: IngredientSet::new(),
            last_recipes: Vec::new(),
            ledger: AttemptLedger::new(),
            clarification_streak: 0,
            pending: None,
            created_at: now,
            last_active: now,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn memory(&self) -> &MemoryStore {
        &self.memory
    }

    pub(crate) fn memory_mut(&mut self) -> &mut MemoryStore {
        &mut self.memory
    }

    pub fn current_recipe(&self) -> Option<&Arc<Recipe>> {
        self.current_recipe.as_ref()
    }

    /// 整体替换当前菜谱（菜谱本身不可变）
    pub(crate) fn set_current_recipe(&mut self, recipe: Recipe) {
        self.current_recipe = Some(Arc::new(recipe));
    }

    pub fn known_ingredients(&self) -> &IngredientSet {
        &self.known_ingredients
    }

    pub(crate) fn add_known_ingredients(&mut self, ingredients: impl IntoIterator<Item = Ingredient>) -> usize {
        self.known_ingredients.extend(ingredients)
    }

    pub fn last_recipes(&self) -> &[Recipe] {
        &self.last_recipes
    }

    pub(crate) fn set_last_recipes(&mut self, recipes: Vec<Recipe>) {
        self.last_recipes = recipes;
    }

    pub fn ledger(&self) -> &AttemptLedger {
        &self.ledger
    }

    pub(crate) fn ledger_mut(&mut self) -> &mut AttemptLedger {
        &mut self.ledger
    }

    pub fn clarification_streak(&self) -> u8 {
        self.clarification_streak
    }

    pub(crate) fn bump_clarification(&mut self, pending: PendingClarification) {
        self.clarification_streak = self.clarification_streak.saturating_add(1);
        self.pending = Some(pending);
    }

    pub(crate) fn settle_clarification(&mut self) {
        self.clarification_streak = 0;
        self.pending = None;
    }

    pub fn pending(&self) -> Option<&PendingClarification> {
        self.pending.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_active(&self) -> DateTime<Utc> {
        self.last_active
    }

    pub(crate) fn touch(&mut self) {
        self.last_active = Utc::now();
    }

    pub fn is_expired(&self, idle_timeout: Duration) -> bool {
        let idle = Utc::now().signed_duration_since(self.last_active);
        idle.to_std().map(|d| d > idle_timeout).unwrap_or(false)
    }

    /// 显式结束会话：清空记忆、菜谱、食材与尝试记录
    pub(crate) fn reset(&mut self) {
        self.memory.clear();
        self.current_recipe = None;
        self.known_ingredients.clear();
        self.last_recipes.clear();
        self.ledger.clear();
        self.settle_clarification();
        self.touch();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::IngredientSource;

    #[test]
    fn test_new_session_is_empty() {
        let s = Session::new("s1", MemoryLimits::default());
        assert_eq!(s.id(), "s1");
        assert!(s.current_recipe().is_none());
        assert!(s.known_ingredients().is_empty());
        assert_eq!(s.clarification_streak(), 0);
    }

    #[test]
    fn test_current_recipe_replaced_wholesale() {
        let mut s = Session::new("s1", MemoryLimits::default());
        s.set_current_recipe(Recipe::new("A", vec![], vec![]));
        let first = s.current_recipe().cloned();
        s.set_current_recipe(Recipe::new("B", vec![], vec![]));
        assert_eq!(first.map(|r| r.title.clone()).as_deref(), Some("A"));
        assert_eq!(s.current_recipe().map(|r| r.title.as_str()), Some("B"));
    }

    #[test]
    fn test_reset_clears_state() {
        let mut s = Session::new("s1", MemoryLimits::default());
        s.add_known_ingredients(vec![Ingredient::new("egg", IngredientSource::Text)]);
        s.set_current_recipe(Recipe::new("A", vec![], vec![]));
        s.bump_clarification(PendingClarification {
            intent: Intent::RecipeSearch,
            text: "x".into(),
        });
        s.reset();
        assert!(s.known_ingredients().is_empty());
        assert!(s.current_recipe().is_none());
        assert!(s.pending().is_none());
        assert_eq!(s.clarification_streak(), 0);
    }

    #[test]
    fn test_session_serde_roundtrip() {
        let mut s = Session::new("s1", MemoryLimits::default());
        s.set_current_recipe(Recipe::new("A", vec![], vec!["boil".into()]));
        let json = serde_json::to_string(&s).unwrap();
        let back: Session = serde_json::from_str(&json).unwrap();
        assert_eq!(back.current_recipe().map(|r| r.title.as_str()), Some("A"));
    }
}
