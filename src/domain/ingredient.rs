//! 食材值类型与去重集合
//!
//! 规范名：去首尾空白、小写、合并空白、别名映射、单数化；IngredientSet 按规范名（大小写不敏感）去重并保持插入顺序。

use serde::{Deserialize, Serialize};

/// 食材来源
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngredientSource {
    Image,
    Text,
    Inferred,
}

/// 单个食材：规范名 + 可选数量 / 单位
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    pub source: IngredientSource,
}

/// 常见别名（左侧为规范化前的小写形式）
const ALIASES: &[(&str, &str)] = &[
    ("peppers", "bell pepper"),
    ("bell peppers", "bell pepper"),
    ("sweet pepper", "bell pepper"),
    ("sweet peppers", "bell pepper"),
    ("capsicum", "bell pepper"),
    ("capsicums", "bell pepper"),
    ("red pepper", "bell pepper"),
    ("green pepper", "bell pepper"),
    ("scallion", "green onion"),
    ("scallions", "green onion"),
    ("spring onion", "green onion"),
    ("spring onions", "green onion"),
    ("aubergine", "eggplant"),
    ("aubergines", "eggplant"),
    ("courgette", "zucchini"),
    ("courgettes", "zucchini"),
    ("coriander leaves", "cilantro"),
    ("garbanzo beans", "chickpea"),
    ("chicken breasts", "chicken breast"),
];

/// 以 s 结尾但不应单数化的词
const PLURAL_EXCEPTIONS: &[&str] = &[
    "asparagus",
    "hummus",
    "couscous",
    "molasses",
    "grits",
    "swiss",
    "brussels",
    "oats",
    "chives",
    "greens",
    "noodles",
];

/// 常见计量单位（含复数与缩写）
const UNITS: &[&str] = &[
    "cup", "cups", "tbsp", "tablespoon", "tablespoons", "tsp", "teaspoon", "teaspoons", "g",
    "gram", "grams", "kg", "ml", "l", "liter", "liters", "litre", "litres", "oz", "ounce",
    "ounces", "lb", "lbs", "pound", "pounds", "clove", "cloves", "pinch", "can", "cans", "slice",
    "slices", "bunch", "handful", "piece", "pieces", "stick", "sticks", "sprig", "sprigs",
];

fn singularize(word: &str) -> String {
    if PLURAL_EXCEPTIONS.contains(&word) || word.len() <= 3 {
        return word.to_string();
    }
    if let Some(stem) = word.strip_suffix("ies") {
        return format!("{stem}y");
    }
    if let Some(stem) = word.strip_suffix("oes") {
        return format!("{stem}o");
    }
    // peaches / radishes / boxes / glasses：去掉 es
    if ["ches", "shes", "xes", "zes", "sses"].iter().any(|s| word.ends_with(s)) {
        return word[..word.len() - 2].to_string();
    }
    if word.ends_with("ss") || word.ends_with("us") || word.ends_with("is") {
        return word.to_string();
    }
    word.strip_suffix('s').unwrap_or(word).to_string()
}

/// 规范化食材名：小写、合并空白、别名、末词单数化
pub fn canonical_name(raw: &str) -> String {
    let lowered = raw
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    let trimmed = lowered.trim_matches(|c: char| !c.is_alphanumeric() && c != ')');
    if let Some((_, canonical)) = ALIASES.iter().find(|(alias, _)| *alias == trimmed) {
        return canonical.to_string();
    }
    if PLURAL_EXCEPTIONS.contains(&trimmed) {
        return trimmed.to_string();
    }
    match trimmed.rsplit_once(' ') {
        Some((head, last)) => format!("{head} {}", singularize(last)),
        None => singularize(trimmed),
    }
}

fn is_quantity_token(token: &str) -> bool {
    !token.is_empty()
        && token.chars().all(|c| {
            c.is_ascii_digit() || matches!(c, '/' | '.' | '-' | '½' | '¼' | '¾' | '⅓' | '⅔')
        })
}

impl Ingredient {
    pub fn new(name: &str, source: IngredientSource) -> Self {
        Self {
            name: canonical_name(name),
            quantity: None,
            unit: None,
            source,
        }
    }

    /// 解析菜谱中的一行食材，如 "2 cloves garlic, minced" → 2 / clove / garlic
    pub fn parse_line(line: &str, source: IngredientSource) -> Self {
        let main = line.split(',').next().unwrap_or(line).trim();
        let mut tokens: Vec<&str> = main.split_whitespace().collect();

        let mut quantity_parts = Vec::new();
        while let Some(first) = tokens.first() {
            if is_quantity_token(first) {
                quantity_parts.push(*first);
                tokens.remove(0);
            } else {
                break;
            }
        }

        let mut unit = None;
        if !quantity_parts.is_empty() {
            if let Some(first) = tokens.first() {
                let lowered = first.trim_end_matches('.').to_lowercase();
                if UNITS.contains(&lowered.as_str()) && tokens.len() > 1 {
                    unit = Some(singularize(&lowered));
                    tokens.remove(0);
                    if tokens.first().map(|t| t.eq_ignore_ascii_case("of")).unwrap_or(false) {
                        tokens.remove(0);
                    }
                }
            }
        }

        let name = if tokens.is_empty() {
            main.to_string()
        } else {
            tokens.join(" ")
        };

        Self {
            name: canonical_name(&name),
            quantity: (!quantity_parts.is_empty()).then(|| quantity_parts.join(" ")),
            unit,
            source,
        }
    }

    /// 去重键（规范名已是小写）
    pub fn key(&self) -> &str {
        &self.name
    }

    /// 展示用："2 clove garlic"
    pub fn display_line(&self) -> String {
        match (&self.quantity, &self.unit) {
            (Some(q), Some(u)) => format!("{q} {u} {}", self.name),
            (Some(q), None) => format!("{q} {}", self.name),
            _ => self.name.clone(),
        }
    }
}

/// 按规范名去重的有序食材集合
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct IngredientSet {
    items: Vec<Ingredient>,
}

impl IngredientSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入；已存在同名食材时返回 false
    pub fn insert(&mut self, ingredient: Ingredient) -> bool {
        if ingredient.name.is_empty() || self.contains(&ingredient.name) {
            return false;
        }
        self.items.push(ingredient);
        true
    }

    pub fn extend(&mut self, ingredients: impl IntoIterator<Item = Ingredient>) -> usize {
        ingredients
            .into_iter()
            .filter(|i| self.insert(i.clone()))
            .count()
    }

    /// 大小写不敏感（参数会先规范化）
    pub fn contains(&self, name: &str) -> bool {
        let key = canonical_name(name);
        self.items.iter().any(|i| i.key() == key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Ingredient> {
        self.items.iter()
    }

    pub fn names(&self) -> Vec<String> {
        self.items.iter().map(|i| i.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn into_vec(self) -> Vec<Ingredient> {
        self.items
    }
}

impl FromIterator<Ingredient> for IngredientSet {
    fn from_iter<T: IntoIterator<Item = Ingredient>>(iter: T) -> Self {
        let mut set = IngredientSet::new();
        set.extend(iter);
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_name_plurals_and_case() {
        assert_eq!(canonical_name("  Onions "), "onion");
        assert_eq!(canonical_name("TOMATOES"), "tomato");
        assert_eq!(canonical_name("berries"), "berry");
        assert_eq!(canonical_name("Asparagus"), "asparagus");
        assert_eq!(canonical_name("olive   oil"), "olive oil");
        assert_eq!(canonical_name("egg"), "egg");
        assert_eq!(canonical_name("Peaches"), "peach");
        assert_eq!(canonical_name("radishes"), "radish");
        assert_eq!(canonical_name("squashes"), "squash");
        assert_eq!(canonical_name("boxes"), "box");
        assert_eq!(canonical_name("cheeses"), "cheese");
        assert_eq!(canonical_name("peach"), "peach");
    }

    #[test]
    fn test_canonical_name_aliases() {
        assert_eq!(canonical_name("Peppers"), "bell pepper");
        assert_eq!(canonical_name("capsicum"), "bell pepper");
        assert_eq!(canonical_name("Scallions"), "green onion");
    }

    #[test]
    fn test_parse_line_quantity_unit_name() {
        let i = Ingredient::parse_line("2 cloves garlic, minced", IngredientSource::Inferred);
        assert_eq!(i.name, "garlic");
        assert_eq!(i.quantity.as_deref(), Some("2"));
        assert_eq!(i.unit.as_deref(), Some("clove"));

        let i = Ingredient::parse_line("1 1/2 cups of flour", IngredientSource::Inferred);
        assert_eq!(i.name, "flour");
        assert_eq!(i.quantity.as_deref(), Some("1 1/2"));
        assert_eq!(i.unit.as_deref(), Some("cup"));

        let i = Ingredient::parse_line("3 eggs", IngredientSource::Inferred);
        assert_eq!(i.name, "egg");
        assert_eq!(i.unit, None);

        let i = Ingredient::parse_line("Parmesan cheese", IngredientSource::Text);
        assert_eq!(i.name, "parmesan cheese");
        assert_eq!(i.quantity, None);
    }

    #[test]
    fn test_ingredient_set_dedup_case_insensitive() {
        let mut set = IngredientSet::new();
        assert!(set.insert(Ingredient::new("Onion", IngredientSource::Image)));
        assert!(!set.insert(Ingredient::new("onions", IngredientSource::Text)));
        assert!(set.insert(Ingredient::new("Chicken", IngredientSource::Image)));
        assert_eq!(set.len(), 2);
        assert!(set.contains("ONION"));
        assert_eq!(set.names(), vec!["onion".to_string(), "chicken".to_string()]);
    }
}
