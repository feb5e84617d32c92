//! 从用户输入中抽取可长期保留的事实：饮食限制、已有食材
//!
//! 饮食限制需要带第一人称线索（"I'm vegetarian"、"we are vegan"、"allergic to nuts"），
//! 避免把「vegan 是什么意思？」这类提问误记为偏好。

use std::sync::OnceLock;

use regex::Regex;

/// (关键词, 规范约束名)
const DIETARY_TERMS: &[(&str, &str)] = &[
    ("vegetarian", "vegetarian"),
    ("vegan", "vegan"),
    ("pescatarian", "pescatarian"),
    ("gluten-free", "gluten-free"),
    ("gluten free", "gluten-free"),
    ("celiac", "gluten-free"),
    ("coeliac", "gluten-free"),
    ("dairy-free", "dairy-free"),
    ("dairy free", "dairy-free"),
    ("lactose", "dairy-free"),
    ("nut allergy", "nut-free"),
    ("allergic to nuts", "nut-free"),
    ("peanut allergy", "nut-free"),
    ("nut-free", "nut-free"),
    ("keto", "ketogenic"),
    ("low-carb", "low-carb"),
    ("low carb", "low-carb"),
    ("paleo", "paleo"),
    ("halal", "halal"),
    ("kosher", "kosher"),
];

static FIRST_PERSON_RE: OnceLock<Regex> = OnceLock::new();
static STATED_RE: OnceLock<Regex> = OnceLock::new();
static STOP_RE: OnceLock<Regex> = OnceLock::new();

fn first_person_cue() -> &'static Regex {
    FIRST_PERSON_RE.get_or_init(|| {
        Regex::new(r"(?i)\b(i'?m|i am|i eat|i follow|i need|we'?re|we are|we eat|my|allergic|for me|for us|keep it|make it)\b").unwrap()
    })
}

fn stated_ingredients_pattern() -> &'static Regex {
    STATED_RE.get_or_init(|| {
        Regex::new(r"(?i)\b(?:i|we)\s+(?:have|have got|got|bought)\s+(?:some\s+)?([^.?!;]+)").unwrap()
    })
}

/// 食材列表之后的尾巴："... in the fridge, what can I make"
fn list_tail_pattern() -> &'static Regex {
    STOP_RE.get_or_init(|| {
        Regex::new(r"(?i)in (?:the|my) fridge|at home|\s(?:left|what|how)\b").unwrap()
    })
}

/// 抽取饮食限制（规范名，去重，保持出现顺序）
pub fn dietary_constraints(text: &str) -> Vec<String> {
    if !first_person_cue().is_match(text) {
        return Vec::new();
    }
    let lower = text.to_lowercase();
    let mut found: Vec<String> = Vec::new();
    for (term, canonical) in DIETARY_TERMS {
        if lower.contains(term) && !found.iter().any(|f| f == canonical) {
            found.push(canonical.to_string());
        }
    }
    found
}

/// 抽取陈述的已有食材："I have eggs, spinach and feta" → [eggs, spinach, feta]
pub fn stated_ingredients(text: &str) -> Vec<String> {
    let Some(caps) = stated_ingredients_pattern().captures(text) else {
        return Vec::new();
    };
    let Some(list) = caps.get(1) else {
        return Vec::new();
    };
    let list = list.as_str();
    // 偏移量取自原串本身，大小写转换会改变 UTF-8 字节长度
    let list = match list_tail_pattern().find(list) {
        Some(tail) => &list[..tail.start()],
        None => list,
    };

    list.split([',', '&'])
        .flat_map(|part| part.split(" and "))
        .map(|item| {
            item.trim()
                .trim_start_matches("and ")
                .trim_start_matches("some ")
                .trim_start_matches("a ")
                .trim_start_matches("an ")
                .trim_start_matches("the ")
                .trim()
                .to_string()
        })
        .filter(|item| !item.is_empty() && item.split_whitespace().count() <= 4)
        .collect()
}
