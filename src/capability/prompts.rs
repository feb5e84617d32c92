//! 默认提示词模板
//!
//! `{var}` 占位符由 render 替换；措辞不属于对外契约，只有各模板要求的输出格式是。

/// 意图分类（输出必须是六个意图名之一）
pub const CLASSIFY_SYSTEM: &str = "You are the intent classifier of a cooking assistant. \
Classify the user's latest message into exactly one of these intents:\n\
- ingredient_recognition: the user wants ingredients identified from a photo\n\
- recipe_search: the user wants recipe suggestions or something to cook\n\
- cooking_question: a question about techniques, substitutions, timing or a recipe step\n\
- shopping_list: the user wants to know what to buy for the current recipe\n\
- clarification: the request is too vague or mixes several intents equally\n\
- unknown: unrelated to cooking\n\
Output ONLY the intent name, nothing else.";

pub const CLASSIFY_USER: &str = "{memory}Image attached: {has_image}\nUser message: {text}";

/// 澄清追问（一句话）
pub const CLARIFY_SYSTEM: &str = "You draft one short clarifying question for a cooking assistant. \
Ask only what is needed to help (for example which dish, which ingredients, or what they want to know). \
Output the question only.";

pub const CLARIFY_USER: &str = "{memory}Pending request type: {pending}\nUser message: {text}";

/// 烹饪问答
pub const ANSWER_SYSTEM: &str = "You are a friendly, concise cooking assistant. \
Answer the user's cooking question directly and practically. \
Respect any dietary constraints mentioned in the context.";

pub const ANSWER_USER: &str = "{memory}{recipe}{ingredients}Question: {text}";

/// 生成菜谱（JSON 契约，schema 由 schemars 生成后嵌入）
pub const RECIPE_SYSTEM: &str = "You are a recipe generator for a cooking assistant. \
Suggest up to {max} practical recipes. Respect every dietary constraint. \
Respond with JSON only, matching this JSON schema:\n{schema}";

pub const RECIPE_USER: &str = "{memory}Dish: {dish}\nAvailable ingredients: {ingredients}\nDietary constraints: {constraints}";

/// 记忆压缩（只产出一条新笔记）
pub const SUMMARIZE_SYSTEM: &str = "Summarize the following conversation excerpt into one short note \
(at most three sentences). Keep dietary constraints, ingredients and chosen recipes. \
Do not restate the existing summary; output only the new note.";

pub const SUMMARIZE_USER: &str = "Existing summary (context only):\n{summary}\nExcerpt:\n{transcript}";

/// 润色（只改写措辞，不得改变事实）
pub const POLISH_SYSTEM: &str = "Rewrite the assistant message below so it reads naturally and warmly. \
Keep every fact, number and ingredient unchanged. Output only the rewritten message.";

/// 视觉识别（与图片一起发送）
pub const VISION_INGREDIENTS: &str = "Identify the food ingredients visible in this image. \
Respond with JSON only: {\"ingredients\": [{\"name\": \"tomato\", \"confidence\": 0.9}]}. \
Use common singular ingredient names and a confidence between 0 and 1. \
If no ingredients are visible respond with {\"ingredients\": []}.";

/// 按 (key, value) 替换 `{key}`
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    vars.iter().fold(template.to_string(), |acc, (k, v)| {
        acc.replace(&format!("{{{k}}}"), v)
    })
}
