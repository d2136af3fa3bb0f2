//! 学习树生成服务
//! 子主题生成、选择题生成与并发编排

use crate::models::{Question, StudyTree, SubtopicEntry};
use crate::services::extract::extract_json_payload;
use crate::services::gemini::{GenerateError, TextGenerator};
use crate::services::retry::{call_with_retry, RetryPolicy};
use crate::utils::truncate_for_log;
use futures::stream::{self, StreamExt};
use regex::Regex;

/// 每棵学习树的目标子主题数，与前端的九个星球一一对应
pub const TARGET_SUBTOPICS: usize = 9;

/// 同时进行的出题请求上限
const MAX_CONCURRENT_QUESTION_CALLS: usize = 6;

/// 判定为"过于宽泛"的子主题关键词
const GENERIC_TERMS: &[&str] = &[
    "basics",
    "advanced",
    "introduction",
    "overview",
    "applications",
    "fundamentals",
];

/// 过滤掉过于宽泛的子主题
///
/// 三个词以内且包含宽泛关键词（整词匹配）的条目会被丢弃，
/// "主题 + 宽泛后缀"（如 "<Topic> Basics"）以及 "Introduction to <Topic>"
/// 也会被丢弃；更长的具体短语即便含有这些词也保留。
pub fn filter_generic_subtopics(subtopics: &[String], topic: &str) -> Vec<String> {
    let topic_lower = topic.to_lowercase();
    subtopics
        .iter()
        .filter(|subtopic| !is_generic_subtopic(subtopic, &topic_lower))
        .cloned()
        .collect()
}

fn is_generic_subtopic(subtopic: &str, topic_lower: &str) -> bool {
    let lower = subtopic.to_lowercase();
    for term in GENERIC_TERMS {
        if lower == format!("{} {}", topic_lower, term) {
            return true;
        }
    }
    if lower == format!("introduction to {}", topic_lower) {
        return true;
    }

    if subtopic.split_whitespace().count() <= 3 {
        let pattern = Regex::new(&format!(r"\b({})\b", GENERIC_TERMS.join("|"))).unwrap();
        if pattern.is_match(&lower) {
            return true;
        }
    }
    false
}

/// 为主题生成子主题列表，目标 9 个，绝不报错
///
/// 过滤后不足 9 个时按原始顺序用未入选的条目补齐；全部被过滤时
/// 退回原始列表。JSON 解析失败则用简化提示词重试一次（要 5 个，
/// 不过滤），仍失败返回空列表。
pub async fn get_subtopics<G: TextGenerator + ?Sized>(client: &G, topic: &str) -> Vec<String> {
    let prompt = build_subtopics_prompt(topic);
    let policy = RetryPolicy::default();

    let raw = match call_with_retry("subtopics", &policy, || client.generate(prompt.clone())).await
    {
        Ok(text) => text,
        Err(err) => {
            log::error!("subtopic generation failed for '{}': {}", topic, err);
            return Vec::new();
        }
    };

    let payload = extract_json_payload(&raw);
    let parsed: Vec<String> = match serde_json::from_str(&payload) {
        Ok(list) => list,
        Err(err) => {
            log::warn!(
                "subtopic response for '{}' was not valid JSON ({}), retrying with simplified prompt",
                topic,
                err
            );
            return get_subtopics_simplified(client, topic).await;
        }
    };

    let filtered = filter_generic_subtopics(&parsed, topic);
    select_subtopics(parsed, filtered)
}

/// 从过滤结果中选出最终子主题列表
fn select_subtopics(original: Vec<String>, filtered: Vec<String>) -> Vec<String> {
    if filtered.len() >= TARGET_SUBTOPICS {
        return filtered.into_iter().take(TARGET_SUBTOPICS).collect();
    }
    if filtered.is_empty() {
        // 过滤把所有条目都丢掉了，宁可宽泛也不要空结果
        return original.into_iter().take(TARGET_SUBTOPICS).collect();
    }

    let mut selected = filtered;
    for item in original {
        if selected.len() >= TARGET_SUBTOPICS {
            break;
        }
        if !selected.contains(&item) {
            selected.push(item);
        }
    }
    selected
}

async fn get_subtopics_simplified<G: TextGenerator + ?Sized>(
    client: &G,
    topic: &str,
) -> Vec<String> {
    let prompt = format!(
        "List 5 important sub topics for studying \"{}\".\n\
         Return ONLY a JSON array of strings, no other text.\n\
         Format: [\"Sub topic 1\", \"Sub topic 2\", \"Sub topic 3\", \"Sub topic 4\", \"Sub topic 5\"]",
        topic
    );
    let policy = RetryPolicy::default();

    match call_with_retry("subtopics-simplified", &policy, || {
        client.generate(prompt.clone())
    })
    .await
    {
        Ok(raw) => {
            let payload = extract_json_payload(&raw);
            let mut subtopics: Vec<String> =
                serde_json::from_str(&payload).unwrap_or_else(|err| {
                    log::error!(
                        "simplified subtopic retry for '{}' still unparseable: {} (payload: {})",
                        topic,
                        err,
                        truncate_for_log(&payload, 200)
                    );
                    Vec::new()
                });
            subtopics.truncate(TARGET_SUBTOPICS);
            subtopics
        }
        Err(err) => {
            log::error!("simplified subtopic retry for '{}' failed: {}", topic, err);
            Vec::new()
        }
    }
}

fn build_subtopics_prompt(topic: &str) -> String {
    format!(
        r#"You are an expert educator. Generate exactly {count} specific, concrete sub topics for studying "{topic}".

CRITICAL REQUIREMENTS:
- Each sub topic must be SPECIFIC and CONCRETE to "{topic}"
- DO NOT use generic terms like "Basics", "Advanced Concepts", "Introduction", "Overview", "Applications"
- Each sub topic should be a distinct, important area or concept within "{topic}"

Examples of GOOD sub topics:
- For "Python": ["Lists and List Comprehensions", "Dictionary Operations", "Function Definitions and Scope"]
- For "Photosynthesis": ["Light-Dependent Reactions", "The Calvin Cycle", "Chlorophyll and Pigments"]

Examples of BAD sub topics (DO NOT USE):
- "{topic} Basics", "{topic} Advanced", "Introduction to {topic}", "{topic} Overview"

Return ONLY a valid JSON array of {count} strings. No other text, no explanations, no markdown formatting.

Sub topics for "{topic}":"#,
        count = TARGET_SUBTOPICS,
        topic = topic
    )
}

/// 为一个子主题生成选择题，尽力而为，绝不报错
///
/// 模型输出里的坏记录会被修复或丢弃，解析失败时返回空列表并
/// 记录响应前缀便于排查。
pub async fn generate_questions<G: TextGenerator + ?Sized>(
    client: &G,
    subtopic: &str,
    topic: &str,
    count: u32,
) -> Vec<Question> {
    let prompt = build_questions_prompt(subtopic, topic, count);
    let policy = RetryPolicy::default();
    let label = format!("questions:{}", subtopic);

    let raw = match call_with_retry(&label, &policy, || client.generate(prompt.clone())).await {
        Ok(text) => text,
        Err(err) => {
            log::error!("question generation failed for '{}': {}", subtopic, err);
            return Vec::new();
        }
    };

    let payload = extract_json_payload(&raw);
    let values: Vec<serde_json::Value> = match serde_json::from_str(&payload) {
        Ok(values) => values,
        Err(err) => {
            log::error!(
                "question response for '{}' was not valid JSON: {} (payload: {})",
                subtopic,
                err,
                truncate_for_log(&payload, 500)
            );
            return Vec::new();
        }
    };

    values.into_iter().filter_map(repair_question).collect()
}

/// 校验并修复一条模型生成的题目记录
///
/// 缺少 question 或 options、或 options 含非字符串元素的记录直接丢弃
/// （剔除单个选项会让 correct_index 错位指向别的选项）；correct_index
/// 缺失、非整数或越界时归零；explanation 缺失时填入占位文本。
pub fn repair_question(value: serde_json::Value) -> Option<Question> {
    let object = value.as_object()?;
    let question = object.get("question")?.as_str()?.to_string();
    let options: Vec<String> = object
        .get("options")?
        .as_array()?
        .iter()
        .map(|option| option.as_str().map(str::to_string))
        .collect::<Option<Vec<String>>>()?;

    let correct_index = object
        .get("correct_index")
        .and_then(|value| value.as_i64())
        .filter(|index| *index >= 0 && (*index as usize) < options.len())
        .map(|index| index as usize)
        .unwrap_or(0);
    let explanation = object
        .get("explanation")
        .and_then(|value| value.as_str())
        .unwrap_or("This is the correct answer.")
        .to_string();

    Some(Question {
        question,
        options,
        correct_index,
        explanation,
    })
}

fn build_questions_prompt(subtopic: &str, topic: &str, count: u32) -> String {
    format!(
        r#"Generate {count} multiple choice questions about "{subtopic}" (within the broader topic of "{topic}").

For each question, provide:
1. A clear, specific question
2. Four answer choices
3. The index of the correct answer
4. A brief explanation of why that answer is correct

Return ONLY a JSON array. Each question must have this exact structure:
{{
    "question": "The question text",
    "options": ["Option A", "Option B", "Option C", "Option D"],
    "correct_index": 0,
    "explanation": "Explanation of why the correct answer is right"
}}

Generate questions for "{subtopic}":"#,
        count = count,
        subtopic = subtopic,
        topic = topic
    )
}

/// 为一个主题生成完整学习树
///
/// 子主题按生成顺序排列；出题请求并发执行但按原始下标写回，
/// 完成顺序不影响输出顺序。没有子主题时直接返回空树。
pub async fn create_study_tree<G: TextGenerator + ?Sized>(
    client: &G,
    topic: &str,
    questions_per_subtopic: u32,
) -> StudyTree {
    log::info!("generating study tree for topic '{}'", topic);

    let mut subtopics = get_subtopics(client, topic).await;
    if subtopics.is_empty() {
        log::warn!("no subtopics generated for '{}', returning empty tree", topic);
        return StudyTree {
            topic: topic.to_string(),
            subtopics: Vec::new(),
        };
    }
    subtopics.truncate(TARGET_SUBTOPICS);
    log::info!(
        "generated {} subtopics for '{}', fanning out question generation",
        subtopics.len(),
        topic
    );

    let mut entries: Vec<Option<SubtopicEntry>> = (0..subtopics.len()).map(|_| None).collect();
    let mut results = stream::iter(subtopics.iter().cloned().enumerate())
        .map(|(index, name)| async move {
            let questions =
                generate_questions(client, &name, topic, questions_per_subtopic).await;
            (index, SubtopicEntry { name, questions })
        })
        .buffer_unordered(MAX_CONCURRENT_QUESTION_CALLS);

    while let Some((index, entry)) = results.next().await {
        entries[index] = Some(entry);
    }

    StudyTree {
        topic: topic.to_string(),
        subtopics: entries.into_iter().flatten().collect(),
    }
}

/// 星球过渡语请求
#[derive(Debug, Clone)]
pub struct TransitionRequest {
    pub topic: String,
    pub from_planet: u32,
    pub to_planet: u32,
    pub from_subtopic: String,
    pub to_subtopic: String,
}

/// 生成两个子主题之间的过渡语，原样返回去除首尾空白的文本
pub async fn generate_transition<G: TextGenerator + ?Sized>(
    client: &G,
    request: &TransitionRequest,
) -> Result<String, GenerateError> {
    let prompt = format!(
        r#"You are the narrator of a space-themed study game about "{topic}".
The learner just completed planet {from_planet} ("{from_subtopic}") and is now traveling to planet {to_planet} ("{to_subtopic}").
Write ONE short, creative, encouraging transition sentence for this journey. Return only the sentence, no quotes, no other text."#,
        topic = request.topic,
        from_planet = request.from_planet,
        from_subtopic = request.from_subtopic,
        to_planet = request.to_planet,
        to_subtopic = request.to_subtopic
    );

    let text = client.generate(prompt).await?;
    Ok(text.trim().to_string())
}
