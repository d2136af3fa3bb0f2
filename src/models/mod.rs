use serde::{Deserialize, Serialize};

/// 一次请求生成的完整学习树，返回后不再变更
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudyTree {
    pub topic: String,
    pub subtopics: Vec<SubtopicEntry>,
}

/// 学习树中的一个子主题及其题目，顺序与子主题生成顺序一致
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubtopicEntry {
    pub name: String,
    pub questions: Vec<Question>,
}

/// 一道选择题；修复后 correct_index 始终是 options 的合法下标
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub question: String,
    pub options: Vec<String>,
    pub correct_index: usize,
    pub explanation: String,
}
