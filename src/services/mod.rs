// 服务模块
// 提供核心业务逻辑服务

pub mod extract;
pub mod gemini;
pub mod retry;
pub mod study;
pub mod tts;

pub use extract::extract_json_payload;

pub use gemini::{GeminiClient, GenerateError, TextGenerator};

pub use retry::{call_with_retry, RetryPolicy};

pub use study::{
    create_study_tree,
    filter_generic_subtopics,
    generate_questions,
    generate_transition,
    get_subtopics,
    repair_question,
    TransitionRequest,
    TARGET_SUBTOPICS,
};

pub use tts::{TtsClient, TtsError};
