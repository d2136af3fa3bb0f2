//! Gemini 文本生成客户端
//! 封装 generateContent 接口，区分限流错误并携带服务端的重试提示

use crate::utils::truncate_for_log;
use futures::future::BoxFuture;
use futures::FutureExt;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// 文本生成错误
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    /// 配额或限流错误，可重试；retry_after 为服务端建议的等待时长
    #[error("rate limited by provider: {message}")]
    RateLimited {
        message: String,
        retry_after: Option<Duration>,
    },
    #[error("provider returned status {status}: {body}")]
    Api { status: u16, body: String },
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("provider returned an empty response")]
    EmptyResponse,
}

/// 文本生成接口，便于在测试中注入替身
pub trait TextGenerator: Send + Sync {
    fn generate(&self, prompt: String) -> BoxFuture<'_, Result<String, GenerateError>>;
}

#[derive(Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

/// Gemini 客户端
/// 在 main 中构建一次，经 Arc 注入各处，初始化后只读
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            model,
        }
    }

    async fn generate_content(&self, prompt: String) -> Result<String, GenerateError> {
        let url = format!(
            "{}/{}:generateContent?key={}",
            GEMINI_API_BASE, self.model, self.api_key
        );
        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
        };

        let response = self
            .http
            .post(&url)
            .timeout(REQUEST_TIMEOUT)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let body = response.text().await.unwrap_or_default();
            let retry_after = parse_retry_hint(&body);
            return Err(GenerateError::RateLimited {
                message: truncate_for_log(&body, 200),
                retry_after,
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerateError::Api {
                status: status.as_u16(),
                body: truncate_for_log(&body, 500),
            });
        }

        let payload: GenerateContentResponse = response.json().await?;
        let text = response_text(payload);
        if text.trim().is_empty() {
            return Err(GenerateError::EmptyResponse);
        }
        Ok(text)
    }
}

impl TextGenerator for GeminiClient {
    fn generate(&self, prompt: String) -> BoxFuture<'_, Result<String, GenerateError>> {
        self.generate_content(prompt).boxed()
    }
}

/// 拼接首个候选回复中的全部文本片段
fn response_text(payload: GenerateContentResponse) -> String {
    payload
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .map(|part| part.text)
                .collect::<String>()
        })
        .unwrap_or_default()
}

/// 从 429 错误体中解析建议的重试等待时长
///
/// 兼容 RetryInfo 的 `"retryDelay": "21s"` 与错误消息里的
/// "Please retry in 21.53s" 两种写法。
pub fn parse_retry_hint(body: &str) -> Option<Duration> {
    let pattern = Regex::new(r"(?i)retry[^0-9]{0,20}([0-9]+(?:\.[0-9]+)?)\s*s").unwrap();
    let captures = pattern.captures(body)?;
    let seconds: f64 = captures.get(1)?.as_str().parse().ok()?;
    Some(Duration::from_secs_f64(seconds))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_retry_hint_from_retry_info() {
        let body = r#"{"error":{"code":429,"status":"RESOURCE_EXHAUSTED","details":[{"@type":"type.googleapis.com/google.rpc.RetryInfo","retryDelay":"21s"}]}}"#;
        assert_eq!(parse_retry_hint(body), Some(Duration::from_secs(21)));
    }

    #[test]
    fn test_parse_retry_hint_from_message() {
        let body = "You exceeded your current quota. Please retry in 4.5s.";
        assert_eq!(parse_retry_hint(body), Some(Duration::from_secs_f64(4.5)));
    }

    #[test]
    fn test_parse_retry_hint_absent() {
        assert_eq!(parse_retry_hint("quota exceeded"), None);
    }

    #[test]
    fn test_response_text_concatenates_parts() {
        let payload: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"Hello "},{"text":"world"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(response_text(payload), "Hello world");
    }

    #[test]
    fn test_response_text_empty_candidates() {
        let payload: GenerateContentResponse = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(response_text(payload), "");
    }
}
