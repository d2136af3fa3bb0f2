//! HTTP 路由层
//! 面向前端的接口：学习树生成、语音合成与星球过渡语

use crate::services::gemini::GeminiClient;
use crate::services::study::{self, TransitionRequest};
use crate::services::tts::{TtsClient, TtsError};
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// questions_per_subtopic 缺省值
pub const DEFAULT_QUESTIONS_PER_SUBTOPIC: u32 = 3;

/// 路由共享状态，两个客户端在启动时构建一次后只读
#[derive(Clone)]
pub struct AppState {
    pub gemini: Arc<GeminiClient>,
    pub tts: Arc<TtsClient>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/generate-study", post(generate_study))
        .route("/api/tts", post(tts))
        .route("/api/planet-transition", post(planet_transition))
        .with_state(state)
}

#[derive(Deserialize)]
pub struct GenerateStudyBody {
    topic: Option<String>,
    #[serde(default)]
    questions_per_subtopic: Option<serde_json::Value>,
}

#[derive(Deserialize)]
pub struct TtsBody {
    text: Option<String>,
}

#[derive(Deserialize)]
pub struct TransitionBody {
    topic: Option<String>,
    from_planet: Option<u32>,
    to_planet: Option<u32>,
    from_subtopic: Option<String>,
    to_subtopic: Option<String>,
}

#[derive(Serialize)]
struct TransitionReply {
    message: String,
}

#[derive(Serialize)]
struct ErrorReply {
    error: String,
}

/// 将每个子主题的题目数量收敛到 [1, 10]，缺省或非整数取默认值
pub fn clamp_question_count(requested: Option<&serde_json::Value>) -> u32 {
    match requested.and_then(|value| value.as_i64()) {
        Some(count) => count.clamp(1, 10) as u32,
        None => DEFAULT_QUESTIONS_PER_SUBTOPIC,
    }
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorReply {
            error: message.to_string(),
        }),
    )
        .into_response()
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn generate_study(
    State(state): State<AppState>,
    Json(body): Json<GenerateStudyBody>,
) -> Response {
    let request_id = Uuid::new_v4();
    let Some(topic) = body
        .topic
        .as_deref()
        .map(str::trim)
        .filter(|topic| !topic.is_empty())
    else {
        return error_response(StatusCode::BAD_REQUEST, "topic is required");
    };
    let count = clamp_question_count(body.questions_per_subtopic.as_ref());

    log::info!(
        "[{}] generate-study topic='{}' questions_per_subtopic={}",
        request_id,
        topic,
        count
    );
    let tree = study::create_study_tree(state.gemini.as_ref(), topic, count).await;
    log::info!(
        "[{}] study tree ready with {} subtopics",
        request_id,
        tree.subtopics.len()
    );
    Json(tree).into_response()
}

async fn tts(State(state): State<AppState>, Json(body): Json<TtsBody>) -> Response {
    let request_id = Uuid::new_v4();
    let Some(text) = body
        .text
        .as_deref()
        .map(str::trim)
        .filter(|text| !text.is_empty())
    else {
        return error_response(StatusCode::BAD_REQUEST, "text is required");
    };

    log::info!("[{}] tts request ({} chars)", request_id, text.chars().count());
    match state.tts.synthesize(text).await {
        Ok(audio) => ([(header::CONTENT_TYPE, "audio/mpeg")], audio).into_response(),
        Err(TtsError::MissingApiKey) => error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "text-to-speech service is not configured",
        ),
        Err(err) => {
            log::error!("[{}] tts failed: {}", request_id, err);
            error_response(StatusCode::BAD_GATEWAY, &err.to_string())
        }
    }
}

async fn planet_transition(
    State(state): State<AppState>,
    Json(body): Json<TransitionBody>,
) -> Response {
    let request_id = Uuid::new_v4();
    let (Some(topic), Some(from_planet), Some(to_planet), Some(from_subtopic), Some(to_subtopic)) = (
        body.topic,
        body.from_planet,
        body.to_planet,
        body.from_subtopic,
        body.to_subtopic,
    ) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "topic, from_planet, to_planet, from_subtopic and to_subtopic are required",
        );
    };

    let request = TransitionRequest {
        topic,
        from_planet,
        to_planet,
        from_subtopic,
        to_subtopic,
    };
    log::info!(
        "[{}] planet-transition {} -> {}",
        request_id,
        request.from_planet,
        request.to_planet
    );
    match study::generate_transition(state.gemini.as_ref(), &request).await {
        Ok(message) => Json(TransitionReply { message }).into_response(),
        Err(err) => {
            log::error!("[{}] transition generation failed: {}", request_id, err);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_question_count() {
        assert_eq!(clamp_question_count(None), 3);
        assert_eq!(
            clamp_question_count(Some(&serde_json::json!("five"))),
            DEFAULT_QUESTIONS_PER_SUBTOPIC
        );
        assert_eq!(clamp_question_count(Some(&serde_json::json!(5))), 5);
        assert_eq!(clamp_question_count(Some(&serde_json::json!(0))), 1);
        assert_eq!(clamp_question_count(Some(&serde_json::json!(-2))), 1);
        assert_eq!(clamp_question_count(Some(&serde_json::json!(99))), 10);
    }
}
