//! ElevenLabs 语音合成客户端
//! 单次同步调用，失败不重试，凭证缺失作为独立错误类型上报

use crate::utils::truncate_for_log;
use serde::Serialize;
use std::time::Duration;

// 免费档可用的 Rachel 音色
const ELEVENLABS_VOICE_ID: &str = "21m00Tcm4TlvDq8ikWAM";
const ELEVENLABS_MODEL_ID: &str = "eleven_turbo_v2";
const TTS_TIMEOUT: Duration = Duration::from_secs(30);

/// 语音合成错误
#[derive(Debug, thiserror::Error)]
pub enum TtsError {
    /// 凭证未配置，HTTP 层据此返回"服务未配置"而不是笼统的失败
    #[error("ELEVENLABS_API_KEY is not configured")]
    MissingApiKey,
    #[error("voice api returned status {status}: {body}")]
    Api { status: u16, body: String },
    #[error("voice api request failed: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Serialize)]
struct TtsRequest<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: VoiceSettings,
}

#[derive(Serialize)]
struct VoiceSettings {
    stability: f32,
    similarity_boost: f32,
}

/// ElevenLabs 客户端
pub struct TtsClient {
    http: reqwest::Client,
    api_key: Option<String>,
}

impl TtsClient {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// 将文本合成为 MP3 音频字节
    pub async fn synthesize(&self, text: &str) -> Result<Vec<u8>, TtsError> {
        let api_key = self.api_key.as_deref().ok_or(TtsError::MissingApiKey)?;
        let url = format!(
            "https://api.elevenlabs.io/v1/text-to-speech/{}",
            ELEVENLABS_VOICE_ID
        );

        log::info!("[tts] synthesizing {} chars", text.chars().count());
        let response = self
            .http
            .post(&url)
            .timeout(TTS_TIMEOUT)
            .header("xi-api-key", api_key)
            .header(reqwest::header::ACCEPT, "audio/mpeg")
            .json(&TtsRequest {
                text,
                model_id: ELEVENLABS_MODEL_ID,
                voice_settings: VoiceSettings {
                    stability: 0.5,
                    similarity_boost: 0.75,
                },
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            log::error!(
                "[tts] api error {}: {}",
                status,
                truncate_for_log(&body, 500)
            );
            return Err(TtsError::Api {
                status: status.as_u16(),
                body: truncate_for_log(&body, 500),
            });
        }

        let audio = response.bytes().await?;
        log::info!("[tts] generated {} bytes of audio", audio.len());
        Ok(audio.to_vec())
    }
}
