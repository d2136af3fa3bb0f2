//! 服务配置
//! 全部来自环境变量，启动时读取一次

use anyhow::{Context, Result};

/// 服务运行配置
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub elevenlabs_api_key: Option<String>,
    pub port: u16,
    pub log_level: log::LevelFilter,
}

impl ServerConfig {
    /// 从环境变量读取配置；缺少必需的 Gemini 密钥时直接报错
    pub fn from_env() -> Result<Self> {
        let gemini_api_key = std::env::var("GEMINI_API_KEY")
            .context("GEMINI_API_KEY is not set")?;
        let gemini_model =
            std::env::var("GEMINI_MODEL").unwrap_or_else(|_| "gemini-2.5-flash".to_string());
        let elevenlabs_api_key = std::env::var("ELEVENLABS_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());
        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(5000);
        let log_level = std::env::var("LOG_LEVEL")
            .ok()
            .and_then(|level| level.parse().ok())
            .unwrap_or(log::LevelFilter::Info);

        Ok(Self {
            gemini_api_key,
            gemini_model,
            elevenlabs_api_key,
            port,
            log_level,
        })
    }
}
