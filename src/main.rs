use anyhow::{Context, Result};
use std::sync::Arc;
use studyverse::config::ServerConfig;
use studyverse::routes::{self, AppState};
use studyverse::services::gemini::GeminiClient;
use studyverse::services::tts::TtsClient;

/// 初始化带时间戳的日志输出
fn setup_logger(level: log::LevelFilter) -> Result<(), fern::InitError> {
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stdout())
        .apply()?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServerConfig::from_env()?;
    setup_logger(config.log_level).context("failed to initialize logger")?;

    let tts = Arc::new(TtsClient::new(config.elevenlabs_api_key.clone()));
    if !tts.is_configured() {
        log::warn!("ELEVENLABS_API_KEY not set, /api/tts will report the service as unconfigured");
    }

    let state = AppState {
        gemini: Arc::new(GeminiClient::new(
            config.gemini_api_key.clone(),
            config.gemini_model.clone(),
        )),
        tts,
    };
    let app = routes::router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    log::info!(
        "studyverse listening on {} (model: {})",
        addr,
        config.gemini_model
    );
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
