pub mod api;
pub mod codec;
pub mod config;
pub mod coordinator;
pub mod data;
pub mod error;
pub mod pipeline;
pub mod recording;
pub mod replay;
pub mod state;

use state::AppState;
use std::sync::Arc;

pub fn run() -> anyhow::Result<()> {
    // Load configuration (never overwrite an existing file on failure)
    let config_result = config::load_config();
    let config = match &config_result {
        Ok(c) => c.clone(),
        Err(_) => config::AppConfig::default(),
    };

    let level = config::parse_log_level(&config.logging.level).unwrap_or(tracing::Level::INFO);
    tracing_subscriber::fmt().with_max_level(level).init();

    if let Err(e) = &config_result {
        tracing::error!("Failed to load config: {}. Using in-memory defaults (not saving).", e);
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        let state = Arc::new(AppState::new(config));
        api::run_server(state).await.map_err(anyhow::Error::msg)
    })
}
