//! chess-explainer HTTP server binary.
//!
//! # Environment Variables
//!
//! - `ANTHROPIC_API_KEY`: API key for the generative model
//! - `CHESS_EXPLAINER_CONFIG`: Optional YAML config file
//! - `CHESS_EXPLAINER_*`: Per-field overrides (e.g. `CHESS_EXPLAINER_MAX_ATTEMPTS=2`)
//! - `PORT`: HTTP port, overriding the configured one
//! - `RUST_LOG`: Tracing filter (default: "info,chess_explainer=debug")
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin server
//! ```

use std::sync::Arc;

use anyhow::Context;
use chess_explainer::cache::{CacheLayer, FileCache, InMemoryCache};
use chess_explainer::llms::{AnthropicCompletion, GenerativeModel};
use chess_explainer::server::{app_router, AppState};
use chess_explainer::utilities::{CacheBackend, PipelineConfig};
use chess_explainer::ExplanationAgent;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,chess_explainer=debug".into()),
        )
        .init();

    let config = PipelineConfig::load().context("Failed to load configuration")?;

    if std::env::var("ANTHROPIC_API_KEY").is_err() {
        tracing::warn!("ANTHROPIC_API_KEY is not set; model calls will fail");
    }
    let model: Arc<dyn GenerativeModel> = Arc::new(
        AnthropicCompletion::new(
            config.model.clone(),
            None,
            config.api_base_url.clone(),
            config.timeout(),
        )
        .context("Failed to build model client")?
        .with_max_tokens(config.max_tokens)
        .with_temperature(config.temperature),
    );

    let cache: Arc<dyn CacheLayer> = match config.cache_backend {
        CacheBackend::Memory => Arc::new(InMemoryCache::new()),
        CacheBackend::File => Arc::new(
            FileCache::open(&config.cache_dir)
                .await
                .with_context(|| format!("Failed to open cache at {}", config.cache_dir.display()))?,
        ),
    };

    let agent = ExplanationAgent::from_config(&config, model, cache);
    let app = app_router(AppState::new(agent));

    let port = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(config.port);
    let bind_addr = format!("0.0.0.0:{}", port);

    tracing::info!(
        "chess-explainer {} starting on {} (model {}, cache {:?}, max attempts {})",
        chess_explainer::VERSION,
        bind_addr,
        config.model,
        config.cache_backend,
        config.max_attempts
    );
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health : liveness probe");
    tracing::info!("  POST /explain: grounded move explanation");

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;

    axum::serve(listener, app).await.context("Server failed")?;
    Ok(())
}
