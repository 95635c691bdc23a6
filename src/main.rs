mod config;
mod credential;
mod gemini;
mod i18n;
mod models;
mod orchestrator;
mod routes;
mod view;

use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::AppConfig;
use crate::credential::{CredentialProvider, KeyStore, NoCredential};
use crate::gemini::GeminiClient;
use crate::routes::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Init tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    match &config.api_key {
        Some(key) => tracing::info!("Using API key: {}...", key.chars().take(6).collect::<String>()),
        None => tracing::warn!("GEMINI_API_KEY not set; a key must be selected before generating"),
    }

    let credentials: Arc<dyn CredentialProvider> = if config.api_key.is_none() && !config.key_selection {
        tracing::warn!("Key selection disabled and no key configured; generation is unavailable");
        Arc::new(NoCredential)
    } else {
        Arc::new(KeyStore::new("GEMINI_API_KEY", config.api_key.clone()).with_selection(config.key_selection))
    };
    let gemini = GeminiClient::new(&config.gemini, credentials.clone()).context("failed to build Gemini client")?;
    tracing::info!(text_model = %config.gemini.text_model, image_model = %config.gemini.image_model, "Gemini client ready");

    let state = AppState::new(Arc::new(gemini), credentials, config.gemini.request_timeout);
    tokio::spawn(routes::sweep_idle_sessions(state.clone(), config.session_ttl));
    let app = routes::app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(%addr, "Starting server");
    let listener = tokio::net::TcpListener::bind(addr).await.with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server failed")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
