mod clients;
mod config;
mod error;
mod extractor;
mod fanout;
mod models;
mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{fmt, EnvFilter};

use crate::clients::{AzureImageClient, OpenAiVisionClient};
use crate::config::Config;
use crate::extractor::ProfileExtractor;
use crate::fanout::StyleFanOut;
use crate::routes::{router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let config = Config::from_env().context("loading configuration")?;
    if config.openai.api_key.is_none() {
        tracing::warn!("OPENAI_API_KEY is not set; /analyze will fail");
    }
    if config.azure.api_key.is_none() || config.azure.endpoint.is_none() {
        tracing::warn!("Azure OpenAI image settings are incomplete; every style image will fail");
    }

    let http = reqwest::Client::builder()
        .user_agent(concat!("style_advisor/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("building HTTP client")?;

    let state = AppState {
        extractor: Arc::new(ProfileExtractor::new(Arc::new(OpenAiVisionClient::new(
            http.clone(),
            config.openai.clone(),
        )))),
        fanout: Arc::new(StyleFanOut::new(
            Arc::new(AzureImageClient::new(http, config.azure.clone())),
            config.fanout.clone(),
        )),
    };

    let app = router(state, config.max_body_bytes);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(%addr, workers = config.fanout.workers, "Starting server");
    let listener = tokio::net::TcpListener::bind(addr).await.with_context(|| format!("binding {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
