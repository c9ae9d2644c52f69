mod config;
mod credentials;
mod error;
mod gemini;
mod models;
mod orchestrator;
mod palette;
mod prompt;
mod routes;

use anyhow::Context;
use routes::AppState;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::Config;
use crate::credentials::{mask, CredentialStore, FileCredentialStore, MemoryCredentialStore};
use crate::gemini::GeminiClient;
use crate::orchestrator::BatchOrchestrator;

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("❌ Could not install Ctrl+C handler: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("👋 Shutting down");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Init tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let config = Config::from_env();
    tracing::info!(model = %config.image_model, base = %config.api_base, "Loaded configuration");

    let credentials: Arc<dyn CredentialStore> = match &config.credential_file {
        Some(path) => {
            let store = FileCredentialStore::open(path);
            tracing::info!("🗄️ Persisting API key in {}", store.path().display());
            Arc::new(store)
        }
        None => {
            tracing::info!("🧠 Keeping API key in memory only");
            let seeded = config.seed_api_key.as_deref().map(MemoryCredentialStore::with_credential);
            Arc::new(seeded.unwrap_or_default())
        }
    };
    match (credentials.get(), &config.seed_api_key) {
        (Some(existing), _) => tracing::info!("🔑 Using stored API key {}", mask(&existing)),
        (None, Some(seed)) => {
            tracing::info!("🔑 Seeding API key {} from GEMINI_API_KEY", mask(seed));
            credentials.set(seed);
        }
        (None, None) => tracing::warn!("🔒 No API key configured; set one via PUT /api/credential"),
    }

    let state = AppState {
        orchestrator: Arc::new(BatchOrchestrator::new(
            Arc::new(GeminiClient::new(&config)),
            Arc::clone(&credentials),
        )),
        credentials,
    };
    let app = routes::router(state, config.max_upload_bytes);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, "Starting server");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}
