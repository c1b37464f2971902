//! Kickwatch HTTP server
//!
//! Serves kick predictions over REST, logs every scored request through the
//! background log writer and optionally profiles selected routes.

mod api;
mod auth;
mod error;
mod handlers;
mod state;

pub use api::create_router;
pub use auth::API_KEY_HEADER;
pub use error::ServerError;
pub use state::AppState;

use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::inference::{InferenceConfig, InferenceEngine};
use crate::monitoring::ProfilingConfig;
use crate::service::{spawn_log_writer, LogWriterConfig, PredictionService};
use crate::storage::open_store;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Mount point of the API routes, e.g. `/api/v1`
    pub api_prefix: String,
    /// Expected `X-API-Key`; when `None` every protected route answers 403
    pub api_key: Option<String>,
    /// SQLite file, or `:memory:`
    pub database_path: String,
    pub cors_origin: Option<String>,
    pub inference: InferenceConfig,
    pub profiling: ProfilingConfig,
    pub log_writer: LogWriterConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let api_prefix = std::env::var("API_PREFIX").unwrap_or_else(|_| "/api/v1".to_string());
        Self {
            host: std::env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("API_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8000),
            api_prefix: Self::normalize_prefix(&api_prefix),
            api_key: std::env::var("API_KEY").ok().filter(|k| !k.is_empty()),
            database_path: std::env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "data/predictions.db".to_string()),
            cors_origin: std::env::var("CORS_ORIGIN").ok(),
            inference: InferenceConfig::default(),
            profiling: ProfilingConfig::default(),
            log_writer: LogWriterConfig::default(),
        }
    }
}

impl ServerConfig {
    /// `api/v1/` -> `/api/v1`; empty or `/` mounts at the root
    fn normalize_prefix(prefix: &str) -> String {
        let trimmed = prefix.trim().trim_matches('/');
        if trimmed.is_empty() {
            String::new()
        } else {
            format!("/{}", trimmed)
        }
    }

    pub fn with_api_prefix(mut self, prefix: &str) -> Self {
        self.api_prefix = Self::normalize_prefix(prefix);
        self
    }

    pub fn with_api_key(mut self, key: Option<String>) -> Self {
        self.api_key = key;
        self
    }
}

async fn shutdown_signal(started_at: chrono::DateTime<chrono::Utc>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for ctrl+c, server will only stop when killed");
        std::future::pending::<()>().await;
    }
    let stop_time = chrono::Utc::now();
    info!(
        stopped_at = %stop_time.to_rfc3339(),
        uptime_secs = stop_time.signed_duration_since(started_at).num_seconds(),
        "Shutdown signal received, stopping server gracefully"
    );
}

/// Start the server with the given configuration
pub async fn run_server(config: ServerConfig) -> anyhow::Result<()> {
    let store = open_store(&config.database_path)?;
    info!(database = %config.database_path, "Prediction store opened");

    let writer = spawn_log_writer(config.log_writer.clone(), store.clone());

    let service = match InferenceEngine::load(config.inference.clone()) {
        Ok(engine) => {
            info!(model = %config.inference.model_path.display(), "Model loaded");
            Some(PredictionService::new(Arc::new(engine), writer.handle()))
        }
        Err(e) => {
            error!(
                model = %config.inference.model_path.display(),
                error = %e,
                "Model failed to load, predictions will answer 503"
            );
            None
        }
    };

    if config.api_key.is_none() {
        warn!("API_KEY is not set, protected routes will reject every request");
    }
    if config.profiling.enabled {
        info!(dir = %config.profiling.profiles_dir.display(), "Request profiling enabled");
    }

    let state = Arc::new(AppState::new(config.clone(), store, service, writer.handle()));
    let ready = state.is_ready();
    let started_at = state.started_at;
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(
        address = %addr,
        prefix = %config.api_prefix,
        ready,
        pid = std::process::id(),
        "Kickwatch server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(started_at))
        .await?;

    let handle = writer.handle();
    let drained = writer.shutdown().await;
    let stats = handle.stats();
    info!(
        drained,
        written = stats.written,
        failed = stats.failed,
        dropped = stats.dropped,
        "Prediction log writer stopped"
    );

    info!("Server shut down cleanly");
    Ok(())
}
