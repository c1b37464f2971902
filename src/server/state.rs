//! Application state management

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::service::{LogWriterHandle, PredictionService};
use crate::storage::PredictionStore;

use super::ServerConfig;

/// Application state shared across handlers
pub struct AppState {
    pub config: ServerConfig,
    pub store: Arc<dyn PredictionStore>,
    /// `None` when the model failed to load; predictions answer 503
    pub service: Option<PredictionService>,
    pub writer: LogWriterHandle,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        config: ServerConfig,
        store: Arc<dyn PredictionStore>,
        service: Option<PredictionService>,
        writer: LogWriterHandle,
    ) -> Self {
        Self {
            config,
            store,
            service,
            writer,
            started_at: Utc::now(),
        }
    }

    pub fn model_loaded(&self) -> bool {
        self.service.is_some()
    }

    pub fn storage_reachable(&self) -> bool {
        self.store.ping().is_ok()
    }

    /// Ready to serve predictions: model loaded and storage reachable
    pub fn is_ready(&self) -> bool {
        self.model_loaded() && self.storage_reachable()
    }
}
