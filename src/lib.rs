//! Kickwatch - kick success prediction with production monitoring
//!
//! This crate serves a binary classifier for rugby kick attempts and keeps an
//! eye on it once deployed:
//! - Validated feature vectors and single-call scoring
//! - Background logging of every served prediction
//! - Selective per-request profiling
//! - Batch drift evaluation against the training data
//!
//! # Modules
//!
//! - [`features`] - Feature catalogue and validated input vectors
//! - [`inference`] - Classifier loading and scoring
//! - [`storage`] - Prediction log backends (SQLite, in-memory)
//! - [`service`] - Prediction orchestration and the async log writer
//! - [`monitoring`] - Process sampling and request profiling
//! - [`drift`] - Drift statistics, evaluation and reports
//! - [`server`] - HTTP server with REST API
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;

// Prediction path
pub mod features;
pub mod inference;
pub mod storage;
pub mod service;

// Observability
pub mod monitoring;
pub mod drift;

// Services
pub mod server;
pub mod cli;

pub use error::{KickwatchError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{KickwatchError, Result};

    pub use crate::features::{Feature, FeatureKind, FeatureVector, Flag, RawFeatures, N_FEATURES};

    pub use crate::inference::{Classifier, InferenceConfig, InferenceEngine, LogisticModel, Score};

    pub use crate::storage::{open_store, InMemoryStore, NewPrediction, PredictionRecord, PredictionStore, SqliteStore};

    pub use crate::service::{
        spawn_log_writer, AsyncLogWriter, LogWriterConfig, LogWriterHandle, LoggingFailure,
        PredictionResult, PredictionService,
    };

    pub use crate::monitoring::{ProfilingConfig, ProfilingInterceptor};

    pub use crate::drift::{DriftConfig, DriftEvaluator, DriftReport, FeatureWindow};

    pub use crate::server::{create_router, AppState, ServerConfig};
}
