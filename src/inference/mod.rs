//! Inference engine module
//!
//! Provides single-row model scoring with:
//! - One probability call per request (the class label is derived, not re-queried)
//! - Confidence as distance from the decision boundary
//! - Lock-free prediction and error counters
//! - A JSON-serialized logistic classifier behind the [`Classifier`] trait

mod config;
mod engine;
mod model;

pub use config::InferenceConfig;
pub use engine::{InferenceEngine, InferenceStats, Score};
pub use model::{Classifier, LogisticModel};
