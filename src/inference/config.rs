//! Inference configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for model inference
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    /// Path to the serialized classifier
    pub model_path: PathBuf,

    /// Threshold for deriving a class label from the probability
    pub classification_threshold: f64,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            model_path: std::env::var("MODEL_PATH")
                .unwrap_or_else(|_| "models/model.json".to_string())
                .into(),
            classification_threshold: 0.5,
        }
    }
}

impl InferenceConfig {
    /// Create a new inference configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the model path
    pub fn with_model_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.model_path = path.into();
        self
    }

    /// Builder method to set classification threshold
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.classification_threshold = threshold.clamp(0.0, 1.0);
        self
    }
}
