//! Inference engine implementation
//!
//! Wraps a shared, read-only classifier and turns one validated feature
//! vector into a probability and a confidence with a single model call.

use crate::error::{KickwatchError, Result};
use crate::features::FeatureVector;
use super::{Classifier, InferenceConfig, LogisticModel};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Output of one scoring call
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Score {
    /// Probability of the positive class, in [0, 1]
    pub probability: f64,
    /// Distance from the decision boundary: `max(p, 1 - p)`
    pub confidence: f64,
}

impl Score {
    fn from_probability(probability: f64) -> Self {
        Self {
            probability,
            confidence: probability.max(1.0 - probability),
        }
    }
}

/// Inference statistics snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceStats {
    pub total_predictions: u64,
    pub error_count: u64,
}

/// Scoring front-end over a loaded classifier
pub struct InferenceEngine {
    config: InferenceConfig,
    model: Arc<dyn Classifier>,
    total_predictions: AtomicU64,
    error_count: AtomicU64,
}

impl std::fmt::Debug for InferenceEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceEngine")
            .field("config", &self.config)
            .field("n_features", &self.model.n_features())
            .finish()
    }
}

impl InferenceEngine {
    /// Create an engine around an already-loaded classifier
    pub fn new(config: InferenceConfig, model: Arc<dyn Classifier>) -> Self {
        Self {
            config,
            model,
            total_predictions: AtomicU64::new(0),
            error_count: AtomicU64::new(0),
        }
    }

    /// Load the logistic model named by the configuration
    pub fn load(config: InferenceConfig) -> Result<Self> {
        let model = LogisticModel::load(&config.model_path)?;
        Ok(Self::new(config, Arc::new(model)))
    }

    /// Score one vector.
    ///
    /// Calls the classifier exactly once. The vector is trusted to satisfy
    /// its range invariants already.
    pub fn score(&self, vector: &FeatureVector) -> Result<Score> {
        let input = vector.to_array();
        let result = self
            .model
            .predict_probability(&input)
            .map_err(|e| KickwatchError::ScoringError(e.to_string()))
            .and_then(|p| {
                if p.is_finite() && (0.0..=1.0).contains(&p) {
                    Ok(Score::from_probability(p))
                } else {
                    Err(KickwatchError::ScoringError(format!(
                        "model returned invalid probability {}",
                        p
                    )))
                }
            });

        match &result {
            Ok(_) => self.total_predictions.fetch_add(1, Ordering::Relaxed),
            Err(_) => self.error_count.fetch_add(1, Ordering::Relaxed),
        };
        result
    }

    /// Class label (kick made) for a probability under the configured threshold
    pub fn label(&self, probability: f64) -> bool {
        probability >= self.config.classification_threshold
    }

    pub fn stats(&self) -> InferenceStats {
        InferenceStats {
            total_predictions: self.total_predictions.load(Ordering::Relaxed),
            error_count: self.error_count.load(Ordering::Relaxed),
        }
    }
}
