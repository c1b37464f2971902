//! Prediction orchestration: validate, score, hand off for logging.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::log_writer::LogWriterHandle;
use crate::error::Result;
use crate::features::{FeatureVector, RawFeatures};
use crate::inference::{InferenceEngine, Score};
use crate::storage::NewPrediction;

/// What the caller gets back for one prediction
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Probability of a successful kick
    pub prediction: f64,
    pub confidence: f64,
}

#[derive(Clone)]
pub struct PredictionService {
    engine: Arc<InferenceEngine>,
    writer: LogWriterHandle,
}

impl PredictionService {
    pub fn new(engine: Arc<InferenceEngine>, writer: LogWriterHandle) -> Self {
        Self { engine, writer }
    }

    /// Validate, score and queue the record for persistence.
    ///
    /// Invalid input fails with a validation error and is never logged. A
    /// valid request the model cannot score is logged as a failed attempt and
    /// the scoring error is returned. The hand-off to the log writer does not
    /// wait on storage.
    pub fn predict(&self, raw: RawFeatures) -> Result<PredictionResult> {
        let vector = FeatureVector::new(raw)?;

        let start = Instant::now();
        let outcome = self.engine.score(&vector);
        let latency_ms = start.elapsed().as_secs_f64() * 1000.0;

        match outcome {
            Ok(score) => {
                self.writer.enqueue(NewPrediction::scored(
                    vector,
                    score.probability,
                    score.confidence,
                    latency_ms,
                ));
                Ok(PredictionResult {
                    prediction: score.probability,
                    confidence: score.confidence,
                })
            }
            Err(e) => {
                warn!(error = %e, "scoring failed, logging failed attempt");
                self.writer
                    .enqueue(NewPrediction::failed(vector, e.to_string(), latency_ms));
                Err(e)
            }
        }
    }

    /// Score an already validated vector without logging it
    pub fn score_only(&self, vector: &FeatureVector) -> Result<Score> {
        self.engine.score(vector)
    }

    pub fn engine(&self) -> &InferenceEngine {
        &self.engine
    }

    pub fn writer(&self) -> &LogWriterHandle {
        &self.writer
    }
}
