//! Drift detection module
//!
//! Compares a live window of logged predictions against a reference
//! (training) window, feature by feature, and decides whether the dataset as
//! a whole has drifted.

mod data_drift;
mod evaluator;
mod report;
mod window;

pub use data_drift::{ks_statistic, PopulationStabilityIndex, ProportionDifference};
pub use evaluator::{DriftConfig, DriftEvaluator};
pub use report::{DriftReport, DriftStatistic, FeatureDrift};
pub use window::FeatureWindow;

use crate::error::Result;
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Drift detection result for one column
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftResult {
    /// Whether drift was detected
    pub drift_detected: bool,
    /// Drift score/statistic
    pub score: f64,
    /// Threshold used for detection
    pub threshold: f64,
    pub message: String,
}

impl DriftResult {
    /// Create a result indicating no drift
    pub fn no_drift(score: f64, threshold: f64) -> Self {
        Self {
            drift_detected: false,
            score,
            threshold,
            message: "No drift detected".to_string(),
        }
    }

    /// Create a result indicating drift
    pub fn drift(score: f64, threshold: f64, message: &str) -> Self {
        Self {
            drift_detected: true,
            score,
            threshold,
            message: message.to_string(),
        }
    }
}

/// Trait for drift detectors
pub trait DriftDetector: Send + Sync {
    /// Detect drift between reference and test data
    fn detect(&self, reference: &Array1<f64>, test: &Array1<f64>) -> Result<DriftResult>;
}
