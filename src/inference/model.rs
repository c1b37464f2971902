//! Classifier capability and the serialized logistic model

use crate::error::{KickwatchError, Result};
use crate::features::{Feature, N_FEATURES};
use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A loaded binary classifier.
///
/// Implementations must be safe to share across concurrent requests; the
/// engine never mutates them.
pub trait Classifier: Send + Sync {
    /// Probability of the positive class for one feature row
    fn predict_probability(&self, features: &[f64]) -> Result<f64>;

    /// Number of input features the model expects
    fn n_features(&self) -> usize;
}

/// Logistic regression with fixed coefficients, stored as JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticModel {
    /// Feature names in input order (optional in the file)
    #[serde(default)]
    pub feature_names: Vec<String>,
    /// Fitted coefficients
    pub coefficients: Vec<f64>,
    /// Fitted intercept
    #[serde(default)]
    pub intercept: f64,
}

impl LogisticModel {
    /// Create a model from coefficients in catalogue order
    pub fn new(coefficients: Vec<f64>, intercept: f64) -> Result<Self> {
        let model = Self {
            feature_names: Feature::names().into_iter().map(String::from).collect(),
            coefficients,
            intercept,
        };
        model.check()?;
        Ok(model)
    }

    /// Load a model from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            KickwatchError::ConfigError(format!("cannot read model {}: {}", path.display(), e))
        })?;
        let model: Self = serde_json::from_str(&json)?;
        model.check()?;
        Ok(model)
    }

    fn check(&self) -> Result<()> {
        if self.coefficients.len() != N_FEATURES {
            return Err(KickwatchError::ConfigError(format!(
                "model has {} coefficients, expected {}",
                self.coefficients.len(),
                N_FEATURES
            )));
        }
        if !self.feature_names.is_empty() {
            let expected = Feature::names();
            if self.feature_names.iter().map(String::as_str).ne(expected.iter().copied()) {
                return Err(KickwatchError::ConfigError(format!(
                    "model feature order {:?} does not match {:?}",
                    self.feature_names, expected
                )));
            }
        }
        Ok(())
    }

    fn sigmoid(z: f64) -> f64 {
        1.0 / (1.0 + (-z).exp())
    }
}

impl Classifier for LogisticModel {
    fn predict_probability(&self, features: &[f64]) -> Result<f64> {
        if features.len() != self.coefficients.len() {
            return Err(KickwatchError::ShapeError {
                expected: format!("{} features", self.coefficients.len()),
                actual: format!("{} features", features.len()),
            });
        }
        let x = ArrayView1::from(features);
        let w = ArrayView1::from(self.coefficients.as_slice());
        Ok(Self::sigmoid(x.dot(&w) + self.intercept))
    }

    fn n_features(&self) -> usize {
        self.coefficients.len()
    }
}
