//! Batch drift evaluation over logged predictions

use super::data_drift::{ks_statistic, PopulationStabilityIndex, ProportionDifference};
use super::report::{DriftReport, DriftStatistic, FeatureDrift};
use super::window::{FeatureWindow, PREDICTION_COLUMN};
use super::DriftDetector;
use crate::error::{KickwatchError, Result};
use crate::features::{Feature, FeatureKind, N_FEATURES};
use crate::storage::PredictionStore;
use chrono::Utc;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info};

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Drift evaluation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftConfig {
    /// Quantile bins for PSI
    pub n_bins: usize,
    pub psi_threshold: f64,
    pub proportion_threshold: f64,
    /// Dataset drift when strictly more than this share of features drifted
    pub drift_share: f64,
    /// Smallest window either side may have
    pub min_samples: usize,
    /// How many recent records form the live window
    pub batch_size: usize,
    pub reports_dir: PathBuf,
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            n_bins: 10,
            psi_threshold: 0.2,
            proportion_threshold: 0.1,
            drift_share: 0.5,
            min_samples: env_or("DRIFT_MIN_SAMPLES", 50),
            batch_size: env_or("DRIFT_BATCH_SIZE", 1000),
            reports_dir: std::env::var("DRIFT_REPORTS_DIR")
                .unwrap_or_else(|_| "data/drift_reports".to_string())
                .into(),
        }
    }
}

impl DriftConfig {
    pub fn with_min_samples(mut self, n: usize) -> Self {
        self.min_samples = n.max(1);
        self
    }

    pub fn with_batch_size(mut self, n: usize) -> Self {
        self.batch_size = n.max(1);
        self
    }

    pub fn with_drift_share(mut self, share: f64) -> Self {
        self.drift_share = share.clamp(0.0, 1.0);
        self
    }

    pub fn with_reports_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.reports_dir = dir.into();
        self
    }
}

/// Compares live windows against a reference window
#[derive(Debug, Clone)]
pub struct DriftEvaluator {
    config: DriftConfig,
}

impl DriftEvaluator {
    pub fn new(config: DriftConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DriftConfig {
        &self.config
    }

    fn ensure_size(&self, window: &str, actual: usize) -> Result<()> {
        if actual < self.config.min_samples {
            return Err(KickwatchError::InsufficientData {
                window: window.to_string(),
                required: self.config.min_samples,
                actual,
            });
        }
        Ok(())
    }

    fn continuous(
        &self,
        name: &str,
        reference: &Array1<f64>,
        live: &Array1<f64>,
    ) -> Result<FeatureDrift> {
        let psi = PopulationStabilityIndex::new(self.config.n_bins)
            .with_threshold(self.config.psi_threshold);
        let result = psi.detect(reference, live)?;
        if result.drift_detected {
            debug!(feature = name, "{}", result.message);
        }
        Ok(FeatureDrift {
            feature: name.to_string(),
            kind: FeatureKind::Continuous,
            statistic: DriftStatistic::Psi,
            score: result.score,
            threshold: result.threshold,
            drifted: result.drift_detected,
            reference_mean: reference.mean().unwrap_or(0.0),
            live_mean: live.mean().unwrap_or(0.0),
            ks_statistic: Some(ks_statistic(reference, live)),
        })
    }

    fn boolean(&self, name: &str, reference: &Array1<f64>, live: &Array1<f64>) -> Result<FeatureDrift> {
        let result = ProportionDifference::new(self.config.proportion_threshold).detect(reference, live)?;
        if result.drift_detected {
            debug!(feature = name, "{}", result.message);
        }
        Ok(FeatureDrift {
            feature: name.to_string(),
            kind: FeatureKind::Boolean,
            statistic: DriftStatistic::ProportionDifference,
            score: result.score,
            threshold: result.threshold,
            drifted: result.drift_detected,
            reference_mean: reference.mean().unwrap_or(0.0),
            live_mean: live.mean().unwrap_or(0.0),
            ks_statistic: None,
        })
    }

    /// Evaluate every feature of `live` against `reference`.
    ///
    /// Fails with `InsufficientData` when either window is smaller than
    /// `min_samples`; no report is produced in that case.
    pub fn evaluate(&self, reference: &FeatureWindow, live: &FeatureWindow) -> Result<DriftReport> {
        self.ensure_size("reference", reference.len())?;
        self.ensure_size("live", live.len())?;

        let mut features = Vec::with_capacity(N_FEATURES);
        for feature in Feature::ALL {
            let ref_col = reference.column(feature);
            let live_col = live.column(feature);
            let drift = match feature.kind() {
                FeatureKind::Continuous => self.continuous(feature.name(), &ref_col, &live_col)?,
                FeatureKind::Boolean => self.boolean(feature.name(), &ref_col, &live_col)?,
            };
            features.push(drift);
        }

        let prediction = match (reference.predictions(), live.predictions()) {
            (Some(r), Some(l)) => Some(self.continuous(PREDICTION_COLUMN, r, l)?),
            _ => None,
        };

        let n_drifted = features.iter().filter(|f| f.drifted).count();
        let drifted_share = n_drifted as f64 / features.len() as f64;
        let dataset_drift = drifted_share > self.config.drift_share;

        info!(
            n_drifted,
            drifted_share,
            dataset_drift,
            reference_size = reference.len(),
            live_size = live.len(),
            "drift evaluated"
        );

        Ok(DriftReport {
            features,
            prediction,
            n_drifted,
            drifted_share,
            drift_share_threshold: self.config.drift_share,
            dataset_drift,
            reference_size: reference.len(),
            live_size: live.len(),
            generated_at: Utc::now(),
        })
    }

    /// Evaluate the most recent `batch_size` records and write the report.
    pub fn run(
        &self,
        store: &dyn PredictionStore,
        reference: &FeatureWindow,
    ) -> Result<(DriftReport, PathBuf)> {
        let records = store.recent(self.config.batch_size)?;
        let live = FeatureWindow::from_records(&records)?;
        let report = self.evaluate(reference, &live)?;
        let path = report.write_to(&self.config.reports_dir)?;
        info!(
            path = %path.display(),
            drifted = ?report.drifted_features(),
            "drift report written"
        );
        Ok((report, path))
    }
}
