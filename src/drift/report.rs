//! Drift report artifact

use crate::error::{KickwatchError, Result};
use crate::features::FeatureKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Suffixes tried before giving up on a free report name
const MAX_NAME_ATTEMPTS: usize = 1000;

/// Statistic used to judge one column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftStatistic {
    Psi,
    ProportionDifference,
}

/// Per-column drift outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureDrift {
    pub feature: String,
    pub kind: FeatureKind,
    pub statistic: DriftStatistic,
    pub score: f64,
    pub threshold: f64,
    pub drifted: bool,
    pub reference_mean: f64,
    pub live_mean: f64,
    /// Two-sample KS statistic, reported for continuous columns
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub ks_statistic: Option<f64>,
}

/// Outcome of one drift evaluation. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftReport {
    pub features: Vec<FeatureDrift>,
    /// Drift of the model output; informational, not part of the dataset share
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub prediction: Option<FeatureDrift>,
    pub n_drifted: usize,
    pub drifted_share: f64,
    pub drift_share_threshold: f64,
    pub dataset_drift: bool,
    pub reference_size: usize,
    pub live_size: usize,
    pub generated_at: DateTime<Utc>,
}

impl DriftReport {
    /// Get drifted feature names
    pub fn drifted_features(&self) -> Vec<&str> {
        self.features
            .iter()
            .filter(|f| f.drifted)
            .map(|f| f.feature.as_str())
            .collect()
    }

    pub fn feature(&self, name: &str) -> Option<&FeatureDrift> {
        self.features.iter().find(|f| f.feature == name)
    }

    /// `drift_report_<%Y%m%d_%H%M%S_%6f>.json`
    pub fn file_name(&self) -> String {
        format!("drift_report_{}.json", self.timestamp())
    }

    fn timestamp(&self) -> String {
        self.generated_at.format("%Y%m%d_%H%M%S_%6f").to_string()
    }

    /// Write the report into `dir` as a new file.
    ///
    /// The file appears atomically and never replaces an earlier report; on a
    /// name clash a `_<n>` suffix is added.
    pub fn write_to(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let tmp = dir.join(format!(".{}.tmp", self.file_name()));
        std::fs::write(&tmp, serde_json::to_vec_pretty(self)?)?;

        let result = self.link_unique(dir, &tmp);
        // The hard link (if any) keeps the data alive
        let _ = std::fs::remove_file(&tmp);
        result
    }

    fn link_unique(&self, dir: &Path, tmp: &Path) -> Result<PathBuf> {
        for n in 0..MAX_NAME_ATTEMPTS {
            let name = match n {
                0 => self.file_name(),
                n => format!("drift_report_{}_{}.json", self.timestamp(), n),
            };
            let path = dir.join(name);
            match std::fs::hard_link(tmp, &path) {
                Ok(()) => return Ok(path),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(KickwatchError::IoError(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!("no free report name for {}", self.file_name()),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry(name: &str, drifted: bool) -> FeatureDrift {
        FeatureDrift {
            feature: name.to_string(),
            kind: FeatureKind::Continuous,
            statistic: DriftStatistic::Psi,
            score: if drifted { 1.5 } else { 0.01 },
            threshold: 0.2,
            drifted,
            reference_mean: 30.0,
            live_mean: if drifted { 97.0 } else { 30.0 },
            ks_statistic: Some(0.1),
        }
    }

    fn report() -> DriftReport {
        DriftReport {
            features: vec![entry("distance", true), entry("angle", false)],
            prediction: None,
            n_drifted: 1,
            drifted_share: 0.5,
            drift_share_threshold: 0.5,
            dataset_drift: false,
            reference_size: 1000,
            live_size: 200,
            generated_at: Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap(),
        }
    }

    #[test]
    fn test_drifted_features() {
        let r = report();
        assert_eq!(r.drifted_features(), vec!["distance"]);
        assert!(!r.feature("angle").unwrap().drifted);
        assert!(r.feature("wind_speed").is_none());
    }

    #[test]
    fn test_write_to() {
        let dir = tempfile::tempdir().unwrap();
        let path = report().write_to(dir.path().join("reports")).unwrap();
        assert_eq!(path.file_name().unwrap(), "drift_report_20240501_083000_000000.json");

        let parsed: DriftReport = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(parsed.n_drifted, 1);
        assert!(parsed.feature("distance").unwrap().drifted);

        let files: Vec<_> = std::fs::read_dir(path.parent().unwrap()).unwrap().collect();
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn test_same_timestamp_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let first = report().write_to(dir.path()).unwrap();

        let mut second = report();
        second.n_drifted = 2;
        let second_path = second.write_to(dir.path()).unwrap();

        assert_ne!(first, second_path);
        assert_eq!(
            second_path.file_name().unwrap(),
            "drift_report_20240501_083000_000000_1.json"
        );
        let kept: DriftReport = serde_json::from_slice(&std::fs::read(&first).unwrap()).unwrap();
        assert_eq!(kept.n_drifted, 1);

        let files: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(files.len(), 2);
    }
}
