//! Data drift detection methods

use crate::drift::{DriftDetector, DriftResult};
use crate::error::{KickwatchError, Result};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Floor applied to bin proportions so empty bins do not blow up the log
const PSI_EPSILON: f64 = 0.0001;

fn ensure_non_empty(reference: &Array1<f64>, test: &Array1<f64>) -> Result<()> {
    if reference.is_empty() || test.is_empty() {
        return Err(KickwatchError::ValidationError(
            "Empty arrays provided".to_string(),
        ));
    }
    Ok(())
}

fn sorted(data: &Array1<f64>) -> Vec<f64> {
    let mut v: Vec<f64> = data.iter().copied().collect();
    v.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    v
}

/// Two-sample Kolmogorov-Smirnov statistic: the largest distance between the
/// empirical CDFs of `reference` and `test`. Reported alongside PSI, never
/// used to flag drift.
pub fn ks_statistic(reference: &Array1<f64>, test: &Array1<f64>) -> f64 {
    let a = sorted(reference);
    let b = sorted(test);
    let (n1, n2) = (a.len() as f64, b.len() as f64);
    let (mut i, mut j) = (0, 0);
    let mut d: f64 = 0.0;

    while i < a.len() && j < b.len() {
        let x = a[i].min(b[j]);
        while i < a.len() && a[i] <= x {
            i += 1;
        }
        while j < b.len() && b[j] <= x {
            j += 1;
        }
        d = d.max((i as f64 / n1 - j as f64 / n2).abs());
    }
    d
}

/// Population Stability Index with bins cut at reference quantiles
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopulationStabilityIndex {
    n_bins: usize,
    threshold: f64,
}

impl PopulationStabilityIndex {
    pub fn new(n_bins: usize) -> Self {
        Self {
            n_bins: n_bins.max(2),
            threshold: 0.2,
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold.max(0.0);
        self
    }

    /// Inner bin edges: the reference quantiles at i / n_bins
    fn compute_bin_edges(&self, sorted_ref: &[f64]) -> Vec<f64> {
        (1..self.n_bins)
            .map(|i| sorted_ref[(i * sorted_ref.len()) / self.n_bins])
            .collect()
    }

    /// Bin `i` holds values in `(edge[i-1], edge[i]]`, open at both ends
    fn bin_proportions(&self, data: &Array1<f64>, edges: &[f64]) -> Vec<f64> {
        let n = data.len() as f64;
        let mut counts = vec![0usize; self.n_bins];
        for &value in data.iter() {
            counts[edges.partition_point(|&e| e < value)] += 1;
        }
        counts
            .iter()
            .map(|&c| (c as f64 / n).max(PSI_EPSILON))
            .collect()
    }

    pub fn psi(&self, reference: &Array1<f64>, test: &Array1<f64>) -> f64 {
        let edges = self.compute_bin_edges(&sorted(reference));
        let ref_props = self.bin_proportions(reference, &edges);
        let test_props = self.bin_proportions(test, &edges);

        ref_props
            .iter()
            .zip(test_props.iter())
            .map(|(&p_ref, &p_test)| (p_test - p_ref) * (p_test / p_ref).ln())
            .sum()
    }
}

impl DriftDetector for PopulationStabilityIndex {
    fn detect(&self, reference: &Array1<f64>, test: &Array1<f64>) -> Result<DriftResult> {
        ensure_non_empty(reference, test)?;

        let psi = self.psi(reference, test);
        if psi > self.threshold {
            Ok(DriftResult::drift(
                psi,
                self.threshold,
                &format!("PSI ({:.4}) exceeds threshold ({:.4})", psi, self.threshold),
            ))
        } else {
            Ok(DriftResult::no_drift(psi, self.threshold))
        }
    }
}

/// Absolute difference in the share of true values of a 0/1 column
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProportionDifference {
    threshold: f64,
}

impl ProportionDifference {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold: threshold.clamp(0.0, 1.0),
        }
    }

    fn proportion(data: &Array1<f64>) -> f64 {
        data.iter().filter(|&&v| v != 0.0).count() as f64 / data.len() as f64
    }
}

impl DriftDetector for ProportionDifference {
    fn detect(&self, reference: &Array1<f64>, test: &Array1<f64>) -> Result<DriftResult> {
        ensure_non_empty(reference, test)?;

        let p_ref = Self::proportion(reference);
        let p_test = Self::proportion(test);
        let diff = (p_ref - p_test).abs();
        if diff > self.threshold {
            Ok(DriftResult::drift(
                diff,
                self.threshold,
                &format!(
                    "share of true values moved from {:.3} to {:.3}",
                    p_ref, p_test
                ),
            ))
        } else {
            Ok(DriftResult::no_drift(diff, self.threshold))
        }
    }
}
