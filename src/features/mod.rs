//! Feature catalogue
//!
//! The classifier consumes a fixed eleven-field vector. [`Feature`] enumerates
//! the fields in model input order and carries their kind and valid range;
//! [`FeatureVector`] is the validated, immutable input record.

mod vector;

pub use vector::{FeatureVector, Flag, RawFeatures};

use serde::{Deserialize, Serialize};

/// Number of features consumed by the classifier
pub const N_FEATURES: usize = 11;

/// Statistical kind of a feature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    /// Bounded real-valued feature
    Continuous,
    /// Two-valued flag, stored as 0.0 / 1.0 in numeric views
    Boolean,
}

/// A named input feature, in model input order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    TimeNorm,
    Distance,
    Angle,
    WindSpeed,
    PrecipitationProbability,
    IsLeftFooted,
    GameAway,
    IsEndgame,
    IsStart,
    IsLeftSide,
    HasPreviousAttempts,
}

impl Feature {
    /// All features in model input order
    pub const ALL: [Feature; N_FEATURES] = [
        Feature::TimeNorm,
        Feature::Distance,
        Feature::Angle,
        Feature::WindSpeed,
        Feature::PrecipitationProbability,
        Feature::IsLeftFooted,
        Feature::GameAway,
        Feature::IsEndgame,
        Feature::IsStart,
        Feature::IsLeftSide,
        Feature::HasPreviousAttempts,
    ];

    /// Column name used in requests, records and CSV files
    pub fn name(&self) -> &'static str {
        match self {
            Feature::TimeNorm => "time_norm",
            Feature::Distance => "distance",
            Feature::Angle => "angle",
            Feature::WindSpeed => "wind_speed",
            Feature::PrecipitationProbability => "precipitation_probability",
            Feature::IsLeftFooted => "is_left_footed",
            Feature::GameAway => "game_away",
            Feature::IsEndgame => "is_endgame",
            Feature::IsStart => "is_start",
            Feature::IsLeftSide => "is_left_side",
            Feature::HasPreviousAttempts => "has_previous_attempts",
        }
    }

    /// Position in the model input vector
    pub fn index(&self) -> usize {
        Self::ALL
            .iter()
            .position(|f| f == self)
            .unwrap_or_default()
    }

    pub fn kind(&self) -> FeatureKind {
        match self {
            Feature::TimeNorm
            | Feature::Distance
            | Feature::Angle
            | Feature::WindSpeed
            | Feature::PrecipitationProbability => FeatureKind::Continuous,
            _ => FeatureKind::Boolean,
        }
    }

    /// Closed valid range for continuous features
    pub fn bounds(&self) -> Option<(f64, f64)> {
        match self {
            Feature::TimeNorm => Some((0.0, 1.0)),
            Feature::Distance => Some((2.0, 100.0)),
            Feature::Angle => Some((0.0, 90.0)),
            Feature::WindSpeed => Some((0.0, 50.0)),
            Feature::PrecipitationProbability => Some((0.0, 1.0)),
            _ => None,
        }
    }

    /// Column names in model input order
    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(|f| f.name()).collect()
    }
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
