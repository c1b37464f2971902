//! Validated feature vector

use crate::error::{KickwatchError, Result};
use super::{Feature, N_FEATURES};
use serde::{Deserialize, Serialize};

/// Boolean flag as sent by clients: `true`/`false` or `0`/`1`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Flag {
    Bool(bool),
    Int(i64),
}

impl Flag {
    fn resolve(self, feature: Feature) -> Result<bool> {
        match self {
            Flag::Bool(b) => Ok(b),
            Flag::Int(0) => Ok(false),
            Flag::Int(1) => Ok(true),
            Flag::Int(other) => Err(KickwatchError::ValidationError(format!(
                "{} must be 0 or 1, got {}",
                feature, other
            ))),
        }
    }
}

impl From<bool> for Flag {
    fn from(value: bool) -> Self {
        Flag::Bool(value)
    }
}

/// Unvalidated prediction input, as received from the request layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawFeatures {
    pub time_norm: f64,
    pub distance: f64,
    pub angle: f64,
    pub wind_speed: f64,
    pub precipitation_probability: f64,
    pub is_left_footed: Flag,
    pub game_away: Flag,
    pub is_endgame: Flag,
    pub is_start: Flag,
    pub is_left_side: Flag,
    pub has_previous_attempts: Flag,
}

/// Validated, immutable model input.
///
/// Every continuous field is finite and inside its closed range. Values can
/// only be obtained through [`FeatureVector::new`] (or deserialization, which
/// goes through the same checks).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawFeatures")]
pub struct FeatureVector {
    time_norm: f64,
    distance: f64,
    angle: f64,
    wind_speed: f64,
    precipitation_probability: f64,
    is_left_footed: bool,
    game_away: bool,
    is_endgame: bool,
    is_start: bool,
    is_left_side: bool,
    has_previous_attempts: bool,
}

fn check_range(feature: Feature, value: f64) -> Result<f64> {
    let (lo, hi) = feature.bounds().unwrap_or((f64::NEG_INFINITY, f64::INFINITY));
    if !value.is_finite() || value < lo || value > hi {
        return Err(KickwatchError::ValidationError(format!(
            "{} must be within [{}, {}], got {}",
            feature, lo, hi, value
        )));
    }
    Ok(value)
}

impl FeatureVector {
    /// Validate raw input and build a feature vector
    pub fn new(raw: RawFeatures) -> Result<Self> {
        Ok(Self {
            time_norm: check_range(Feature::TimeNorm, raw.time_norm)?,
            distance: check_range(Feature::Distance, raw.distance)?,
            angle: check_range(Feature::Angle, raw.angle)?,
            wind_speed: check_range(Feature::WindSpeed, raw.wind_speed)?,
            precipitation_probability: check_range(
                Feature::PrecipitationProbability,
                raw.precipitation_probability,
            )?,
            is_left_footed: raw.is_left_footed.resolve(Feature::IsLeftFooted)?,
            game_away: raw.game_away.resolve(Feature::GameAway)?,
            is_endgame: raw.is_endgame.resolve(Feature::IsEndgame)?,
            is_start: raw.is_start.resolve(Feature::IsStart)?,
            is_left_side: raw.is_left_side.resolve(Feature::IsLeftSide)?,
            has_previous_attempts: raw
                .has_previous_attempts
                .resolve(Feature::HasPreviousAttempts)?,
        })
    }

    /// Build a vector from numeric values in model input order.
    /// Boolean features treat any non-zero value as `true`.
    pub fn from_values(values: &[f64]) -> Result<Self> {
        if values.len() != N_FEATURES {
            return Err(KickwatchError::ShapeError {
                expected: format!("{} features", N_FEATURES),
                actual: format!("{} features", values.len()),
            });
        }
        let flag = |f: Feature| Flag::Bool(values[f.index()] != 0.0);
        Self::new(RawFeatures {
            time_norm: values[Feature::TimeNorm.index()],
            distance: values[Feature::Distance.index()],
            angle: values[Feature::Angle.index()],
            wind_speed: values[Feature::WindSpeed.index()],
            precipitation_probability: values[Feature::PrecipitationProbability.index()],
            is_left_footed: flag(Feature::IsLeftFooted),
            game_away: flag(Feature::GameAway),
            is_endgame: flag(Feature::IsEndgame),
            is_start: flag(Feature::IsStart),
            is_left_side: flag(Feature::IsLeftSide),
            has_previous_attempts: flag(Feature::HasPreviousAttempts),
        })
    }

    pub fn time_norm(&self) -> f64 {
        self.time_norm
    }

    pub fn distance(&self) -> f64 {
        self.distance
    }

    pub fn angle(&self) -> f64 {
        self.angle
    }

    pub fn wind_speed(&self) -> f64 {
        self.wind_speed
    }

    pub fn precipitation_probability(&self) -> f64 {
        self.precipitation_probability
    }

    pub fn is_left_footed(&self) -> bool {
        self.is_left_footed
    }

    pub fn game_away(&self) -> bool {
        self.game_away
    }

    pub fn is_endgame(&self) -> bool {
        self.is_endgame
    }

    pub fn is_start(&self) -> bool {
        self.is_start
    }

    pub fn is_left_side(&self) -> bool {
        self.is_left_side
    }

    pub fn has_previous_attempts(&self) -> bool {
        self.has_previous_attempts
    }

    /// Numeric value of a single feature (flags map to 0.0 / 1.0)
    pub fn value(&self, feature: Feature) -> f64 {
        let flag = |b: bool| if b { 1.0 } else { 0.0 };
        match feature {
            Feature::TimeNorm => self.time_norm,
            Feature::Distance => self.distance,
            Feature::Angle => self.angle,
            Feature::WindSpeed => self.wind_speed,
            Feature::PrecipitationProbability => self.precipitation_probability,
            Feature::IsLeftFooted => flag(self.is_left_footed),
            Feature::GameAway => flag(self.game_away),
            Feature::IsEndgame => flag(self.is_endgame),
            Feature::IsStart => flag(self.is_start),
            Feature::IsLeftSide => flag(self.is_left_side),
            Feature::HasPreviousAttempts => flag(self.has_previous_attempts),
        }
    }

    /// Model input in catalogue order
    pub fn to_array(&self) -> [f64; N_FEATURES] {
        let mut out = [0.0; N_FEATURES];
        for (slot, feature) in out.iter_mut().zip(Feature::ALL.iter()) {
            *slot = self.value(*feature);
        }
        out
    }
}

impl TryFrom<RawFeatures> for FeatureVector {
    type Error = KickwatchError;

    fn try_from(raw: RawFeatures) -> Result<Self> {
        Self::new(raw)
    }
}

impl From<FeatureVector> for RawFeatures {
    fn from(v: FeatureVector) -> Self {
        Self {
            time_norm: v.time_norm,
            distance: v.distance,
            angle: v.angle,
            wind_speed: v.wind_speed,
            precipitation_probability: v.precipitation_probability,
            is_left_footed: v.is_left_footed.into(),
            game_away: v.game_away.into(),
            is_endgame: v.is_endgame.into(),
            is_start: v.is_start.into(),
            is_left_side: v.is_left_side.into(),
            has_previous_attempts: v.has_previous_attempts.into(),
        }
    }
}
