//! Column-oriented sample windows for drift evaluation

use crate::error::{KickwatchError, Result};
use crate::features::{Feature, FeatureVector, N_FEATURES};
use crate::storage::PredictionRecord;
use ndarray::{Array1, Array2};
use polars::prelude::*;
use std::path::Path;

/// Column holding model outputs, when a window carries them
pub const PREDICTION_COLUMN: &str = "prediction";

/// A bounded batch of feature rows, one column per catalogue feature
#[derive(Debug, Clone)]
pub struct FeatureWindow {
    /// `len x N_FEATURES`, columns in catalogue order
    data: Array2<f64>,
    predictions: Option<Array1<f64>>,
}

impl FeatureWindow {
    fn from_rows(rows: Vec<[f64; N_FEATURES]>, predictions: Option<Vec<f64>>) -> Result<Self> {
        let n = rows.len();
        let flat: Vec<f64> = rows.into_iter().flatten().collect();
        let data = Array2::from_shape_vec((n, N_FEATURES), flat).map_err(|e| {
            KickwatchError::ShapeError {
                expected: format!("{} x {}", n, N_FEATURES),
                actual: e.to_string(),
            }
        })?;
        Ok(Self {
            data,
            predictions: predictions.map(Array1::from_vec),
        })
    }

    pub fn from_vectors(vectors: &[FeatureVector]) -> Result<Self> {
        Self::from_rows(vectors.iter().map(FeatureVector::to_array).collect(), None)
    }

    /// Window over logged predictions, including their model outputs.
    /// Failed attempts carry no prediction and are left out.
    pub fn from_records(records: &[PredictionRecord]) -> Result<Self> {
        let served: Vec<(&PredictionRecord, f64)> = records
            .iter()
            .filter(|r| r.is_success())
            .filter_map(|r| Some((r, r.prediction?)))
            .collect();
        Self::from_rows(
            served.iter().map(|(r, _)| r.features.to_array()).collect(),
            Some(served.iter().map(|(_, p)| *p).collect()),
        )
    }

    /// Load a reference window from CSV.
    ///
    /// Every catalogue feature must be present as a column. Other columns
    /// (the training target, for instance) are ignored, except an optional
    /// `prediction` column.
    pub fn from_csv(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(100))
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish()?;
        Self::from_dataframe(&df)
    }

    pub fn from_dataframe(df: &DataFrame) -> Result<Self> {
        let n = df.height();
        let mut data = Array2::<f64>::zeros((n, N_FEATURES));

        for feature in Feature::ALL {
            let values = numeric_column(df, feature.name())?;
            data.column_mut(feature.index())
                .assign(&Array1::from_vec(values));
        }

        let predictions = if df.get_column_names().iter().any(|c| c.as_str() == PREDICTION_COLUMN) {
            Some(Array1::from_vec(numeric_column(df, PREDICTION_COLUMN)?))
        } else {
            None
        };

        Ok(Self { data, predictions })
    }

    pub fn len(&self) -> usize {
        self.data.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.data.nrows() == 0
    }

    pub fn column(&self, feature: Feature) -> Array1<f64> {
        self.data.column(feature.index()).to_owned()
    }

    pub fn predictions(&self) -> Option<&Array1<f64>> {
        self.predictions.as_ref()
    }

    /// Row `i` as model input values, in catalogue order
    pub fn row(&self, i: usize) -> Option<Vec<f64>> {
        (i < self.len()).then(|| self.data.row(i).to_vec())
    }
}

/// Read a column as finite f64 values; booleans become 0/1
fn numeric_column(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let column = df
        .column(name)
        .map_err(|_| KickwatchError::DataError(format!("missing column '{}'", name)))?;
    let cast = column.cast(&DataType::Float64)?;
    cast.f64()?
        .iter()
        .enumerate()
        .map(|(row, value)| match value {
            Some(v) if v.is_finite() => Ok(v),
            _ => Err(KickwatchError::DataError(format!(
                "column '{}' has a missing or non-finite value at row {}",
                name, row
            ))),
        })
        .collect()
}
