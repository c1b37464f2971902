//! Prediction storage
//!
//! The core only needs append / read / delete over prediction records.
//! [`PredictionStore`] is that capability; [`InMemoryStore`] and
//! [`SqliteStore`] are the two backends shipped with the service.

mod memory;
mod sqlite;

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

use crate::error::Result;
use crate::features::FeatureVector;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Status recorded for a prediction the model served
pub const STATUS_OK: u16 = 200;
/// Status recorded when the model failed to score a valid request
pub const STATUS_SCORING_FAILED: u16 = 500;

/// A prediction attempt waiting to be persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPrediction {
    #[serde(flatten)]
    pub features: FeatureVector,
    /// `None` when scoring failed
    pub prediction: Option<f64>,
    pub confidence: f64,
    pub latency_ms: f64,
    pub cpu_usage_percent: Option<f64>,
    pub memory_usage_mb: Option<f64>,
    pub status_code: u16,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl NewPrediction {
    /// A successfully scored prediction
    pub fn scored(features: FeatureVector, prediction: f64, confidence: f64, latency_ms: f64) -> Self {
        Self {
            features,
            prediction: Some(prediction),
            confidence,
            latency_ms,
            cpu_usage_percent: None,
            memory_usage_mb: None,
            status_code: STATUS_OK,
            error_message: None,
            created_at: Utc::now(),
        }
    }

    /// A valid request the model could not score
    pub fn failed(features: FeatureVector, error: impl Into<String>, latency_ms: f64) -> Self {
        Self {
            features,
            prediction: None,
            confidence: 0.0,
            latency_ms,
            cpu_usage_percent: None,
            memory_usage_mb: None,
            status_code: STATUS_SCORING_FAILED,
            error_message: Some(error.into()),
            created_at: Utc::now(),
        }
    }
}

/// Durable log entry for one prediction attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    /// Monotonic id assigned by the store
    pub id: i64,
    #[serde(flatten)]
    pub features: FeatureVector,
    pub prediction: Option<f64>,
    pub confidence: f64,
    pub latency_ms: f64,
    pub cpu_usage_percent: Option<f64>,
    pub memory_usage_mb: Option<f64>,
    pub status_code: u16,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl PredictionRecord {
    /// Attach a store-assigned id to a pending prediction
    pub fn from_new(id: i64, entry: NewPrediction) -> Self {
        Self {
            id,
            features: entry.features,
            prediction: entry.prediction,
            confidence: entry.confidence,
            latency_ms: entry.latency_ms,
            cpu_usage_percent: entry.cpu_usage_percent,
            memory_usage_mb: entry.memory_usage_mb,
            status_code: entry.status_code,
            error_message: entry.error_message,
            created_at: entry.created_at,
        }
    }

    /// True when the model served this prediction
    pub fn is_success(&self) -> bool {
        self.status_code == STATUS_OK && self.prediction.is_some()
    }
}

/// Append / read / delete capability over prediction records.
///
/// Implementations must tolerate concurrent callers; the core never
/// serializes access itself. Calls may block, so async callers should run
/// them on a blocking thread.
pub trait PredictionStore: Send + Sync {
    /// Persist a prediction and return it with its assigned id
    fn append(&self, entry: NewPrediction) -> Result<PredictionRecord>;

    /// Fetch one record by id
    fn get(&self, id: i64) -> Result<Option<PredictionRecord>>;

    /// Records in id order, paginated
    fn list(&self, skip: usize, limit: usize) -> Result<Vec<PredictionRecord>>;

    /// The `limit` most recent records, in id order
    fn recent(&self, limit: usize) -> Result<Vec<PredictionRecord>>;

    /// Delete a record; returns false when it did not exist
    fn delete(&self, id: i64) -> Result<bool>;

    fn count(&self) -> Result<usize>;

    /// Cheap reachability check used by the readiness predicate
    fn ping(&self) -> Result<()>;
}

/// Open the store named by a database path; `:memory:` selects the in-memory backend
pub fn open_store(database_path: &str) -> Result<Arc<dyn PredictionStore>> {
    if database_path == ":memory:" {
        return Ok(Arc::new(InMemoryStore::new()));
    }
    if let Some(parent) = std::path::Path::new(database_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let store = SqliteStore::open(database_path)?;
    store.migrate()?;
    Ok(Arc::new(store))
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_serializes_flat() {
        let record = PredictionRecord::from_new(7, test_support::entry(30.0, 0.8));
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["distance"], 30.0);
        assert_eq!(json["is_left_footed"], true);
        assert_eq!(json["prediction"], 0.8);
        assert_eq!(json["status_code"], 200);
        assert!(json["error_message"].is_null());
        assert!(json.get("features").is_none());
    }

    #[test]
    fn test_failed_attempt_record() {
        let features = test_support::entry(30.0, 0.5).features;
        let record = PredictionRecord::from_new(3, NewPrediction::failed(features, "nan logit", 0.2));
        assert!(!record.is_success());
        assert_eq!(record.status_code, STATUS_SCORING_FAILED);
        assert_eq!(record.prediction, None);
        assert_eq!(record.error_message.as_deref(), Some("nan logit"));
    }

    #[test]
    fn test_open_memory_store() {
        let store = open_store(":memory:").unwrap();
        assert_eq!(store.count().unwrap(), 0);
        assert!(store.ping().is_ok());
    }

    #[test]
    fn test_open_sqlite_store_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("predictions.db");
        let store = open_store(path.to_str().unwrap()).unwrap();
        store.append(test_support::entry(20.0, 0.4)).unwrap();
        assert_eq!(store.count().unwrap(), 1);
    }
}
