//! SQLite prediction store

use crate::error::{KickwatchError, Result};
use crate::features::{FeatureVector, Flag, RawFeatures};
use super::{NewPrediction, PredictionRecord, PredictionStore};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

const SCHEMA_V1: &str = "
CREATE TABLE IF NOT EXISTS prediction_inputs (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  time_norm REAL NOT NULL,
  distance REAL NOT NULL,
  angle REAL NOT NULL,
  wind_speed REAL NOT NULL,
  precipitation_probability REAL NOT NULL,
  is_left_footed INTEGER NOT NULL,
  game_away INTEGER NOT NULL,
  is_endgame INTEGER NOT NULL,
  is_start INTEGER NOT NULL,
  is_left_side INTEGER NOT NULL,
  has_previous_attempts INTEGER NOT NULL,
  prediction REAL,
  confidence REAL NOT NULL,
  latency_ms REAL NOT NULL,
  cpu_usage_percent REAL,
  memory_usage_mb REAL,
  status_code INTEGER NOT NULL DEFAULT 200,
  error_message TEXT,
  created_at TEXT NOT NULL
);
";

const SELECT_COLUMNS: &str = "id, time_norm, distance, angle, wind_speed, precipitation_probability,
  is_left_footed, game_away, is_endgame, is_start, is_left_side, has_previous_attempts,
  prediction, confidence, latency_ms, cpu_usage_percent, memory_usage_mb,
  status_code, error_message, created_at";

/// Column values as read from SQLite, before validation
struct RowData {
    id: i64,
    continuous: [f64; 5],
    flags: [i64; 6],
    prediction: Option<f64>,
    confidence: f64,
    latency_ms: f64,
    cpu_usage_percent: Option<f64>,
    memory_usage_mb: Option<f64>,
    status_code: u16,
    error_message: Option<String>,
    created_at: String,
}

impl RowData {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            continuous: [row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?, row.get(5)?],
            flags: [
                row.get(6)?,
                row.get(7)?,
                row.get(8)?,
                row.get(9)?,
                row.get(10)?,
                row.get(11)?,
            ],
            prediction: row.get(12)?,
            confidence: row.get(13)?,
            latency_ms: row.get(14)?,
            cpu_usage_percent: row.get(15)?,
            memory_usage_mb: row.get(16)?,
            status_code: row.get(17)?,
            error_message: row.get(18)?,
            created_at: row.get(19)?,
        })
    }

    fn into_record(self) -> Result<PredictionRecord> {
        let [time_norm, distance, angle, wind_speed, precipitation_probability] = self.continuous;
        let [f0, f1, f2, f3, f4, f5] = self.flags.map(Flag::Int);
        let features = FeatureVector::new(RawFeatures {
            time_norm,
            distance,
            angle,
            wind_speed,
            precipitation_probability,
            is_left_footed: f0,
            game_away: f1,
            is_endgame: f2,
            is_start: f3,
            is_left_side: f4,
            has_previous_attempts: f5,
        })
        .map_err(|e| KickwatchError::StorageError(format!("corrupt row {}: {}", self.id, e)))?;

        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map_err(|e| KickwatchError::StorageError(format!("bad timestamp in row {}: {}", self.id, e)))?
            .with_timezone(&Utc);

        Ok(PredictionRecord {
            id: self.id,
            features,
            prediction: self.prediction,
            confidence: self.confidence,
            latency_ms: self.latency_ms,
            cpu_usage_percent: self.cpu_usage_percent,
            memory_usage_mb: self.memory_usage_mb,
            status_code: self.status_code,
            error_message: self.error_message,
            created_at,
        })
    }
}

/// Prediction store backed by a single SQLite connection
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a database file
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;",
        )?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Private in-memory database, mostly for tests
    pub fn open_in_memory() -> Result<Self> {
        let store = Self { conn: Mutex::new(Connection::open_in_memory()?) };
        store.migrate()?;
        Ok(store)
    }

    /// Create the predictions table if it does not exist
    pub fn migrate(&self) -> Result<()> {
        self.conn.lock().execute_batch(SCHEMA_V1)?;
        Ok(())
    }

    fn query(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<PredictionRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, RowData::read)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(RowData::into_record).collect()
    }
}

impl PredictionStore for SqliteStore {
    fn append(&self, entry: NewPrediction) -> Result<PredictionRecord> {
        let f = &entry.features;
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO prediction_inputs (
                time_norm, distance, angle, wind_speed, precipitation_probability,
                is_left_footed, game_away, is_endgame, is_start, is_left_side, has_previous_attempts,
                prediction, confidence, latency_ms, cpu_usage_percent, memory_usage_mb,
                status_code, error_message, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)",
            params![
                f.time_norm(),
                f.distance(),
                f.angle(),
                f.wind_speed(),
                f.precipitation_probability(),
                f.is_left_footed(),
                f.game_away(),
                f.is_endgame(),
                f.is_start(),
                f.is_left_side(),
                f.has_previous_attempts(),
                entry.prediction,
                entry.confidence,
                entry.latency_ms,
                entry.cpu_usage_percent,
                entry.memory_usage_mb,
                entry.status_code,
                entry.error_message,
                entry.created_at.to_rfc3339(),
            ],
        )?;
        let id = conn.last_insert_rowid();
        Ok(PredictionRecord::from_new(id, entry))
    }

    fn get(&self, id: i64) -> Result<Option<PredictionRecord>> {
        let sql = format!("SELECT {} FROM prediction_inputs WHERE id = ?1", SELECT_COLUMNS);
        let row = {
            let conn = self.conn.lock();
            conn.query_row(&sql, params![id], RowData::read).optional()?
        };
        row.map(RowData::into_record).transpose()
    }

    fn list(&self, skip: usize, limit: usize) -> Result<Vec<PredictionRecord>> {
        let sql = format!(
            "SELECT {} FROM prediction_inputs ORDER BY id LIMIT ?1 OFFSET ?2",
            SELECT_COLUMNS
        );
        self.query(&sql, params![limit as i64, skip as i64])
    }

    fn recent(&self, limit: usize) -> Result<Vec<PredictionRecord>> {
        let sql = format!(
            "SELECT * FROM (SELECT {} FROM prediction_inputs ORDER BY id DESC LIMIT ?1) ORDER BY id",
            SELECT_COLUMNS
        );
        self.query(&sql, params![limit as i64])
    }

    fn delete(&self, id: i64) -> Result<bool> {
        let affected = self
            .conn
            .lock()
            .execute("DELETE FROM prediction_inputs WHERE id = ?1", params![id])?;
        Ok(affected > 0)
    }

    fn count(&self) -> Result<usize> {
        let n: i64 = self
            .conn
            .lock()
            .query_row("SELECT COUNT(*) FROM prediction_inputs", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    fn ping(&self) -> Result<()> {
        self.conn.lock().query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }
}
