//! In-memory prediction store

use crate::error::Result;
use super::{NewPrediction, PredictionRecord, PredictionStore};
use parking_lot::RwLock;
use std::collections::BTreeMap;

struct StoreInner {
    next_id: i64,
    records: BTreeMap<i64, PredictionRecord>,
}

/// Process-local store, used for tests and `DATABASE_PATH=:memory:`
pub struct InMemoryStore {
    inner: RwLock<StoreInner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(StoreInner {
                next_id: 1,
                records: BTreeMap::new(),
            }),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PredictionStore for InMemoryStore {
    fn append(&self, entry: NewPrediction) -> Result<PredictionRecord> {
        let mut inner = self.inner.write();
        let id = inner.next_id;
        inner.next_id += 1;
        let record = PredictionRecord::from_new(id, entry);
        inner.records.insert(id, record.clone());
        Ok(record)
    }

    fn get(&self, id: i64) -> Result<Option<PredictionRecord>> {
        Ok(self.inner.read().records.get(&id).cloned())
    }

    fn list(&self, skip: usize, limit: usize) -> Result<Vec<PredictionRecord>> {
        Ok(self
            .inner
            .read()
            .records
            .values()
            .skip(skip)
            .take(limit)
            .cloned()
            .collect())
    }

    fn recent(&self, limit: usize) -> Result<Vec<PredictionRecord>> {
        let inner = self.inner.read();
        let mut out: Vec<PredictionRecord> =
            inner.records.values().rev().take(limit).cloned().collect();
        out.reverse();
        Ok(out)
    }

    fn delete(&self, id: i64) -> Result<bool> {
        Ok(self.inner.write().records.remove(&id).is_some())
    }

    fn count(&self) -> Result<usize> {
        Ok(self.inner.read().records.len())
    }

    fn ping(&self) -> Result<()> {
        Ok(())
    }
}
