//! Asynchronous prediction log writer
//!
//! Request handlers hand finished predictions to a bounded queue and return
//! immediately. A single background task drains the queue, stamps each record
//! with a process resource sample and appends it to the store on the blocking
//! pool. Persistence failures never reach the request; they are counted,
//! logged and broadcast to subscribers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{KickwatchError, Result};
use crate::monitoring::ProcessSampler;
use crate::storage::{NewPrediction, PredictionStore};

const FAILURE_CHANNEL_CAPACITY: usize = 64;

/// Log writer settings, populated from env vars.
#[derive(Debug, Clone)]
pub struct LogWriterConfig {
    /// Bounded queue size; records beyond it are dropped
    pub queue_capacity: usize,
    /// How long `shutdown` waits for the queue to drain
    pub shutdown_timeout_ms: u64,
}

impl Default for LogWriterConfig {
    fn default() -> Self {
        Self {
            queue_capacity: std::env::var("LOG_QUEUE_CAPACITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|&n: &usize| n > 0)
                .unwrap_or(1024),
            shutdown_timeout_ms: std::env::var("LOG_SHUTDOWN_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5000),
        }
    }
}

/// A prediction record could not be persisted
#[derive(Debug, Clone, Error)]
#[error("failed to persist prediction scored at {created_at}: {reason}")]
pub struct LoggingFailure {
    pub created_at: DateTime<Utc>,
    pub reason: String,
}

/// Counter snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogWriterStats {
    pub enqueued: u64,
    pub written: u64,
    pub failed: u64,
    pub dropped: u64,
}

#[derive(Default)]
struct Counters {
    enqueued: AtomicU64,
    written: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

enum LogCommand {
    Write(NewPrediction),
    Flush(oneshot::Sender<()>),
    Shutdown,
}

/// Cloneable handle used by the prediction path.
#[derive(Clone)]
pub struct LogWriterHandle {
    tx: mpsc::Sender<LogCommand>,
    counters: Arc<Counters>,
    failures: broadcast::Sender<LoggingFailure>,
}

impl LogWriterHandle {
    /// Queue a record without waiting. Returns false when it was dropped.
    pub fn enqueue(&self, entry: NewPrediction) -> bool {
        match self.tx.try_send(LogCommand::Write(entry)) {
            Ok(()) => {
                self.counters.enqueued.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(TrySendError::Full(_)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                warn!("prediction log queue full, record dropped");
                false
            }
            Err(TrySendError::Closed(_)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                warn!("prediction log writer stopped, record dropped");
                false
            }
        }
    }

    /// Resolves once every record enqueued before the call has been attempted
    pub async fn flush(&self) -> Result<()> {
        let (done_tx, done_rx) = oneshot::channel();
        self.tx
            .send(LogCommand::Flush(done_tx))
            .await
            .map_err(|_| KickwatchError::StorageError("log writer stopped".to_string()))?;
        done_rx
            .await
            .map_err(|_| KickwatchError::StorageError("log writer stopped".to_string()))
    }

    pub fn stats(&self) -> LogWriterStats {
        LogWriterStats {
            enqueued: self.counters.enqueued.load(Ordering::Relaxed),
            written: self.counters.written.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
        }
    }

    /// Receive every persistence failure from now on
    pub fn subscribe_failures(&self) -> broadcast::Receiver<LoggingFailure> {
        self.failures.subscribe()
    }

    /// Records waiting in the queue
    pub fn queue_depth(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }
}

/// Owner of the background task
pub struct AsyncLogWriter {
    handle: LogWriterHandle,
    task: JoinHandle<()>,
    shutdown_timeout: Duration,
}

impl AsyncLogWriter {
    pub fn handle(&self) -> LogWriterHandle {
        self.handle.clone()
    }

    /// Stop accepting records and drain the queue.
    ///
    /// Returns false if the timeout expired first; remaining records are lost.
    pub async fn shutdown(self) -> bool {
        let AsyncLogWriter {
            handle,
            mut task,
            shutdown_timeout,
        } = self;

        let drained = tokio::time::timeout(shutdown_timeout, async {
            if handle.tx.send(LogCommand::Shutdown).await.is_err() {
                debug!("log writer already stopped");
            }
            (&mut task).await
        })
        .await;

        match drained {
            Ok(_) => true,
            Err(_) => {
                warn!(
                    pending = handle.queue_depth(),
                    "log writer did not drain within {:?}, abandoning queue", shutdown_timeout
                );
                task.abort();
                false
            }
        }
    }
}

/// Spawn the background writer. Must be called inside a tokio runtime.
pub fn spawn_log_writer(config: LogWriterConfig, store: Arc<dyn PredictionStore>) -> AsyncLogWriter {
    let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
    let (failures, _) = broadcast::channel(FAILURE_CHANNEL_CAPACITY);
    let counters = Arc::new(Counters::default());

    let task = tokio::spawn(writer_loop(rx, store, counters.clone(), failures.clone()));

    AsyncLogWriter {
        handle: LogWriterHandle {
            tx,
            counters,
            failures,
        },
        task,
        shutdown_timeout: Duration::from_millis(config.shutdown_timeout_ms),
    }
}

async fn writer_loop(
    mut rx: mpsc::Receiver<LogCommand>,
    store: Arc<dyn PredictionStore>,
    counters: Arc<Counters>,
    failures: broadcast::Sender<LoggingFailure>,
) {
    let mut sampler = Some(ProcessSampler::new());

    while let Some(command) = rx.recv().await {
        match command {
            LogCommand::Write(entry) => {
                let taken = sampler.take().unwrap_or_default();
                sampler = persist(entry, taken, &store, &counters, &failures).await;
            }
            LogCommand::Flush(done) => {
                let _ = done.send(());
            }
            LogCommand::Shutdown => {
                debug!("log writer draining");
                rx.close();
            }
        }
    }
    debug!("log writer exited");
}

/// Stamp the record with a resource sample and append it, both on the
/// blocking pool. Hands the sampler back unless the task panicked.
async fn persist(
    mut entry: NewPrediction,
    mut sampler: ProcessSampler,
    store: &Arc<dyn PredictionStore>,
    counters: &Counters,
    failures: &broadcast::Sender<LoggingFailure>,
) -> Option<ProcessSampler> {
    let created_at = entry.created_at;
    let store = store.clone();
    let task = tokio::task::spawn_blocking(move || {
        if let Some(sample) = sampler.sample() {
            entry.cpu_usage_percent.get_or_insert(sample.cpu_usage_percent);
            entry.memory_usage_mb.get_or_insert(sample.memory_mb);
        }
        let result = store.append(entry);
        (sampler, result)
    });

    let (sampler, reason) = match task.await {
        Ok((sampler, Ok(record))) => {
            counters.written.fetch_add(1, Ordering::Relaxed);
            debug!(id = record.id, status = record.status_code, "prediction logged");
            return Some(sampler);
        }
        Ok((sampler, Err(e))) => (Some(sampler), e.to_string()),
        Err(e) => (None, format!("store task panicked: {}", e)),
    };

    counters.failed.fetch_add(1, Ordering::Relaxed);
    let failure = LoggingFailure { created_at, reason };
    warn!("{}", failure);
    // No subscribers is fine
    let _ = failures.send(failure);
    sampler
}
