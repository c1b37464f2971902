//! Prediction service and its background log writer

pub mod log_writer;
mod prediction;

pub use log_writer::{
    spawn_log_writer, AsyncLogWriter, LogWriterConfig, LogWriterHandle, LogWriterStats,
    LoggingFailure,
};
pub use prediction::{PredictionResult, PredictionService};
