//! Monitoring Module
//!
//! Process resource sampling and selective request profiling.

pub mod profiling;
pub mod system;

pub use profiling::{
    profiling_layer, ProfileArtifact, ProfileOutcome, ProfileSession, ProfilingConfig,
    ProfilingFailure, ProfilingInterceptor,
};
pub use system::{ProcessSample, ProcessSampler};
