//! Selective per-request profiling
//!
//! A request is profiled when [`ProfilingInterceptor::should_profile`] says so.
//! Each profiled request gets a [`ProfileSession`] guard that writes exactly
//! one JSON artifact into the profiles directory, either from
//! [`ProfileSession::finish`] or, if the request never completes, from `Drop`.

use super::system::ProcessSampler;
use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{info, warn};

/// Header that opts a single request out of profiling
pub const SKIP_PROFILING_HEADER: &str = "x-skip-profiling";
/// Header carrying the wall time of a profiled request, in seconds
pub const PROCESS_TIME_HEADER: &str = "x-process-time";

const SKIPPED_USER_AGENT: &str = "python-requests";

/// Profiling settings, injected at construction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfilingConfig {
    pub enabled: bool,
    /// Only paths under this prefix are profiled
    pub include_prefix: Option<String>,
    /// Paths never profiled; matches exactly or as a `path/` prefix
    pub exclude_paths: Vec<String>,
    pub profiles_dir: PathBuf,
}

impl Default for ProfilingConfig {
    fn default() -> Self {
        let enabled = std::env::var("PROFILING_ENABLED")
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
            .unwrap_or(false);
        let include_prefix = match std::env::var("PROFILING_PREFIX") {
            Ok(p) if p.is_empty() => None,
            Ok(p) => Some(p),
            Err(_) => Some("/api".to_string()),
        };
        Self {
            enabled,
            include_prefix,
            exclude_paths: vec!["/health".to_string(), "/api/v1/health".to_string()],
            profiles_dir: std::env::var("PROFILES_DIR")
                .unwrap_or_else(|_| "profiles".to_string())
                .into(),
        }
    }
}

impl ProfilingConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_profiles_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.profiles_dir = dir.into();
        self
    }

    pub fn with_include_prefix(mut self, prefix: Option<String>) -> Self {
        self.include_prefix = prefix;
        self
    }

    pub fn with_exclude_paths(mut self, paths: Vec<String>) -> Self {
        self.exclude_paths = paths;
        self
    }
}

/// Writing a profile artifact failed. Logged and swallowed.
#[derive(Debug, Error)]
#[error("failed to write profile for {endpoint}: {reason}")]
pub struct ProfilingFailure {
    pub endpoint: String,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileOutcome {
    Completed,
    /// The handler produced a server error
    Failed,
    /// The request was dropped before a response was produced
    Aborted,
}

/// On-disk record of one profiled request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileArtifact {
    pub endpoint: String,
    pub method: String,
    pub status: Option<u16>,
    pub outcome: ProfileOutcome,
    pub started_at: DateTime<Utc>,
    pub wall_time_ms: f64,
    pub cpu_usage_percent: Option<f64>,
    pub memory_start_mb: Option<f64>,
    pub memory_end_mb: Option<f64>,
    pub memory_delta_mb: Option<f64>,
}

/// `/api/v1/predict` -> `api_v1_predict`, `/` -> `root`
pub fn endpoint_name(path: &str) -> String {
    let trimmed = path.trim_start_matches('/').trim_end_matches('/');
    if trimmed.is_empty() {
        "root".to_string()
    } else {
        trimmed.replace('/', "_")
    }
}

/// File name of the artifact for an endpoint profiled at `at`
pub fn artifact_name(endpoint: &str, at: DateTime<Utc>) -> String {
    format!("{}_{}.prof", endpoint, at.format("%Y%m%d_%H%M%S_%6f"))
}

fn write_artifact(dir: &Path, artifact: &ProfileArtifact) -> Result<PathBuf, ProfilingFailure> {
    let failure = |reason: String| ProfilingFailure {
        endpoint: artifact.endpoint.clone(),
        reason,
    };
    std::fs::create_dir_all(dir).map_err(|e| failure(e.to_string()))?;
    let name = artifact_name(&artifact.endpoint, artifact.started_at);
    let path = dir.join(&name);
    let tmp = dir.join(format!(".{}.tmp", name));
    let body = serde_json::to_vec_pretty(artifact).map_err(|e| failure(e.to_string()))?;
    std::fs::write(&tmp, body).map_err(|e| failure(e.to_string()))?;
    std::fs::rename(&tmp, &path).map_err(|e| failure(e.to_string()))?;
    Ok(path)
}

/// Decides which requests are profiled and opens sessions for them
#[derive(Debug, Clone)]
pub struct ProfilingInterceptor {
    config: Arc<ProfilingConfig>,
}

impl ProfilingInterceptor {
    pub fn new(config: ProfilingConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// Profiling predicate, evaluated once per request
    pub fn should_profile(&self, path: &str, headers: &HeaderMap) -> bool {
        if !self.config.enabled {
            return false;
        }
        if let Some(prefix) = &self.config.include_prefix {
            if !path.starts_with(prefix.as_str()) {
                return false;
            }
        }
        let excluded = self.config.exclude_paths.iter().any(|excluded| {
            path == excluded
                || path
                    .strip_prefix(excluded.as_str())
                    .map_or(false, |rest| rest.starts_with('/'))
        });
        if excluded || headers.contains_key(SKIP_PROFILING_HEADER) {
            return false;
        }
        let user_agent = headers
            .get(axum::http::header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        !user_agent.to_ascii_lowercase().contains(SKIPPED_USER_AGENT)
    }

    /// Start measuring a request
    pub fn begin(&self, method: &str, path: &str) -> ProfileSession {
        let mut sampler = ProcessSampler::new();
        let memory_start_mb = sampler.sample().map(|s| s.memory_mb);
        ProfileSession {
            dir: self.config.profiles_dir.clone(),
            endpoint: endpoint_name(path),
            method: method.to_string(),
            started_at: Utc::now(),
            start: Instant::now(),
            sampler,
            memory_start_mb,
            written: false,
        }
    }
}

/// Guard for one profiled request
pub struct ProfileSession {
    dir: PathBuf,
    endpoint: String,
    method: String,
    started_at: DateTime<Utc>,
    start: Instant,
    sampler: ProcessSampler,
    memory_start_mb: Option<f64>,
    written: bool,
}

impl ProfileSession {
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Record the response status and write the artifact.
    ///
    /// Returns the artifact path, or `None` when writing failed.
    pub fn finish(mut self, status: u16) -> Option<PathBuf> {
        let artifact = self.snapshot(Some(status), outcome_for(status));
        persist_artifact(&self.dir, &artifact)
    }

    /// Like [`finish`](Self::finish), but sampling and the file write run on
    /// the blocking pool
    pub async fn finish_async(self, status: u16) -> Option<PathBuf> {
        match tokio::task::spawn_blocking(move || self.finish(status)).await {
            Ok(path) => path,
            Err(e) => {
                warn!(target: "profiling", "profile writer task failed: {}", e);
                None
            }
        }
    }

    fn snapshot(&mut self, status: Option<u16>, outcome: ProfileOutcome) -> ProfileArtifact {
        self.written = true;
        let wall_time_ms = self.start.elapsed().as_secs_f64() * 1000.0;
        let end = self.sampler.sample();
        let memory_end_mb = end.map(|s| s.memory_mb);
        ProfileArtifact {
            endpoint: self.endpoint.clone(),
            method: self.method.clone(),
            status,
            outcome,
            started_at: self.started_at,
            wall_time_ms,
            cpu_usage_percent: end.map(|s| s.cpu_usage_percent),
            memory_start_mb: self.memory_start_mb,
            memory_end_mb,
            memory_delta_mb: self.memory_start_mb.zip(memory_end_mb).map(|(a, b)| b - a),
        }
    }
}

fn outcome_for(status: u16) -> ProfileOutcome {
    if status >= 500 {
        ProfileOutcome::Failed
    } else {
        ProfileOutcome::Completed
    }
}

fn persist_artifact(dir: &Path, artifact: &ProfileArtifact) -> Option<PathBuf> {
    match write_artifact(dir, artifact) {
        Ok(path) => Some(path),
        Err(failure) => {
            warn!(target: "profiling", "{}", failure);
            None
        }
    }
}

impl Drop for ProfileSession {
    fn drop(&mut self) {
        if self.written {
            return;
        }
        let artifact = self.snapshot(None, ProfileOutcome::Aborted);
        let dir = std::mem::take(&mut self.dir);
        // Outside a runtime there is no blocking pool to hand off to
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(move || persist_artifact(&dir, &artifact));
            }
            Err(_) => {
                persist_artifact(&dir, &artifact);
            }
        }
    }
}

/// Axum middleware wrapping every request in the profiling predicate
pub async fn profiling_layer(
    State(interceptor): State<ProfilingInterceptor>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    if !interceptor.should_profile(&path, request.headers()) {
        return next.run(request).await;
    }

    let method = request.method().to_string();
    let session = {
        let (method, path) = (method.clone(), path.clone());
        match tokio::task::spawn_blocking(move || interceptor.begin(&method, &path)).await {
            Ok(session) => session,
            Err(e) => {
                warn!(target: "profiling", "profiling session failed to start: {}", e);
                return next.run(request).await;
            }
        }
    };
    let mut response = next.run(request).await;

    let elapsed = session.elapsed();
    let status = response.status().as_u16();
    if let Ok(value) = HeaderValue::from_str(&format!("{:.6}", elapsed.as_secs_f64())) {
        response.headers_mut().insert(PROCESS_TIME_HEADER, value);
    }
    info!(
        target: "profiling",
        method = %method,
        path = %path,
        status,
        elapsed_ms = elapsed.as_secs_f64() * 1000.0,
        "request profiled"
    );
    session.finish_async(status).await;
    response
}
