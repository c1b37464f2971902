//! Process resource sampling
//!
//! CPU and resident memory of the current process, read through sysinfo.

use serde::{Deserialize, Serialize};
use sysinfo::{Pid, System};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// A snapshot of the current process's resource usage
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProcessSample {
    /// CPU usage since the previous refresh (0-100 per core)
    pub cpu_usage_percent: f64,
    /// Resident memory in megabytes
    pub memory_mb: f64,
}

/// Samples resources of the running process.
///
/// CPU usage is computed by sysinfo as a delta between two refreshes, so the
/// first sample of a fresh sampler reports 0.
pub struct ProcessSampler {
    system: System,
    pid: Option<Pid>,
}

impl ProcessSampler {
    pub fn new() -> Self {
        let pid = sysinfo::get_current_pid().ok();
        let mut system = System::new();
        if let Some(pid) = pid {
            system.refresh_process(pid);
        }
        Self { system, pid }
    }

    /// Refresh and read the process entry; `None` when the platform has no
    /// process information
    pub fn sample(&mut self) -> Option<ProcessSample> {
        let pid = self.pid?;
        if !self.system.refresh_process(pid) {
            return None;
        }
        self.system.process(pid).map(|process| ProcessSample {
            cpu_usage_percent: process.cpu_usage() as f64,
            memory_mb: process.memory() as f64 / BYTES_PER_MB,
        })
    }
}

impl Default for ProcessSampler {
    fn default() -> Self {
        Self::new()
    }
}
