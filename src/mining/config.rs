//! Mining configuration

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Which backend to run chunks on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// GPU when the probe finds one, otherwise the best CPU backend.
    #[default]
    Auto,
    Gpu,
    Cpu,
    Sequential,
    /// Accelerated slot with no accelerator behind it; never searches.
    Stub,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Auto => "auto",
            BackendKind::Gpu => "gpu",
            BackendKind::Cpu => "cpu",
            BackendKind::Sequential => "sequential",
            BackendKind::Stub => "stub",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(BackendKind::Auto),
            "gpu" | "opencl" => Ok(BackendKind::Gpu),
            "cpu" | "parallel" => Ok(BackendKind::Cpu),
            "sequential" | "seq" => Ok(BackendKind::Sequential),
            "stub" => Ok(BackendKind::Stub),
            other => anyhow::bail!(
                "Unknown backend '{}' (expected auto, gpu, cpu, sequential or stub)",
                other
            ),
        }
    }
}

/// Configuration for mining operations
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MinerConfig {
    /// Backend preference
    pub backend: BackendKind,
    /// Number of CPU threads (0 = auto-detect)
    pub threads: usize,
    /// Smallest number of nonces a CPU worker takes at once
    pub min_batch: u32,
    /// Work items per GPU dispatch
    pub gpu_work_size: u32,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Auto,
            threads: 0,
            min_batch: 4096,
            gpu_work_size: 1 << 20,
        }
    }
}

impl MinerConfig {
    pub fn new(backend: BackendKind, threads: usize) -> Self {
        Self {
            backend,
            threads,
            ..Self::default()
        }
    }

    /// Load a JSON config; missing fields fall back to defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, anyhow::Error> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: MinerConfig = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_min_batch(mut self, min_batch: u32) -> Self {
        self.min_batch = min_batch;
        self
    }

    pub fn with_gpu_work_size(mut self, gpu_work_size: u32) -> Self {
        self.gpu_work_size = gpu_work_size;
        self
    }

    /// Thread count with 0 resolved to the number of logical CPUs.
    pub fn resolved_threads(&self) -> usize {
        if self.threads == 0 {
            num_cpus::get()
        } else {
            self.threads
        }
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.min_batch == 0 {
            anyhow::bail!("min_batch must be at least 1");
        }
        if self.gpu_work_size == 0 {
            anyhow::bail!("gpu_work_size must be at least 1");
        }
        Ok(())
    }
}
