//! Configuration Management
//!
//! Optional settings file at `<config dir>/cloud-asset-count/config.json`.
//! Command-line flags win over the file, the file wins over built-in
//! defaults.

use crate::dispatch::DEFAULT_CONCURRENCY;
use crate::provider::gcp::GcpBackend;
use crate::report::DEFAULT_REPORT_PATH;
use crate::retry::{RetryPolicy, DEFAULT_MAX_DELAY};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_LOG_PATH: &str = "debug.log";

/// User configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// Worker pool size
    #[serde(default)]
    pub concurrency: Option<usize>,
    /// First delay after a rate-limited call
    #[serde(default)]
    pub retry_delay_secs: Option<u64>,
    /// Longest delay between retries
    #[serde(default)]
    pub max_retry_delay_secs: Option<u64>,
    /// Retries per pair before giving up
    #[serde(default)]
    pub max_retries: Option<u32>,
    /// Never give up on rate-limited pairs
    #[serde(default)]
    pub retry_forever: bool,
    #[serde(default)]
    pub report_path: Option<PathBuf>,
    #[serde(default)]
    pub log_path: Option<PathBuf>,
    #[serde(default)]
    pub gcp_backend: Option<GcpBackend>,
}

/// Values given on the command line
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub concurrency: Option<usize>,
    pub retry_delay_secs: Option<u64>,
    pub max_retries: Option<u32>,
    pub retry_forever: bool,
    pub report_path: Option<PathBuf>,
    pub log_path: Option<PathBuf>,
    pub gcp_backend: Option<GcpBackend>,
}

impl Config {
    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("cloud-asset-count").join("config.json"))
    }

    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load configuration from `path`; a missing file gives defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {:?}", path))?;
        serde_json::from_str(&content).with_context(|| format!("Malformed config {:?}", path))
    }

    /// Fold command-line values over the file
    pub fn merge(mut self, overrides: Overrides) -> Self {
        if overrides.concurrency.is_some() {
            self.concurrency = overrides.concurrency;
        }
        if overrides.retry_delay_secs.is_some() {
            self.retry_delay_secs = overrides.retry_delay_secs;
        }
        if overrides.max_retries.is_some() {
            self.max_retries = overrides.max_retries;
            self.retry_forever = false;
        }
        if overrides.retry_forever {
            self.retry_forever = true;
        }
        if overrides.report_path.is_some() {
            self.report_path = overrides.report_path;
        }
        if overrides.log_path.is_some() {
            self.log_path = overrides.log_path;
        }
        if overrides.gcp_backend.is_some() {
            self.gcp_backend = overrides.gcp_backend;
        }
        self
    }

    pub fn effective_concurrency(&self) -> usize {
        self.concurrency.unwrap_or(DEFAULT_CONCURRENCY).max(1)
    }

    pub fn effective_retry_policy(&self) -> RetryPolicy {
        let defaults = RetryPolicy::default();
        let base_delay = self
            .retry_delay_secs
            .map(Duration::from_secs)
            .unwrap_or(defaults.base_delay);

        if self.retry_forever {
            return RetryPolicy::fixed_forever(base_delay);
        }

        RetryPolicy {
            base_delay,
            max_delay: self
                .max_retry_delay_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_MAX_DELAY),
            max_retries: Some(self.max_retries.unwrap_or(defaults.max_retries.unwrap_or(0))),
            ..defaults
        }
    }

    pub fn effective_report_path(&self) -> PathBuf {
        self.report_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_REPORT_PATH))
    }

    pub fn effective_log_path(&self) -> PathBuf {
        self.log_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_PATH))
    }

    pub fn effective_gcp_backend(&self) -> GcpBackend {
        self.gcp_backend.unwrap_or_default()
    }
}
