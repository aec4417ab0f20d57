use crate::client::SubmitOptions;
use crate::engine::ResetPolicy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced while loading or validating the service configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("failed to parse config: {0}")]
    ParseInline(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Service configuration. Every field has a documented default so an empty
/// JSON object is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TallyConfig {
    /// Fixed façade poll period; bounds staleness without push notifications.
    pub refresh_interval_ms: u64,
    /// Bound on waiting for a submission's commit confirmation.
    pub submit_timeout_ms: u64,
    /// Backpressure retries per submission.
    pub submit_max_retries: usize,
    /// Counter value before any event has been applied.
    pub initial_value: i64,
    /// Who may reset the counter. Open by default.
    pub reset_policy: ResetPolicy,
    /// Remote submission endpoint. `None` runs against the in-process
    /// loopback transport.
    pub endpoint: Option<String>,
}

impl Default for TallyConfig {
    fn default() -> Self {
        Self {
            refresh_interval_ms: 2_000,
            submit_timeout_ms: 2_000,
            submit_max_retries: 3,
            initial_value: 0,
            reset_policy: ResetPolicy::Open,
            endpoint: None,
        }
    }
}

impl TallyConfig {
    /// Loads and validates a config from a JSON file.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let payload = fs::read_to_string(path_ref).map_err(|source| ConfigError::Io {
            path: path_ref.to_path_buf(),
            source,
        })?;
        let config: Self =
            serde_json::from_str(&payload).map_err(|source| ConfigError::Parse {
                path: path_ref.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Parses and validates a config from a JSON string.
    pub fn from_json(payload: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(payload)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects configurations that would stall the poller or wedge a caller.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.refresh_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "refresh_interval_ms must be positive".into(),
            ));
        }
        if self.submit_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "submit_timeout_ms must be positive".into(),
            ));
        }
        if let Some(endpoint) = &self.endpoint {
            if endpoint.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "endpoint must not be empty when set".into(),
                ));
            }
        }
        Ok(())
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    /// Submission bounds derived from the config.
    pub fn submit_options(&self) -> SubmitOptions {
        SubmitOptions {
            max_retries: self.submit_max_retries,
            commit_timeout: Duration::from_millis(self.submit_timeout_ms),
            ..SubmitOptions::default()
        }
    }
}
