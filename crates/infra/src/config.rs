//! Configuration loading and representation.
//!
//! The file is YAML with two required keys (`db.uri`, `apps.callbacks_uri`)
//! and optional tuning sections. Command-line flags are applied on top via
//! [`ConfigOverrides`], then [`PropagatorConfig::validate`] turns the raw
//! strings and numbers into typed values.
//!
//! ```yaml
//! db:
//!   uri: postgres://propagator@localhost/jobs
//! apps:
//!   callbacks_uri: http://apps.internal/callbacks/job-status
//! propagation:
//!   retries: 3
//!   batch_size: 1000
//!   poll_interval_ms: 0
//! diagnostics:
//!   listen_addr: 0.0.0.0:60000
//! logging:
//!   format: json
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Url;
use serde::Deserialize;
use thiserror::Error;

use propagator_core::{BatchSize, RetryCeiling};
use propagator_observability::LogFormat;

use crate::workers::PropagationWorkerConfig;

pub const DEFAULT_DIAGNOSTICS_ADDR: &str = "0.0.0.0:60000";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("missing required config key `{0}`")]
    Missing(&'static str),

    #[error("invalid value for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(key: &'static str, reason: impl ToString) -> Self {
        Self::Invalid {
            key,
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DbSection {
    pub uri: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppsSection {
    pub callbacks_uri: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PropagationSection {
    pub retries: Option<u32>,
    pub batch_size: Option<usize>,
    pub poll_interval_ms: Option<u64>,
    /// Unset means no client-side timeout.
    pub request_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DiagnosticsSection {
    pub listen_addr: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSection {
    pub format: Option<String>,
}

/// Raw configuration as read from the file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PropagatorConfig {
    pub db: DbSection,
    pub apps: AppsSection,
    pub propagation: PropagationSection,
    pub diagnostics: DiagnosticsSection,
    pub logging: LoggingSection,
}

/// Values supplied on the command line; `Some` wins over the file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub db_uri: Option<String>,
    pub retries: Option<u32>,
    pub batch_size: Option<usize>,
    pub poll_interval_ms: Option<u64>,
    pub diagnostics_addr: Option<String>,
    pub log_format: Option<String>,
}

/// Fully validated configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub db_uri: String,
    pub callbacks_uri: Url,
    pub retry_ceiling: RetryCeiling,
    pub batch_size: BatchSize,
    pub poll_interval: Duration,
    pub request_timeout: Option<Duration>,
    pub diagnostics_addr: SocketAddr,
    pub log_format: LogFormat,
}

impl PropagatorConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        // An empty document deserializes to unit, not to an empty mapping.
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&contents)
    }

    pub fn apply(mut self, overrides: ConfigOverrides) -> Self {
        if let Some(uri) = overrides.db_uri {
            self.db.uri = Some(uri);
        }
        if let Some(retries) = overrides.retries {
            self.propagation.retries = Some(retries);
        }
        if let Some(size) = overrides.batch_size {
            self.propagation.batch_size = Some(size);
        }
        if let Some(ms) = overrides.poll_interval_ms {
            self.propagation.poll_interval_ms = Some(ms);
        }
        if let Some(addr) = overrides.diagnostics_addr {
            self.diagnostics.listen_addr = Some(addr);
        }
        if let Some(format) = overrides.log_format {
            self.logging.format = Some(format);
        }
        self
    }

    pub fn validate(&self) -> Result<ResolvedConfig, ConfigError> {
        let db_uri = required(self.db.uri.as_deref(), "db.uri")?.to_string();

        let callbacks = required(self.apps.callbacks_uri.as_deref(), "apps.callbacks_uri")?;
        let callbacks_uri =
            Url::parse(callbacks).map_err(|e| ConfigError::invalid("apps.callbacks_uri", e))?;
        if !matches!(callbacks_uri.scheme(), "http" | "https") {
            return Err(ConfigError::invalid(
                "apps.callbacks_uri",
                format!("unsupported scheme `{}`", callbacks_uri.scheme()),
            ));
        }

        let retry_ceiling = match self.propagation.retries {
            Some(n) => {
                RetryCeiling::new(n).map_err(|e| ConfigError::invalid("propagation.retries", e))?
            }
            None => RetryCeiling::default(),
        };
        let batch_size = match self.propagation.batch_size {
            Some(n) => {
                BatchSize::new(n).map_err(|e| ConfigError::invalid("propagation.batch_size", e))?
            }
            None => BatchSize::default(),
        };

        let poll_interval = Duration::from_millis(self.propagation.poll_interval_ms.unwrap_or(0));
        let request_timeout = match self.propagation.request_timeout_ms {
            Some(0) => {
                return Err(ConfigError::invalid(
                    "propagation.request_timeout_ms",
                    "must be positive",
                ));
            }
            Some(ms) => Some(Duration::from_millis(ms)),
            None => None,
        };

        let diagnostics_addr = self
            .diagnostics
            .listen_addr
            .as_deref()
            .unwrap_or(DEFAULT_DIAGNOSTICS_ADDR)
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::invalid("diagnostics.listen_addr", e))?;

        let log_format = match self.logging.format.as_deref() {
            Some(format) => format
                .parse::<LogFormat>()
                .map_err(|e| ConfigError::invalid("logging.format", e))?,
            None => LogFormat::default(),
        };

        Ok(ResolvedConfig {
            db_uri,
            callbacks_uri,
            retry_ceiling,
            batch_size,
            poll_interval,
            request_timeout,
            diagnostics_addr,
            log_format,
        })
    }
}

fn required<'a>(value: Option<&'a str>, key: &'static str) -> Result<&'a str, ConfigError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ConfigError::Missing(key)),
    }
}

impl ResolvedConfig {
    pub fn worker_config(&self) -> PropagationWorkerConfig {
        PropagationWorkerConfig::default()
            .with_retry_ceiling(self.retry_ceiling)
            .with_batch_size(self.batch_size)
            .with_poll_interval(self.poll_interval)
    }
}
