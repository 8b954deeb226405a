use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::execution::RetryPolicy;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Malformed config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferlineConfig {
    pub engine: EngineConfig,
    pub workflow: WorkflowConfig,
    pub storage: StorageConfig,
    pub repository: RepositoryConfig,
    pub usage: UsageConfig,
    pub schemas: SchemaConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub endpoint: String,
    /// Root of the serve controller reporting replica state.
    pub serve_endpoint: Option<String>,
    pub timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8000/".to_string(),
            serve_endpoint: None,
            timeout_secs: 60,
        }
    }
}

impl EngineConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub max_activity_attempts: u32,
    pub retry_interval_ms: u64,
    pub readiness_poll_interval_ms: u64,
    pub readiness_timeout_secs: Option<u64>,
    pub workers: usize,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_activity_attempts: 3,
            retry_interval_ms: 1000,
            readiness_poll_interval_ms: 500,
            readiness_timeout_secs: None,
            workers: 4,
        }
    }
}

impl WorkflowConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_activity_attempts,
            interval: Duration::from_millis(self.retry_interval_ms),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.readiness_poll_interval_ms)
    }

    pub fn readiness_timeout(&self) -> Option<Duration> {
        self.readiness_timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./data/blobs"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    pub root: PathBuf,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./data/runs"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UsageConfig {
    pub enabled: bool,
    pub credit_limit_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    /// Directory of `<task>.json` output schemas.
    pub dir: Option<PathBuf>,
}

impl InferlineConfig {
    /// Reads the config file. A missing file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        match fs::read_to_string(path) {
            Ok(contents) => Self::from_toml(&contents),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::info!("No config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.engine.endpoint = endpoint.into();
        self
    }

    pub fn with_serve_endpoint(mut self, serve_endpoint: impl Into<String>) -> Self {
        self.engine.serve_endpoint = Some(serve_endpoint.into());
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workflow.workers = workers;
        self
    }

    pub fn with_storage_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.storage.root = root.into();
        self
    }

    pub fn with_repository_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.repository.root = root.into();
        self
    }

    pub fn with_credit_limit(mut self, credit_limit_ms: u64) -> Self {
        self.usage.enabled = true;
        self.usage.credit_limit_ms = Some(credit_limit_ms);
        self
    }
}
