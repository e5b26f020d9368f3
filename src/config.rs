use crate::error::{Result, StoreError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Sentinel path naming a transient store.
pub const MEMORY_SENTINEL: &str = ":memory:";

/// Default lock-wait bound (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 10_000;

/// Location of the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StorePath {
    File(PathBuf),
    /// Non-persistent; everything is discarded when the store closes.
    Memory,
}

impl StorePath {
    pub fn is_memory(&self) -> bool {
        matches!(self, StorePath::Memory)
    }
}

impl From<&str> for StorePath {
    fn from(value: &str) -> Self {
        if value == MEMORY_SENTINEL {
            StorePath::Memory
        } else {
            StorePath::File(PathBuf::from(value))
        }
    }
}

impl From<String> for StorePath {
    fn from(value: String) -> Self {
        StorePath::from(value.as_str())
    }
}

impl From<PathBuf> for StorePath {
    fn from(value: PathBuf) -> Self {
        StorePath::File(value)
    }
}

impl From<&Path> for StorePath {
    fn from(value: &Path) -> Self {
        StorePath::File(value.to_path_buf())
    }
}

impl From<StorePath> for String {
    fn from(value: StorePath) -> Self {
        value.to_string()
    }
}

impl fmt::Display for StorePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorePath::File(path) => write!(f, "{}", path.display()),
            StorePath::Memory => f.write_str(MEMORY_SENTINEL),
        }
    }
}

/// Store configuration
///
/// Deserializes from JSON such as
/// `{"path": "/tmp/ex_db.db", "busy_timeout_ms": 10000, "foreign_keys": false}`;
/// everything but `path` is optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Database file, or `:memory:`
    pub path: StorePath,
    /// How long a locked store is waited on before the operation fails.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// Switch on the engine's native foreign key enforcement.
    #[serde(default)]
    pub foreign_keys: bool,
}

const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

impl StoreConfig {
    pub fn new(path: impl Into<StorePath>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            foreign_keys: false,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(StorePath::Memory)
    }

    pub fn with_busy_timeout(mut self, millis: u64) -> Self {
        self.busy_timeout_ms = millis;
        self
    }

    pub fn with_foreign_keys(mut self, enabled: bool) -> Self {
        self.foreign_keys = enabled;
        self
    }

    /// Load a JSON config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config_error = |reason: String| StoreError::Config {
            path: path.display().to_string(),
            reason,
        };
        let text = std::fs::read_to_string(path).map_err(|err| config_error(err.to_string()))?;
        serde_json::from_str(&text).map_err(|err| config_error(err.to_string()))
    }
}
