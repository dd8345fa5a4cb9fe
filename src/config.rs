use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::package::PackageError;

// =============================================================================
// Time-related constants
// =============================================================================

/// Timeout for a single fetch in milliseconds (30 seconds)
pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 30_000;

/// Timeout for one handler's whole contribution in milliseconds (2 minutes)
pub const DEFAULT_HANDLER_TIMEOUT_MS: u64 = 120_000;

/// Timeout for scanning one package in milliseconds (5 minutes)
pub const DEFAULT_SCAN_TIMEOUT_MS: u64 = 300_000;

/// Delay between starting each package scan in a batch (10ms)
pub const SCAN_STAGGER_DELAY_MS: u64 = 10;

pub const DEFAULT_USER_AGENT: &str = concat!("upstream-scan/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid blacklist entry: {0}")]
    Blacklist(#[from] PackageError),
}

/// Scanner configuration structure
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct ScanConfig {
    pub fetch: FetchConfig,
    pub timeouts: TimeoutConfig,
    pub handlers: HandlersConfig,
    /// Atoms whose matching versions are never reported
    pub blacklist_versions: Vec<String>,
}

/// HTTP-related configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct FetchConfig {
    /// Per-request timeout in milliseconds
    pub timeout: u64,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_FETCH_TIMEOUT_MS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// Dispatcher timeouts in milliseconds
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct TimeoutConfig {
    pub handler: u64,
    pub scan: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            handler: DEFAULT_HANDLER_TIMEOUT_MS,
            scan: DEFAULT_SCAN_TIMEOUT_MS,
        }
    }
}

/// Handler-specific configuration
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct HandlersConfig {
    pub pypi: HandlerConfig,
    pub github: HandlerConfig,
    pub freecode: HandlerConfig,
}

/// Individual handler configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct HandlerConfig {
    pub enabled: bool,
    /// Override the upstream endpoint (mirrors, tests)
    pub base_url: Option<String>,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: None,
        }
    }
}

impl ScanConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch.timeout)
    }

    pub fn handler_timeout(&self) -> Duration {
        Duration::from_millis(self.timeouts.handler)
    }

    pub fn scan_timeout(&self) -> Duration {
        Duration::from_millis(self.timeouts.scan)
    }
}

/// Load configuration from a JSON file
pub fn load_config(path: &Path) -> Result<ScanConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Returns the path to the data directory for upstream-scan.
/// Uses $XDG_DATA_HOME/upstream-scan if XDG_DATA_HOME is set,
/// otherwise falls back to ~/.local/share/upstream-scan,
/// or ./upstream-scan if neither is available.
pub fn data_dir() -> PathBuf {
    data_dir_with_env(std::env::var("XDG_DATA_HOME").ok(), dirs::home_dir())
}

/// Returns the name of the log file inside the data directory.
pub fn log_file_name() -> &'static str {
    "upstream-scan.log"
}

fn data_dir_with_env(xdg_data_home: Option<String>, home_dir: Option<PathBuf>) -> PathBuf {
    let data_dir = xdg_data_home
        .map(PathBuf::from)
        .or_else(|| home_dir.map(|home| home.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."));

    data_dir.join("upstream-scan")
}
