use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::scoring::aggregate::{DEFAULT_PREVIEW_LIMIT, DEFAULT_TOP_N};

/// Environment variable overriding `model.path`
pub const ENV_MODEL_PATH: &str = "TRIAGE_MODEL_PATH";
/// Environment variable overriding `server.bind_address`
pub const ENV_BIND: &str = "TRIAGE_BIND";

/// Errors that can occur while loading or saving configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Configuration for the triage service
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Classifier artifact configuration
    #[serde(default)]
    pub model: ModelConfig,
    /// Report shaping
    #[serde(default)]
    pub report: ReportConfig,
    /// Output configuration for offline runs
    #[serde(default)]
    pub output: OutputConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Socket address to listen on
    pub bind_address: String,
    /// Largest accepted upload body in bytes
    pub max_upload_bytes: usize,
    /// Origins allowed by CORS; empty allows any origin
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

/// Classifier artifact configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Path to the JSON model bundle
    pub path: PathBuf,
}

/// Report shaping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Entries kept in each top-N table
    pub top_n: usize,
    /// Maximum rows in the high-risk preview
    pub preview_limit: usize,
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Output format: "json", "jsonl", or "console"
    pub format: String,
    /// Output file path (stdout when absent)
    pub file_path: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind_address: "0.0.0.0:8000".to_string(),
            max_upload_bytes: 50 * 1024 * 1024,
            allowed_origins: Vec::new(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelConfig {
            path: PathBuf::from("model_outputs/model.json"),
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        ReportConfig {
            top_n: DEFAULT_TOP_N,
            preview_limit: DEFAULT_PREVIEW_LIMIT,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            format: "json".to_string(),
            file_path: None,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to a file
    pub fn to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Load from `path` when it exists, defaults otherwise, then apply
    /// environment overrides.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            Self::from_file(path)?
        } else {
            log::warn!("Config file {:?} not found, using defaults", path);
            Config::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(model_path) = std::env::var(ENV_MODEL_PATH) {
            self.model.path = PathBuf::from(model_path);
        }
        if let Ok(bind) = std::env::var(ENV_BIND) {
            self.server.bind_address = bind;
        }
    }
}
