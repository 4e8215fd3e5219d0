//! Configuration management for ThreatScope

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use threatscope_core::{Error, Result, Severity};

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Store file settings
    #[serde(default)]
    pub store: StoreConfig,

    /// Ingestion settings
    #[serde(default)]
    pub ingest: IngestSettings,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("Failed to read config file {:?}: {}", path, e))
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| Error::Configuration(format!("Failed to parse config: {}", e)))
    }

    /// Create a configuration builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    /// Merge with environment variables (THREATSCOPE_ prefix)
    pub fn merge_env(self) -> Self {
        self.merge_vars(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any variable source
    pub fn merge_vars(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        // Store settings
        if let Some(val) = var("THREATSCOPE_STORE_PATH") {
            self.store.path = PathBuf::from(val);
        }

        // Ingest settings
        if let Some(val) = var("THREATSCOPE_MIN_SEVERITY") {
            if let Ok(severity) = val.parse() {
                self.ingest.min_severity = Some(severity);
            }
        }

        // Logging
        if let Some(val) = var("THREATSCOPE_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Some(val) = var("THREATSCOPE_LOG_FORMAT") {
            self.logging.format = val;
        }

        self
    }
}

/// Store file configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// JSON file holding the host store
    #[serde(default = "default_store_path")]
    pub path: PathBuf,

    /// Indent the JSON on save
    #[serde(default = "default_true")]
    pub pretty: bool,
}

fn default_store_path() -> PathBuf {
    PathBuf::from("threatscope-data/dashboard.json")
}

fn default_true() -> bool {
    true
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            pretty: true,
        }
    }
}

/// Ingestion configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestSettings {
    /// Drop extracted findings below this tier
    #[serde(default)]
    pub min_severity: Option<Severity>,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (pretty, json, compact)
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    String::from("info")
}

fn default_log_format() -> String {
    String::from("compact")
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Builder for constructing Config
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.store.path = path.into();
        self
    }

    pub fn pretty(mut self, pretty: bool) -> Self {
        self.config.store.pretty = pretty;
        self
    }

    pub fn min_severity(mut self, severity: Severity) -> Self {
        self.config.ingest.min_severity = Some(severity);
        self
    }

    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn log_format(mut self, format: impl Into<String>) -> Self {
        self.config.logging.format = format.into();
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
