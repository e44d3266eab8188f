//! Tool configuration.
//!
//! Loaded from an optional YAML file and environment variables. Command-line
//! flags are applied on top by the binaries.

mod broker;

pub use broker::BrokerConfig;

use std::path::PathBuf;

use serde::Deserialize;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "rmqtools.yaml";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "RMQTOOLS_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "RMQTOOLS";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "RMQTOOLS_LOG";
/// Conventional broker URI variable, used when no URL is configured otherwise.
pub const AMQP_URL_ENV_VAR: &str = "AMQP_URL";

/// Errors from loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),
}

/// Sniffer-only settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SnifferConfig {
    /// Where image/jpeg frames are written.
    pub frame_dir: PathBuf,
}

impl Default for SnifferConfig {
    fn default() -> Self {
        Self {
            frame_dir: PathBuf::from("."),
        }
    }
}

/// Main configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub broker: BrokerConfig,
    pub sniffer: SnifferConfig,
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Configuration sources (in order of priority, later overrides earlier):
    /// 1. `DEFAULT_CONFIG_FILE` in current directory (if exists)
    /// 2. File specified by `path` argument (if provided)
    /// 3. File specified by `CONFIG_ENV_VAR` environment variable (if set)
    /// 4. Environment variables with `CONFIG_ENV_PREFIX` prefix, `__` separated
    ///
    /// `AMQP_URL_ENV_VAR` fills `broker.url` only when nothing above set it.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        let settings = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut config: Config = settings.try_deserialize()?;
        if config.broker.url.is_none() {
            config.broker.url = std::env::var(AMQP_URL_ENV_VAR).ok();
        }
        Ok(config)
    }

    /// Apply a `--url` flag.
    pub fn with_url(mut self, url: Option<String>) -> Self {
        if url.is_some() {
            self.broker.url = url;
        }
        self
    }

    /// Apply a `--frame-dir` flag.
    pub fn with_frame_dir(mut self, frame_dir: Option<PathBuf>) -> Self {
        if let Some(dir) = frame_dir {
            self.sniffer.frame_dir = dir;
        }
        self
    }
}
