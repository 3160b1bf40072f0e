//! Configuration management for zipbox
//!
//! This module provides a layered configuration system that loads settings from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use zipbox::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("Archives are published to: {}", config.storage.output_root.display());
//! ```
//!
//! # Environment Variables
//!
//! Configuration can be overridden using environment variables with the pattern:
//! `ZIPBOX__<section>__<key>`
//!
//! Examples:
//! - `ZIPBOX__SERVER__BIND_ADDR=0.0.0.0:9000`
//! - `ZIPBOX__STORAGE__OUTPUT_ROOT=/app/output`
//! - `ZIPBOX__RETENTION__MAX_AGE=7d`
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/zipbox.toml`.
//! This can be overridden using the `ZIPBOX_CONFIG` environment variable.

mod models;
mod sources;
mod validation;

pub use crate::humanize::{ByteSize, HumanDuration};
pub use models::{ApiLimits, Config, RetentionConfig, ServerConfig, StorageConfig};
pub use validation::ValidationError;

use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),

    #[error("Failed to render configuration: {0}")]
    RenderError(#[from] toml::ser::Error),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// Configuration is loaded with the following priority (highest to lowest):
    /// 1. Environment variables (`ZIPBOX__*`)
    /// 2. TOML file (default: `config/zipbox.toml`)
    /// 3. Default values
    ///
    /// # Errors
    ///
    /// Returns an error if the file is malformed or validation fails
    /// (zero retention window, overlapping roots, etc.)
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path (plus environment overrides)
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path.as_ref())?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Validate a configuration built in code
    pub fn validate(&self) -> Result<(), ConfigError> {
        validation::validate(self)?;
        Ok(())
    }

    /// Effective configuration rendered as TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}
