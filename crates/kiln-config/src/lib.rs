//! Configuration for the Kiln broker.
//!
//! This crate provides:
//! - Server settings with defaults
//! - Multi-format file loading (YAML, TOML, JSON)
//! - Environment variable overrides
//! - Validation of listener settings and the static topic catalogue

pub mod provider;
pub mod types;
pub mod validation;

pub use provider::{EnvironmentProvider, FileFormat, FileProvider};
pub use types::{ServerConfig, TopicConfig};
pub use validation::{validate_config, validate_topic_name, ValidationError};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Config not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
