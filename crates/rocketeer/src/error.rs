use std::path::PathBuf;
use thiserror::Error;

use crate::gitops::error::GitOpsError;

#[derive(Error, Debug)]
pub enum RocketeerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("GitOps error: {0}")]
    GitOps(#[from] GitOpsError),

    #[error("Telemetry error: {0}")]
    Telemetry(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },

    #[error("Invalid git ref '{git_ref}': {reason}")]
    InvalidRef { git_ref: String, reason: String },
}

pub type Result<T> = std::result::Result<T, RocketeerError>;
