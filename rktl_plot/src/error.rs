//! Error types for the plotting node.

use crate::schema::Role;
use thiserror::Error;

/// Startup and output errors.
#[derive(Debug, Error)]
pub enum PlotError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown plot variable: {0}")]
    UnknownVariable(String),

    #[error("Variable '{name}' configured as {configured} but declared {declared}")]
    RoleMismatch {
        name: String,
        configured: Role,
        declared: Role,
    },

    #[error("Invalid plot configuration: {0}")]
    InvalidConfig(String),
}

/// Why a metrics message was dropped.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MetricsError {
    #[error("missing 'episode' value")]
    MissingEpisode,

    #[error("invalid episode number '{0}'")]
    InvalidEpisode(String),

    #[error("value '{value}' for '{key}' is not a finite number")]
    InvalidValue { key: String, value: String },

    #[error("undecodable message: {0}")]
    Undecodable(String),
}
