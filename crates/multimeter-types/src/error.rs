//! Error types for screeps-multimeter.

use std::io;

/// Errors produced by the multimeter crates.
#[derive(Debug, thiserror::Error)]
pub enum MultimeterError {
    #[error("config error: {0}")]
    Config(String),

    #[error("command error: {0}")]
    Command(String),

    #[error("plugin error: {0}")]
    Plugin(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("terminal error: {0}")]
    Terminal(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, MultimeterError>;
