// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BootrunError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// The script generator refused to produce a build script.
    #[error("Cannot build: {0}")]
    CannotBuild(String),

    /// The worker sent something other than an integer status on its
    /// message channel.
    #[error("Worker protocol violation: {0}")]
    ProtocolViolation(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, BootrunError>;
