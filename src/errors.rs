// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipdagError {
    /// Fatal configuration problem. Always names the offending entry and is
    /// raised before any job is submitted.
    #[error("Configuration error in '{entry}': {message}")]
    Config { entry: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Task not found: {0}")]
    UnknownTask(String),

    #[error("Output '{key}' of task '{task}' is already set")]
    OutputConflict { task: String, key: String },

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PipdagError {
    /// Shorthand for building a [`PipdagError::Config`].
    pub fn config(entry: impl Into<String>, message: impl Into<String>) -> Self {
        PipdagError::Config {
            entry: entry.into(),
            message: message.into(),
        }
    }

    /// Entry name for configuration errors, `None` otherwise.
    pub fn config_entry(&self) -> Option<&str> {
        match self {
            PipdagError::Config { entry, .. } => Some(entry),
            _ => None,
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, PipdagError>;
