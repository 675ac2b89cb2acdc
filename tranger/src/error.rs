//! Error types for TimeRanger operations.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("TimeRanger not initialized at {0}")]
    NotInitialized(PathBuf),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("TimeRanger opened read-only: {0}")]
    ReadOnly(String),
}

pub type Result<T> = std::result::Result<T, Error>;
