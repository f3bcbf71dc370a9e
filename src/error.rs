// src/error.rs

use serde_json::Error as SerdeError;
use std::io;
use thiserror::Error;

/// Custom error types for the application
#[derive(Error, Debug)]
pub enum AppError {
    /// Malformed or unsupported request parameters, rejected before any I/O
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Engine failure while resolving video metadata
    #[error("Could not fetch video information: {0}")]
    MetadataFetch(String),

    /// Engine, network or disk failure during the main transfer
    #[error("Download failed: {0}")]
    Transfer(String),

    /// Re-encode or tagging failure. Never fatal for a download task.
    #[error("Post-processing error: {0}")]
    PostProcess(String),

    /// Destination directory could not be created or written
    #[error("Directory error: {0}")]
    Directory(String),

    /// A task of the same kind already occupies the supervisor slot
    #[error("A {0} task is already running")]
    AlreadyRunning(String),

    /// Error for missing dependencies
    #[error("Missing dependency: {0}")]
    MissingDependency(String),

    /// Settings could not be read or written
    #[error("Settings error: {0}")]
    Settings(String),

    /// The task was cancelled by the caller
    #[error("Task cancelled")]
    Cancelled,

    /// I/O related errors
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    /// JSON parsing errors
    #[error("JSON parsing error: {0}")]
    JsonError(#[from] SerdeError),

    /// General application errors
    #[error("Application error: {0}")]
    General(String),
}

impl AppError {
    /// True for errors that are rejected synchronously at admission time
    pub fn is_admission_error(&self) -> bool {
        matches!(
            self,
            AppError::InvalidRequest(_) | AppError::Directory(_) | AppError::AlreadyRunning(_)
        )
    }
}

/// Convert a string error to AppError::General
impl From<String> for AppError {
    fn from(error: String) -> Self {
        AppError::General(error)
    }
}

/// Convert a &str error to AppError::General
impl From<&str> for AppError {
    fn from(error: &str) -> Self {
        AppError::General(error.to_string())
    }
}
