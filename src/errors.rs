//! Error types for the utmka application.
//!
//! This module defines the error taxonomy shared by the REST gateway, the
//! import/export layer and the terminal client. Every variant falls into one
//! of three families: network failure, validation failure or server rejection.

use std::{io, path::PathBuf};

use thiserror::Error;

/// The main error type for the utmka application.
#[derive(Error, Debug)]
pub enum UtmError {
    /// Errors related to file I/O operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Errors related to serialization/deserialization operations.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Connection-level failure talking to the backend or the shortener.
    #[error("Network error: {0}")]
    Http(#[from] reqwest::Error),

    /// A request was aborted because it exceeded its timeout.
    #[error("Request to {endpoint} timed out after {seconds}s")]
    Timeout { endpoint: String, seconds: u64 },

    /// The backend answered with a non-2xx status.
    #[error("Server rejected request ({status}): {message}")]
    ServerRejected { status: u16, message: String },

    /// A required field was empty or otherwise unusable.
    #[error("Validation failed: {message}")]
    Validation { message: String },

    /// The generator could not turn the input into an absolute URL.
    #[error("Invalid URL: {url}")]
    InvalidUrl { url: String },

    /// An import file had the wrong shape (not an array, empty, bad extension).
    #[error("Invalid import file: {message}")]
    InvalidImport { message: String },

    /// The link shortener returned an error or an empty body.
    #[error("Shortening failed: {message}")]
    ShortenFailed { message: String },

    /// Record with the given id is not in the current collection.
    #[error("Record not found: {id}")]
    RecordNotFound { id: String },

    /// Errors related to configuration.
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// Directory creation or access failed.
    #[error("Failed to create or access directory: {path}")]
    DirectoryError { path: PathBuf },

    /// file not found
    #[error("File not found: {file_path}")]
    FileNotFound { file_path: String },
}

impl UtmError {
    pub fn validation(message: impl Into<String>) -> Self {
        UtmError::Validation {
            message: message.into(),
        }
    }

    /// True for failures that originate in the transport rather than in the
    /// data the user supplied.
    pub fn is_network(&self) -> bool {
        matches!(self, UtmError::Http(_) | UtmError::Timeout { .. })
    }
}
