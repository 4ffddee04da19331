//! Error types for the telemetry sanitizer.
//!
//! The sanitizing cloner and the bot classifier are total functions and
//! never return errors. Errors only appear at the edges:
//! - [`AppError`]: Top-level errors surfaced by the binary
//! - [`ValueError`]: Mutating a composite value failed
//! - [`ConfigError`]: Configuration loading and validation
//! - [`LoaderError`]: Script loader misuse
//!
//! All errors implement `Send + Sync`.

use thiserror::Error;

/// Top-level application error.
///
/// Wraps the failures the binary can hit for unified handling.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O failure on stdin/stdout.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised when mutating a composite [`Value`](crate::value::Value).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValueError {
    /// The composite was frozen and rejects mutation.
    #[error("Cannot modify frozen {kind}")]
    Frozen {
        /// Kind of composite (`sequence` or `mapping`).
        kind: &'static str,
    },

    /// Index is past the end of a sequence.
    #[error("Index {index} out of bounds for sequence of length {len}")]
    IndexOutOfBounds {
        /// Requested index.
        index: usize,
        /// Current sequence length.
        len: usize,
    },
}

/// Configuration errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Configuration value is invalid.
    #[error("Invalid value for {var}: {reason}")]
    InvalidValue {
        /// The variable name.
        var: String,
        /// Why the value is invalid.
        reason: String,
    },
}

/// Script loader errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LoaderError {
    /// The script URL was empty.
    #[error("Script URL must not be empty")]
    EmptyUrl,

    /// No pending script with this id exists.
    #[error("Unknown or already settled script: {id}")]
    UnknownScript {
        /// The script id.
        id: u64,
    },
}
