//! Error handling for the harstat extraction library.
//!
//! This module defines the main error type `Error` used throughout the library,
//! along with a convenient `Result` type alias. Only configuration problems,
//! unreadable captures, and export failures travel through it to the caller;
//! per-entry and per-chunk problems are absorbed where they happen.
//!
//! # Examples
//!
//! ```
//! use harstat_core::error::{Error, Result};
//!
//! fn needs_keys(keys: &[String]) -> Result<()> {
//!     if keys.is_empty() {
//!         return Err(Error::config("no API keys configured"));
//!     }
//!     Ok(())
//! }
//!
//! assert!(needs_keys(&[]).is_err());
//! ```

use thiserror::Error;

/// Result type for harstat operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for harstat operations
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Spreadsheet export error
    #[error("Spreadsheet error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// The capture is not a readable HTTP archive
    #[error("Malformed capture: {0}")]
    Capture(String),

    /// The completion service failed or returned something unusable
    #[error("Oracle error: {0}")]
    Oracle(String),

    /// Every credential in the pool failed for one call
    #[error("All {tried} credentials failed; last error: {last}")]
    CredentialsExhausted { tried: usize, last: String },
}

impl Error {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new capture error
    pub fn capture<S: Into<String>>(msg: S) -> Self {
        Self::Capture(msg.into())
    }

    /// Create a new oracle error
    pub fn oracle<S: Into<String>>(msg: S) -> Self {
        Self::Oracle(msg.into())
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Self::Config(s.to_string())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Self::Config(s)
    }
}
