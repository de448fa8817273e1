//! Error types for the hustle library.

use thiserror::Error;

/// Errors that can occur during cache lifecycle and configuration operations.
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// I/O error during cache or config file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Cache manifest could not be encoded or decoded.
    #[error("Cache manifest error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration file could not be parsed.
    #[error("Invalid configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Configuration could not be serialized.
    #[error("Failed to write configuration: {0}")]
    ConfigWrite(#[from] toml::ser::Error),

    /// A URL could not be parsed or resolved against the scope.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// The network answered with a non-success status.
    #[error("Request to {url} failed with status {status}")]
    BadStatus {
        /// Requested URL.
        url: String,
        /// HTTP status code returned.
        status: u16,
    },

    /// Pre-population of the cache bucket failed; nothing was committed.
    #[error("Precache of {url} failed: {reason}")]
    Precache {
        /// URL that could not be fetched.
        url: String,
        /// Underlying failure.
        reason: String,
    },

    /// The Cache API only stores `GET` requests.
    #[error("Cannot cache {method} request")]
    UnsupportedMethod {
        /// Rejected request method.
        method: String,
    },

    /// A request method that is not a valid HTTP token.
    #[error("Invalid HTTP method {method:?}")]
    InvalidMethod {
        /// Rejected request method.
        method: String,
    },

    /// A lifecycle event arrived in a state that does not accept it.
    #[error("Invalid worker state: {0}")]
    InvalidState(String),
}

/// A specialized `Result` type for hustle operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Failure reported by a host capability (browser API or native plugin).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CapabilityError {
    /// The capability is not present in this host.
    #[error("{0} is not available")]
    Unavailable(&'static str),

    /// The capability exists but refused or failed the call.
    #[error("{0}")]
    Rejected(String),
}
