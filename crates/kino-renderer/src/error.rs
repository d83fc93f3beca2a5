//! Error types for Kino Renderer

use thiserror::Error;

/// Result type alias for renderer assembly
pub type Result<T> = std::result::Result<T, Error>;

/// Renderer assembly error types
#[derive(Error, Debug)]
pub enum Error {
    // Manifest errors
    #[error("Failed to fetch manifest: {0}")]
    ManifestFetch(String),

    #[error("Failed to parse manifest: {0}")]
    ManifestParse(String),

    // Network errors
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    // Device errors
    #[error("Capability query failed: {0}")]
    CapabilityQuery(String),

    // Pipeline errors
    #[error("Pipeline construction failed: {0}")]
    Construction(String),

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification of a failed build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The manifest could not be fetched or understood
    Transport,
    /// The device could not report decodable variants
    CapabilityQuery,
    /// A pipeline failed to assemble
    Construction,
}

impl Error {
    /// Create a capability query error
    pub fn capability(msg: impl Into<String>) -> Self {
        Error::CapabilityQuery(msg.into())
    }

    /// Create a construction error
    pub fn construction(msg: impl Into<String>) -> Self {
        Error::Construction(msg.into())
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ManifestFetch(_) | Error::ManifestParse(_) | Error::Network(_) => {
                ErrorKind::Transport
            }
            Error::CapabilityQuery(_) => ErrorKind::CapabilityQuery,
            Error::Construction(_) | Error::InvalidConfig(_) | Error::Internal(_) => {
                ErrorKind::Construction
            }
        }
    }

    /// Returns true if a caller may retry the build
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::ManifestFetch(_) | Error::Network(_)
        )
    }

    /// Returns the error code for events and reports
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::ManifestFetch(_) => "MANIFEST_FETCH",
            Error::ManifestParse(_) => "MANIFEST_PARSE",
            Error::Network(_) => "NETWORK",
            Error::CapabilityQuery(_) => "CAPABILITY_QUERY",
            Error::Construction(_) => "CONSTRUCTION",
            Error::InvalidConfig(_) => "INVALID_CONFIG",
            Error::Internal(_) => "INTERNAL",
        }
    }
}
