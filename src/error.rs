//! Error types for CID lookup and subject tagging

use thiserror::Error;

/// Every failure the lookup pipeline can produce
#[derive(Error, Debug)]
pub enum CidError {
    /// A host field read or write failed
    #[error("Accessor error: {0}")]
    Accessor(String),

    /// No credential could be obtained for the directory
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// The directory site or list could not be resolved
    #[error("Directory unavailable: {0}")]
    DirectoryUnavailable(String),

    /// The filtered item query was rejected
    #[error("Directory query failed ({status}): {message}")]
    Query { status: u16, message: String },

    /// An interactive window (sign-in or external page) could not be opened
    #[error("Popup blocked: {0}")]
    PopupBlocked(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CidError {
    pub fn is_authentication(&self) -> bool {
        matches!(self, Self::Authentication(_) | Self::PopupBlocked(_))
    }
}

/// Result type alias for CID operations
pub type Result<T> = std::result::Result<T, CidError>;
