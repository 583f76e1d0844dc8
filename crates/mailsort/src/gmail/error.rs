//! Gmail API error types.

use thiserror::Error;

/// Errors that can occur when talking to the Gmail API.
#[derive(Error, Debug)]
pub enum GmailError {
    /// Missing or unusable credentials for an account.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// OAuth2 token refresh failed.
    #[error("OAuth2 token refresh failed: {0}")]
    TokenRefresh(String),

    /// HTTP transport error.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The API returned a non-success status.
    #[error("Gmail API returned status {status}: {body}")]
    Api { status: u16, body: String },

    /// The API response could not be interpreted.
    #[error("Unexpected Gmail API response: {0}")]
    Response(String),
}

/// Result type for Gmail operations.
pub type Result<T> = std::result::Result<T, GmailError>;
