//! OAuth2 token refresh for linked Gmail accounts.
//!
//! Access tokens are short-lived; accounts linked with a real refresh token
//! (as opposed to the primary-account sentinel) can have theirs renewed here
//! via the standard `refresh_token` grant.

use chrono::{Duration as ChronoDuration, Utc};
use log::info;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;

use super::error::{GmailError, Result};

/// Google OAuth2 token endpoint.
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Scopes a linked account is expected to carry: full mailbox access,
/// read, modify, and label management.
pub const GMAIL_SCOPES: &[&str] = &[
    "https://mail.google.com/",
    "https://www.googleapis.com/auth/gmail.readonly",
    "https://www.googleapis.com/auth/gmail.modify",
    "https://www.googleapis.com/auth/gmail.labels",
];

/// Default connect timeout for HTTP requests (10 seconds).
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default request timeout for HTTP requests (30 seconds).
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum length for sanitized error bodies to prevent log flooding.
const MAX_ERROR_BODY_LENGTH: usize = 200;

/// Truncates a remote error body to a reasonable length. This keeps useful
/// error context while preventing token data from flooding logs.
pub(crate) fn sanitize_error_body(body: &str) -> String {
    if body.len() > MAX_ERROR_BODY_LENGTH {
        format!("{}... (truncated)", &body[..MAX_ERROR_BODY_LENGTH])
    } else {
        body.to_string()
    }
}

/// Creates an HTTP client with appropriate timeouts.
pub(crate) fn create_http_client() -> Result<Client> {
    Ok(Client::builder()
        .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
        .timeout(DEFAULT_REQUEST_TIMEOUT)
        .build()?)
}

/// Response from the token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    /// The new access token.
    pub access_token: String,

    /// Token type (usually "Bearer").
    #[serde(default)]
    pub token_type: Option<String>,

    /// Lifetime in seconds of the access token.
    #[serde(default)]
    pub expires_in: Option<u64>,

    /// A rotated refresh token, when the endpoint issues one.
    #[serde(default)]
    pub refresh_token: Option<String>,

    /// Space-separated list of granted scopes.
    #[serde(default)]
    pub scope: Option<String>,
}

impl TokenResponse {
    /// Absolute expiry derived from `expires_in`, as RFC 3339 UTC text.
    pub fn expires_at(&self) -> Option<String> {
        self.expires_in
            .map(|secs| (Utc::now() + ChronoDuration::seconds(secs as i64)).to_rfc3339())
    }
}

/// Token refresh handler for the Google OAuth2 endpoint.
#[derive(Clone)]
pub struct GmailAuthenticator {
    client: Client,
    token_url: String,
    client_id: String,
    client_secret: SecretString,
}

impl GmailAuthenticator {
    /// Creates an authenticator against the given token endpoint.
    pub fn new(
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: SecretString,
    ) -> Result<Self> {
        Ok(Self {
            client: create_http_client()?,
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret,
        })
    }

    /// Exchanges a refresh token for a fresh access token.
    pub async fn refresh_access_token(&self, refresh_token: &SecretString) -> Result<TokenResponse> {
        info!("Refreshing Gmail access token");

        let scope = GMAIL_SCOPES.join(" ");
        let params = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.expose_secret()),
            ("refresh_token", refresh_token.expose_secret()),
            ("grant_type", "refresh_token"),
            ("scope", scope.as_str()),
        ];

        let response = self
            .client
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| GmailError::TokenRefresh(format!("Token refresh request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GmailError::TokenRefresh(format!(
                "Token refresh failed ({}): {}",
                status,
                sanitize_error_body(&body)
            )));
        }

        let token: TokenResponse = response.json().await.map_err(|e| {
            GmailError::TokenRefresh(format!("Failed to parse refresh response: {}", e))
        })?;

        info!("Successfully refreshed access token");
        Ok(token)
    }

    /// The token endpoint this authenticator posts to.
    pub fn token_url(&self) -> &str {
        &self.token_url
    }
}
