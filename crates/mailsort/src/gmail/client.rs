//! Gmail REST API client.

use log::debug;
use reqwest::{Client, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;

use super::auth::{create_http_client, sanitize_error_body};
use super::error::{GmailError, Result};
use super::types::{GmailMessage, GmailMessageList, GmailMessageStub, ModifyMessageRequest};

/// Gmail REST API v1 base URL.
pub const GMAIL_API_BASE: &str = "https://gmail.googleapis.com/gmail/v1";

/// How many messages one poll pulls from the top of the mailbox. Kept small
/// to bound per-call latency and external-API quota use.
pub const DEFAULT_POLL_BATCH_SIZE: u32 = 2;

/// An authenticated hold on one linked mailbox.
#[derive(Clone)]
pub struct GmailSession {
    access_token: SecretString,
}

impl GmailSession {
    /// Wraps an access token, rejecting empty credentials up front.
    /// Invalid-but-nonempty tokens surface as auth errors on first use.
    pub fn new(access_token: SecretString) -> Result<Self> {
        if access_token.expose_secret().trim().is_empty() {
            return Err(GmailError::Auth("Access token is empty".to_string()));
        }
        Ok(Self { access_token })
    }

    fn bearer(&self) -> &str {
        self.access_token.expose_secret()
    }
}

/// Client for the Gmail REST API. One instance is shared across accounts;
/// per-account credentials travel in the [`GmailSession`] passed to each call.
#[derive(Clone)]
pub struct GmailClient {
    http: Client,
    api_base: String,
}

impl GmailClient {
    /// Creates a client against the given API base URL.
    pub fn new(api_base: impl Into<String>) -> Result<Self> {
        Ok(Self {
            http: create_http_client()?,
            api_base: api_base.into(),
        })
    }

    /// Lists ids of the most recent messages in the mailbox, newest first.
    pub async fn list_messages(
        &self,
        session: &GmailSession,
        max_results: u32,
    ) -> Result<Vec<GmailMessageStub>> {
        let url = format!(
            "{}/users/me/messages?maxResults={}",
            self.api_base, max_results
        );
        debug!("Listing up to {} Gmail messages", max_results);

        let response = self
            .http
            .get(&url)
            .bearer_auth(session.bearer())
            .send()
            .await?;
        let list: GmailMessageList = parse_json(response).await?;
        Ok(list.messages.unwrap_or_default())
    }

    /// Fetches one message with its full payload tree.
    pub async fn get_message(&self, session: &GmailSession, id: &str) -> Result<GmailMessage> {
        let url = format!("{}/users/me/messages/{}?format=full", self.api_base, id);
        let response = self
            .http
            .get(&url)
            .bearer_auth(session.bearer())
            .send()
            .await?;
        parse_json(response).await
    }

    /// Removes the INBOX label so the message leaves the remote inbox.
    pub async fn archive_message(&self, session: &GmailSession, id: &str) -> Result<()> {
        let url = format!("{}/users/me/messages/{}/modify", self.api_base, id);
        let request = ModifyMessageRequest::remove_labels(&["INBOX"]);
        let response = self
            .http
            .post(&url)
            .bearer_auth(session.bearer())
            .json(&request)
            .send()
            .await?;
        check_status(response).await
    }

    /// Moves a message to the remote trash.
    pub async fn trash_message(&self, session: &GmailSession, id: &str) -> Result<()> {
        let url = format!("{}/users/me/messages/{}/trash", self.api_base, id);
        let response = self
            .http
            .post(&url)
            .bearer_auth(session.bearer())
            .send()
            .await?;
        check_status(response).await
    }

    /// The API base URL this client targets.
    pub fn api_base(&self) -> &str {
        &self.api_base
    }
}

async fn parse_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(status_error(status, &body));
    }
    response
        .json()
        .await
        .map_err(|e| GmailError::Response(format!("Failed to parse Gmail API response: {}", e)))
}

async fn check_status(response: Response) -> Result<()> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(status_error(status, &body));
    }
    Ok(())
}

/// Rejected credentials come back as 401/403; everything else is an API error.
fn status_error(status: StatusCode, body: &str) -> GmailError {
    let body = sanitize_error_body(body);
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        GmailError::Auth(format!("Gmail API rejected the credential ({}): {}", status, body))
    } else {
        GmailError::Api {
            status: status.as_u16(),
            body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_rejects_empty_token() {
        assert!(matches!(
            GmailSession::new(SecretString::from("")),
            Err(GmailError::Auth(_))
        ));
        assert!(matches!(
            GmailSession::new(SecretString::from("   ")),
            Err(GmailError::Auth(_))
        ));
    }

    #[test]
    fn test_session_accepts_nonempty_token() {
        let session = GmailSession::new(SecretString::from("ya29.token")).unwrap();
        assert_eq!(session.bearer(), "ya29.token");
    }

    #[test]
    fn test_client_creation_keeps_api_base() {
        let client = GmailClient::new(GMAIL_API_BASE).unwrap();
        assert_eq!(client.api_base(), GMAIL_API_BASE);
    }

    #[test]
    fn test_status_error_maps_auth_statuses() {
        let err = status_error(StatusCode::UNAUTHORIZED, "{\"error\": \"invalid token\"}");
        assert!(matches!(err, GmailError::Auth(_)));

        let err = status_error(StatusCode::FORBIDDEN, "denied");
        assert!(matches!(err, GmailError::Auth(_)));

        let err = status_error(StatusCode::TOO_MANY_REQUESTS, "slow down");
        assert!(matches!(err, GmailError::Api { status: 429, .. }));
    }
}
