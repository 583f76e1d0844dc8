//! Builder patterns for creating test rows programmatically.
//!
//! These builders allow seeding accounts and messages without repetitive
//! struct literals.

#![allow(dead_code)]

use mailsort::db::account_repo::{AccountRow, PRIMARY_ACCOUNT_SENTINEL};
use mailsort::db::email_repo::RawEmailRow;

/// Builder for `RawEmailRow` instances.
pub struct RawEmailBuilder {
    user_id: String,
    email_id: String,
    thread_id: String,
    subject: String,
    body: String,
    received_at: Option<String>,
    archived: bool,
    unsubscribe_link: Option<String>,
    google_sub: String,
}

impl RawEmailBuilder {
    /// Create a builder with defaults derived from the message id.
    pub fn new(user_id: &str, email_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            email_id: email_id.to_string(),
            thread_id: format!("thread-{}", email_id),
            subject: format!("Subject {}", email_id),
            body: "Plain text body".to_string(),
            received_at: None,
            archived: false,
            unsubscribe_link: None,
            google_sub: "sub-a".to_string(),
        }
    }

    /// Set the thread id.
    pub fn thread_id(mut self, thread_id: &str) -> Self {
        self.thread_id = thread_id.to_string();
        self
    }

    /// Set the subject line.
    pub fn subject(mut self, subject: &str) -> Self {
        self.subject = subject.to_string();
        self
    }

    /// Set the body text.
    pub fn body(mut self, body: &str) -> Self {
        self.body = body.to_string();
        self
    }

    /// Set the received timestamp (RFC 3339 UTC).
    pub fn received_at(mut self, received_at: &str) -> Self {
        self.received_at = Some(received_at.to_string());
        self
    }

    /// Set the stored unsubscribe link.
    pub fn unsubscribe_link(mut self, link: &str) -> Self {
        self.unsubscribe_link = Some(link.to_string());
        self
    }

    /// Set the owning remote account.
    pub fn google_sub(mut self, google_sub: &str) -> Self {
        self.google_sub = google_sub.to_string();
        self
    }

    /// Mark the message as already archived.
    pub fn archived(mut self) -> Self {
        self.archived = true;
        self
    }

    /// Build the final row.
    pub fn build(self) -> RawEmailRow {
        RawEmailRow {
            user_id: self.user_id,
            email_id: self.email_id,
            thread_id: self.thread_id,
            subject: self.subject,
            body: self.body,
            received_at: self.received_at,
            archived: self.archived,
            unsubscribe_link: self.unsubscribe_link,
            google_sub: self.google_sub,
        }
    }
}

/// Builder for `AccountRow` instances.
pub struct AccountBuilder {
    user_id: String,
    google_sub: String,
    access_token: String,
    refresh_token: Option<String>,
    expires_at: Option<String>,
    email: Option<String>,
}

impl AccountBuilder {
    /// Create a builder with a placeholder access token.
    pub fn new(user_id: &str, google_sub: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            google_sub: google_sub.to_string(),
            access_token: "test-access-token".to_string(),
            refresh_token: None,
            expires_at: None,
            email: None,
        }
    }

    /// Set the stored access token.
    pub fn access_token(mut self, token: &str) -> Self {
        self.access_token = token.to_string();
        self
    }

    /// Set the stored refresh token.
    pub fn refresh_token(mut self, token: &str) -> Self {
        self.refresh_token = Some(token.to_string());
        self
    }

    /// Mark the account as using the caller-supplied session credential.
    pub fn primary(mut self) -> Self {
        self.refresh_token = Some(PRIMARY_ACCOUNT_SENTINEL.to_string());
        self
    }

    /// Set the token expiry timestamp (RFC 3339 UTC).
    pub fn expires_at(mut self, expires_at: &str) -> Self {
        self.expires_at = Some(expires_at.to_string());
        self
    }

    /// Set the display email address.
    pub fn email(mut self, email: &str) -> Self {
        self.email = Some(email.to_string());
        self
    }

    /// Build the final row.
    pub fn build(self) -> AccountRow {
        AccountRow {
            user_id: self.user_id,
            google_sub: self.google_sub,
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at: self.expires_at,
            email: self.email,
        }
    }
}
