//! Gmail mailbox access module.
//!
//! This module talks to the Gmail REST API for one linked account: listing
//! and fetching messages, moving them out of the remote inbox, trashing them,
//! and refreshing expired OAuth2 access tokens. Payload decoding and
//! unsubscribe-link detection live in [`extract`].

pub mod auth;
pub mod client;
pub mod error;
pub mod extract;
pub mod types;

pub use auth::{GmailAuthenticator, TokenResponse, GMAIL_SCOPES, GOOGLE_TOKEN_URL};
pub use client::{GmailClient, GmailSession, DEFAULT_POLL_BATCH_SIZE, GMAIL_API_BASE};
pub use error::GmailError;
pub use extract::{
    extract_body, extract_received_at, extract_subject, extract_unsubscribe_link,
    NO_READABLE_CONTENT,
};
pub use types::{GmailBody, GmailHeader, GmailMessage, GmailMessageList, GmailMessageStub, GmailPayload};
