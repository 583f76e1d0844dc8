//! Per-account mailbox polling: credential resolution, page fetch, and
//! local reconciliation.

use log::{error, info, warn};
use secrecy::SecretString;

use crate::db::account_repo::{self, AccountRow};
use crate::db::email_repo::{self, RawEmailRow};
use crate::db::Database;
use crate::gmail::{
    extract_body, extract_received_at, extract_subject, extract_unsubscribe_link,
    GmailAuthenticator, GmailClient, GmailMessage, GmailSession,
};

use super::error::Result;

/// Seconds before the stored expiry at which a token already counts as
/// expired, so a token refreshed here survives the whole poll.
pub const DEFAULT_REFRESH_BUFFER_SECONDS: u64 = 60;

/// Resolves the effective session for a linked account.
///
/// Sentinel accounts carry no stored credential and borrow the caller's live
/// session token; `None` with a warning when the caller supplied none.
/// Stored accounts whose access token is expired are refreshed first when a
/// real refresh token exists, and the replacement is persisted. An expired
/// token with no refresh credential is used as-is; the remote end decides.
pub async fn resolve_session(
    db: &Database,
    auth: &GmailAuthenticator,
    account: &AccountRow,
    session_token: Option<&str>,
    refresh_buffer_seconds: u64,
) -> Result<Option<GmailSession>> {
    if account.is_primary() {
        return match session_token {
            Some(token) => Ok(Some(GmailSession::new(SecretString::from(token))?)),
            None => {
                warn!(
                    "Account {} of user {} is the primary account but no session token was provided, skipping",
                    account.google_sub, account.user_id
                );
                Ok(None)
            }
        };
    }

    if account.is_expired(refresh_buffer_seconds) {
        // Past the primary-account branch a stored refresh token is real.
        if let Some(refresh_token) = account.refresh_token.as_deref() {
            info!(
                "Access token for account {} of user {} is expired, refreshing",
                account.google_sub, account.user_id
            );
            let refreshed = auth
                .refresh_access_token(&SecretString::from(refresh_token))
                .await?;
            let expires_at = refreshed.expires_at();
            account_repo::update_access_token(
                db,
                &account.user_id,
                &account.google_sub,
                &refreshed.access_token,
                expires_at.as_deref(),
            )?;
            return Ok(Some(GmailSession::new(SecretString::from(
                refreshed.access_token,
            ))?));
        }
        warn!(
            "Access token for account {} of user {} is expired and no refresh token is stored",
            account.google_sub, account.user_id
        );
    }

    Ok(Some(GmailSession::new(SecretString::from(
        account.access_token.as_str(),
    ))?))
}

/// Polls one account: fetches the most recent page in full, reconciles it
/// locally, and returns the user's entire unprocessed backlog.
///
/// Messages already ingested upsert idempotently. After the upsert each
/// message is archived remotely and, on success, marked archived locally; a
/// per-message remote failure is logged and skipped. Listing or fetch
/// failures propagate as the account's failure.
pub async fn poll_account(
    db: &Database,
    client: &GmailClient,
    session: &GmailSession,
    account: &AccountRow,
    batch_size: u32,
) -> Result<Vec<RawEmailRow>> {
    let stubs = client.list_messages(session, batch_size).await?;
    info!(
        "Listed {} messages for account {} of user {}",
        stubs.len(),
        account.google_sub,
        account.user_id
    );

    let mut rows = Vec::with_capacity(stubs.len());
    for stub in &stubs {
        let message = client.get_message(session, &stub.id).await?;
        rows.push(map_message(&message, &account.user_id, &account.google_sub));
    }

    email_repo::upsert_raw_batch(db, &rows)?;

    for row in &rows {
        match client.archive_message(session, &row.email_id).await {
            Ok(()) => {
                if let Err(e) = email_repo::mark_archived(db, &row.user_id, &row.email_id) {
                    error!(
                        "Failed to mark message {} archived locally: {}",
                        row.email_id, e
                    );
                }
            }
            Err(e) => {
                error!(
                    "Failed to archive message {} on account {}: {}",
                    row.email_id, account.google_sub, e
                );
            }
        }
    }

    Ok(email_repo::get_unprocessed(db, &account.user_id)?)
}

/// Maps a fetched message into its stored form.
pub fn map_message(message: &GmailMessage, user_id: &str, google_sub: &str) -> RawEmailRow {
    let subject = extract_subject(&message.payload);
    let received_at = extract_received_at(&message.payload);
    let body = extract_body(&message.payload);
    let unsubscribe_link =
        extract_unsubscribe_link(message.payload.headers.as_deref().unwrap_or_default(), &body);

    RawEmailRow {
        user_id: user_id.to_string(),
        email_id: message.id.clone(),
        thread_id: message.thread_id.clone(),
        subject,
        body,
        received_at,
        archived: false,
        unsubscribe_link,
        google_sub: google_sub.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gmail::{GmailError, GOOGLE_TOKEN_URL};
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;

    use crate::collector::error::CollectorError;

    fn test_db() -> Database {
        Database::open_in_memory().expect("Failed to create test database")
    }

    fn test_auth() -> GmailAuthenticator {
        GmailAuthenticator::new(GOOGLE_TOKEN_URL, "client-id", SecretString::from("secret"))
            .expect("authenticator")
    }

    fn sample_account(user: &str, sub: &str) -> AccountRow {
        AccountRow {
            user_id: user.to_string(),
            google_sub: sub.to_string(),
            access_token: "stored-access".to_string(),
            refresh_token: Some("stored-refresh".to_string()),
            expires_at: Some("2099-01-01T00:00:00Z".to_string()),
            email: None,
        }
    }

    fn b64(text: &str) -> String {
        URL_SAFE_NO_PAD.encode(text.as_bytes())
    }

    fn sample_message(id: &str, headers: serde_json::Value) -> GmailMessage {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "threadId": format!("thread-{}", id),
            "payload": {
                "mimeType": "text/plain",
                "headers": headers,
                "body": {"size": 15, "data": b64("Agenda attached")},
            },
        }))
        .expect("valid message json")
    }

    #[tokio::test]
    async fn test_resolve_session_primary_with_token() {
        let db = test_db();
        let mut account = sample_account("u1", "sub-a");
        account.refresh_token = Some(account_repo::PRIMARY_ACCOUNT_SENTINEL.to_string());

        let session = resolve_session(&db, &test_auth(), &account, Some("live-token"), 60)
            .await
            .expect("resolution should succeed");
        assert!(session.is_some());
    }

    #[tokio::test]
    async fn test_resolve_session_primary_without_token_skips() {
        let db = test_db();
        let mut account = sample_account("u1", "sub-a");
        account.refresh_token = Some(account_repo::PRIMARY_ACCOUNT_SENTINEL.to_string());

        let session = resolve_session(&db, &test_auth(), &account, None, 60)
            .await
            .expect("resolution should succeed");
        assert!(session.is_none());
    }

    #[tokio::test]
    async fn test_resolve_session_valid_stored_token() {
        let db = test_db();
        let account = sample_account("u1", "sub-a");

        let session = resolve_session(&db, &test_auth(), &account, None, 60)
            .await
            .expect("resolution should succeed");
        assert!(session.is_some());
    }

    #[tokio::test]
    async fn test_resolve_session_expired_without_refresh_uses_stale_token() {
        let db = test_db();
        let mut account = sample_account("u1", "sub-a");
        account.refresh_token = None;
        account.expires_at = Some("2020-01-01T00:00:00Z".to_string());

        let session = resolve_session(&db, &test_auth(), &account, None, 60)
            .await
            .expect("resolution should succeed");
        assert!(session.is_some());
    }

    #[tokio::test]
    async fn test_resolve_session_rejects_empty_stored_token() {
        let db = test_db();
        let mut account = sample_account("u1", "sub-a");
        account.access_token = String::new();

        let result = resolve_session(&db, &test_auth(), &account, None, 60).await;
        assert!(matches!(
            result,
            Err(CollectorError::Gmail(GmailError::Auth(_)))
        ));
    }

    #[test]
    fn test_map_message_derives_fields() {
        let message = sample_message(
            "m1",
            serde_json::json!([
                {"name": "Subject", "value": "Team sync"},
                {"name": "Date", "value": "Mon, 6 Jan 2025 13:30:00 -0700"},
            ]),
        );

        let row = map_message(&message, "u1", "sub-a");
        assert_eq!(row.user_id, "u1");
        assert_eq!(row.google_sub, "sub-a");
        assert_eq!(row.email_id, "m1");
        assert_eq!(row.thread_id, "thread-m1");
        assert_eq!(row.subject, "Team sync");
        assert_eq!(row.body, "Agenda attached");
        assert_eq!(row.received_at.as_deref(), Some("2025-01-06T20:30:00+00:00"));
        assert!(!row.archived);
        assert!(row.unsubscribe_link.is_none());
    }

    #[test]
    fn test_map_message_defaults_and_unsubscribe() {
        let message = sample_message(
            "m2",
            serde_json::json!([
                {"name": "List-Unsubscribe", "value": "<https://news.example.com/unsub?id=9>"},
            ]),
        );

        let row = map_message(&message, "u1", "sub-a");
        assert_eq!(row.subject, "No Subject");
        assert!(row.received_at.is_none());
        assert_eq!(
            row.unsubscribe_link.as_deref(),
            Some("https://news.example.com/unsub?id=9")
        );
    }
}
