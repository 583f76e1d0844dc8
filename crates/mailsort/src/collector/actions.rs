//! Message actions: delete, archive, unsubscribe, fetch.
//!
//! Remote mutations are best-effort. A message whose account is gone or
//! whose credentials fail is logged and skipped remotely, while the local
//! mutation still covers every requested id.

use std::collections::HashMap;

use log::{error, info, warn};

use crate::db::account_repo;
use crate::db::email_repo::{self, EmailDetail, RawEmailRow};
use crate::db::Database;
use crate::gmail::{GmailAuthenticator, GmailClient};

use super::error::Result;
use super::poll;

/// Remote mutation applied before the local one.
#[derive(Clone, Copy)]
enum RemoteAction {
    Trash,
    Archive,
}

impl RemoteAction {
    fn verb(self) -> &'static str {
        match self {
            RemoteAction::Trash => "trash",
            RemoteAction::Archive => "archive",
        }
    }
}

/// Trashes the given messages on their remote accounts, then deletes them
/// from local storage. Returns the local delete count.
pub async fn delete_messages(
    db: &Database,
    gmail: &GmailClient,
    auth: &GmailAuthenticator,
    user_id: &str,
    email_ids: &[String],
    session_token: Option<&str>,
    refresh_buffer_seconds: u64,
) -> Result<u64> {
    let rows = email_repo::get_raw_by_ids(db, user_id, email_ids)?;
    remote_sweep(
        db,
        gmail,
        auth,
        &rows,
        session_token,
        refresh_buffer_seconds,
        RemoteAction::Trash,
    )
    .await;

    // Local deletion covers every requested id, whatever the remote outcome.
    let deleted = email_repo::delete_raw(db, user_id, email_ids)?;
    email_repo::delete_processed(db, user_id, email_ids)?;
    info!("Deleted {} messages locally for user {}", deleted, user_id);
    Ok(deleted)
}

/// Archives the given messages on their remote accounts, then marks them
/// archived locally. Returns the number of local marks that succeeded.
pub async fn archive_messages(
    db: &Database,
    gmail: &GmailClient,
    auth: &GmailAuthenticator,
    user_id: &str,
    email_ids: &[String],
    session_token: Option<&str>,
    refresh_buffer_seconds: u64,
) -> Result<u64> {
    let rows = email_repo::get_raw_by_ids(db, user_id, email_ids)?;
    remote_sweep(
        db,
        gmail,
        auth,
        &rows,
        session_token,
        refresh_buffer_seconds,
        RemoteAction::Archive,
    )
    .await;

    let mut marked = 0u64;
    for email_id in email_ids {
        match email_repo::mark_archived(db, user_id, email_id) {
            Ok(()) => marked += 1,
            Err(e) => error!("Failed to mark message {} archived: {}", email_id, e),
        }
    }
    info!("Archived {} messages locally for user {}", marked, user_id);
    Ok(marked)
}

/// Marks a classified message unsubscribed and returns its stored
/// unsubscribe link.
///
/// Returns `None` when the message is unknown or carries no link. Opening
/// the link is the caller's business; nothing is sent to the list host.
pub fn unsubscribe(db: &Database, user_id: &str, email_id: &str) -> Result<Option<String>> {
    let detail = match email_repo::get_by_id(db, user_id, email_id)? {
        Some(detail) => detail,
        None => return Ok(None),
    };

    match detail.raw.unsubscribe_link {
        Some(link) => {
            email_repo::mark_unsubscribed(db, user_id, email_id)?;
            info!("Marked message {} unsubscribed for user {}", email_id, user_id);
            Ok(Some(link))
        }
        None => {
            info!("Message {} has no unsubscribe link", email_id);
            Ok(None)
        }
    }
}

/// Fetches one stored message, enriched with its classification when one
/// exists.
pub fn get_message(db: &Database, user_id: &str, email_id: &str) -> Result<Option<EmailDetail>> {
    Ok(email_repo::get_by_id(db, user_id, email_id)?)
}

/// Applies `action` to every row on its owning account. Rows are grouped by
/// account so each account's session is resolved once.
async fn remote_sweep(
    db: &Database,
    gmail: &GmailClient,
    auth: &GmailAuthenticator,
    rows: &[RawEmailRow],
    session_token: Option<&str>,
    refresh_buffer_seconds: u64,
    action: RemoteAction,
) {
    let mut by_account: HashMap<&str, Vec<&RawEmailRow>> = HashMap::new();
    for row in rows {
        by_account
            .entry(row.google_sub.as_str())
            .or_default()
            .push(row);
    }

    for (google_sub, group) in by_account {
        let user_id = group[0].user_id.as_str();
        let account = match account_repo::find(db, user_id, google_sub) {
            Ok(Some(account)) => account,
            Ok(None) => {
                warn!(
                    "No stored account {} for user {}, skipping remote {}",
                    google_sub,
                    user_id,
                    action.verb()
                );
                continue;
            }
            Err(e) => {
                error!("Failed to load account {}: {}", google_sub, e);
                continue;
            }
        };

        let session = match poll::resolve_session(
            db,
            auth,
            &account,
            session_token,
            refresh_buffer_seconds,
        )
        .await
        {
            Ok(Some(session)) => session,
            // A skipped primary account has already been warned about.
            Ok(None) => continue,
            Err(e) => {
                error!(
                    "Could not build a session for account {}: {}",
                    google_sub, e
                );
                continue;
            }
        };

        for row in group {
            let result = match action {
                RemoteAction::Trash => gmail.trash_message(&session, &row.email_id).await,
                RemoteAction::Archive => gmail.archive_message(&session, &row.email_id).await,
            };
            if let Err(e) = result {
                error!(
                    "Failed to {} message {} on account {}: {}",
                    action.verb(),
                    row.email_id,
                    google_sub,
                    e
                );
            }
        }
    }
}
