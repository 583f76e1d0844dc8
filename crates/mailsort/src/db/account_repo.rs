//! Linked-account repository — CRUD operations for the `gmail_accounts` table.

use rusqlite::params;

use super::{Database, DatabaseError};

/// Refresh-token sentinel marking the user's primary account. Accounts
/// carrying it have no stored refresh credential; callers substitute the
/// live session token instead.
pub const PRIMARY_ACCOUNT_SENTINEL: &str = "primary_account";

/// A linked Gmail account row.
#[derive(Debug, Clone)]
pub struct AccountRow {
    pub user_id: String,
    pub google_sub: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<String>,
    pub email: Option<String>,
}

impl AccountRow {
    /// True when this account's stored refresh credential is the
    /// primary-account sentinel.
    pub fn is_primary(&self) -> bool {
        self.refresh_token.as_deref() == Some(PRIMARY_ACCOUNT_SENTINEL)
    }

    /// Checks if the access token is expired (or expires within
    /// `buffer_seconds`). A missing or unparseable expiry counts as expired.
    pub fn is_expired(&self, buffer_seconds: u64) -> bool {
        let Some(expires_at) = self.expires_at.as_deref() else {
            return true;
        };
        let Ok(expires) = chrono::DateTime::parse_from_rfc3339(expires_at) else {
            return true;
        };
        let now = chrono::Utc::now();
        let buffer = chrono::Duration::seconds(buffer_seconds.min(365 * 24 * 3600) as i64);
        expires <= now + buffer
    }

    /// Checks if the account carries a real refresh credential.
    pub fn can_refresh(&self) -> bool {
        self.refresh_token.is_some() && !self.is_primary()
    }
}

/// Inserts or updates a linked account.
///
/// On conflict the stored refresh token survives unless the new row carries
/// one: re-linking an account without a fresh consent screen returns no
/// refresh token, and overwriting the stored one with NULL would strand the
/// account.
pub fn upsert(db: &Database, row: &AccountRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO gmail_accounts (user_id, google_sub, access_token, refresh_token, expires_at, email, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, datetime('now'))
             ON CONFLICT(user_id, google_sub) DO UPDATE SET
               access_token = ?3,
               refresh_token = COALESCE(?4, refresh_token),
               expires_at = ?5,
               email = COALESCE(?6, email),
               updated_at = datetime('now')",
            params![
                row.user_id,
                row.google_sub,
                row.access_token,
                row.refresh_token,
                row.expires_at,
                row.email,
            ],
        )?;
        Ok(())
    })
}

/// Finds one account by its remote identifier.
pub fn find(
    db: &Database,
    user_id: &str,
    google_sub: &str,
) -> Result<Option<AccountRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT user_id, google_sub, access_token, refresh_token, expires_at, email
             FROM gmail_accounts WHERE user_id = ?1 AND google_sub = ?2",
        )?;
        let mut rows = stmt.query_map(params![user_id, google_sub], map_account_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Lists all linked accounts for a user.
pub fn list_for_user(db: &Database, user_id: &str) -> Result<Vec<AccountRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT user_id, google_sub, access_token, refresh_token, expires_at, email
             FROM gmail_accounts WHERE user_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![user_id], map_account_row)?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(DatabaseError::Sqlite)
    })
}

/// Stores a freshly refreshed access token and its expiry.
pub fn update_access_token(
    db: &Database,
    user_id: &str,
    google_sub: &str,
    access_token: &str,
    expires_at: Option<&str>,
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE gmail_accounts
             SET access_token = ?3, expires_at = ?4, updated_at = datetime('now')
             WHERE user_id = ?1 AND google_sub = ?2",
            params![user_id, google_sub, access_token, expires_at],
        )?;
        Ok(())
    })
}

fn map_account_row(row: &rusqlite::Row<'_>) -> Result<AccountRow, rusqlite::Error> {
    Ok(AccountRow {
        user_id: row.get(0)?,
        google_sub: row.get(1)?,
        access_token: row.get(2)?,
        refresh_token: row.get(3)?,
        expires_at: row.get(4)?,
        email: row.get(5)?,
    })
}
