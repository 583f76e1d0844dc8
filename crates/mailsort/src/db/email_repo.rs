//! Email repository — CRUD operations for the `raw_emails` and
//! `processed_emails` tables.
//!
//! Both tables share the conflict key (user_id, email_id, thread_id,
//! google_sub); upserts update on conflict so re-ingestion never duplicates.
//! Every query is pre-filtered on user_id.

use rusqlite::params;

use super::{Database, DatabaseError};

/// A message as ingested from the remote mailbox.
#[derive(Debug, Clone)]
pub struct RawEmailRow {
    pub user_id: String,
    pub email_id: String,
    pub thread_id: String,
    pub subject: String,
    pub body: String,
    /// RFC 3339 UTC, when the Date header was present and parseable.
    pub received_at: Option<String>,
    pub archived: bool,
    pub unsubscribe_link: Option<String>,
    pub google_sub: String,
}

/// The classification outcome for a raw message.
#[derive(Debug, Clone)]
pub struct ProcessedEmailRow {
    pub user_id: String,
    pub email_id: String,
    pub thread_id: String,
    pub subject: String,
    pub summary: String,
    pub category_id: i64,
    pub unsubscribed: bool,
    pub received_at: Option<String>,
    pub archived: bool,
    pub google_sub: String,
}

/// A raw message enriched with its classification, when one exists.
#[derive(Debug, Clone)]
pub struct EmailDetail {
    pub raw: RawEmailRow,
    pub classification: Option<ClassificationInfo>,
}

/// Classification fields joined from `processed_emails` and `categories`.
#[derive(Debug, Clone)]
pub struct ClassificationInfo {
    pub summary: String,
    pub category_id: i64,
    pub category_name: Option<String>,
    pub category_description: Option<String>,
    pub unsubscribed: bool,
}

/// Inserts or updates one raw message.
pub fn upsert_raw(db: &Database, row: &RawEmailRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| upsert_raw_on(conn, row))
}

/// Inserts or updates a batch of raw messages under a single lock.
pub fn upsert_raw_batch(db: &Database, rows: &[RawEmailRow]) -> Result<(), DatabaseError> {
    if rows.is_empty() {
        return Ok(());
    }
    db.with_conn(|conn| {
        for row in rows {
            upsert_raw_on(conn, row)?;
        }
        Ok(())
    })
}

fn upsert_raw_on(conn: &rusqlite::Connection, row: &RawEmailRow) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO raw_emails (user_id, email_id, thread_id, subject, body, received_at, archived, unsubscribe_link, google_sub)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         ON CONFLICT(user_id, email_id, thread_id, google_sub) DO UPDATE SET
           subject = ?4,
           body = ?5,
           received_at = ?6,
           unsubscribe_link = ?8",
        params![
            row.user_id,
            row.email_id,
            row.thread_id,
            row.subject,
            row.body,
            row.received_at,
            row.archived,
            row.unsubscribe_link,
            row.google_sub,
        ],
    )?;
    Ok(())
}

/// Inserts or updates one classification outcome.
pub fn upsert_processed(db: &Database, row: &ProcessedEmailRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO processed_emails (user_id, email_id, thread_id, subject, summary, category_id, unsubscribed, received_at, archived, google_sub)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(user_id, email_id, thread_id, google_sub) DO UPDATE SET
               subject = ?4,
               summary = ?5,
               category_id = ?6,
               received_at = ?8",
            params![
                row.user_id,
                row.email_id,
                row.thread_id,
                row.subject,
                row.summary,
                row.category_id,
                row.unsubscribed,
                row.received_at,
                row.archived,
                row.google_sub,
            ],
        )?;
        Ok(())
    })
}

/// Returns the user's unprocessed backlog: raw messages whose conflict key
/// has no matching processed row. Ordered by insertion.
pub fn get_unprocessed(db: &Database, user_id: &str) -> Result<Vec<RawEmailRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT r.user_id, r.email_id, r.thread_id, r.subject, r.body, r.received_at, r.archived, r.unsubscribe_link, r.google_sub
             FROM raw_emails r
             WHERE r.user_id = ?1
               AND NOT EXISTS (
                 SELECT 1 FROM processed_emails p
                 WHERE p.user_id = r.user_id
                   AND p.email_id = r.email_id
                   AND p.thread_id = r.thread_id
                   AND p.google_sub = r.google_sub
               )
             ORDER BY r.id",
        )?;
        let rows = stmt.query_map(params![user_id], map_raw_row)?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(DatabaseError::Sqlite)
    })
}

/// Fetches the raw rows matching the given remote message ids.
pub fn get_raw_by_ids(
    db: &Database,
    user_id: &str,
    email_ids: &[String],
) -> Result<Vec<RawEmailRow>, DatabaseError> {
    if email_ids.is_empty() {
        return Ok(Vec::new());
    }

    db.with_conn(|conn| {
        // Build IN clause with positional params.
        let placeholders: Vec<String> =
            (0..email_ids.len()).map(|i| format!("?{}", i + 2)).collect();
        let sql = format!(
            "SELECT user_id, email_id, thread_id, subject, body, received_at, archived, unsubscribe_link, google_sub
             FROM raw_emails WHERE user_id = ?1 AND email_id IN ({})
             ORDER BY id",
            placeholders.join(", ")
        );

        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
        param_values.push(Box::new(user_id.to_string()));
        for id in email_ids {
            param_values.push(Box::new(id.clone()));
        }

        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&sql)?;
        let result = stmt
            .query_map(params_ref.as_slice(), map_raw_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(result)
    })
}

/// Fetches one message by remote id, enriched with classification fields
/// when a processed row exists.
pub fn get_by_id(
    db: &Database,
    user_id: &str,
    email_id: &str,
) -> Result<Option<EmailDetail>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT r.user_id, r.email_id, r.thread_id, r.subject, r.body, r.received_at, r.archived, r.unsubscribe_link, r.google_sub,
                    p.summary, p.category_id, p.unsubscribed, c.name, c.description
             FROM raw_emails r
             LEFT JOIN processed_emails p
               ON p.user_id = r.user_id
              AND p.email_id = r.email_id
              AND p.thread_id = r.thread_id
              AND p.google_sub = r.google_sub
             LEFT JOIN categories c
               ON c.user_id = p.user_id AND c.category_id = p.category_id
             WHERE r.user_id = ?1 AND r.email_id = ?2
             LIMIT 1",
        )?;
        let mut rows = stmt.query_map(params![user_id, email_id], |row| {
            let raw = map_raw_row(row)?;
            let summary: Option<String> = row.get(9)?;
            let classification = match summary {
                Some(summary) => Some(ClassificationInfo {
                    summary,
                    category_id: row.get(10)?,
                    unsubscribed: row.get(11)?,
                    category_name: row.get(12)?,
                    category_description: row.get(13)?,
                }),
                None => None,
            };
            Ok(EmailDetail {
                raw,
                classification,
            })
        })?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Lists all classification outcomes for a user, newest first.
pub fn list_processed(
    db: &Database,
    user_id: &str,
) -> Result<Vec<ProcessedEmailRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT user_id, email_id, thread_id, subject, summary, category_id, unsubscribed, received_at, archived, google_sub
             FROM processed_emails WHERE user_id = ?1
             ORDER BY received_at DESC",
        )?;
        let rows = stmt.query_map(params![user_id], map_processed_row)?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(DatabaseError::Sqlite)
    })
}

/// Deletes raw rows by remote id. Returns the number of rows deleted.
pub fn delete_raw(
    db: &Database,
    user_id: &str,
    email_ids: &[String],
) -> Result<u64, DatabaseError> {
    delete_from_table(db, "raw_emails", user_id, email_ids)
}

/// Deletes processed rows by remote id. Returns the number of rows deleted.
pub fn delete_processed(
    db: &Database,
    user_id: &str,
    email_ids: &[String],
) -> Result<u64, DatabaseError> {
    delete_from_table(db, "processed_emails", user_id, email_ids)
}

fn delete_from_table(
    db: &Database,
    table: &str,
    user_id: &str,
    email_ids: &[String],
) -> Result<u64, DatabaseError> {
    if email_ids.is_empty() {
        return Ok(0);
    }

    db.with_conn(|conn| {
        let placeholders: Vec<String> =
            (0..email_ids.len()).map(|i| format!("?{}", i + 2)).collect();
        let sql = format!(
            "DELETE FROM {} WHERE user_id = ?1 AND email_id IN ({})",
            table,
            placeholders.join(", ")
        );

        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
        param_values.push(Box::new(user_id.to_string()));
        for id in email_ids {
            param_values.push(Box::new(id.clone()));
        }

        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let count = conn.execute(&sql, params_ref.as_slice())?;
        Ok(count as u64)
    })
}

/// Marks a message archived in both tables. Rows absent from either table
/// are left alone.
pub fn mark_archived(db: &Database, user_id: &str, email_id: &str) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE raw_emails SET archived = 1 WHERE user_id = ?1 AND email_id = ?2",
            params![user_id, email_id],
        )?;
        conn.execute(
            "UPDATE processed_emails SET archived = 1 WHERE user_id = ?1 AND email_id = ?2",
            params![user_id, email_id],
        )?;
        Ok(())
    })
}

/// Marks a classified message unsubscribed.
pub fn mark_unsubscribed(
    db: &Database,
    user_id: &str,
    email_id: &str,
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE processed_emails SET unsubscribed = 1 WHERE user_id = ?1 AND email_id = ?2",
            params![user_id, email_id],
        )?;
        Ok(())
    })
}

/// Counts raw messages for a user.
pub fn count_raw(db: &Database, user_id: &str) -> Result<u64, DatabaseError> {
    count_table(db, "raw_emails", user_id)
}

/// Counts classification outcomes for a user.
pub fn count_processed(db: &Database, user_id: &str) -> Result<u64, DatabaseError> {
    count_table(db, "processed_emails", user_id)
}

fn count_table(db: &Database, table: &str, user_id: &str) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {} WHERE user_id = ?1", table),
            params![user_id],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}

fn map_raw_row(row: &rusqlite::Row<'_>) -> Result<RawEmailRow, rusqlite::Error> {
    Ok(RawEmailRow {
        user_id: row.get(0)?,
        email_id: row.get(1)?,
        thread_id: row.get(2)?,
        subject: row.get(3)?,
        body: row.get(4)?,
        received_at: row.get(5)?,
        archived: row.get(6)?,
        unsubscribe_link: row.get(7)?,
        google_sub: row.get(8)?,
    })
}

fn map_processed_row(row: &rusqlite::Row<'_>) -> Result<ProcessedEmailRow, rusqlite::Error> {
    Ok(ProcessedEmailRow {
        user_id: row.get(0)?,
        email_id: row.get(1)?,
        thread_id: row.get(2)?,
        subject: row.get(3)?,
        summary: row.get(4)?,
        category_id: row.get(5)?,
        unsubscribed: row.get(6)?,
        received_at: row.get(7)?,
        archived: row.get(8)?,
        google_sub: row.get(9)?,
    })
}
