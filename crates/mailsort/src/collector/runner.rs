//! Ingestion run orchestration: poll every linked account, merge the
//! backlogs, classify the unprocessed delta.

use std::collections::HashSet;
use std::sync::Arc;

use log::{debug, error, info};
use tracing::{info_span, Instrument};
use uuid::Uuid;

use crate::ai::{Categorize, EmailCategorization};
use crate::db::account_repo::{self, AccountRow};
use crate::db::category_repo::{self, CategoryRow};
use crate::db::email_repo::{self, EmailDetail, ProcessedEmailRow, RawEmailRow};
use crate::db::Database;
use crate::gmail::{GmailAuthenticator, GmailClient, DEFAULT_POLL_BATCH_SIZE};

use super::actions;
use super::error::Result;
use super::poll::{self, DEFAULT_REFRESH_BUFFER_SECONDS};
use super::progress::{RunHandle, RunPhase, RunTracker};

/// Outcome of a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// A full pass over the backlog finished.
    Completed,
    /// The user has no linked accounts; there was nothing to do.
    NoAccounts,
    /// The user has no categories; polling ran but nothing was classified.
    NoCategories,
}

/// Summary of one ingestion run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub accounts_polled: usize,
    pub accounts_skipped: usize,
    pub accounts_failed: usize,
    pub messages_merged: usize,
    pub messages_classified: usize,
    /// Per-unit failures that were logged and skipped.
    pub errors: Vec<String>,
}

impl RunReport {
    pub fn new(outcome: RunOutcome) -> Self {
        Self {
            outcome,
            accounts_polled: 0,
            accounts_skipped: 0,
            accounts_failed: 0,
            messages_merged: 0,
            messages_classified: 0,
            errors: Vec::new(),
        }
    }
}

/// Orchestrates the poll, merge, and classify pass for one user.
///
/// Stateless between runs and safe to re-trigger at any time: ingestion
/// upserts idempotently and classification only ever touches the
/// unprocessed delta. All collaborators are injected.
#[derive(Clone)]
pub struct EmailCollector {
    db: Database,
    gmail: GmailClient,
    auth: GmailAuthenticator,
    classifier: Arc<dyn Categorize>,
    batch_size: u32,
    refresh_buffer_seconds: u64,
}

impl EmailCollector {
    /// Builds a collector from its collaborators.
    pub fn new(
        db: Database,
        gmail: GmailClient,
        auth: GmailAuthenticator,
        classifier: Arc<dyn Categorize>,
    ) -> Self {
        Self {
            db,
            gmail,
            auth,
            classifier,
            batch_size: DEFAULT_POLL_BATCH_SIZE,
            refresh_buffer_seconds: DEFAULT_REFRESH_BUFFER_SECONDS,
        }
    }

    /// Overrides the per-account page size.
    pub fn with_batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Overrides the buffer applied when deciding whether a stored access
    /// token counts as expired.
    pub fn with_refresh_buffer(mut self, seconds: u64) -> Self {
        self.refresh_buffer_seconds = seconds;
        self
    }

    /// Triggers a run in the background and returns immediately.
    ///
    /// Dropping the handle detaches the run; it keeps going on its own.
    pub fn spawn(&self, user_id: &str, session_token: Option<&str>) -> RunHandle {
        let run_id = Uuid::new_v4().to_string();
        let tracker = RunTracker::new();

        let collector = self.clone();
        let user = user_id.to_string();
        let token = session_token.map(str::to_string);
        let task_tracker = tracker.clone();
        let span = info_span!("ingestion_run", run_id = %run_id, user = %user);

        let task = tokio::spawn(
            async move {
                let result = collector.run(&user, token.as_deref(), &task_tracker).await;
                if let Err(ref e) = result {
                    error!("Ingestion run failed: {}", e);
                    task_tracker.fail(&e.to_string());
                }
                result
            }
            .instrument(span),
        );

        RunHandle::new(run_id, tracker, task)
    }

    /// Runs one full pass and returns its report.
    ///
    /// `session_token` substitutes for the primary account's missing stored
    /// credential when present. Progress is published through `tracker`.
    pub async fn run(
        &self,
        user_id: &str,
        session_token: Option<&str>,
        tracker: &RunTracker,
    ) -> Result<RunReport> {
        info!("Starting ingestion run for user {}", user_id);

        tracker.set_phase(RunPhase::ListingAccounts);
        let accounts = {
            let _step = info_span!("list_accounts").entered();
            account_repo::list_for_user(&self.db, user_id)?
        };
        if accounts.is_empty() {
            info!("User {} has no linked accounts, nothing to poll", user_id);
            let report = RunReport::new(RunOutcome::NoAccounts);
            tracker.complete(&report);
            return Ok(report);
        }

        let mut report = RunReport::new(RunOutcome::Completed);

        tracker.set_phase(RunPhase::Polling);
        let backlogs = self
            .poll_accounts(&accounts, session_token, &mut report)
            .instrument(info_span!("poll_accounts"))
            .await;
        tracker.record_accounts(
            report.accounts_polled,
            report.accounts_skipped,
            report.accounts_failed,
        );

        tracker.set_phase(RunPhase::Merging);
        let backlog = {
            let _step = info_span!("merge_backlogs").entered();
            merge_backlogs(backlogs)
        };
        report.messages_merged = backlog.len();
        tracker.record_merged(backlog.len());

        let categories = category_repo::list_for_user(&self.db, user_id)?;
        if categories.is_empty() {
            info!(
                "User {} has no categories, skipping classification",
                user_id
            );
            report.outcome = RunOutcome::NoCategories;
            tracker.complete(&report);
            return Ok(report);
        }

        tracker.set_phase(RunPhase::Classifying);
        classify_backlog(
            &self.db,
            self.classifier.as_ref(),
            &backlog,
            &categories,
            &mut report,
            tracker,
        )
        .instrument(info_span!("classify_backlog"))
        .await;

        info!(
            "Run complete for user {}: {} accounts polled, {} messages merged, {} classified",
            user_id, report.accounts_polled, report.messages_merged, report.messages_classified
        );
        tracker.complete(&report);
        Ok(report)
    }

    /// Polls every account; one account's failure never stops the rest.
    async fn poll_accounts(
        &self,
        accounts: &[AccountRow],
        session_token: Option<&str>,
        report: &mut RunReport,
    ) -> Vec<Vec<RawEmailRow>> {
        let mut backlogs = Vec::new();
        for account in accounts {
            match self.poll_one(account, session_token).await {
                Ok(Some(backlog)) => {
                    report.accounts_polled += 1;
                    backlogs.push(backlog);
                }
                Ok(None) => report.accounts_skipped += 1,
                Err(e) => {
                    error!(
                        "Polling failed for account {} of user {}: {}",
                        account.google_sub, account.user_id, e
                    );
                    report
                        .errors
                        .push(format!("account {}: {}", account.google_sub, e));
                    report.accounts_failed += 1;
                }
            }
        }
        backlogs
    }

    async fn poll_one(
        &self,
        account: &AccountRow,
        session_token: Option<&str>,
    ) -> Result<Option<Vec<RawEmailRow>>> {
        let session = match poll::resolve_session(
            &self.db,
            &self.auth,
            account,
            session_token,
            self.refresh_buffer_seconds,
        )
        .await?
        {
            Some(session) => session,
            None => return Ok(None),
        };

        let backlog =
            poll::poll_account(&self.db, &self.gmail, &session, account, self.batch_size).await?;
        Ok(Some(backlog))
    }

    /// Trashes the given messages remotely and deletes them locally.
    /// Returns the local delete count.
    pub async fn delete_messages(
        &self,
        user_id: &str,
        email_ids: &[String],
        session_token: Option<&str>,
    ) -> Result<u64> {
        actions::delete_messages(
            &self.db,
            &self.gmail,
            &self.auth,
            user_id,
            email_ids,
            session_token,
            self.refresh_buffer_seconds,
        )
        .await
    }

    /// Archives the given messages remotely and marks them archived locally.
    /// Returns the number of messages marked.
    pub async fn archive_messages(
        &self,
        user_id: &str,
        email_ids: &[String],
        session_token: Option<&str>,
    ) -> Result<u64> {
        actions::archive_messages(
            &self.db,
            &self.gmail,
            &self.auth,
            user_id,
            email_ids,
            session_token,
            self.refresh_buffer_seconds,
        )
        .await
    }

    /// Marks a classified message unsubscribed and returns its stored link.
    pub fn unsubscribe(&self, user_id: &str, email_id: &str) -> Result<Option<String>> {
        actions::unsubscribe(&self.db, user_id, email_id)
    }

    /// Fetches one stored message, enriched with its classification when
    /// one exists.
    pub fn get_message(&self, user_id: &str, email_id: &str) -> Result<Option<EmailDetail>> {
        actions::get_message(&self.db, user_id, email_id)
    }
}

/// Merges per-account backlogs into one deterministic list: newest first
/// (missing timestamps last), de-duplicated on the storage key keeping the
/// first occurrence. Each account's poll returns the same user-wide
/// backlog, so without de-duplication a multi-account user would classify
/// every message once per account.
fn merge_backlogs(backlogs: Vec<Vec<RawEmailRow>>) -> Vec<RawEmailRow> {
    let mut merged: Vec<RawEmailRow> = backlogs.into_iter().flatten().collect();
    merged.sort_by(|a, b| b.received_at.cmp(&a.received_at));

    let mut seen = HashSet::new();
    merged.retain(|row| {
        seen.insert((
            row.user_id.clone(),
            row.email_id.clone(),
            row.thread_id.clone(),
            row.google_sub.clone(),
        ))
    });
    merged
}

/// Classifies the backlog sequentially. A per-message failure is logged,
/// recorded in the report, and skipped; the rest of the backlog proceeds.
async fn classify_backlog(
    db: &Database,
    classifier: &dyn Categorize,
    backlog: &[RawEmailRow],
    categories: &[CategoryRow],
    report: &mut RunReport,
    tracker: &RunTracker,
) {
    for message in backlog {
        match classify_message(db, classifier, message, categories).await {
            Ok(()) => {
                report.messages_classified += 1;
                tracker.increment_classified();
            }
            Err(e) => {
                error!(
                    "Classification failed for message {}: {}",
                    message.email_id, e
                );
                report
                    .errors
                    .push(format!("message {}: {}", message.email_id, e));
            }
        }
    }
}

async fn classify_message(
    db: &Database,
    classifier: &dyn Categorize,
    message: &RawEmailRow,
    categories: &[CategoryRow],
) -> Result<()> {
    let outcome = classifier.categorize(message, categories).await?;
    debug!(
        "Message {} assigned category {} (confidence {:.2})",
        message.email_id, outcome.category_id, outcome.confidence
    );
    email_repo::upsert_processed(db, &to_processed_row(message, &outcome))?;
    Ok(())
}

/// Derives the stored classification row for a message.
fn to_processed_row(message: &RawEmailRow, outcome: &EmailCategorization) -> ProcessedEmailRow {
    ProcessedEmailRow {
        user_id: message.user_id.clone(),
        email_id: message.email_id.clone(),
        thread_id: message.thread_id.clone(),
        subject: message.subject.clone(),
        summary: outcome.summary.clone(),
        category_id: outcome.category_id,
        unsubscribed: false,
        received_at: message.received_at.clone(),
        archived: message.archived,
        google_sub: message.google_sub.clone(),
    }
}
