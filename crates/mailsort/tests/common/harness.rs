//! Test harness for collector runs against an in-memory database.
//!
//! The Gmail client and authenticator are constructed but never contacted:
//! accounts in these tests are either absent, missing locally, or skipped
//! primary accounts, so no request leaves the process.

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::SecretString;

use mailsort::ai::{Categorize, ClassifierError, EmailCategorization};
use mailsort::db::account_repo::{self, AccountRow};
use mailsort::db::category_repo::{self, CategoryRow};
use mailsort::db::email_repo::{self, ProcessedEmailRow, RawEmailRow};
use mailsort::gmail::{GmailAuthenticator, GmailClient, GMAIL_API_BASE, GOOGLE_TOKEN_URL};
use mailsort::{Database, EmailCollector};

/// Classifier stand-in returning canned outcomes, failing for configured ids.
pub struct ScriptedClassifier {
    fail_for: Vec<String>,
}

impl ScriptedClassifier {
    /// A classifier that succeeds for every message.
    pub fn new() -> Self {
        Self {
            fail_for: Vec::new(),
        }
    }

    /// A classifier that fails for the given message ids.
    pub fn failing_for(ids: &[&str]) -> Self {
        Self {
            fail_for: ids.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Default for ScriptedClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Categorize for ScriptedClassifier {
    async fn categorize(
        &self,
        email: &RawEmailRow,
        categories: &[CategoryRow],
    ) -> Result<EmailCategorization, ClassifierError> {
        if self.fail_for.contains(&email.email_id) {
            return Err(ClassifierError::EmptyResponse);
        }
        Ok(EmailCategorization {
            email_id: email.email_id.clone(),
            category_id: categories[0].category_id,
            summary: format!("Summary of {}", email.subject),
            confidence: 0.9,
        })
    }
}

/// Isolated test environment around an in-memory database.
pub struct TestHarness {
    pub db: Database,
}

impl TestHarness {
    pub fn new() -> Self {
        Self {
            db: Database::open_in_memory().expect("Failed to create test database"),
        }
    }

    /// Builds a collector over this harness's database.
    pub fn collector(&self, classifier: Arc<dyn Categorize>) -> EmailCollector {
        let gmail = GmailClient::new(GMAIL_API_BASE).expect("Failed to build Gmail client");
        let auth =
            GmailAuthenticator::new(GOOGLE_TOKEN_URL, "client-id", SecretString::from("secret"))
                .expect("Failed to build authenticator");
        EmailCollector::new(self.db.clone(), gmail, auth, classifier)
    }

    /// Stores a linked account row.
    pub fn link_account(&self, account: &AccountRow) {
        account_repo::upsert(&self.db, account).expect("Failed to upsert account");
    }

    /// Creates a category and returns its per-user id.
    pub fn create_category(&self, user_id: &str, name: &str) -> i64 {
        category_repo::create(&self.db, user_id, name, None).expect("Failed to create category")
    }

    /// Ingests raw messages as if a poll pass had stored them.
    pub fn ingest(&self, rows: &[RawEmailRow]) {
        email_repo::upsert_raw_batch(&self.db, rows).expect("Failed to upsert raw emails");
    }

    /// Stores a classification outcome for an already ingested message.
    ///
    /// Thread id and account follow the same defaults as `RawEmailBuilder`,
    /// so the anti-join between the two tables matches.
    pub fn classify(&self, user_id: &str, email_id: &str, category_id: i64) {
        email_repo::upsert_processed(
            &self.db,
            &ProcessedEmailRow {
                user_id: user_id.to_string(),
                email_id: email_id.to_string(),
                thread_id: format!("thread-{}", email_id),
                subject: format!("Subject {}", email_id),
                summary: "A summary".to_string(),
                category_id,
                unsubscribed: false,
                received_at: None,
                archived: false,
                google_sub: "sub-a".to_string(),
            },
        )
        .expect("Failed to upsert classification");
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
