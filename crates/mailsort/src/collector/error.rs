use thiserror::Error;

use crate::ai::ClassifierError;
use crate::db::DatabaseError;
use crate::gmail::GmailError;

/// Errors that prevent a run or action from proceeding at all.
///
/// Failures scoped to one account or one message are logged, recorded in the
/// run report, and skipped instead of surfacing here.
#[derive(Error, Debug)]
pub enum CollectorError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Mailbox error: {0}")]
    Gmail(#[from] GmailError),

    #[error("Classification error: {0}")]
    Classifier(#[from] ClassifierError),

    #[error("Run task failed: {0}")]
    TaskJoin(String),
}

pub type Result<T> = std::result::Result<T, CollectorError>;
