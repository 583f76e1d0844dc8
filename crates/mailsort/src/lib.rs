pub mod ai;
pub mod collector;
pub mod config;
pub mod db;
pub mod error;
pub mod gmail;
pub mod secrets;

pub use ai::{Categorize, ClassifierError, EmailCategorization, EmailClassifier};
pub use collector::{
    CollectorError, EmailCollector, RunHandle, RunOutcome, RunPhase, RunReport, RunState,
    RunStatus, RunTracker,
};
pub use config::{load_config, Config};
pub use db::{Database, DatabaseError};
pub use error::{ConfigError, MailsortError, Result};
pub use gmail::{GmailAuthenticator, GmailClient, GmailError, GmailSession};
pub use secrets::{resolve_secret, resolve_secret_optional, SecretError};
