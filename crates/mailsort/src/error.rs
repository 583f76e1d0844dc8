use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MailsortError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Mailbox error: {0}")]
    Gmail(#[from] crate::gmail::GmailError),

    #[error("Classification error: {0}")]
    Classifier(#[from] crate::ai::ClassifierError),

    #[error("Collector error: {0}")]
    Collector(#[from] crate::collector::CollectorError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config YAML: {0}")]
    ParseYaml(#[from] serde_yaml::Error),

    #[error("Failed to decode config: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },

    #[error("Secret resolution failed for '{field}': {source}")]
    Secret {
        field: String,
        #[source]
        source: crate::secrets::SecretError,
    },
}

pub type Result<T> = std::result::Result<T, MailsortError>;
