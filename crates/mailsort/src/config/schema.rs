use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::ai::classifier::{DEFAULT_MAX_BODY_CHARS, DEFAULT_TEMPERATURE};
use crate::collector::DEFAULT_REFRESH_BUFFER_SECONDS;
use crate::error::ConfigError;
use crate::gmail::{DEFAULT_POLL_BATCH_SIZE, GMAIL_API_BASE, GOOGLE_TOKEN_URL};
use crate::secrets;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub version: String,
    #[serde(default)]
    pub database: DatabaseConfig,
    pub gmail: GmailConfig,
    pub classifier: ClassifierConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseConfig {
    /// SQLite database file path. `~` expands to the home directory.
    #[serde(default = "default_database_path")]
    pub path: String,
}

fn default_database_path() -> String {
    crate::db::default_database_path()
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|| "mailsort.db".to_string())
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

/// Gmail API access settings for polling linked accounts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GmailConfig {
    /// Gmail REST API base URL. Overridable for proxies.
    #[serde(default = "default_gmail_api_base")]
    pub api_base_url: String,

    /// OAuth2 token endpoint used for refresh grants.
    #[serde(default = "default_token_url")]
    pub token_url: String,

    /// OAuth2 client ID of the application.
    pub client_id: String,

    /// Direct OAuth2 client secret (for local development).
    /// WARNING: This stores the client secret in plaintext in the config file.
    /// Prefer clientSecretEnvVar or clientSecretFile for better security.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        alias = "client_secret"
    )]
    pub client_secret_insecure: Option<String>,

    /// Path to file containing the OAuth2 client secret (for Docker secrets).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret_file: Option<String>,

    /// Environment variable containing the OAuth2 client secret.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret_env_var: Option<String>,

    /// Messages fetched per account on each poll pass.
    #[serde(default = "default_poll_batch_size")]
    pub poll_batch_size: u32,

    /// Seconds before the stored expiry at which a token counts as expired.
    #[serde(default = "default_refresh_buffer")]
    pub refresh_buffer_seconds: u64,
}

fn default_gmail_api_base() -> String {
    GMAIL_API_BASE.to_string()
}

fn default_token_url() -> String {
    GOOGLE_TOKEN_URL.to_string()
}

fn default_poll_batch_size() -> u32 {
    DEFAULT_POLL_BATCH_SIZE
}

fn default_refresh_buffer() -> u64 {
    DEFAULT_REFRESH_BUFFER_SECONDS
}

impl GmailConfig {
    /// Resolves the OAuth2 client secret from its configured source.
    pub fn client_secret(&self) -> Result<SecretString, ConfigError> {
        secrets::resolve_secret(
            self.client_secret_insecure.as_deref(),
            self.client_secret_file.as_deref(),
            self.client_secret_env_var.as_deref(),
        )
        .map_err(|e| ConfigError::Secret {
            field: "gmail.clientSecret".to_string(),
            source: e,
        })
    }
}

/// Classification model settings (OpenAI-compatible chat completions API).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifierConfig {
    /// Chat completions API base URL.
    #[serde(default = "default_classifier_api_base")]
    pub api_base_url: String,

    /// Model identifier sent with each request.
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum email body characters included in the prompt.
    #[serde(default = "default_max_body_chars")]
    pub max_body_chars: usize,

    /// Direct API key (for local development).
    /// WARNING: This stores the API key in plaintext in the config file.
    /// Prefer apiKeyEnvVar or apiKeyFile for better security.
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "api_key")]
    pub api_key_insecure: Option<String>,

    /// Path to file containing the API key (for Docker secrets).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_file: Option<String>,

    /// Environment variable containing the API key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env_var: Option<String>,
}

fn default_classifier_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}

fn default_max_body_chars() -> usize {
    DEFAULT_MAX_BODY_CHARS
}

impl ClassifierConfig {
    /// Resolves the model API key from its configured source.
    pub fn api_key(&self) -> Result<SecretString, ConfigError> {
        secrets::resolve_secret(
            self.api_key_insecure.as_deref(),
            self.api_key_file.as_deref(),
            self.api_key_env_var.as_deref(),
        )
        .map_err(|e| ConfigError::Secret {
            field: "classifier.apiKey".to_string(),
            source: e,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_database_config_default() {
        let config = DatabaseConfig::default();
        assert!(config.path.ends_with("mailsort.db"));
    }

    #[test]
    fn test_gmail_config_defaults_applied() {
        let config: GmailConfig = serde_yaml::from_str("clientId: my-client-id").unwrap();

        assert_eq!(config.client_id, "my-client-id");
        assert_eq!(config.api_base_url, GMAIL_API_BASE);
        assert_eq!(config.token_url, GOOGLE_TOKEN_URL);
        assert_eq!(config.poll_batch_size, DEFAULT_POLL_BATCH_SIZE);
        assert_eq!(config.refresh_buffer_seconds, DEFAULT_REFRESH_BUFFER_SECONDS);
    }

    #[test]
    fn test_classifier_config_defaults_applied() {
        let config: ClassifierConfig = serde_yaml::from_str("apiKeyEnvVar: MODEL_API_KEY").unwrap();

        assert_eq!(config.api_base_url, "https://api.openai.com/v1");
        assert_eq!(config.model, "gpt-4o-mini");
        assert!((config.temperature - DEFAULT_TEMPERATURE).abs() < f32::EPSILON);
        assert_eq!(config.max_body_chars, DEFAULT_MAX_BODY_CHARS);
    }

    #[test]
    fn test_client_secret_direct_value() {
        let config: GmailConfig =
            serde_yaml::from_str("clientId: id\nclientSecretInsecure: shh").unwrap();
        let secret = config.client_secret().unwrap();
        assert_eq!(secret.expose_secret(), "shh");
    }

    #[test]
    fn test_client_secret_plain_alias() {
        let config: GmailConfig = serde_yaml::from_str("clientId: id\nclient_secret: shh").unwrap();
        assert_eq!(config.client_secret_insecure.as_deref(), Some("shh"));
    }

    #[test]
    fn test_api_key_missing_source() {
        let config: ClassifierConfig = serde_yaml::from_str("model: gpt-4o-mini").unwrap();
        let result = config.api_key();
        assert!(matches!(result, Err(ConfigError::Secret { .. })));
    }
}
