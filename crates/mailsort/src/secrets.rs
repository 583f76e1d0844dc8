//! Secret resolution from multiple sources.
//!
//! The two credentials this crate needs (the Google OAuth2 client secret and
//! the classification model API key) can each come from one of three places,
//! tried in priority order:
//!
//! 1. **Direct value** - For quick local testing (e.g., `clientSecret: "..."`)
//! 2. **File reference** - For Docker secrets (e.g., `clientSecretFile: /run/secrets/gmail`)
//! 3. **Env var reference** - For Kubernetes/production (e.g., `clientSecretEnvVar: GMAIL_CLIENT_SECRET`)
//!
//! Resolved values are wrapped in [`SecretString`] so they never reach a log
//! line or a `Debug` dump.

use secrecy::SecretString;
use std::fs;

/// Error type for secret resolution failures.
#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("No secret source provided (need one of: direct value, file path, or env var name)")]
    NoSourceProvided,

    #[error("Failed to read secret from file '{path}': {source}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Environment variable '{name}' not set")]
    EnvVarNotSet { name: String },

    #[error("Environment variable '{name}' contains invalid UTF-8")]
    EnvVarNotUnicode { name: String },
}

/// Result type for secret resolution.
pub type Result<T> = std::result::Result<T, SecretError>;

/// Resolves a secret from multiple sources in priority order:
/// 1. Direct value (if provided and non-empty)
/// 2. File contents (if path provided)
/// 3. Environment variable (if name provided)
///
/// # Arguments
///
/// * `direct` - Optional direct value of the secret
/// * `file_path` - Optional path to a file containing the secret
/// * `env_var` - Optional name of an environment variable containing the secret
///
/// # Returns
///
/// The resolved secret wrapped in `SecretString`, or an error if no source
/// provides a valid value.
///
/// # Examples
///
/// ```ignore
/// use mailsort::secrets::resolve_secret;
///
/// // Direct value takes priority
/// let secret = resolve_secret(
///     Some("my-client-secret"),
///     Some("/run/secrets/gmail"),
///     Some("GMAIL_CLIENT_SECRET"),
/// )?;
///
/// // File path used if no direct value
/// let secret = resolve_secret(
///     None,
///     Some("~/.secrets/model-api-key"),
///     Some("MODEL_API_KEY"),
/// )?;
///
/// // Env var used as fallback
/// let secret = resolve_secret(
///     None,
///     None,
///     Some("MODEL_API_KEY"),
/// )?;
/// ```
pub fn resolve_secret(
    direct: Option<&str>,
    file_path: Option<&str>,
    env_var: Option<&str>,
) -> Result<SecretString> {
    // Priority 1: Direct value
    if let Some(value) = direct {
        if !value.is_empty() {
            return Ok(SecretString::from(value.to_string()));
        }
    }

    // Priority 2: File
    if let Some(path) = file_path {
        if !path.is_empty() {
            let expanded = expand_home(path);
            match fs::read_to_string(&expanded) {
                Ok(content) => return Ok(SecretString::from(content.trim().to_string())),
                Err(e) => {
                    return Err(SecretError::FileReadError {
                        path: expanded,
                        source: e,
                    })
                }
            }
        }
    }

    // Priority 3: Environment variable
    if let Some(var_name) = env_var {
        if !var_name.is_empty() {
            match std::env::var(var_name) {
                Ok(value) => {
                    // Trim whitespace for consistency (env vars may have trailing newlines)
                    let trimmed = value.trim();
                    return Ok(SecretString::from(trimmed));
                }
                Err(std::env::VarError::NotPresent) => {
                    return Err(SecretError::EnvVarNotSet {
                        name: var_name.to_string(),
                    })
                }
                Err(std::env::VarError::NotUnicode(_)) => {
                    return Err(SecretError::EnvVarNotUnicode {
                        name: var_name.to_string(),
                    })
                }
            }
        }
    }

    Err(SecretError::NoSourceProvided)
}

/// Resolves a secret, returning None if no source is provided instead of an error.
///
/// This is useful for optional secrets where missing values are acceptable.
pub fn resolve_secret_optional(
    direct: Option<&str>,
    file_path: Option<&str>,
    env_var: Option<&str>,
) -> Result<Option<SecretString>> {
    match resolve_secret(direct, file_path, env_var) {
        Ok(secret) => Ok(Some(secret)),
        Err(SecretError::NoSourceProvided) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Checks if at least one secret source is configured (non-empty).
///
/// This is useful for validation to ensure the user has provided
/// at least one way to obtain a secret.
pub fn has_secret_source(
    direct: Option<&str>,
    file_path: Option<&str>,
    env_var: Option<&str>,
) -> bool {
    direct.is_some_and(|s| !s.is_empty())
        || file_path.is_some_and(|s| !s.is_empty())
        || env_var.is_some_and(|s| !s.is_empty())
}

/// Expands `~` to the user's home directory.
///
/// Works cross-platform: checks HOME (Unix) then USERPROFILE (Windows).
/// Handles both `~/path` and standalone `~`.
///
/// **Limitation**: This function does NOT support `~user/path` syntax
/// (e.g., `~alice/secrets`). Only the current user's home directory
/// expansion via `~` or `~/path` is supported. Use absolute paths if
/// you need to reference other users' directories.
fn expand_home(path: &str) -> String {
    if path == "~" || path.starts_with("~/") {
        if let Some(home) = std::env::var_os("HOME").or_else(|| std::env::var_os("USERPROFILE")) {
            if path == "~" {
                return home.to_string_lossy().into_owned();
            }
            return path.replacen("~", &home.to_string_lossy(), 1);
        }
    }
    path.to_string()
}
