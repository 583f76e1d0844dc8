use std::path::Path;

use crate::config::schema::Config;
use crate::error::ConfigError;
use crate::secrets;

const SCHEMA_JSON: &str = include_str!("../../../../schema/config-v1.json");

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let yaml_value: serde_yaml::Value = serde_yaml::from_str(content)?;

    // The schema operates on JSON, so the YAML document is converted first.
    let json_value = serde_json::to_value(&yaml_value)?;

    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let compiled =
        jsonschema::JSONSchema::compile(&schema).map_err(|e| ConfigError::Validation {
            message: format!("Failed to compile JSON schema: {}", e),
        })?;

    let result = compiled.validate(json_value);
    if let Err(errors) = result {
        let error_messages: Vec<String> = errors
            .map(|e| format!("{} at {}", e, e.instance_path))
            .collect();
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

/// Semantic checks on the deserialized config, after defaults are applied.
fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if config.database.path.is_empty() {
        return Err(ConfigError::Validation {
            message: "database.path must not be empty".to_string(),
        });
    }

    if config.gmail.api_base_url.is_empty() {
        return Err(ConfigError::Validation {
            message: "gmail.apiBaseUrl must not be empty".to_string(),
        });
    }

    if config.gmail.token_url.is_empty() {
        return Err(ConfigError::Validation {
            message: "gmail.tokenUrl must not be empty".to_string(),
        });
    }

    if config.gmail.client_id.is_empty() {
        return Err(ConfigError::Validation {
            message: "gmail.clientId must not be empty".to_string(),
        });
    }

    // The remote API rejects list requests above 500.
    if config.gmail.poll_batch_size == 0 || config.gmail.poll_batch_size > 500 {
        return Err(ConfigError::Validation {
            message: format!(
                "gmail.pollBatchSize must be between 1 and 500, got {}",
                config.gmail.poll_batch_size
            ),
        });
    }

    if !secrets::has_secret_source(
        config.gmail.client_secret_insecure.as_deref(),
        config.gmail.client_secret_file.as_deref(),
        config.gmail.client_secret_env_var.as_deref(),
    ) {
        return Err(ConfigError::Validation {
            message: "gmail: client secret requires one of: clientSecretInsecure, \
                      clientSecretFile, or clientSecretEnvVar"
                .to_string(),
        });
    }

    if config.classifier.api_base_url.is_empty() {
        return Err(ConfigError::Validation {
            message: "classifier.apiBaseUrl must not be empty".to_string(),
        });
    }

    if config.classifier.model.is_empty() {
        return Err(ConfigError::Validation {
            message: "classifier.model must not be empty".to_string(),
        });
    }

    if !(0.0..=2.0).contains(&config.classifier.temperature) {
        return Err(ConfigError::Validation {
            message: format!(
                "classifier.temperature must be between 0.0 and 2.0, got {}",
                config.classifier.temperature
            ),
        });
    }

    if config.classifier.max_body_chars == 0 {
        return Err(ConfigError::Validation {
            message: "classifier.maxBodyChars must be at least 1".to_string(),
        });
    }

    if !secrets::has_secret_source(
        config.classifier.api_key_insecure.as_deref(),
        config.classifier.api_key_file.as_deref(),
        config.classifier.api_key_env_var.as_deref(),
    ) {
        return Err(ConfigError::Validation {
            message: "classifier: API key requires one of: apiKeyInsecure, apiKeyFile, \
                      or apiKeyEnvVar"
                .to_string(),
        });
    }

    Ok(())
}
