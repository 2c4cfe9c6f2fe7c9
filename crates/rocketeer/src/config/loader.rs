use std::path::{Component, Path};

use crate::config::schema::{
    Configuration, EngineSettings, GitAuthType, API_VERSION, CONFIGURATION_KIND,
};
use crate::error::ConfigError;
use crate::gitops::git::validate_ref;
use crate::secrets::has_secret_source;

const CONFIGURATION_SCHEMA_JSON: &str =
    include_str!("../../schema/configuration-v1alpha1.json");

fn read(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Loads a `Configuration` document (YAML or JSON) and validates it.
pub fn load_configuration<P: AsRef<Path>>(path: P) -> Result<Configuration, ConfigError> {
    load_configuration_from_str(&read(path.as_ref())?)
}

pub fn load_configuration_from_str(content: &str) -> Result<Configuration, ConfigError> {
    let json_value: serde_json::Value = serde_yaml::from_str(content)?;

    validate_schema(&json_value)?;

    let config: Configuration =
        serde_json::from_value(json_value).map_err(|e| ConfigError::Validation {
            message: e.to_string(),
        })?;

    validate_configuration(&config)?;

    Ok(config)
}

/// Loads engine settings from a YAML file. Missing fields take their defaults.
pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<EngineSettings, ConfigError> {
    load_settings_from_str(&read(path.as_ref())?)
}

pub fn load_settings_from_str(content: &str) -> Result<EngineSettings, ConfigError> {
    let settings: EngineSettings = serde_yaml::from_str(content)?;
    validate_settings(&settings)?;
    Ok(settings)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(CONFIGURATION_SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

fn validate_configuration(config: &Configuration) -> Result<(), ConfigError> {
    if config.api_version != API_VERSION || config.kind != CONFIGURATION_KIND {
        return Err(ConfigError::Validation {
            message: format!(
                "Expected {} {}, got {} {}",
                API_VERSION, CONFIGURATION_KIND, config.api_version, config.kind
            ),
        });
    }

    if config.spec.git_url.trim().is_empty() {
        return Err(ConfigError::Validation {
            message: "spec.gitUrl must not be empty".to_string(),
        });
    }

    validate_ref(&config.spec.git_ref).map_err(|reason| ConfigError::InvalidRef {
        git_ref: config.spec.git_ref.clone(),
        reason,
    })?;

    // The folder is joined onto the working copy, so it must stay inside it.
    let folder = Path::new(config.spec.descriptors_folder());
    let escapes = folder
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        return Err(ConfigError::Validation {
            message: format!(
                "spec.descriptorsFolder '{}' must be a relative path inside the repository",
                folder.display()
            ),
        });
    }

    Ok(())
}

fn validate_settings(settings: &EngineSettings) -> Result<(), ConfigError> {
    if settings.sync_interval_secs == 0 {
        return Err(ConfigError::Validation {
            message: "syncIntervalSecs must be greater than 0".to_string(),
        });
    }
    if settings.git.timeout_secs == 0 || settings.store_timeout_secs == 0 {
        return Err(ConfigError::Validation {
            message: "timeouts must be greater than 0".to_string(),
        });
    }
    if settings.max_descriptor_bytes == 0 {
        return Err(ConfigError::Validation {
            message: "maxDescriptorBytes must be greater than 0".to_string(),
        });
    }

    let auth = &settings.git.auth;
    if auth.auth_type == GitAuthType::Token
        && !has_secret_source(
            auth.token_insecure.as_deref(),
            auth.token_file.as_deref(),
            Some(auth.token_env_var.as_str()),
        )
    {
        return Err(ConfigError::Validation {
            message: "git.auth type 'token' requires token, tokenFile, or tokenEnvVar".to_string(),
        });
    }
    Ok(())
}
