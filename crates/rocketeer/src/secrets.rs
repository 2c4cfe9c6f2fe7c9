//! Secret resolution for git credentials.
//!
//! A secret can come from three places, tried in this order:
//!
//! 1. **Direct value** in the settings file (local testing only)
//! 2. **File** such as a mounted Kubernetes secret (`tokenFile: /var/run/secrets/git/token`)
//! 3. **Environment variable** (`tokenEnvVar: GIT_TOKEN`)
//!
//! Empty strings count as "not configured".

use std::fs;

use secrecy::SecretString;

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

fn configured(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Resolves a secret from the first configured source.
///
/// File and environment values are trimmed; mounted secrets usually end with a newline.
pub fn resolve_secret(
    direct: Option<&str>,
    file_path: Option<&str>,
    env_var: Option<&str>,
) -> Result<SecretString> {
    if let Some(value) = configured(direct) {
        return Ok(SecretString::from(value.to_string()));
    }

    if let Some(path) = configured(file_path) {
        let expanded = expand_home(path);
        return fs::read_to_string(&expanded)
            .map(|content| SecretString::from(content.trim().to_string()))
            .map_err(|source| SecretError::FileReadError {
                path: expanded,
                source,
            });
    }

    if let Some(name) = configured(env_var) {
        return match std::env::var(name) {
            Ok(value) => Ok(SecretString::from(value.trim().to_string())),
            Err(std::env::VarError::NotPresent) => Err(SecretError::EnvVarNotSet {
                name: name.to_string(),
            }),
            Err(std::env::VarError::NotUnicode(_)) => Err(SecretError::EnvVarNotUnicode {
                name: name.to_string(),
            }),
        };
    }

    Err(SecretError::NoSourceProvided)
}

/// Checks if at least one secret source is configured (non-empty).
pub fn has_secret_source(
    direct: Option<&str>,
    file_path: Option<&str>,
    env_var: Option<&str>,
) -> bool {
    configured(direct).is_some() || configured(file_path).is_some() || configured(env_var).is_some()
}

/// Expands a leading `~` or `~/` to the current user's home directory.
///
/// `~user/...` is not supported.
fn expand_home(path: &str) -> String {
    let Some(home) = dirs::home_dir() else {
        return path.to_string();
    };
    if path == "~" {
        home.to_string_lossy().into_owned()
    } else if let Some(rest) = path.strip_prefix("~/") {
        home.join(rest).to_string_lossy().into_owned()
    } else {
        path.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    // Tests that modify environment variables must run serially.
    #[test]
    #[serial]
    fn test_direct_value_takes_priority() {
        std::env::set_var("ROCKETEER_TEST_SECRET_1", "env_value");
        let result =
            resolve_secret(Some("direct_value"), None, Some("ROCKETEER_TEST_SECRET_1")).unwrap();
        assert_eq!(result.expose_secret(), "direct_value");
        std::env::remove_var("ROCKETEER_TEST_SECRET_1");
    }

    #[test]
    #[serial]
    fn test_file_takes_priority_over_env() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "file_value").unwrap();

        std::env::set_var("ROCKETEER_TEST_SECRET_2", "env_value");
        let result = resolve_secret(
            None,
            Some(temp_file.path().to_str().unwrap()),
            Some("ROCKETEER_TEST_SECRET_2"),
        )
        .unwrap();
        assert_eq!(result.expose_secret(), "file_value");
        std::env::remove_var("ROCKETEER_TEST_SECRET_2");
    }

    #[test]
    #[serial]
    fn test_env_var_fallback_is_trimmed() {
        std::env::set_var("ROCKETEER_TEST_SECRET_3", " env_value\n");
        let result = resolve_secret(Some(""), Some(""), Some("ROCKETEER_TEST_SECRET_3")).unwrap();
        assert_eq!(result.expose_secret(), "env_value");
        std::env::remove_var("ROCKETEER_TEST_SECRET_3");
    }

    #[test]
    fn test_no_source_error() {
        assert!(matches!(
            resolve_secret(None, None, None),
            Err(SecretError::NoSourceProvided)
        ));
    }

    #[test]
    fn test_file_not_found_error() {
        let result = resolve_secret(None, Some("/nonexistent/path/to/secret"), None);
        assert!(matches!(result, Err(SecretError::FileReadError { .. })));
    }

    #[test]
    fn test_env_var_not_set_error() {
        let result = resolve_secret(None, None, Some("ROCKETEER_DEFINITELY_NOT_SET_12345"));
        assert!(matches!(result, Err(SecretError::EnvVarNotSet { .. })));
    }

    #[test]
    fn test_has_secret_source() {
        assert!(has_secret_source(Some("value"), None, None));
        assert!(has_secret_source(None, Some("/path"), None));
        assert!(has_secret_source(None, None, Some("ENV_VAR")));
        assert!(!has_secret_source(None, None, None));
        assert!(!has_secret_source(Some(""), Some(""), Some("")));
    }

    #[test]
    fn test_expand_home() {
        assert_eq!(expand_home("/absolute/path"), "/absolute/path");
        assert_eq!(expand_home("relative/path"), "relative/path");
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home("~/token"), home.join("token").to_string_lossy());
            assert_eq!(expand_home("~"), home.to_string_lossy());
        }
    }
}
