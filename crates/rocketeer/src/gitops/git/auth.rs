//! Credentials for git network operations.
//!
//! Tokens are handed to git through a throwaway `GIT_ASKPASS` script that is
//! deleted when the returned [`AuthEnv`] drops. SSH keys go through
//! `GIT_SSH_COMMAND`.

use std::path::PathBuf;

use secrecy::{ExposeSecret, SecretString};

use crate::config::{GitAuthSettings, GitAuthType};
use crate::gitops::error::{GitOpsError, Result};

/// Escapes a value for use inside single quotes in `sh`.
pub fn shell_escape(value: &str) -> String {
    value.replace('\'', "'\\''")
}

#[cfg(not(unix))]
fn batch_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len() * 2);
    for ch in value.chars() {
        match ch {
            '%' => escaped.push_str("%%"),
            '^' | '&' | '|' | '<' | '>' | '(' | ')' | '"' => {
                escaped.push('^');
                escaped.push(ch);
            }
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Deletes the askpass script on drop so the token does not outlive the command.
#[derive(Debug, Default)]
pub struct AskpassScript {
    path: Option<PathBuf>,
}

impl AskpassScript {
    pub fn path(&self) -> Option<&std::path::Path> {
        self.path.as_deref()
    }
}

impl Drop for AskpassScript {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            if let Err(e) = std::fs::remove_file(&path) {
                log::warn!("Failed to remove askpass script: {}", e);
            }
        }
    }
}

/// Environment for one git invocation. Keep it alive until the command exits.
#[derive(Debug, Default)]
pub struct AuthEnv {
    pub env_vars: Vec<(String, String)>,
    pub script: AskpassScript,
}

/// Builds the git environment for the configured authentication.
pub fn build_auth_env(auth: &GitAuthSettings) -> Result<AuthEnv> {
    match auth.auth_type {
        GitAuthType::None => Ok(AuthEnv::default()),
        GitAuthType::Token => token_env(&resolve_token(auth)?),
        GitAuthType::SshKey => ssh_env(auth),
    }
}

fn resolve_token(auth: &GitAuthSettings) -> Result<SecretString> {
    let env_var = Some(auth.token_env_var.as_str()).filter(|v| !v.is_empty());
    crate::secrets::resolve_secret(
        auth.token_insecure.as_deref(),
        auth.token_file.as_deref(),
        env_var,
    )
    .map_err(|e| {
        GitOpsError::GitAuthFailed(format!(
            "Failed to resolve git token: {}. Configure token, tokenFile, or tokenEnvVar.",
            e
        ))
    })
}

fn token_env(token: &SecretString) -> Result<AuthEnv> {
    let script_error =
        |e: std::io::Error| GitOpsError::GitAuthFailed(format!("Failed to write askpass script: {}", e));

    let suffix = uuid::Uuid::new_v4();

    #[cfg(unix)]
    let path = {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;

        let path = std::env::temp_dir().join(format!(".rocketeer-askpass-{}.sh", suffix));
        let script = format!(
            "#!/bin/sh\necho '{}'\n",
            shell_escape(token.expose_secret())
        );
        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .mode(0o700)
            .open(&path)
            .map_err(script_error)?;
        file.write_all(script.as_bytes()).map_err(script_error)?;
        path
    };

    #[cfg(not(unix))]
    let path = {
        let path = std::env::temp_dir().join(format!(".rocketeer-askpass-{}.bat", suffix));
        let script = format!("@echo off\r\necho {}\r\n", batch_escape(token.expose_secret()));
        std::fs::write(&path, script).map_err(script_error)?;
        path
    };

    let script = AskpassScript {
        path: Some(path.clone()),
    };
    let path_str = path
        .to_str()
        .ok_or_else(|| {
            GitOpsError::GitAuthFailed("Temp directory path is not valid UTF-8".to_string())
        })?
        .to_string();

    Ok(AuthEnv {
        env_vars: vec![
            ("GIT_ASKPASS".to_string(), path_str),
            ("GIT_TERMINAL_PROMPT".to_string(), "0".to_string()),
        ],
        script,
    })
}

/// Expands `~` and applies the default key location.
fn ssh_key_path(configured: &str) -> PathBuf {
    let home = dirs::home_dir();
    match configured {
        "" => home
            .map(|h| h.join(".ssh").join("id_ed25519"))
            .unwrap_or_else(|| PathBuf::from(".ssh/id_ed25519")),
        "~" => home.unwrap_or_default(),
        path => match (path.strip_prefix("~/"), home) {
            (Some(rest), Some(home)) => home.join(rest),
            _ => PathBuf::from(path),
        },
    }
}

fn ssh_env(auth: &GitAuthSettings) -> Result<AuthEnv> {
    let key_path = ssh_key_path(&auth.ssh_key_path);
    if !key_path.exists() {
        return Err(GitOpsError::GitAuthFailed(format!(
            "SSH key file not found: {}",
            key_path.display()
        )));
    }

    let escaped = shell_escape(&key_path.display().to_string());
    let quoted = if escaped.starts_with('-') {
        format!("'./{}'", escaped)
    } else {
        format!("'{}'", escaped)
    };

    Ok(AuthEnv {
        env_vars: vec![
            (
                "GIT_SSH_COMMAND".to_string(),
                format!(
                    "ssh -i {} -o IdentitiesOnly=yes -o StrictHostKeyChecking=accept-new",
                    quoted
                ),
            ),
            ("GIT_TERMINAL_PROMPT".to_string(), "0".to_string()),
        ],
        script: AskpassScript::default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_env_none() {
        let env = build_auth_env(&GitAuthSettings::default()).unwrap();
        assert!(env.env_vars.is_empty());
        assert!(env.script.path().is_none());
    }

    #[test]
    fn test_token_askpass_script_removed_on_drop() {
        let settings = GitAuthSettings {
            auth_type: GitAuthType::Token,
            token_insecure: Some("s3cr'et".to_string()),
            ..Default::default()
        };
        let env = build_auth_env(&settings).unwrap();
        let path = env.script.path().unwrap().to_path_buf();
        assert!(path.exists());
        assert!(env
            .env_vars
            .iter()
            .any(|(k, v)| k == "GIT_ASKPASS" && v == path.to_str().unwrap()));

        #[cfg(unix)]
        {
            let script = std::fs::read_to_string(&path).unwrap();
            assert!(script.contains("echo 's3cr'\\''et'"));
        }

        drop(env);
        assert!(!path.exists());
    }

    #[test]
    fn test_token_missing_source() {
        let settings = GitAuthSettings {
            auth_type: GitAuthType::Token,
            ..Default::default()
        };
        let err = build_auth_env(&settings).unwrap_err();
        assert!(matches!(err, GitOpsError::GitAuthFailed(_)));
    }

    #[test]
    fn test_ssh_key_not_found() {
        let settings = GitAuthSettings {
            auth_type: GitAuthType::SshKey,
            ssh_key_path: "/nonexistent/path/id_rsa".to_string(),
            ..Default::default()
        };
        let err = build_auth_env(&settings).unwrap_err().to_string();
        assert!(err.contains("SSH key file not found"));
    }

    #[test]
    fn test_ssh_key_command() {
        let temp = tempfile::TempDir::new().unwrap();
        let key = temp.path().join("deploy key");
        std::fs::write(&key, "key").unwrap();
        let settings = GitAuthSettings {
            auth_type: GitAuthType::SshKey,
            ssh_key_path: key.display().to_string(),
            ..Default::default()
        };
        let env = build_auth_env(&settings).unwrap();
        let (_, command) = env
            .env_vars
            .iter()
            .find(|(k, _)| k == "GIT_SSH_COMMAND")
            .unwrap();
        assert!(command.contains(&format!("-i '{}'", key.display())));
    }

    #[test]
    fn test_ssh_key_path_tilde_expansion() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(ssh_key_path("~/.ssh/deploy"), home.join(".ssh/deploy"));
            assert_eq!(ssh_key_path(""), home.join(".ssh").join("id_ed25519"));
        }
        assert_eq!(ssh_key_path("/keys/id"), PathBuf::from("/keys/id"));
    }

    #[test]
    fn test_shell_escape() {
        assert_eq!(shell_escape("simple"), "simple");
        assert_eq!(shell_escape("it's"), "it'\\''s");
    }
}
