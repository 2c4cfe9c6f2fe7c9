//! Helpers for sanitizing data before it reaches logs, spans or the filesystem.
//!
//! Repository URLs may carry tokens in their userinfo; working-copy directory
//! names come from user-controlled namespace and configuration names.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::Path;

/// Returns only the filename component of a path (no directory).
pub fn redact_path(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
        .to_string()
}

/// Strips userinfo (tokens, passwords) from a git remote URL.
///
/// - `https://ghp_token@github.com/user/repo` → `https://****@github.com/user/repo`
/// - `git@github.com:user/repo.git` → unchanged
/// - `/srv/git/repo` → unchanged
pub fn redact_repo_url(url: &str) -> String {
    let Some(scheme_end) = url.find("://") else {
        // scp-like SSH syntax and local paths carry no secret.
        return url.to_string();
    };

    let scheme = &url[..scheme_end + 3];
    let rest = &url[scheme_end + 3..];
    let authority_end = rest.find('/').unwrap_or(rest.len());
    match rest[..authority_end].rfind('@') {
        Some(at_pos) => format!("{}****@{}", scheme, &rest[at_pos + 1..]),
        None => url.to_string(),
    }
}

/// Returns a short deterministic hash of a value for correlation or uniqueness.
pub fn short_hash(value: impl Hash) -> String {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

/// Turns an arbitrary name into a single safe directory name.
///
/// Keeps ASCII alphanumerics, `-`, `_` and inner `.`; anything else becomes `-`.
/// When the name had to change, a hash of the original is appended so that two
/// different names never share a directory.
pub fn sanitize_segment(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '-'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches('.');

    if cleaned == name && !cleaned.is_empty() {
        return cleaned.to_string();
    }

    let hash = short_hash(name);
    if cleaned.is_empty() {
        hash
    } else {
        format!("{}-{}", cleaned, &hash[..8])
    }
}
