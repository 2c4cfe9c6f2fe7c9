//! Git output parsing and argument validation helpers.

use std::process::Output;

/// Formats a git failure from its captured output, preferring stderr.
pub fn format_git_error(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();

    match (stderr.is_empty(), stdout.is_empty()) {
        (true, true) => format!(
            "Command failed with exit code {}",
            output.status.code().unwrap_or(-1)
        ),
        (true, false) => stdout,
        (false, true) => stderr,
        (false, false) => format!("{}\n{}", stderr, stdout),
    }
}

/// True if pull output reports that nothing was fetched.
///
/// Git has printed both spellings over the years.
pub fn is_up_to_date(output: &str) -> bool {
    output.contains("Already up to date") || output.contains("Already up-to-date")
}

/// Counts changed files from the diffstat summary of a pull.
pub fn count_changed_files(output: &str) -> u32 {
    output
        .lines()
        .filter(|line| line.contains("file") && line.contains("changed"))
        .find_map(|line| line.split_whitespace().find_map(|w| w.parse::<u32>().ok()))
        .unwrap_or(0)
}

/// Validates a branch name before it is passed to git.
///
/// A subset of `git check-ref-format`: enough to keep a ref from being read as
/// an option or from addressing something outside `refs/heads`.
pub fn validate_ref(git_ref: &str) -> Result<(), String> {
    if git_ref.is_empty() {
        return Err("ref must not be empty".to_string());
    }
    if git_ref.starts_with('-') {
        return Err("ref must not start with '-'".to_string());
    }
    if git_ref.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err("ref must not contain whitespace".to_string());
    }
    if git_ref.contains("..") || git_ref.contains("@{") {
        return Err("ref must not contain '..' or '@{'".to_string());
    }
    if git_ref.chars().any(|c| matches!(c, '~' | '^' | ':' | '?' | '*' | '[' | '\\')) {
        return Err("ref contains a character git does not allow".to_string());
    }
    if git_ref.starts_with('/') || git_ref.ends_with('/') || git_ref.ends_with('.') {
        return Err("ref must not start or end with '/' or end with '.'".to_string());
    }
    if git_ref.ends_with(".lock") {
        return Err("ref must not end with '.lock'".to_string());
    }
    Ok(())
}

/// Normalizes a remote URL for comparison: trims whitespace, a trailing slash
/// and a trailing `.git`.
pub fn normalize_remote_url(url: &str) -> &str {
    let url = url.trim().trim_end_matches('/');
    url.strip_suffix(".git").unwrap_or(url)
}

/// True if two remote URLs point at the same repository.
pub fn same_remote(a: &str, b: &str) -> bool {
    normalize_remote_url(a) == normalize_remote_url(b)
}
