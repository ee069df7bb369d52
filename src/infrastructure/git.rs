//! Best-effort local git lookups

use std::path::Path;
use std::process::Command;

/// Returns the current branch of the repository at `dir`, if any
///
/// Runs `git rev-parse --abbrev-ref HEAD`. Any failure (no git binary,
/// not a repository, detached HEAD reported as empty output) yields
/// `None`; callers treat an unknown branch as a non-fatal condition.
#[must_use]
pub fn current_branch(dir: &Path) -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--abbrev-ref", "HEAD"])
        .current_dir(dir)
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    let branch = String::from_utf8(output.stdout).ok()?.trim().to_string();
    if branch.is_empty() { None } else { Some(branch) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_non_repository_returns_none() {
        let dir = TempDir::new().unwrap();
        assert_eq!(current_branch(dir.path()), None);
    }

    #[test]
    fn test_fresh_repository_branch() {
        let dir = TempDir::new().unwrap();
        let init = Command::new("git")
            .args(["init", "--initial-branch", "trunk"])
            .current_dir(dir.path())
            .output();

        // Skip silently when git is unavailable on the test host.
        if init.map(|o| o.status.success()).unwrap_or(false) {
            assert_eq!(current_branch(dir.path()), Some("trunk".to_string()));
        }
    }
}
