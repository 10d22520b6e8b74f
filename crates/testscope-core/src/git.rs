//! Git integration for collecting the files a change touched.

use std::path::Path;
use std::process::Command;

use crate::error::{ImpactError, Result};

/// List files that differ from `base_ref`.
///
/// Runs `git diff --name-only -z <base_ref>` in `repo_dir` with path quoting
/// off, so names come back verbatim. Paths are relative to the repository
/// root. An empty diff is an empty list, not an error.
pub fn changed_files(repo_dir: &Path, base_ref: &str) -> Result<Vec<String>> {
    let output = Command::new("git")
        .args(["-c", "core.quotePath=off", "diff", "--name-only", "-z", base_ref])
        .current_dir(repo_dir)
        .output()
        .map_err(|e| ImpactError::Git(format!("failed to run git: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ImpactError::Git(format!(
            "git diff --name-only {base_ref} failed: {stderr}"
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout)
        .split('\0')
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect())
}

/// Check whether a directory is inside a git work tree.
pub fn is_git_repo(dir: &Path) -> bool {
    Command::new("git")
        .args(["rev-parse", "--is-inside-work-tree"])
        .current_dir(dir)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command as StdCommand;

    fn run_git(repo_dir: &Path, args: &[&str]) {
        let output = StdCommand::new("git")
            .args(args)
            .current_dir(repo_dir)
            .output()
            .unwrap();
        assert!(
            output.status.success(),
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
    }

    fn make_git_repo() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        run_git(dir.path(), &["init"]);
        run_git(dir.path(), &["config", "user.name", "test-user"]);
        run_git(dir.path(), &["config", "user.email", "test@example.com"]);
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/a.ts"), "export const a = 1;\n").unwrap();
        std::fs::write(dir.path().join("src/b.ts"), "export const b = 1;\n").unwrap();
        run_git(dir.path(), &["add", "."]);
        run_git(dir.path(), &["commit", "-m", "initial"]);
        dir
    }

    #[test]
    fn clean_tree_has_no_changes() {
        let repo = make_git_repo();
        assert!(changed_files(repo.path(), "HEAD").unwrap().is_empty());
    }

    #[test]
    fn modified_tracked_files_are_listed() {
        let repo = make_git_repo();
        std::fs::write(repo.path().join("src/a.ts"), "export const a = 2;\n").unwrap();
        let changed = changed_files(repo.path(), "HEAD").unwrap();
        assert_eq!(changed, vec!["src/a.ts".to_string()]);
    }

    #[test]
    fn diff_against_older_commit() {
        let repo = make_git_repo();
        std::fs::write(repo.path().join("src/b.ts"), "export const b = 2;\n").unwrap();
        run_git(repo.path(), &["commit", "-am", "second"]);
        let changed = changed_files(repo.path(), "HEAD~1").unwrap();
        assert_eq!(changed, vec!["src/b.ts".to_string()]);
    }

    #[test]
    fn non_ascii_names_are_returned_verbatim() {
        let repo = make_git_repo();
        std::fs::write(repo.path().join("src/café.ts"), "export const c = 1;\n").unwrap();
        run_git(repo.path(), &["add", "."]);
        run_git(repo.path(), &["commit", "-m", "add café"]);
        std::fs::write(repo.path().join("src/café.ts"), "export const c = 2;\n").unwrap();

        let changed = changed_files(repo.path(), "HEAD").unwrap();
        assert_eq!(changed, vec!["src/café.ts".to_string()]);
    }

    #[test]
    fn surrounding_whitespace_in_names_is_kept() {
        let repo = make_git_repo();
        std::fs::write(repo.path().join("src/ spaced .ts"), "1\n").unwrap();
        run_git(repo.path(), &["add", "."]);
        run_git(repo.path(), &["commit", "-m", "add spaced"]);
        std::fs::write(repo.path().join("src/ spaced .ts"), "2\n").unwrap();

        let changed = changed_files(repo.path(), "HEAD").unwrap();
        assert_eq!(changed, vec!["src/ spaced .ts".to_string()]);
    }

    #[test]
    fn unknown_ref_is_git_error() {
        let repo = make_git_repo();
        let result = changed_files(repo.path(), "no-such-ref");
        assert!(matches!(result, Err(ImpactError::Git(_))));
    }

    #[test]
    fn outside_repo_is_git_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(changed_files(dir.path(), "HEAD").is_err());
    }

    #[test]
    fn is_git_repo_true_for_repo() {
        let repo = make_git_repo();
        assert!(is_git_repo(repo.path()));
    }

    #[test]
    fn is_git_repo_false_for_non_repo() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!is_git_repo(dir.path()));
    }
}
