//! Git Adapter (component 1): a typed wrapper around the `git` CLI.
//!
//! Every operation takes an explicit working directory and
//! [`CancellationToken`], and is bounded by a caller-supplied deadline — no
//! process invocation anywhere else in the crate talks to `git` directly.
//! Grounded on `worktrunk::git::Repository`/`WorkingTree`
//! (`src/git/repository/mod.rs`, `src/git/repository/worktrees.rs`) and
//! `Repository::branch_divergence`-equivalent ahead/behind queries
//! (`src/git/repository/branch.rs`); collapsed from the teacher's
//! cache-heavy, multi-worktree `Repository`/`WorkingTree` split into a
//! single stateless adapter since this spec's Git Adapter has no per-call
//! caching requirement.

pub mod process;
mod worktree;

pub use worktree::Worktree;

use std::path::{Path, PathBuf};
use std::time::Duration;

use std::sync::OnceLock;

use regex::Regex;

use crate::cancel::CancellationToken;
use crate::error::TicketFlowError;

/// Ahead/behind counts of a branch relative to a base, per §4.1
/// `branch_divergence`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Divergence {
    pub ahead: usize,
    pub behind: usize,
}

impl Divergence {
    pub fn is_diverged(&self) -> bool {
        self.ahead > 0 && self.behind > 0
    }
}

/// Validates a branch/ticket id against `^[A-Za-z0-9_./-]+$` with no leading
/// `-`, per §4.1.
pub fn validate_branch_name(name: &str) -> Result<(), TicketFlowError> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_./-]+$").unwrap());
    if name.starts_with('-') || !re.is_match(name) {
        return Err(TicketFlowError::InvalidFormat {
            detail: format!("`{name}` is not a valid branch name"),
        });
    }
    Ok(())
}

/// A typed handle to a Git repository, scoped at construction to a working
/// directory. Stateless: every method re-derives what it needs rather than
/// caching, since callers (the Ticket Engine) already control invocation
/// cadence.
#[derive(Debug, Clone)]
pub struct GitAdapter {
    deadline: Duration,
}

impl GitAdapter {
    pub fn new(timeout_git: Duration) -> Self {
        Self { deadline: timeout_git }
    }

    fn git(
        &self,
        dir: &Path,
        args: &[&str],
        token: &CancellationToken,
    ) -> Result<String, TicketFlowError> {
        let out = process::run_git(dir, args, self.deadline, token)?;
        if !out.status.success() {
            return Err(TicketFlowError::GitCommandFailed {
                command: format!("git {}", args.join(" ")),
                stderr: String::from_utf8_lossy(&out.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&out.stdout).trim().to_string())
    }

    /// `git rev-parse --show-toplevel` — the current tree's root (may be a worktree).
    pub fn find_project_root(
        &self,
        dir: &Path,
        token: &CancellationToken,
    ) -> Result<PathBuf, TicketFlowError> {
        Ok(PathBuf::from(self.git(dir, &["rev-parse", "--show-toplevel"], token)?))
    }

    /// `git rev-parse --git-common-dir`'s parent: the main repository root,
    /// stable across all linked worktrees.
    pub fn find_main_repository_root(
        &self,
        dir: &Path,
        token: &CancellationToken,
    ) -> Result<PathBuf, TicketFlowError> {
        let common_dir = self.git(dir, &["rev-parse", "--git-common-dir"], token)?;
        let common_dir = PathBuf::from(common_dir);
        let absolute = if common_dir.is_relative() { dir.join(&common_dir) } else { common_dir };
        let canonical = dunce::canonicalize(&absolute).map_err(TicketFlowError::Io)?;
        Ok(canonical.parent().map(Path::to_path_buf).unwrap_or(canonical))
    }

    /// Current branch, or `DetachedHead`-shaped error via `InvalidFormat` if unborn/detached.
    pub fn current_branch(
        &self,
        dir: &Path,
        token: &CancellationToken,
    ) -> Result<String, TicketFlowError> {
        let out = process::run_git(dir, &["symbolic-ref", "--short", "-q", "HEAD"], self.deadline, token)?;
        if !out.status.success() {
            return Err(TicketFlowError::InvalidFormat {
                detail: "detached HEAD".to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&out.stdout).trim().to_string())
    }

    /// Configured default, else `origin/HEAD`, else `main`, else `master`.
    pub fn default_branch(
        &self,
        dir: &Path,
        configured: Option<&str>,
        token: &CancellationToken,
    ) -> Result<String, TicketFlowError> {
        if let Some(name) = configured {
            return Ok(name.to_string());
        }
        let out = process::run_git(
            dir,
            &["symbolic-ref", "--short", "-q", "refs/remotes/origin/HEAD"],
            self.deadline,
            token,
        )?;
        if out.status.success() {
            let full = String::from_utf8_lossy(&out.stdout).trim().to_string();
            if let Some(stripped) = full.strip_prefix("origin/") {
                return Ok(stripped.to_string());
            }
        }
        if self.branch_exists(dir, "main", token)? {
            return Ok("main".to_string());
        }
        if self.branch_exists(dir, "master", token)? {
            return Ok("master".to_string());
        }
        Ok("main".to_string())
    }

    /// `show-ref --verify --quiet refs/heads/<name>`; false on absence, error only on unexpected failure.
    pub fn branch_exists(
        &self,
        dir: &Path,
        name: &str,
        token: &CancellationToken,
    ) -> Result<bool, TicketFlowError> {
        let out = process::run_git(
            dir,
            &["show-ref", "--verify", "--quiet", &format!("refs/heads/{name}")],
            self.deadline,
            token,
        )?;
        match out.status.code() {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            _ => Err(TicketFlowError::GitCommandFailed {
                command: format!("git show-ref --verify --quiet refs/heads/{name}"),
                stderr: String::from_utf8_lossy(&out.stderr).trim().to_string(),
            }),
        }
    }

    pub fn branch_commit(
        &self,
        dir: &Path,
        name: &str,
        token: &CancellationToken,
    ) -> Result<String, TicketFlowError> {
        self.git(dir, &["rev-parse", name], token)
    }

    /// `rev-list --count base...branch`, split into two explicit counts.
    pub fn branch_divergence(
        &self,
        dir: &Path,
        branch: &str,
        base: &str,
        token: &CancellationToken,
    ) -> Result<Divergence, TicketFlowError> {
        let ahead = self
            .git(dir, &["rev-list", "--count", &format!("{base}..{branch}")], token)?
            .parse()
            .unwrap_or(0);
        let behind = self
            .git(dir, &["rev-list", "--count", &format!("{branch}..{base}")], token)?
            .parse()
            .unwrap_or(0);
        Ok(Divergence { ahead, behind })
    }

    /// True iff `branch` appears in `git branch --merged <base>`, tolerant of `*`/`+` markers.
    pub fn is_branch_merged(
        &self,
        dir: &Path,
        branch: &str,
        base: &str,
        token: &CancellationToken,
    ) -> Result<bool, TicketFlowError> {
        let out = self.git(dir, &["branch", "--merged", base], token)?;
        Ok(out.lines().any(|line| {
            line.trim_start_matches(['*', '+']).trim() == branch
        }))
    }

    pub fn create_branch(
        &self,
        dir: &Path,
        name: &str,
        from: &str,
        token: &CancellationToken,
    ) -> Result<(), TicketFlowError> {
        validate_branch_name(name)?;
        self.git(dir, &["branch", name, from], token)?;
        Ok(())
    }

    pub fn delete_branch(
        &self,
        dir: &Path,
        name: &str,
        force: bool,
        token: &CancellationToken,
    ) -> Result<(), TicketFlowError> {
        let flag = if force { "-D" } else { "-d" };
        self.git(dir, &["branch", flag, name], token)?;
        Ok(())
    }

    pub fn worktree_add(
        &self,
        dir: &Path,
        path: &Path,
        branch: &str,
        create_new_branch: bool,
        token: &CancellationToken,
    ) -> Result<(), TicketFlowError> {
        validate_branch_name(branch)?;
        let path_str = path.to_string_lossy().to_string();
        if create_new_branch {
            self.git(dir, &["worktree", "add", "-b", branch, &path_str], token)?;
        } else {
            self.git(dir, &["worktree", "add", &path_str, branch], token)?;
        }
        Ok(())
    }

    pub fn worktree_list(
        &self,
        dir: &Path,
        token: &CancellationToken,
    ) -> Result<Vec<Worktree>, TicketFlowError> {
        let out = self.git(dir, &["worktree", "list", "--porcelain"], token)?;
        Worktree::parse_porcelain_list(&out)
    }

    pub fn worktree_remove(
        &self,
        dir: &Path,
        path: &Path,
        force: bool,
        token: &CancellationToken,
    ) -> Result<(), TicketFlowError> {
        let path_str = path.to_string_lossy().to_string();
        if force {
            self.git(dir, &["worktree", "remove", "--force", &path_str], token)?;
        } else {
            self.git(dir, &["worktree", "remove", &path_str], token)?;
        }
        Ok(())
    }

    pub fn worktree_prune(&self, dir: &Path, token: &CancellationToken) -> Result<(), TicketFlowError> {
        self.git(dir, &["worktree", "prune"], token)?;
        Ok(())
    }

    pub fn add(&self, dir: &Path, paths: &[&str], token: &CancellationToken) -> Result<(), TicketFlowError> {
        let mut args = vec!["add"];
        args.extend_from_slice(paths);
        self.git(dir, &args, token)?;
        Ok(())
    }

    pub fn commit(
        &self,
        dir: &Path,
        message: &str,
        token: &CancellationToken,
    ) -> Result<(), TicketFlowError> {
        self.git(dir, &["commit", "-m", message], token)?;
        Ok(())
    }

    /// `exclude` pathspecs are tool-managed paths that never represent a
    /// user edit (the current-ticket symlink, the worktree base directory)
    /// and so must not block a clean-tree precondition.
    pub fn has_uncommitted_changes(
        &self,
        dir: &Path,
        exclude: &[&str],
        token: &CancellationToken,
    ) -> Result<bool, TicketFlowError> {
        let mut args = vec!["status".to_string(), "--porcelain".to_string(), "--".to_string(), ".".to_string()];
        for path in exclude {
            args.push(format!(":!{path}"));
            args.push(format!(":!{path}/**"));
        }
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let out = self.git(dir, &args, token)?;
        Ok(!out.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_branch_names() {
        assert!(validate_branch_name("250102-030405-fix-login").is_ok());
        assert!(validate_branch_name("-leading-dash").is_err());
        assert!(validate_branch_name("has space").is_err());
        assert!(validate_branch_name("semi;colon").is_err());
    }

    #[test]
    fn divergence_detects_conflict() {
        let clean = Divergence { ahead: 2, behind: 0 };
        let diverged = Divergence { ahead: 2, behind: 1 };
        assert!(!clean.is_diverged());
        assert!(diverged.is_diverged());
    }
}
