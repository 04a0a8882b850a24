//! Cleanup Engine (component 7): reconciles `done` tickets with Git state.
//!
//! A thin sub-service over the Git Adapter and Ticket Store rather than a
//! trait object, matching the "thin sub-service" framing in the design
//! notes. Its enumeration always scans all three status directories — the
//! common bug this spec calls out is scanning only todo/doing and missing
//! orphaned branches left behind by done tickets.

use crate::cancel::CancellationToken;
use crate::config::Config;
use crate::error::TicketFlowError;
use crate::git::GitAdapter;
use crate::output::results::{AutoCleanupResult, CleanupResult};
use crate::ticket::{Status, TicketStore};

pub struct CleanupEngine<'a> {
    git: &'a GitAdapter,
    config: &'a Config,
    main_repo_root: &'a std::path::Path,
}

impl<'a> CleanupEngine<'a> {
    pub fn new(git: &'a GitAdapter, config: &'a Config, main_repo_root: &'a std::path::Path) -> Self {
        Self { git, config, main_repo_root }
    }

    /// §4.3.5 `cleanup(ticket_id, force) -> CleanupResult`.
    pub fn cleanup_one(
        &self,
        store: &TicketStore,
        id: &str,
        force: bool,
        token: &CancellationToken,
    ) -> Result<CleanupResult, TicketFlowError> {
        let ticket = store.load(id, token)?;
        if ticket.status != Status::Done {
            return Err(TicketFlowError::InvalidFormat {
                detail: format!("ticket {id} is not done; only done tickets can be cleaned up"),
            });
        }

        let mut worktree_removed = false;
        if self.config.worktree_enabled {
            let path = self.config.worktree_path(self.main_repo_root, id);
            if path.exists() {
                self.git.worktree_remove(self.main_repo_root, &path, force, token)?;
                worktree_removed = true;
            }
        }

        let mut branch_deleted = false;
        if self.git.branch_exists(self.main_repo_root, id, token)? {
            self.git.delete_branch(self.main_repo_root, id, force, token)?;
            branch_deleted = true;
        }

        Ok(CleanupResult { ticket_id: id.to_string(), worktree_removed, branch_deleted })
    }

    /// §4.3.6 `auto_cleanup() -> AutoCleanupResult`: reconciles the whole
    /// repository, tolerating individual-entry failures.
    pub fn auto_cleanup(
        &self,
        store: &TicketStore,
        dry_run: bool,
        token: &CancellationToken,
    ) -> Result<AutoCleanupResult, TicketFlowError> {
        let mut result = AutoCleanupResult { dry_run, ..Default::default() };
        let done_ids: Vec<String> =
            store.list(Some(Status::Done), token)?.into_iter().map(|t| t.id).collect();

        if self.config.worktree_enabled {
            let worktrees = self.git.worktree_list(self.main_repo_root, token)?;
            for worktree in worktrees {
                let Some(branch) = &worktree.branch else { continue };
                if !done_ids.contains(branch) {
                    continue;
                }
                if dry_run {
                    result.orphan_worktrees_removed.push(branch.clone());
                    continue;
                }
                match self.git.worktree_remove(self.main_repo_root, &worktree.path, true, token) {
                    Ok(()) => result.orphan_worktrees_removed.push(branch.clone()),
                    Err(e) => {
                        log::warn!("auto_cleanup: failed to remove worktree {}: {e}", worktree.path.display());
                        result.failures.push(format!("worktree {}: {e}", worktree.path.display()));
                    }
                }
            }
        }

        let default_branch =
            self.git.default_branch(self.main_repo_root, self.config.default_branch.as_deref(), token)?;
        for id in &done_ids {
            if !self.git.branch_exists(self.main_repo_root, id, token)? {
                continue;
            }
            let merged = match self.git.is_branch_merged(self.main_repo_root, id, &default_branch, token) {
                Ok(merged) => merged,
                Err(e) => {
                    result.failures.push(format!("branch {id}: {e}"));
                    continue;
                }
            };
            if !merged {
                continue;
            }
            if dry_run {
                result.stale_branches_removed.push(id.clone());
                continue;
            }
            match self.git.delete_branch(self.main_repo_root, id, false, token) {
                Ok(()) => result.stale_branches_removed.push(id.clone()),
                Err(e) => {
                    log::warn!("auto_cleanup: failed to delete branch {id}: {e}");
                    result.failures.push(format!("branch {id}: {e}"));
                }
            }
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ticket::Ticket;
    use chrono::Utc;
    use tempfile::tempdir;

    fn init_repo(dir: &std::path::Path) {
        let token = CancellationToken::new();
        let git = GitAdapter::new(std::time::Duration::from_secs(5));
        std::process::Command::new("git").args(["init", "-q", "-b", "main"]).current_dir(dir).status().unwrap();
        std::process::Command::new("git").args(["config", "user.email", "t@example.com"]).current_dir(dir).status().unwrap();
        std::process::Command::new("git").args(["config", "user.name", "Test"]).current_dir(dir).status().unwrap();
        std::fs::write(dir.join("README.md"), "hello\n").unwrap();
        git.add(dir, &["README.md"], &token).unwrap();
        git.commit(dir, "initial", &token).unwrap();
    }

    #[test]
    fn auto_cleanup_is_dry_by_default_and_removes_stale_merged_branches() {
        let dir = tempdir().unwrap();
        init_repo(dir.path());
        let token = CancellationToken::new();
        let git = GitAdapter::new(std::time::Duration::from_secs(5));
        let config = Config::load(dir.path()).unwrap();
        let store = TicketStore::new(config.tickets_dir.clone());

        let mut ticket = Ticket::new(Utc::now(), "done-me".into(), 1, String::new()).unwrap();
        store.create(&ticket, &token).unwrap();
        git.create_branch(dir.path(), &ticket.id, "main", &token).unwrap();
        ticket.started_at = Some(Utc::now());
        store.move_status(&mut ticket, Status::Doing, &token).unwrap();
        ticket.closed_at = Some(Utc::now());
        store.move_status(&mut ticket, Status::Done, &token).unwrap();

        let engine = CleanupEngine::new(&git, &config, dir.path());
        let dry = engine.auto_cleanup(&store, true, &token).unwrap();
        assert_eq!(dry.stale_branches_removed, vec![ticket.id.clone()]);
        assert!(git.branch_exists(dir.path(), &ticket.id, &token).unwrap());

        let applied = engine.auto_cleanup(&store, false, &token).unwrap();
        assert_eq!(applied.stale_branches_removed, vec![ticket.id.clone()]);
        assert!(!git.branch_exists(dir.path(), &ticket.id, &token).unwrap());

        let second = engine.auto_cleanup(&store, false, &token).unwrap();
        assert!(second.stale_branches_removed.is_empty());
    }
}
