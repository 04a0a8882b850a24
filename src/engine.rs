//! Ticket Engine / App Service (component 4): the orchestration layer
//! composing the Git Adapter and Ticket Store into `new`/`start`/`close`/
//! `restore_symlink`/`cleanup`/`auto_cleanup`/`status`.
//!
//! Every write operation returns the entity it operated on, and accumulates a
//! stack of best-effort inverse actions it runs on any downstream failure
//! (`start`'s rollback discipline). Grounded on the teacher's command
//! handlers in `src/commands/mod.rs`, which compose `git::Repository` calls
//! behind a single entry point per operation; this engine generalizes that
//! shape to the ticket lifecycle instead of worktree-session management.

use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::cancel::CancellationToken;
use crate::cleanup::CleanupEngine;
use crate::config::Config;
use crate::error::TicketFlowError;
use crate::git::GitAdapter;
use crate::output::results::{AutoCleanupResult, CleanupResult, StartResult, StatusResult};
use crate::output::StatusWriter;
use crate::ticket::{Status, Ticket, TicketStore};

/// The App Service. Cheap to construct; holds no mutable state beyond what
/// [`CancellationToken`] carries across a single invocation.
pub struct Engine {
    git: GitAdapter,
    store: TicketStore,
    config: Config,
    /// The current tree's root (possibly a linked worktree) — what Git
    /// operations scoped to "the caller's checkout" run against.
    project_root: PathBuf,
    /// The directory containing the shared `.git`, stable across worktrees —
    /// what ticket storage and worktree placement are anchored to (§4.1, §9).
    main_repo_root: PathBuf,
}

impl Engine {
    /// Discovers the repository roots from `cwd`, loads configuration from
    /// the main repository root, and constructs the Ticket Store over it.
    pub fn new(cwd: &Path, token: &CancellationToken) -> Result<Self, TicketFlowError> {
        let discovery = GitAdapter::new(std::time::Duration::from_secs(30));
        let project_root = discovery.find_project_root(cwd, token)?;
        let main_repo_root = discovery.find_main_repository_root(cwd, token)?;
        let config = Config::load(&main_repo_root)?;
        let git = GitAdapter::new(config.timeout_git);
        let store = TicketStore::new(config.tickets_dir.clone());
        Ok(Self { git, store, config, project_root, main_repo_root })
    }

    pub fn store(&self) -> &TicketStore {
        &self.store
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn main_repo_root(&self) -> &Path {
        &self.main_repo_root
    }

    /// Exposes `worktree list` for the `tf worktree list` command (§6).
    pub fn git_worktree_list(&self, token: &CancellationToken) -> Result<Vec<crate::git::Worktree>, TicketFlowError> {
        self.git.worktree_list(&self.main_repo_root, token)
    }

    /// The relative tickets directory name, used to locate the per-worktree
    /// copy of the store (§4.3.2 step 5).
    fn tickets_dir_name(&self) -> &Path {
        self.config.tickets_dir.strip_prefix(&self.main_repo_root).unwrap_or(Path::new("tickets"))
    }

    /// Paths a clean-working-tree precondition must ignore: the current-ticket
    /// symlink is engine-managed state, never committed; the worktree base
    /// directory (when nested under the main repo root, as the default
    /// `.worktrees` is) holds other tickets' checkouts rather than edits; and
    /// the tickets directory itself, whose worktree copy is deliberately left
    /// uncommitted on the ticket's own branch (§4.3.2 step 5).
    fn clean_tree_exclusions(&self) -> Vec<&str> {
        vec!["current-ticket.md", self.config.worktree_base_dir.as_str(), self.tickets_dir_name().to_str().unwrap_or("tickets")]
    }

    /// §4.3.1 `new(slug, parent_id?) -> Ticket`.
    pub fn new_ticket(
        &self,
        slug: &str,
        parent_id: Option<&str>,
        token: &CancellationToken,
    ) -> Result<Ticket, TicketFlowError> {
        let mut related = Vec::new();
        if let Some(parent_id) = parent_id {
            let parent = self
                .store
                .load(parent_id, token)
                .map_err(|_| TicketFlowError::ParentTicketNotFound { id: parent_id.to_string() })?;
            if parent.status == Status::Done {
                return Err(TicketFlowError::InvalidFormat {
                    detail: format!("parent ticket {parent_id} is already done"),
                });
            }
            related.push(format!("parent:{parent_id}"));
        }

        let now = Utc::now();
        let mut ticket = Ticket::new(now, slug.to_string(), self.config.default_priority, self.config.tickets_template.clone())?;
        ticket.related = related;
        self.store.create(&ticket, token)?;

        let path = self.store.ticket_path(Status::Todo, &ticket.id);
        let path_str = path.to_string_lossy().to_string();
        self.git.add(&self.main_repo_root, &[path_str.as_str()], token)?;
        self.git.commit(&self.main_repo_root, &format!("New ticket: {}", ticket.id), token)?;
        Ok(ticket)
    }

    /// §4.3.2 `start(ticket_id, force) -> StartResult`. `status` receives
    /// progress lines for the branch/worktree/init-command steps, which can
    /// each take long enough to warrant feedback before the final result.
    pub fn start(
        &self,
        id: &str,
        force: bool,
        status: &dyn StatusWriter,
        token: &CancellationToken,
    ) -> Result<StartResult, TicketFlowError> {
        let mut ticket = self.store.load(id, token)?;
        if ticket.status == Status::Done {
            return Err(TicketFlowError::TicketAlreadyClosed { id: id.to_string() });
        }
        if !force && self.git.has_uncommitted_changes(&self.project_root, &self.clean_tree_exclusions(), token)? {
            return Err(TicketFlowError::UncommittedChanges);
        }

        let mut rollbacks: Vec<Box<dyn FnOnce()>> = Vec::new();

        // 1. Determine the parent branch: another doing ticket's branch if
        // the caller is inside it (sub-ticket flow), else the default branch.
        let doing = self.store.list(Some(Status::Doing), token)?;
        let current_branch = self.git.current_branch(&self.project_root, token).ok();
        let parent_branch = match &current_branch {
            Some(branch) if doing.iter().any(|t| &t.id == branch && t.id != id) => branch.clone(),
            _ => self.git.default_branch(&self.main_repo_root, self.config.default_branch.as_deref(), token)?,
        };

        // 2/3. Create or reuse the branch.
        let branch_existed = self.git.branch_exists(&self.main_repo_root, id, token)?;
        if !branch_existed {
            status.printf(&format!("Creating branch {id} from {parent_branch}"));
            self.git.create_branch(&self.main_repo_root, id, &parent_branch, token)?;
            rollbacks.push(rollback_delete_branch(self.git.clone(), self.main_repo_root.clone(), id.to_string()));
        } else {
            let divergence = self.git.branch_divergence(&self.main_repo_root, id, &parent_branch, token)?;
            if divergence.is_diverged() {
                if !force {
                    run_rollbacks(rollbacks);
                    return Err(TicketFlowError::BranchDiverged {
                        branch: id.to_string(),
                        base: parent_branch,
                        ahead: divergence.ahead,
                        behind: divergence.behind,
                    });
                }
                status.printf(&format!("Recreating diverged branch {id} from {parent_branch}"));
                self.git.delete_branch(&self.main_repo_root, id, true, token)?;
                self.git.create_branch(&self.main_repo_root, id, &parent_branch, token)?;
            } else {
                status.printf(&format!("Reusing existing branch {id}"));
            }
        }

        // 4. Move the ticket into doing/ and commit, unless it was already there.
        let was_doing = ticket.status == Status::Doing;
        if !was_doing {
            ticket.started_at = Some(Utc::now());
            if let Err(e) = self.store.move_status(&mut ticket, Status::Doing, token) {
                run_rollbacks(rollbacks);
                return Err(e);
            }
            rollbacks.push(rollback_restore_todo(self.store.clone(), ticket.clone()));

            // Stage both sides of the rename: the file landed in doing/, and
            // the todo/ entry it vacated needs its deletion staged too.
            let todo_path = self.store.ticket_path(Status::Todo, &ticket.id).to_string_lossy().to_string();
            let doing_path = self.store.ticket_path(Status::Doing, &ticket.id).to_string_lossy().to_string();
            if let Err(e) = self
                .git
                .add(&self.main_repo_root, &[todo_path.as_str(), doing_path.as_str()], token)
                .and_then(|_| self.git.commit(&self.main_repo_root, &format!("Start ticket: {id}"), token))
            {
                run_rollbacks(rollbacks);
                return Err(e);
            }
        }

        // 5. Worktree.
        let mut worktree_path = None;
        if self.config.worktree_enabled {
            let path = self.config.worktree_path(&self.main_repo_root, id);
            if path.exists() {
                run_rollbacks(rollbacks);
                return Err(TicketFlowError::WorktreeExists { path });
            }
            status.printf(&format!("Creating worktree at {}", path.display()));
            if let Err(e) = self.git.worktree_add(&self.main_repo_root, &path, id, false, token) {
                run_rollbacks(rollbacks);
                return Err(e);
            }
            rollbacks.push(rollback_remove_worktree(self.git.clone(), self.main_repo_root.clone(), path.clone()));

            if let Err(e) = self.copy_ticket_into_worktree(&path, &ticket) {
                run_rollbacks(rollbacks);
                return Err(e);
            }
            worktree_path = Some(path);
        }

        // 6. Init commands.
        let mut init_commands_ran = false;
        if let Some(path) = &worktree_path {
            for command in &self.config.worktree_init_commands {
                status.printf(&format!("Running init command: {command}"));
                let out = crate::git::process::run_shell(path, command, self.config.timeout_init_commands, token);
                match out {
                    Ok(out) if out.status.success() => {}
                    Ok(out) => {
                        run_rollbacks(rollbacks);
                        return Err(TicketFlowError::GitCommandFailed {
                            command: command.clone(),
                            stderr: String::from_utf8_lossy(&out.stderr).trim().to_string(),
                        });
                    }
                    Err(e) => {
                        run_rollbacks(rollbacks);
                        return Err(e);
                    }
                }
            }
            init_commands_ran = !self.config.worktree_init_commands.is_empty();
        }

        Ok(StartResult { ticket, branch: id.to_string(), parent_branch, worktree_path, init_commands_ran })
    }

    fn copy_ticket_into_worktree(&self, worktree_path: &Path, ticket: &Ticket) -> Result<(), TicketFlowError> {
        let worktree_tickets_root = worktree_path.join(self.tickets_dir_name());
        let worktree_store = TicketStore::new(worktree_tickets_root);
        let token = CancellationToken::new();
        worktree_store.create_overwrite(ticket, &token)?;
        worktree_store.set_current(worktree_path, Some(ticket))?;
        Ok(())
    }

    /// §4.3.3 `close(force, reason?) -> Ticket`: closes the current ticket.
    pub fn close(&self, force: bool, reason: Option<&str>, token: &CancellationToken) -> Result<Ticket, TicketFlowError> {
        let current_path = self.store.current(&self.project_root)?.ok_or(TicketFlowError::NoCurrentTicket)?;
        let id = current_path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or(TicketFlowError::NoCurrentTicket)?
            .to_string();
        let ticket = self.store.load(&id, token)?;
        self.close_inner(ticket, true, reason, force, token)
    }

    /// §4.3.3 `close_by_id(id, force, reason?) -> Ticket`.
    pub fn close_by_id(
        &self,
        id: &str,
        force: bool,
        reason: Option<&str>,
        token: &CancellationToken,
    ) -> Result<Ticket, TicketFlowError> {
        let ticket = self.store.load(id, token)?;
        let is_current = self.git.current_branch(&self.project_root, token).ok().as_deref() == Some(id);
        self.close_inner(ticket, is_current, reason, force, token)
    }

    fn close_inner(
        &self,
        mut ticket: Ticket,
        is_current: bool,
        reason: Option<&str>,
        force: bool,
        token: &CancellationToken,
    ) -> Result<Ticket, TicketFlowError> {
        if ticket.started_at.is_none() {
            return Err(TicketFlowError::TicketAlreadyClosed { id: ticket.id.clone() });
        }
        if ticket.closed_at.is_some() {
            return Err(TicketFlowError::TicketAlreadyClosed { id: ticket.id.clone() });
        }

        let reason = reason.map(str::trim).filter(|r| !r.is_empty());
        if !is_current {
            let current_branch_is_ticket =
                self.git.current_branch(&self.main_repo_root, token).ok().as_deref() == Some(ticket.id.as_str());
            if !current_branch_is_ticket && reason.is_none() {
                let default_branch =
                    self.git.default_branch(&self.main_repo_root, self.config.default_branch.as_deref(), token)?;
                let merged = self.git.is_branch_merged(&self.main_repo_root, &ticket.id, &default_branch, token)?;
                if !merged {
                    return Err(TicketFlowError::ClosureReasonRequired { id: ticket.id.clone() });
                }
            }
        }

        if !force && self.git.has_uncommitted_changes(&self.project_root, &self.clean_tree_exclusions(), token)? {
            return Err(TicketFlowError::UncommittedChanges);
        }

        if let Some(reason) = reason {
            ticket.closure_reason = Some(reason.to_string());
            let today = Utc::now().format("%Y-%m-%d");
            ticket.content = format!(
                "{}\n\n## Closure Note\n\n{today}: {reason}\n",
                ticket.content.trim_end_matches('\n')
            );
        }
        ticket.closed_at = Some(Utc::now());

        self.store.move_status(&mut ticket, Status::Done, token)?;

        let doing_dir = self.main_repo_root.join(self.tickets_dir_name()).join("doing");
        let done_dir = self.main_repo_root.join(self.tickets_dir_name()).join("done");
        self.git.add(
            &self.main_repo_root,
            &[doing_dir.to_string_lossy().as_ref(), done_dir.to_string_lossy().as_ref()],
            token,
        )?;
        let message = match &ticket.closure_reason {
            Some(reason) => format!("Close ticket: {}: {reason}", ticket.id),
            None => format!("Close ticket: {}", ticket.id),
        };
        self.git.commit(&self.main_repo_root, &message, token)?;

        if is_current {
            self.store.set_current(&self.project_root, None)?;
        }

        Ok(ticket)
    }

    /// §4.3.4 `restore_symlink() -> Ticket`.
    pub fn restore_symlink(&self, token: &CancellationToken) -> Result<Ticket, TicketFlowError> {
        let branch = self.git.current_branch(&self.project_root, token)?;
        let ticket = self.store.load(&branch, token)?;
        if ticket.status != Status::Doing {
            return Err(TicketFlowError::InvalidFormat {
                detail: format!("branch `{branch}` does not correspond to a ticket in doing"),
            });
        }
        self.store.set_current(&self.project_root, Some(&ticket))?;
        Ok(ticket)
    }

    /// §4.3.5 `cleanup(ticket_id, force) -> CleanupResult`.
    pub fn cleanup(&self, id: &str, force: bool, token: &CancellationToken) -> Result<CleanupResult, TicketFlowError> {
        CleanupEngine::new(&self.git, &self.config, &self.main_repo_root).cleanup_one(&self.store, id, force, token)
    }

    /// §4.3.6 `auto_cleanup() -> AutoCleanupResult`.
    pub fn auto_cleanup(&self, dry_run: bool, token: &CancellationToken) -> Result<AutoCleanupResult, TicketFlowError> {
        CleanupEngine::new(&self.git, &self.config, &self.main_repo_root).auto_cleanup(&self.store, dry_run, token)
    }

    /// §4.3.7 `status() -> StatusResult`.
    pub fn status(&self, token: &CancellationToken) -> Result<StatusResult, TicketFlowError> {
        let todo_count = self.store.list(Some(Status::Todo), token)?.len();
        let doing_count = self.store.list(Some(Status::Doing), token)?.len();
        let done_count = self.store.list(Some(Status::Done), token)?.len();
        let current_ticket_id = self
            .store
            .current(&self.project_root)
            .ok()
            .flatten()
            .and_then(|p| p.file_stem().and_then(|s| s.to_str()).map(str::to_string));
        Ok(StatusResult { todo_count, doing_count, done_count, current_ticket_id })
    }
}

fn run_rollbacks(rollbacks: Vec<Box<dyn FnOnce()>>) {
    for rollback in rollbacks.into_iter().rev() {
        rollback();
    }
}

fn rollback_delete_branch(git: GitAdapter, root: PathBuf, branch: String) -> Box<dyn FnOnce()> {
    Box::new(move || {
        let token = CancellationToken::new();
        if let Err(e) = git.delete_branch(&root, &branch, true, &token) {
            log::warn!("rollback: failed to delete branch {branch}: {e}");
        }
    })
}

fn rollback_remove_worktree(git: GitAdapter, root: PathBuf, path: PathBuf) -> Box<dyn FnOnce()> {
    Box::new(move || {
        let token = CancellationToken::new();
        if let Err(e) = git.worktree_remove(&root, &path, true, &token) {
            log::warn!("rollback: failed to remove worktree {}: {e}", path.display());
        }
    })
}

fn rollback_restore_todo(store: TicketStore, mut ticket: Ticket) -> Box<dyn FnOnce()> {
    Box::new(move || {
        let token = CancellationToken::new();
        ticket.started_at = None;
        if let Err(e) = store.move_status(&mut ticket, Status::Todo, &token) {
            log::warn!("rollback: failed to restore ticket {} to todo: {e}", ticket.id);
        }
    })
}
