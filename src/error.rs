//! Error taxonomy (component 3).
//!
//! A flat enum covering every error kind named in the design: validation,
//! not-found, state, Git, I/O, runtime and config errors. Grounded on the
//! teacher's `git::GitError` (`src/git/error.rs`): each variant carries
//! enough context for a one-line message plus remediation hints, rendered
//! through the same emoji + bold-header + dim-hint convention
//! (`src/styling.rs`), but collapsed into a single enum since this taxonomy
//! is already the union across subsystems rather than split per module.

use std::path::PathBuf;
use std::time::Duration;

use crate::styling::{ERROR, ERROR_EMOJI, HINT, HINT_EMOJI};

#[derive(Debug)]
pub enum TicketFlowError {
    // --- Validation ---
    InvalidSlug { slug: String, reason: String },
    InvalidFormat { detail: String },
    UnexpectedArguments { args: Vec<String> },
    MissingArgument { name: String },
    InvalidFlagsType { detail: String },

    // --- Not found ---
    TicketNotFound { id: String },
    ParentTicketNotFound { id: String },
    NoCurrentTicket,

    // --- State ---
    TicketAlreadyStarted { id: String },
    TicketAlreadyClosed { id: String },
    ClosureReasonRequired { id: String },

    // --- Git ---
    BranchExists { branch: String },
    BranchDiverged { branch: String, base: String, ahead: usize, behind: usize },
    WorktreeExists { path: PathBuf },
    WorktreeCorrupted { path: PathBuf },
    BranchAlreadyCheckedOut { branch: String, location: String },
    PermissionDenied { detail: String },
    LockedWorktree { path: PathBuf },
    UncommittedChanges,
    GitCommandFailed { command: String, stderr: String },

    // --- I/O ---
    FileTooLarge { path: PathBuf, size: u64, limit: u64 },
    BrokenSymlink { path: PathBuf },
    Io(std::io::Error),

    // --- Runtime ---
    Timeout { op: String, elapsed: Duration },
    Cancelled,

    // --- Config ---
    ConfigInvalid { detail: String },
}

impl TicketFlowError {
    /// Remediation lines shown under the error in text mode. Empty when the
    /// message is already self-explanatory.
    pub fn remediation(&self) -> Vec<String> {
        match self {
            Self::InvalidSlug { .. } => {
                vec!["Use lowercase letters, digits and hyphens only".into()]
            }
            Self::TicketNotFound { id } => {
                vec![format!("Check the id with `tf list` — no ticket matches `{id}`")]
            }
            Self::ParentTicketNotFound { id } => {
                vec![format!("The parent ticket `{id}` does not exist")]
            }
            Self::NoCurrentTicket => {
                vec!["Run `tf start <id>` first, or pass an id explicitly".into()]
            }
            Self::TicketAlreadyStarted { .. } => {
                vec!["Use `tf close` if you meant to finish it instead".into()]
            }
            Self::TicketAlreadyClosed { .. } => {
                vec!["Closed tickets cannot be started or closed again".into()]
            }
            Self::ClosureReasonRequired { .. } => vec![
                "Pass --reason \"...\" to close a ticket that isn't the current one and isn't merged".into(),
            ],
            Self::BranchExists { branch } => {
                vec![format!("Branch `{branch}` already exists; use --force to recreate it")]
            }
            Self::BranchDiverged { branch, base, ahead, behind } => vec![format!(
                "`{branch}` is {ahead} ahead and {behind} behind `{base}`; re-run with --force to recreate, or resolve manually"
            )],
            Self::WorktreeExists { path } => {
                vec![format!("Remove it first, or run `tf cleanup` ({})", path.display())]
            }
            Self::WorktreeCorrupted { .. } => {
                vec!["Run `git worktree prune` and retry".into()]
            }
            Self::BranchAlreadyCheckedOut { location, .. } => {
                vec![format!("Already checked out at {location}")]
            }
            Self::PermissionDenied { .. } => {
                vec!["Check file and directory permissions under the tickets root".into()]
            }
            Self::LockedWorktree { .. } => {
                vec!["Run `git worktree unlock` before removing it".into()]
            }
            Self::UncommittedChanges => {
                vec!["Commit or stash your changes first, or pass --force".into()]
            }
            Self::GitCommandFailed { stderr, .. } => {
                git_remediation(stderr)
            }
            Self::FileTooLarge { limit, .. } => {
                vec![format!("Files over {limit} bytes are rejected; split the ticket body")]
            }
            Self::BrokenSymlink { .. } => {
                vec!["Run `tf restore` to rebuild the current-ticket link".into()]
            }
            Self::Io(_) => vec![],
            Self::Timeout { op, .. } => {
                vec![format!("`{op}` did not finish in time; check for a hung process")]
            }
            Self::Cancelled => vec![],
            Self::ConfigInvalid { .. } => {
                vec!["Check .ticketflow.yaml against the documented fields".into()]
            }
            Self::UnexpectedArguments { .. }
            | Self::MissingArgument { .. }
            | Self::InvalidFlagsType { .. }
            | Self::InvalidFormat { .. } => vec![],
        }
    }

    /// Stable exit code: 2 for validation/config errors, 1 for everything else.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidSlug { .. }
            | Self::InvalidFormat { .. }
            | Self::UnexpectedArguments { .. }
            | Self::MissingArgument { .. }
            | Self::InvalidFlagsType { .. }
            | Self::ConfigInvalid { .. } => 2,
            _ => 1,
        }
    }
}

/// Pattern-match raw git stderr to enhance the message, per §7: "Git error
/// strings are pattern-matched only to enhance the user-facing message".
fn git_remediation(stderr: &str) -> Vec<String> {
    if stderr.contains("is not a working tree") || stderr.contains("not a git repository") {
        vec!["Worktree appears corrupted. Run `git worktree prune` and retry".into()]
    } else if stderr.contains("already exists") {
        vec!["Pass --force to replace the existing branch or worktree".into()]
    } else {
        vec![]
    }
}

impl std::fmt::Display for TicketFlowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let headline = match self {
            Self::InvalidSlug { slug, reason } => format!("Invalid slug `{slug}`: {reason}"),
            Self::InvalidFormat { detail } => format!("Invalid format: {detail}"),
            Self::UnexpectedArguments { args } => {
                format!("Unexpected arguments: {}", args.join(", "))
            }
            Self::MissingArgument { name } => format!("Missing required argument: {name}"),
            Self::InvalidFlagsType { detail } => format!("Internal flag error: {detail}"),
            Self::TicketNotFound { id } => format!("Ticket `{id}` not found"),
            Self::ParentTicketNotFound { id } => format!("Parent ticket `{id}` not found"),
            Self::NoCurrentTicket => "No current ticket".to_string(),
            Self::TicketAlreadyStarted { id } => format!("Ticket `{id}` is already started"),
            Self::TicketAlreadyClosed { id } => format!("Ticket `{id}` is already closed"),
            Self::ClosureReasonRequired { id } => {
                format!("Closing `{id}` requires a reason or a merged branch")
            }
            Self::BranchExists { branch } => format!("Branch `{branch}` already exists"),
            Self::BranchDiverged { branch, base, ahead, behind } => format!(
                "Branch `{branch}` has diverged from `{base}` ({ahead} ahead, {behind} behind)"
            ),
            Self::WorktreeExists { path } => format!("Worktree already exists at {}", path.display()),
            Self::WorktreeCorrupted { path } => format!("Worktree at {} appears corrupted", path.display()),
            Self::BranchAlreadyCheckedOut { branch, .. } => {
                format!("Branch `{branch}` is already checked out elsewhere")
            }
            Self::PermissionDenied { detail } => format!("Permission denied: {detail}"),
            Self::LockedWorktree { path } => format!("Worktree at {} is locked", path.display()),
            Self::UncommittedChanges => "Working tree has uncommitted changes".to_string(),
            Self::GitCommandFailed { command, stderr } => {
                format!("git command failed: {command}\n{}", stderr.trim())
            }
            Self::FileTooLarge { path, size, limit } => format!(
                "{} is {size} bytes, exceeding the {limit}-byte limit",
                path.display()
            ),
            Self::BrokenSymlink { path } => format!("Broken symlink at {}", path.display()),
            Self::Io(e) => format!("I/O error: {e}"),
            Self::Timeout { op, elapsed } => format!("`{op}` timed out after {elapsed:?}"),
            Self::Cancelled => "Operation cancelled".to_string(),
            Self::ConfigInvalid { detail } => format!("Invalid configuration: {detail}"),
        };
        write!(f, "{ERROR_EMOJI} {ERROR}{headline}{ERROR:#}")?;
        for hint in self.remediation() {
            write!(f, "\n{HINT_EMOJI} {HINT}{hint}{HINT:#}")?;
        }
        Ok(())
    }
}

impl std::error::Error for TicketFlowError {}

impl From<std::io::Error> for TicketFlowError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_stable() {
        assert_eq!(TicketFlowError::MissingArgument { name: "id".into() }.exit_code(), 2);
        assert_eq!(TicketFlowError::TicketNotFound { id: "x".into() }.exit_code(), 1);
    }

    #[test]
    fn diverged_message_carries_counts() {
        let e = TicketFlowError::BranchDiverged {
            branch: "b".into(),
            base: "main".into(),
            ahead: 2,
            behind: 1,
        };
        let s = e.to_string();
        assert!(s.contains("2 ahead"));
        assert!(s.contains("1 behind"));
    }
}
