//! Result types returned by Ticket Engine operations, each implementing
//! [`Printable`](super::Printable) so the text formatter dispatches on the
//! trait rather than a type-name switch (§4.4).

use std::path::PathBuf;

use serde::Serialize;

use super::Printable;
use crate::ticket::{Status, Ticket};

impl Serialize for Ticket {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("Ticket", 11)?;
        s.serialize_field("id", &self.id)?;
        s.serialize_field("slug", &self.slug)?;
        s.serialize_field("priority", &self.priority)?;
        s.serialize_field("description", &self.description)?;
        s.serialize_field("status", &self.status)?;
        s.serialize_field("created_at", &self.created_at.to_rfc3339())?;
        s.serialize_field("started_at", &self.started_at.map(|t| t.to_rfc3339()))?;
        s.serialize_field("closed_at", &self.closed_at.map(|t| t.to_rfc3339()))?;
        s.serialize_field("closure_reason", &self.closure_reason)?;
        s.serialize_field("related", &self.related)?;
        s.serialize_field("content", &self.content)?;
        s.end()
    }
}

impl Printable for Ticket {
    fn text_representation(&self) -> String {
        let mut out = format!("{} [{}] {}", self.id, self.status, self.description);
        if let Some(reason) = &self.closure_reason {
            out.push_str(&format!(" (closed: {reason})"));
        }
        out
    }

    fn structured_data(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Result of `start(ticket_id, force)` (§4.3.2).
#[derive(Debug, Clone, Serialize)]
pub struct StartResult {
    pub ticket: Ticket,
    pub branch: String,
    pub parent_branch: String,
    pub worktree_path: Option<PathBuf>,
    pub init_commands_ran: bool,
}

impl Printable for StartResult {
    fn text_representation(&self) -> String {
        let mut out = format!(
            "Started {} on branch {} (from {})",
            self.ticket.id, self.branch, self.parent_branch
        );
        if let Some(path) = &self.worktree_path {
            out.push_str(&format!("\nWorktree: {}", path.display()));
        }
        if self.init_commands_ran {
            out.push_str("\nInit commands ran successfully");
        }
        out
    }

    fn structured_data(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Result of `cleanup(ticket_id, force)` (§4.3.5).
#[derive(Debug, Clone, Serialize)]
pub struct CleanupResult {
    pub ticket_id: String,
    pub worktree_removed: bool,
    pub branch_deleted: bool,
}

impl Printable for CleanupResult {
    fn text_representation(&self) -> String {
        format!(
            "Cleaned up {}: worktree_removed={}, branch_deleted={}",
            self.ticket_id, self.worktree_removed, self.branch_deleted
        )
    }

    fn structured_data(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Result of `auto_cleanup()` / `worktree clean` (§4.3.6).
#[derive(Debug, Clone, Default, Serialize)]
pub struct AutoCleanupResult {
    pub dry_run: bool,
    pub orphan_worktrees_removed: Vec<String>,
    pub stale_branches_removed: Vec<String>,
    pub failures: Vec<String>,
}

impl Printable for AutoCleanupResult {
    fn text_representation(&self) -> String {
        let verb = if self.dry_run { "would remove" } else { "removed" };
        let mut out = format!(
            "{verb} {} orphan worktree(s), {} stale branch(es)",
            self.orphan_worktrees_removed.len(),
            self.stale_branches_removed.len()
        );
        for f in &self.failures {
            out.push_str(&format!("\n  failed: {f}"));
        }
        out
    }

    fn structured_data(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Result of `worktree list` (§6).
#[derive(Debug, Clone, Serialize)]
pub struct WorktreeListResult {
    pub worktrees: Vec<crate::git::Worktree>,
}

impl Printable for WorktreeListResult {
    fn text_representation(&self) -> String {
        if self.worktrees.is_empty() {
            return "No worktrees".to_string();
        }
        self.worktrees
            .iter()
            .map(|w| format!("{}\t{}", w.path.display(), w.branch.as_deref().unwrap_or("(detached)")))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn structured_data(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Result of `list` (§6).
#[derive(Debug, Clone, Serialize)]
pub struct TicketListResult {
    pub tickets: Vec<Ticket>,
}

impl Printable for TicketListResult {
    fn text_representation(&self) -> String {
        if self.tickets.is_empty() {
            return "No tickets".to_string();
        }
        self.tickets.iter().map(|t| t.text_representation()).collect::<Vec<_>>().join("\n")
    }

    fn structured_data(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Result of `status` (§4.3.7).
#[derive(Debug, Clone, Serialize)]
pub struct StatusResult {
    pub todo_count: usize,
    pub doing_count: usize,
    pub done_count: usize,
    pub current_ticket_id: Option<String>,
}

impl Printable for StatusResult {
    fn text_representation(&self) -> String {
        format!(
            "todo: {}  doing: {}  done: {}  current: {}",
            self.todo_count,
            self.doing_count,
            self.done_count,
            self.current_ticket_id.as_deref().unwrap_or("(none)")
        )
    }

    fn structured_data(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Result of `version` (§6).
#[derive(Debug, Clone, Serialize)]
pub struct VersionResult {
    pub version: String,
}

impl Printable for VersionResult {
    fn text_representation(&self) -> String {
        format!("ticketflow {}", self.version)
    }

    fn structured_data(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

// Re-exported for callers that need the bare status enum alongside results.
pub type TicketStatus = Status;
