//! Process-wide immutable configuration (§3), loaded from `.ticketflow.yaml`.
//!
//! Grounded on the teacher's config loading (`src/config/user/mod.rs`,
//! `src/config/project.rs`): a serde-derived struct with sensible defaults,
//! deserialized once at startup and passed by value from then on. The
//! source format here is YAML (the on-disk name in §6 is
//! `.ticketflow.yaml`), so `serde_yaml` replaces the teacher's `toml`/
//! `config` crates for this one concern — noted in DESIGN.md. Parsing the
//! file is an "external loader" concern (§1 Non-goals): this module is
//! consumed by, but does not live inside, the engine.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::TicketFlowError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
struct RawTickets {
    dir: String,
    template: String,
    default_priority: i32,
}

impl Default for RawTickets {
    fn default() -> Self {
        Self { dir: "tickets".to_string(), template: String::new(), default_priority: 2 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
struct RawWorktree {
    enabled: bool,
    base_dir: String,
    init_commands: Vec<String>,
}

impl Default for RawWorktree {
    fn default() -> Self {
        Self { enabled: true, base_dir: ".worktrees".to_string(), init_commands: Vec::new() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
struct RawTimeouts {
    git_secs: u64,
    init_commands_secs: u64,
}

impl Default for RawTimeouts {
    fn default() -> Self {
        Self { git_secs: 30, init_commands_secs: 60 }
    }
}

/// Raw, directly-deserialized shape of `.ticketflow.yaml`. All fields are
/// optional in the file; [`RawConfig::validate`] turns this into the
/// immutable [`Config`] value the rest of the crate consumes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawConfig {
    tickets: RawTickets,
    worktree: RawWorktree,
    timeouts: RawTimeouts,
    default_branch: Option<String>,
}

impl RawConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, TicketFlowError> {
        serde_yaml::from_str(yaml)
            .map_err(|e| TicketFlowError::ConfigInvalid { detail: e.to_string() })
    }

    pub fn validate(self, repo_root: &Path) -> Result<Config, TicketFlowError> {
        if self.tickets.dir.trim().is_empty() {
            return Err(TicketFlowError::ConfigInvalid { detail: "tickets.dir must not be empty".into() });
        }
        if self.worktree.enabled && self.worktree.base_dir.trim().is_empty() {
            return Err(TicketFlowError::ConfigInvalid {
                detail: "worktree.base_dir must not be empty when worktree.enabled is true".into(),
            });
        }
        Ok(Config {
            tickets_dir: repo_root.join(&self.tickets.dir),
            tickets_template: self.tickets.template,
            default_priority: self.tickets.default_priority,
            worktree_enabled: self.worktree.enabled,
            worktree_base_dir: self.worktree.base_dir,
            worktree_init_commands: self.worktree.init_commands,
            timeout_git: Duration::from_secs(self.timeouts.git_secs.max(1)),
            timeout_init_commands: Duration::from_secs(self.timeouts.init_commands_secs.max(1)),
            default_branch: self.default_branch,
        })
    }
}

/// The validated, immutable configuration value the engine consumes (§3).
#[derive(Debug, Clone)]
pub struct Config {
    pub tickets_dir: PathBuf,
    pub tickets_template: String,
    pub default_priority: i32,
    pub worktree_enabled: bool,
    pub worktree_base_dir: String,
    pub worktree_init_commands: Vec<String>,
    pub timeout_git: Duration,
    pub timeout_init_commands: Duration,
    pub default_branch: Option<String>,
}

impl Config {
    /// Loads `.ticketflow.yaml` from `repo_root` if present, else applies
    /// defaults — the tool works with zero configuration (§3).
    pub fn load(repo_root: &Path) -> Result<Self, TicketFlowError> {
        let path = repo_root.join(".ticketflow.yaml");
        let raw = if path.is_file() {
            let text = std::fs::read_to_string(&path)?;
            RawConfig::from_yaml(&text)?
        } else {
            RawConfig::default()
        };
        raw.validate(repo_root)
    }

    /// Computes the worktree path for a ticket id, always anchored at the
    /// main repository root regardless of the caller's CWD (§4.3.2, §9).
    pub fn worktree_path(&self, main_repo_root: &Path, ticket_id: &str) -> PathBuf {
        main_repo_root.join(&self.worktree_base_dir).join(ticket_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_with_empty_file() {
        let config = RawConfig::default().validate(Path::new("/repo")).unwrap();
        assert_eq!(config.tickets_dir, Path::new("/repo/tickets"));
        assert!(config.worktree_enabled);
        assert_eq!(config.worktree_base_dir, ".worktrees");
        assert_eq!(config.timeout_git.as_secs(), 30);
    }

    #[test]
    fn rejects_empty_tickets_dir() {
        let mut raw = RawConfig::default();
        raw.tickets.dir = "   ".to_string();
        assert!(raw.validate(Path::new("/repo")).is_err());
    }

    #[test]
    fn worktree_path_is_anchored_at_main_repo_root() {
        let config = RawConfig::default().validate(Path::new("/repo")).unwrap();
        let path = config.worktree_path(Path::new("/repo"), "250102-030405-fix-login");
        assert_eq!(path, Path::new("/repo/.worktrees/250102-030405-fix-login"));
    }

    #[test]
    fn parses_yaml_overrides() {
        let yaml = "tickets:\n  dir: work\nworktree:\n  enabled: false\ndefault_branch: main\n";
        let raw = RawConfig::from_yaml(yaml).unwrap();
        let config = raw.validate(Path::new("/repo")).unwrap();
        assert_eq!(config.tickets_dir, Path::new("/repo/work"));
        assert!(!config.worktree_enabled);
        assert_eq!(config.default_branch.as_deref(), Some("main"));
    }
}
