//! Worktree listing and porcelain parsing.
//!
//! Grounded on `worktrunk::git::Worktree`/`WorktreeList` (`src/git/mod.rs`)
//! and the parser exercised by `src/git/test.rs`; trimmed to the fields
//! `spec.md` §4.1 needs (`worktree_list()` → {path, branch, head, detached}).

use std::path::PathBuf;

use crate::error::TicketFlowError;

/// One entry from `git worktree list --porcelain`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Worktree {
    pub path: PathBuf,
    pub head: String,
    pub branch: Option<String>,
    pub bare: bool,
    pub detached: bool,
    pub locked: Option<String>,
}

impl Worktree {
    /// Parse the block-based porcelain format: entries are separated by a
    /// blank line, each line is `key[ value]`.
    pub fn parse_porcelain_list(output: &str) -> Result<Vec<Worktree>, TicketFlowError> {
        let mut worktrees = Vec::new();
        let mut current: Option<Worktree> = None;

        for line in output.lines() {
            if line.is_empty() {
                if let Some(wt) = current.take() {
                    worktrees.push(wt);
                }
                continue;
            }

            let (key, value) = match line.split_once(' ') {
                Some((k, v)) => (k, Some(v)),
                None => (line, None),
            };

            match key {
                "worktree" => {
                    if let Some(wt) = current.take() {
                        worktrees.push(wt);
                    }
                    current = Some(Worktree {
                        path: PathBuf::from(value.unwrap_or_default()),
                        head: String::new(),
                        branch: None,
                        bare: false,
                        detached: false,
                        locked: None,
                    });
                }
                "HEAD" => {
                    if let Some(wt) = current.as_mut() {
                        wt.head = value.unwrap_or_default().to_string();
                    }
                }
                "branch" => {
                    if let Some(wt) = current.as_mut() {
                        let branch_ref = value.unwrap_or_default();
                        wt.branch = Some(
                            branch_ref
                                .strip_prefix("refs/heads/")
                                .unwrap_or(branch_ref)
                                .to_string(),
                        );
                    }
                }
                "bare" => {
                    if let Some(wt) = current.as_mut() {
                        wt.bare = true;
                    }
                }
                "detached" => {
                    if let Some(wt) = current.as_mut() {
                        wt.detached = true;
                    }
                }
                "locked" => {
                    if let Some(wt) = current.as_mut() {
                        wt.locked = Some(value.unwrap_or_default().to_string());
                    }
                }
                _ => {}
            }
        }

        if let Some(wt) = current.take() {
            worktrees.push(wt);
        }

        Ok(worktrees)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_output_parses_to_empty_list() {
        assert_eq!(Worktree::parse_porcelain_list("").unwrap(), vec![]);
    }

    #[test]
    fn parses_single_branch_worktree() {
        let output = "worktree /repo\nHEAD abc123\nbranch refs/heads/main\n\n";
        let list = Worktree::parse_porcelain_list(output).unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].path, PathBuf::from("/repo"));
        assert_eq!(list[0].branch.as_deref(), Some("main"));
        assert_eq!(list[0].head, "abc123");
        assert!(!list[0].detached);
    }

    #[test]
    fn parses_detached_and_bare_entries() {
        let output = "worktree /repo\nHEAD abc123\nbare\n\nworktree /repo/.worktrees/x\nHEAD def456\ndetached\n\n";
        let list = Worktree::parse_porcelain_list(output).unwrap();
        assert_eq!(list.len(), 2);
        assert!(list[0].bare);
        assert!(list[1].detached);
        assert_eq!(list[1].branch, None);
    }

    #[test]
    fn locked_with_no_reason_is_empty_string() {
        let output = "worktree /repo\nHEAD abc123\nbranch refs/heads/main\nlocked\n\n";
        let list = Worktree::parse_porcelain_list(output).unwrap();
        assert_eq!(list[0].locked.as_deref(), Some(""));
    }

    #[test]
    fn parses_multiple_worktrees_without_trailing_blank() {
        let output = "worktree /repo\nHEAD a\nbranch refs/heads/main\n\nworktree /repo/.worktrees/id\nHEAD b\nbranch refs/heads/id";
        let list = Worktree::parse_porcelain_list(output).unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[1].branch.as_deref(), Some("id"));
    }
}
