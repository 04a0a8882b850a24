//! Ticket data model (§3) and front-matter codec.
//!
//! Grounded on the Markdown+YAML front-matter parsing pattern in
//! `examples/untra-operator/src/queue/ticket.rs` (`Ticket::from_file`,
//! frontmatter extraction), generalized to preserve field order and
//! round-trip unknown keys per SPEC_FULL.md §3.1.

mod frontmatter;
pub mod store;

pub use store::TicketStore;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::error::TicketFlowError;

/// Derived from the containing directory — the directory is the source of
/// truth (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Todo,
    Doing,
    Done,
}

impl Status {
    pub fn dir_name(self) -> &'static str {
        match self {
            Status::Todo => "todo",
            Status::Doing => "doing",
            Status::Done => "done",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.dir_name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ticket {
    pub id: String,
    pub slug: String,
    pub priority: i32,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub closure_reason: Option<String>,
    pub related: Vec<String>,
    pub content: String,
    pub status: Status,
    /// Unknown front-matter keys, preserved verbatim on write (§6). Not part
    /// of the JSON projection (`output::results`'s manual `Serialize` impl).
    pub extra: IndexMap<String, serde_yaml::Value>,
}

/// Validates a slug: lowercase alphanumeric and hyphens, forbidding
/// command-injection characters and control bytes (§3).
pub fn validate_slug(slug: &str) -> Result<(), TicketFlowError> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"^[a-z0-9]+(-[a-z0-9]+)*$").unwrap());
    if slug.is_empty() {
        return Err(TicketFlowError::InvalidSlug {
            slug: slug.to_string(),
            reason: "slug must not be empty".to_string(),
        });
    }
    if slug.chars().any(|c| c.is_control()) {
        return Err(TicketFlowError::InvalidSlug {
            slug: slug.to_string(),
            reason: "slug contains control characters".to_string(),
        });
    }
    if !re.is_match(slug) {
        return Err(TicketFlowError::InvalidSlug {
            slug: slug.to_string(),
            reason: "slug must be lowercase alphanumeric with single hyphens".to_string(),
        });
    }
    Ok(())
}

/// Generates the stable `YYMMDD-HHMMSS-<slug>` id (§3).
pub fn generate_id(now: DateTime<Utc>, slug: &str) -> String {
    format!("{}-{}", now.format("%y%m%d-%H%M%S"), slug)
}

impl Ticket {
    /// A freshly created ticket in `todo`, per §4.3.1.
    pub fn new(now: DateTime<Utc>, slug: String, priority: i32, content: String) -> Result<Self, TicketFlowError> {
        validate_slug(&slug)?;
        Ok(Ticket {
            id: generate_id(now, &slug),
            slug,
            priority,
            description: String::new(),
            created_at: now,
            started_at: None,
            closed_at: None,
            closure_reason: None,
            related: Vec::new(),
            content,
            status: Status::Todo,
            extra: IndexMap::new(),
        })
    }

    /// `status == doing ⇒ started_at ≠ null ∧ closed_at == null` and
    /// `status == done ⇒ started_at ≠ null ∧ closed_at ≠ null ∧ closed_at ≥ started_at` (§3).
    pub fn check_invariants(&self) -> Result<(), TicketFlowError> {
        match self.status {
            Status::Todo => {}
            Status::Doing => {
                if self.started_at.is_none() || self.closed_at.is_some() {
                    return Err(TicketFlowError::InvalidFormat {
                        detail: format!("ticket {} violates the doing-status invariant", self.id),
                    });
                }
            }
            Status::Done => {
                let (Some(started), Some(closed)) = (self.started_at, self.closed_at) else {
                    return Err(TicketFlowError::InvalidFormat {
                        detail: format!("ticket {} violates the done-status invariant", self.id),
                    });
                };
                if closed < started {
                    return Err(TicketFlowError::InvalidFormat {
                        detail: format!("ticket {}: closed_at precedes started_at", self.id),
                    });
                }
            }
        }
        if self.started_at.is_some_and(|s| s < self.created_at) {
            return Err(TicketFlowError::InvalidFormat {
                detail: format!("ticket {}: started_at precedes created_at", self.id),
            });
        }
        Ok(())
    }

    pub fn related_parent(&self) -> Option<&str> {
        self.related.iter().find_map(|r| r.strip_prefix("parent:"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_minimal_and_long_slugs() {
        assert!(validate_slug("a").is_ok());
        assert!(validate_slug("fix-login-retry-logic-edge-case").is_ok());
    }

    #[test]
    fn rejects_invalid_slugs() {
        assert!(validate_slug("").is_err());
        assert!(validate_slug("Has-Caps").is_err());
        assert!(validate_slug("has_underscore").is_err());
        assert!(validate_slug("trailing-").is_err());
        assert!(validate_slug("semi;colon").is_err());
        assert!(validate_slug("new\nline").is_err());
    }

    #[test]
    fn id_format_matches_spec() {
        use chrono::TimeZone;
        let now = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(generate_id(now, "fix-login"), "250102-030405-fix-login");
    }

    #[test]
    fn doing_without_started_at_is_invalid() {
        let mut t = Ticket::new(Utc::now(), "x".into(), 1, String::new()).unwrap();
        t.status = Status::Doing;
        assert!(t.check_invariants().is_err());
    }

    #[test]
    fn done_with_closed_before_started_is_invalid() {
        use chrono::Duration;
        let now = Utc::now();
        let mut t = Ticket::new(now, "x".into(), 1, String::new()).unwrap();
        t.status = Status::Done;
        t.started_at = Some(now);
        t.closed_at = Some(now - Duration::seconds(5));
        assert!(t.check_invariants().is_err());
    }
}
