//! YAML front-matter codec: `Ticket` <-> Markdown+YAML document.
//!
//! The parser tolerates unknown keys and the renderer preserves them (§6).
//! Per SPEC_FULL.md §3.1, known fields are always re-emitted in the
//! canonical field order from §3; unknown keys follow afterwards in the
//! order they were first observed on disk.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde_yaml::Value;

use super::{Status, Ticket};
use crate::error::TicketFlowError;

const KNOWN_FIELDS: &[&str] = &[
    "id",
    "slug",
    "priority",
    "description",
    "created_at",
    "started_at",
    "closed_at",
    "closure_reason",
    "related",
];

pub fn parse(raw: &str, status: Status) -> Result<Ticket, TicketFlowError> {
    let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);
    let mut lines = raw.lines();
    let first = lines.next().unwrap_or_default();
    if first.trim_end() != "---" {
        return Err(TicketFlowError::InvalidFormat {
            detail: "ticket file is missing YAML front matter".to_string(),
        });
    }

    let mut yaml_lines = Vec::new();
    let mut body_lines = Vec::new();
    let mut in_body = false;
    for line in lines {
        if !in_body && line.trim_end() == "---" {
            in_body = true;
            continue;
        }
        if in_body {
            body_lines.push(line);
        } else {
            yaml_lines.push(line);
        }
    }
    if !in_body {
        return Err(TicketFlowError::InvalidFormat {
            detail: "ticket file front matter is not closed with `---`".to_string(),
        });
    }

    let yaml_text = yaml_lines.join("\n");
    let mapping: serde_yaml::Mapping = serde_yaml::from_str(&yaml_text).map_err(|e| {
        TicketFlowError::InvalidFormat { detail: format!("invalid YAML front matter: {e}") }
    })?;

    let get_str = |m: &serde_yaml::Mapping, key: &str| -> Option<String> {
        m.get(key).and_then(|v| v.as_str().map(str::to_string))
    };
    let get_timestamp = |m: &serde_yaml::Mapping, key: &str| -> Result<Option<DateTime<Utc>>, TicketFlowError> {
        match m.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(v) => {
                let s = v.as_str().ok_or_else(|| TicketFlowError::InvalidFormat {
                    detail: format!("`{key}` must be an RFC3339 string"),
                })?;
                let parsed = DateTime::parse_from_rfc3339(s).map_err(|e| TicketFlowError::InvalidFormat {
                    detail: format!("`{key}` is not RFC3339: {e}"),
                })?;
                Ok(Some(parsed.with_timezone(&Utc)))
            }
        }
    };

    let id = get_str(&mapping, "id").ok_or_else(|| TicketFlowError::InvalidFormat {
        detail: "ticket is missing `id`".to_string(),
    })?;
    let slug = get_str(&mapping, "slug").unwrap_or_else(|| id.clone());
    let priority = mapping.get("priority").and_then(Value::as_i64).unwrap_or(0) as i32;
    let description = get_str(&mapping, "description").unwrap_or_default();
    let created_at = get_timestamp(&mapping, "created_at")?.ok_or_else(|| TicketFlowError::InvalidFormat {
        detail: "ticket is missing `created_at`".to_string(),
    })?;
    let started_at = get_timestamp(&mapping, "started_at")?;
    let closed_at = get_timestamp(&mapping, "closed_at")?;
    let closure_reason = get_str(&mapping, "closure_reason");
    let related = mapping
        .get("related")
        .and_then(Value::as_sequence)
        .map(|seq| seq.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default();

    let mut extra = IndexMap::new();
    for (k, v) in mapping.iter() {
        if let Some(key) = k.as_str()
            && !KNOWN_FIELDS.contains(&key)
        {
            extra.insert(key.to_string(), v.clone());
        }
    }

    // `render` always separates the front matter from the body with one
    // blank line; drop it so body round-trips exactly.
    if body_lines.first().is_some_and(|l| l.is_empty()) {
        body_lines.remove(0);
    }
    let content = body_lines.join("\n");

    let ticket = Ticket {
        id,
        slug,
        priority,
        description,
        created_at,
        started_at,
        closed_at,
        closure_reason,
        related,
        content,
        status,
        extra,
    };
    ticket.check_invariants()?;
    Ok(ticket)
}

pub fn render(ticket: &Ticket) -> String {
    let mut mapping = serde_yaml::Mapping::new();
    mapping.insert("id".into(), ticket.id.clone().into());
    mapping.insert("slug".into(), ticket.slug.clone().into());
    mapping.insert("priority".into(), (ticket.priority as i64).into());
    mapping.insert("description".into(), ticket.description.clone().into());
    mapping.insert("created_at".into(), ticket.created_at.to_rfc3339().into());
    mapping.insert(
        "started_at".into(),
        ticket.started_at.map(|t| Value::from(t.to_rfc3339())).unwrap_or(Value::Null),
    );
    mapping.insert(
        "closed_at".into(),
        ticket.closed_at.map(|t| Value::from(t.to_rfc3339())).unwrap_or(Value::Null),
    );
    if let Some(reason) = &ticket.closure_reason {
        mapping.insert("closure_reason".into(), reason.clone().into());
    }
    mapping.insert(
        "related".into(),
        Value::Sequence(ticket.related.iter().map(|r| Value::from(r.clone())).collect()),
    );
    for (k, v) in &ticket.extra {
        mapping.insert(k.clone().into(), v.clone());
    }

    let yaml = serde_yaml::to_string(&Value::Mapping(mapping)).unwrap_or_default();
    let body = ticket.content.trim_end_matches('\n');
    if body.is_empty() {
        format!("---\n{yaml}---\n")
    } else {
        format!("---\n{yaml}---\n\n{body}\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> Ticket {
        let now = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        Ticket::new(now, "fix-login".into(), 1, "Body text.".into()).unwrap()
    }

    #[test]
    fn round_trip_preserves_known_fields() {
        let ticket = sample();
        let rendered = render(&ticket);
        let parsed = parse(&rendered, Status::Todo).unwrap();
        assert_eq!(parsed.id, ticket.id);
        assert_eq!(parsed.slug, ticket.slug);
        assert_eq!(parsed.priority, ticket.priority);
        assert_eq!(parsed.created_at, ticket.created_at);
        assert_eq!(parsed.content, "Body text.");
    }

    #[test]
    fn round_trip_preserves_unknown_keys() {
        let mut ticket = sample();
        ticket.extra.insert("custom_field".to_string(), Value::from("hello"));
        let rendered = render(&ticket);
        assert!(rendered.contains("custom_field: hello"));
        let parsed = parse(&rendered, Status::Todo).unwrap();
        assert_eq!(parsed.extra.get("custom_field").unwrap().as_str(), Some("hello"));
    }

    #[test]
    fn closure_reason_round_trips_when_present() {
        let mut ticket = sample();
        ticket.closure_reason = Some("duplicate".into());
        let rendered = render(&ticket);
        let parsed = parse(&rendered, Status::Todo).unwrap();
        assert_eq!(parsed.closure_reason.as_deref(), Some("duplicate"));
    }

    #[test]
    fn missing_front_matter_delimiter_is_rejected() {
        assert!(parse("no front matter here", Status::Todo).is_err());
    }
}
