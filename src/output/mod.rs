//! Output Substrate (component 5): two orthogonal sinks selected once at
//! dispatch time from the parsed `--format` flag (§4.4).
//!
//! Grounded on the teacher's stdout/stderr separation discipline in
//! `src/output/mod.rs` and its `println!`/`eprintln!` macros
//! (`src/styling.rs`), generalized into the explicit `StatusWriter` /
//! `OutputFormatter` capability pair this spec calls for — the teacher
//! prints directly since it has no JSON output mode; this spec's automation
//! use case requires the dual-sink split.

pub mod results;

use std::sync::Mutex;

use clap::ValueEnum;
use serde::Serialize;

use crate::error::TicketFlowError;
use crate::styling::{eprintln, println, PROGRESS_EMOJI, SUCCESS_EMOJI};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Text,
    Json,
}

/// Progress lines and prompts — a distinct concern from the single
/// structured result emitted by [`OutputFormatter`] (§4.4).
pub trait StatusWriter: Send + Sync {
    fn printf(&self, message: &str);
    fn println(&self, message: &str);
}

/// Human-readable status output, written to the same stdout stream as
/// structured text results (the teacher writes all its own messages to
/// stdout — see `src/styling.rs`'s module doc — reserving stderr for child
/// process output and interactive prompts).
pub struct TextStatusWriter;

impl StatusWriter for TextStatusWriter {
    fn printf(&self, message: &str) {
        println!("{PROGRESS_EMOJI} {message}");
    }

    fn println(&self, message: &str) {
        println!("{PROGRESS_EMOJI} {message}");
    }
}

/// Discards all status output — selected automatically in `json` mode so
/// exactly one JSON document reaches stdout (§4.4, §6).
pub struct NullStatusWriter;

impl StatusWriter for NullStatusWriter {
    fn printf(&self, _message: &str) {}
    fn println(&self, _message: &str) {}
}

/// The capability result types implement instead of being special-cased by
/// the text formatter (§4.4).
pub trait Printable {
    fn text_representation(&self) -> String;
    fn structured_data(&self) -> serde_json::Value;
}

/// Emits the single structured result of a command invocation. Thread-safe
/// for concurrent emitters (§4.4).
pub trait OutputFormatter: Send + Sync {
    fn emit(&self, value: &dyn Printable);
    fn emit_error(&self, error: &TicketFlowError);
}

pub struct TextOutputFormatter;

impl OutputFormatter for TextOutputFormatter {
    fn emit(&self, value: &dyn Printable) {
        println!("{SUCCESS_EMOJI} {}", value.text_representation());
    }

    fn emit_error(&self, error: &TicketFlowError) {
        eprintln!("{error}");
    }
}

/// JSON-encodes the result and flushes stdout, per §6: "exactly one JSON
/// document is written". Guarded by a mutex so concurrent emitters (should
/// the TUI Bridge ever emit from multiple threads) never interleave output.
pub struct JsonOutputFormatter {
    lock: Mutex<()>,
}

impl Default for JsonOutputFormatter {
    fn default() -> Self {
        Self { lock: Mutex::new(()) }
    }
}

#[derive(Serialize)]
struct JsonEnvelope<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl OutputFormatter for JsonOutputFormatter {
    fn emit(&self, value: &dyn Printable) {
        let _guard = self.lock.lock().unwrap();
        let envelope = JsonEnvelope { success: true, data: Some(value.structured_data()), error: None };
        println!("{}", serde_json::to_string(&envelope).unwrap_or_else(|_| "{}".to_string()));
    }

    fn emit_error(&self, error: &TicketFlowError) {
        let _guard = self.lock.lock().unwrap();
        let envelope: JsonEnvelope<()> = JsonEnvelope { success: false, data: None, error: Some(error.to_string()) };
        println!("{}", serde_json::to_string(&envelope).unwrap_or_else(|_| "{}".to_string()));
    }
}

/// Constructs the matching `(StatusWriter, OutputFormatter)` pair for a
/// format flag, per §4.5 dispatch step 4: "json ⇒ null, text ⇒ text".
pub fn sinks_for(format: Format) -> (Box<dyn StatusWriter>, Box<dyn OutputFormatter>) {
    match format {
        Format::Text => (Box::new(TextStatusWriter), Box::new(TextOutputFormatter)),
        Format::Json => (Box::new(NullStatusWriter), Box::new(JsonOutputFormatter::default())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_envelope_marks_success() {
        #[derive(Serialize)]
        struct Dummy {
            x: u32,
        }
        impl Printable for Dummy {
            fn text_representation(&self) -> String {
                self.x.to_string()
            }
            fn structured_data(&self) -> serde_json::Value {
                serde_json::to_value(self).unwrap()
            }
        }
        let formatter = JsonOutputFormatter::default();
        // emit() only prints; this test exercises the envelope shape via
        // structured_data() + manual serialization since emit() writes to stdout.
        let envelope = JsonEnvelope { success: true, data: Some(Dummy { x: 1 }.structured_data()), error: None };
        let json = serde_json::to_string(&envelope).unwrap();
        assert!(json.contains("\"success\":true"));
        let _ = formatter;
    }

    #[test]
    fn json_error_envelope_marks_failure() {
        let envelope: JsonEnvelope<()> = JsonEnvelope {
            success: false,
            data: None,
            error: Some("boom".to_string()),
        };
        let json = serde_json::to_string(&envelope).unwrap();
        assert!(json.contains("\"success\":false"));
        assert!(json.contains("boom"));
    }
}
