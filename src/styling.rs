//! Terminal styling substrate, trimmed from the teacher's consolidated
//! styling module (`anstream` + `anstyle`) down to what the text
//! [`StatusWriter`](crate::output::StatusWriter) and
//! [`OutputFormatter`](crate::output::OutputFormatter) implementations need.
//!
//! `anstream` auto-detects `NO_COLOR`/`CLICOLOR_FORCE`/TTY-ness, so the rest
//! of the crate never has to branch on color support itself.

use anstyle::{AnsiColor, Color, Style};

pub use anstream::{eprintln, println};

/// Error style (red) — use as `{ERROR}text{ERROR:#}`.
pub const ERROR: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Red)));

/// Bold error style, for emphasizing an identifier inside an error message.
pub const ERROR_BOLD: Style = Style::new().bold().fg_color(Some(Color::Ansi(AnsiColor::Red)));

/// Success style (green).
pub const SUCCESS: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Green)));

/// Warning style (yellow).
pub const WARNING: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Yellow)));

/// Hint style (dimmed) — use as `{HINT}text{HINT:#}`.
pub const HINT: Style = Style::new().dimmed();

/// Progress emoji, used by the text [`StatusWriter`](crate::output::StatusWriter).
pub const PROGRESS_EMOJI: &str = "\u{1F504}";

/// Success emoji.
pub const SUCCESS_EMOJI: &str = "\u{2705}";

/// Error emoji.
pub const ERROR_EMOJI: &str = "\u{274C}";

/// Hint emoji.
pub const HINT_EMOJI: &str = "\u{1F4A1}";
