//! TicketFlow — a Markdown ticket backlog coupled to Git branches and worktrees.
//!
//! This crate is the core engine described in the project's design docs: the
//! file-based ticket model, the Git adapter that keeps tickets and branches
//! consistent, and the orchestration layer that composes them. The CLI
//! binary (`src/main.rs`) and any external TUI are thin collaborators built
//! on top of [`engine::Engine`].

pub mod cancel;
pub mod cleanup;
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod git;
pub mod output;
pub mod styling;
pub mod ticket;
pub mod tui_bridge;

pub use cancel::CancellationToken;
pub use config::Config;
pub use engine::Engine;
pub use error::TicketFlowError;
