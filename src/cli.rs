//! Command Dispatcher surface (component 6): the `clap`-derived argument
//! grammar for the CLI surface table (§6). `clap`'s derive macro already
//! gives tolerant flag/positional interspersion; [`crate::dispatch`] layers
//! the validate → execute pipeline on top, matching the teacher's
//! `Cli`/`Commands` split in `src/cli.rs`.

use clap::{Args, Parser, Subcommand};

use crate::output::Format;
use crate::ticket::Status;

#[derive(Debug, Parser)]
#[command(name = "tf", version, about = "A Markdown ticket backlog coupled to Git branches and worktrees")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging (maps to `RUST_LOG=debug` when unset).
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create a new ticket in `todo/`.
    New(NewArgs),
    /// Move a ticket to `doing/`, creating its branch and worktree.
    Start(StartArgs),
    /// Close the current ticket, or the ticket named by `id`.
    Close(CloseArgs),
    /// Re-materialize the current-ticket symlink from the active branch.
    Restore(FormatArgs),
    /// Remove the worktree and branch for a done ticket.
    Cleanup(CleanupArgs),
    /// Worktree-scoped operations.
    #[command(subcommand)]
    Worktree(WorktreeCommand),
    /// List tickets, optionally filtered by status.
    List(ListArgs),
    /// Show a single ticket.
    Show(ShowArgs),
    /// Print per-status counts and the current ticket.
    Status(FormatArgs),
    /// Print the tool version.
    Version(FormatArgs),
}

#[derive(Debug, Subcommand)]
pub enum WorktreeCommand {
    /// List all Git worktrees.
    List(FormatArgs),
    /// Reconcile done tickets with orphan worktrees and stale branches.
    Clean(CleanArgs),
}

#[derive(Debug, Args)]
pub struct FormatArgs {
    #[arg(short = 'o', long, value_enum, default_value_t = Format::Text)]
    pub format: Format,
}

#[derive(Debug, Args)]
pub struct NewArgs {
    pub slug: String,
    #[arg(short = 'p', long)]
    pub parent: Option<String>,
    #[arg(short = 'o', long, value_enum, default_value_t = Format::Text)]
    pub format: Format,
}

#[derive(Debug, Args)]
pub struct StartArgs {
    pub id: String,
    #[arg(short = 'f', long)]
    pub force: bool,
    #[arg(short = 'o', long, value_enum, default_value_t = Format::Text)]
    pub format: Format,
}

#[derive(Debug, Args)]
pub struct CloseArgs {
    pub id: Option<String>,
    #[arg(short = 'f', long)]
    pub force: bool,
    #[arg(long)]
    pub reason: Option<String>,
    #[arg(short = 'o', long, value_enum, default_value_t = Format::Text)]
    pub format: Format,
}

#[derive(Debug, Args)]
pub struct CleanupArgs {
    pub id: String,
    #[arg(short = 'f', long)]
    pub force: bool,
    #[arg(short = 'o', long, value_enum, default_value_t = Format::Text)]
    pub format: Format,
}

#[derive(Debug, Args)]
pub struct CleanArgs {
    #[arg(long)]
    pub dry_run: bool,
    #[arg(short = 'o', long, value_enum, default_value_t = Format::Text)]
    pub format: Format,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    #[arg(short = 's', long, value_enum)]
    pub status: Option<Status>,
    #[arg(short = 'c', long)]
    pub count: Option<usize>,
    #[arg(short = 'o', long, value_enum, default_value_t = Format::Text)]
    pub format: Format,
}

#[derive(Debug, Args)]
pub struct ShowArgs {
    pub id: String,
    #[arg(short = 'o', long, value_enum, default_value_t = Format::Text)]
    pub format: Format,
}

impl clap::ValueEnum for Status {
    fn value_variants<'a>() -> &'a [Self] {
        &[Status::Todo, Status::Doing, Status::Done]
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        Some(clap::builder::PossibleValue::new(self.dir_name()))
    }
}
