//! Command Dispatcher (component 6): validate → execute pipeline, selecting
//! the Output Substrate sinks from `--format` before running the command
//! (§4.5). `clap` already resolved the command name and parsed flags by the
//! time [`run`] is called; this module owns steps 4-7 of the dispatch
//! lifecycle.

use std::path::Path;

use crate::cancel::CancellationToken;
use crate::cli::{Commands, WorktreeCommand};
use crate::engine::Engine;
use crate::error::TicketFlowError;
use crate::output::results::{TicketListResult, VersionResult, WorktreeListResult};
use crate::output::{sinks_for, Format, OutputFormatter, Printable};

/// Runs one parsed command to completion, emitting its result (or error)
/// through the matching sink pair, and returns the process exit code.
pub fn run(command: Commands, cwd: &Path, token: &CancellationToken) -> i32 {
    let format = format_of(&command);
    let (_status, formatter) = sinks_for(format);

    match execute(command, cwd, token) {
        Ok(()) => 0,
        Err(e) => {
            formatter.emit_error(&e);
            e.exit_code()
        }
    }
}

fn format_of(command: &Commands) -> Format {
    match command {
        Commands::New(a) => a.format,
        Commands::Start(a) => a.format,
        Commands::Close(a) => a.format,
        Commands::Restore(a) => a.format,
        Commands::Cleanup(a) => a.format,
        Commands::Worktree(WorktreeCommand::List(a)) => a.format,
        Commands::Worktree(WorktreeCommand::Clean(a)) => a.format,
        Commands::List(a) => a.format,
        Commands::Show(a) => a.format,
        Commands::Status(a) => a.format,
        Commands::Version(a) => a.format,
    }
}

fn execute(command: Commands, cwd: &Path, token: &CancellationToken) -> Result<(), TicketFlowError> {
    let format = format_of(&command);
    let (status, formatter) = sinks_for(format);

    // `version` never needs a repository.
    if let Commands::Version(_) = command {
        formatter.emit(&VersionResult { version: env!("CARGO_PKG_VERSION").to_string() });
        return Ok(());
    }

    let engine = Engine::new(cwd, token)?;
    match command {
        Commands::New(args) => {
            if let Some(parent) = &args.parent {
                validate_nonempty("parent", parent)?;
            }
            validate_nonempty("slug", &args.slug)?;
            let ticket = engine.new_ticket(&args.slug, args.parent.as_deref(), token)?;
            emit(formatter.as_ref(), &ticket);
        }
        Commands::Start(args) => {
            validate_nonempty("id", &args.id)?;
            let result = engine.start(&args.id, args.force, status.as_ref(), token)?;
            emit(formatter.as_ref(), &result);
        }
        Commands::Close(args) => {
            let ticket = match &args.id {
                Some(id) => engine.close_by_id(id, args.force, args.reason.as_deref(), token)?,
                None => engine.close(args.force, args.reason.as_deref(), token)?,
            };
            emit(formatter.as_ref(), &ticket);
        }
        Commands::Restore(_) => {
            let ticket = engine.restore_symlink(token)?;
            emit(formatter.as_ref(), &ticket);
        }
        Commands::Cleanup(args) => {
            validate_nonempty("id", &args.id)?;
            let result = engine.cleanup(&args.id, args.force, token)?;
            emit(formatter.as_ref(), &result);
        }
        Commands::Worktree(WorktreeCommand::List(_)) => {
            let worktrees = engine.git_worktree_list(token)?;
            emit(formatter.as_ref(), &WorktreeListResult { worktrees });
        }
        Commands::Worktree(WorktreeCommand::Clean(args)) => {
            let result = engine.auto_cleanup(args.dry_run, token)?;
            emit(formatter.as_ref(), &result);
        }
        Commands::List(args) => {
            let mut tickets = engine.store().list(args.status, token)?;
            if let Some(count) = args.count {
                tickets.truncate(count);
            }
            emit(formatter.as_ref(), &TicketListResult { tickets });
        }
        Commands::Show(args) => {
            validate_nonempty("id", &args.id)?;
            let ticket = engine.store().load(&args.id, token)?;
            emit(formatter.as_ref(), &ticket);
        }
        Commands::Status(_) => {
            let result = engine.status(token)?;
            emit(formatter.as_ref(), &result);
        }
        Commands::Version(_) => unreachable!("handled above"),
    }
    Ok(())
}

fn validate_nonempty(name: &str, value: &str) -> Result<(), TicketFlowError> {
    if value.trim().is_empty() {
        return Err(TicketFlowError::MissingArgument { name: name.to_string() });
    }
    Ok(())
}

fn emit(formatter: &dyn OutputFormatter, value: &dyn Printable) {
    formatter.emit(value);
}
