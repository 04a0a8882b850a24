//! CLI entry point: parses arguments, wires SIGINT to a [`CancellationToken`],
//! initializes logging, and dispatches to the library. Matches the teacher's
//! `main.rs` shape (parse → init logging → run → `process::exit`), trimmed
//! of the teacher's TUI/shell-completion bootstrapping this tool doesn't
//! have.

use clap::Parser;

use ticketflow::cancel::CancellationToken;
use ticketflow::cli::Cli;
use ticketflow::dispatch;

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "off" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    let token = CancellationToken::new();
    if let Err(e) = signal_hook::flag::register(signal_hook::consts::SIGINT, token.as_flag()) {
        log::warn!("failed to install SIGINT handler: {e}");
    }

    let cwd = match std::env::current_dir() {
        Ok(cwd) => cwd,
        Err(e) => {
            eprintln!("failed to read the current directory: {e}");
            std::process::exit(1);
        }
    };

    let exit_code = dispatch::run(cli.command, &cwd, &token);
    std::process::exit(exit_code);
}
