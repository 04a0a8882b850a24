//! Deadline- and cancellation-aware subprocess runner.
//!
//! Every `git` invocation in this crate flows through [`run`] so that working
//! directory, deadline, and cancellation are handled uniformly (component 1,
//! "Git Adapter"). Grounded on the teacher's `wait_timeout::ChildExt` usage in
//! `src/shell/utils.rs`, generalized with a polling loop so a
//! [`CancellationToken`] can also terminate the child early.

use std::path::Path;
use std::process::{Command, Output, Stdio};
use std::time::{Duration, Instant};

use wait_timeout::ChildExt;

use crate::cancel::CancellationToken;
use crate::error::TicketFlowError;

/// How often the wait loop polls for timeout/cancellation.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Run `git <args>` in `dir`, bounded by `deadline` and cooperatively
/// cancellable via `token`. Never mutates the calling process's working
/// directory — the directory is always passed explicitly to the child.
pub fn run_git(
    dir: &Path,
    args: &[&str],
    deadline: Duration,
    token: &CancellationToken,
) -> Result<Output, TicketFlowError> {
    run(Command::new("git").args(args).current_dir(dir), "git", args, deadline, token)
}

/// Run an arbitrary shell command (used for `worktree.init_commands`),
/// bounded by `deadline` and cancellable via `token`.
pub fn run_shell(
    dir: &Path,
    shell_command: &str,
    deadline: Duration,
    token: &CancellationToken,
) -> Result<Output, TicketFlowError> {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(shell_command).current_dir(dir);
    run(&mut cmd, "sh -c", &[shell_command], deadline, token)
}

fn run(
    cmd: &mut Command,
    op_name: &str,
    args: &[&str],
    deadline: Duration,
    token: &CancellationToken,
) -> Result<Output, TicketFlowError> {
    token.check()?;
    cmd.stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped());

    let mut child = cmd.spawn().map_err(TicketFlowError::Io)?;
    let start = Instant::now();

    loop {
        if token.is_cancelled() {
            let _ = child.kill();
            let _ = child.wait();
            return Err(TicketFlowError::Cancelled);
        }

        let elapsed = start.elapsed();
        if elapsed >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Err(TicketFlowError::Timeout {
                op: format!("{op_name} {}", args.join(" ")),
                elapsed,
            });
        }

        let remaining = deadline - elapsed;
        let wait_slice = remaining.min(POLL_INTERVAL);
        match child.wait_timeout(wait_slice).map_err(TicketFlowError::Io)? {
            Some(_status) => break,
            None => continue,
        }
    }

    // The child has exited; collecting output via `wait_with_output` would
    // re-wait, so read the already-open pipes directly instead.
    use std::io::Read;
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    if let Some(mut out) = child.stdout.take() {
        out.read_to_end(&mut stdout).map_err(TicketFlowError::Io)?;
    }
    if let Some(mut err) = child.stderr.take() {
        err.read_to_end(&mut stderr).map_err(TicketFlowError::Io)?;
    }
    let status = child.wait().map_err(TicketFlowError::Io)?;

    Ok(Output { status, stdout, stderr })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn run_git_reports_version() {
        let dir = std::env::current_dir().unwrap();
        let out = run_git(&dir, &["--version"], Duration::from_secs(5), &CancellationToken::new())
            .unwrap();
        assert!(out.status.success());
        assert!(String::from_utf8_lossy(&out.stdout).contains("git version"));
    }

    #[test]
    fn cancelled_token_aborts_immediately() {
        let dir = std::env::current_dir().unwrap();
        let token = CancellationToken::new();
        token.cancel();
        let err = run_git(&dir, &["--version"], Duration::from_secs(5), &token).unwrap_err();
        assert!(matches!(err, TicketFlowError::Cancelled));
    }

    #[test]
    fn timeout_kills_long_running_command() {
        let dir = std::env::current_dir().unwrap();
        let err = run_shell(&dir, "sleep 5", Duration::from_millis(100), &CancellationToken::new())
            .unwrap_err();
        assert!(matches!(err, TicketFlowError::Timeout { .. }));
    }
}
