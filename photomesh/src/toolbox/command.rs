//! Subprocess plumbing shared by the toolbox adapters.

use crate::pipeline::CollabError;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Runs one toolbox subcommand to completion.
///
/// Cancellation kills the child process and returns `Ok`: a stopped
/// collaborator is a clean early return, not a failure. The child's
/// stdout/stderr are inherited so the toolbox's own progress output stays
/// visible.
pub(crate) async fn run_tool(
    binary: &Path,
    args: &[String],
    cancel: &CancellationToken,
) -> Result<(), CollabError> {
    debug!(binary = %binary.display(), ?args, "spawning toolbox process");

    let mut child = Command::new(binary)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .kill_on_drop(true)
        .spawn()?;

    tokio::select! {
        status = child.wait() => {
            let status = status?;
            if status.success() {
                Ok(())
            } else {
                Err(CollabError::Process(format!(
                    "{} {} exited with {}",
                    binary.display(),
                    args.first().map(String::as_str).unwrap_or(""),
                    status
                )))
            }
        }
        () = cancel.cancelled() => {
            warn!(
                subcommand = args.first().map(String::as_str).unwrap_or(""),
                "stop requested, killing toolbox process"
            );
            if let Err(err) = child.start_kill() {
                debug!(error = %err, "toolbox process already gone");
            }
            let _ = child.wait().await;
            Ok(())
        }
    }
}

pub(crate) fn path_arg(path: &Path) -> String {
    path.display().to_string()
}

pub(crate) fn bool_arg(value: bool) -> String {
    if value { "1" } else { "0" }.to_string()
}

/// Thread-count argument; zero means "all cores", which the toolbox
/// spells `-1`.
pub(crate) fn thread_arg(num_threads: usize) -> String {
    if num_threads == 0 {
        "-1".to_string()
    } else {
        num_threads.to_string()
    }
}
