//! Stand-in archiver commands and process liveness checks.
//!
//! Each helper returns a `(program, args)` pair suitable for an archiver command.

use std::path::Path;
use std::time::Duration;

use tokio::time::{Instant, sleep};

/// Command pair accepted by `ArchiverCommand::new`.
pub type CommandLine = (String, Vec<String>);

fn shell(script: &str) -> CommandLine {
    ("sh".to_string(), vec!["-c".to_string(), script.to_string()])
}

/// Writes one file from the working directory to stdout and exits.
#[must_use]
pub fn cat_file(name: &str) -> CommandLine {
    ("cat".to_string(), vec![name.to_string()])
}

/// A program that does not exist.
#[must_use]
pub fn missing_program() -> CommandLine {
    ("archivist-missing-archiver".to_string(), Vec::new())
}

/// Produces output forever and exits on SIGTERM.
#[must_use]
pub fn endless() -> CommandLine {
    ("yes".to_string(), vec!["archivist".to_string()])
}

/// Records its pid in `pid_file`, then produces output forever.
#[must_use]
pub fn endless_recording_pid(pid_file: &Path) -> CommandLine {
    shell(&format!(
        "echo $$ > '{}'; exec yes archivist",
        pid_file.display()
    ))
}

/// Read a pid written by [`endless_recording_pid`], waiting up to `limit` for it to appear.
pub async fn read_pid(pid_file: &Path, limit: Duration) -> Option<u32> {
    let deadline = Instant::now() + limit;
    loop {
        if let Ok(contents) = tokio::fs::read_to_string(pid_file).await {
            if let Ok(pid) = contents.trim().parse() {
                return Some(pid);
            }
        }
        if Instant::now() >= deadline {
            return None;
        }
        sleep(Duration::from_millis(20)).await;
    }
}

/// Writes `bytes` zero bytes, then blocks until signalled.
#[must_use]
pub fn prefix_then_hang(bytes: usize) -> CommandLine {
    shell(&format!("head -c {bytes} /dev/zero; exec sleep 3600"))
}

/// Ignores SIGTERM so only SIGKILL stops it.
#[must_use]
pub fn ignores_sigterm() -> CommandLine {
    shell("trap '' TERM; while :; do sleep 0.1; done")
}

/// Writes `bytes` zero bytes, then exits with a failure status.
#[must_use]
pub fn fails_after(bytes: usize) -> CommandLine {
    shell(&format!("head -c {bytes} /dev/zero; exit 3"))
}

/// Returns `true` if a process with `pid` exists and has not been reaped.
#[must_use]
pub fn process_alive(pid: u32) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    !matches!(kill(Pid::from_raw(raw), None), Err(Errno::ESRCH))
}

/// Poll until `pid` is gone or `limit` elapses. Returns `true` if the process is gone.
pub async fn wait_until_gone(pid: u32, limit: Duration) -> bool {
    let deadline = Instant::now() + limit;
    loop {
        if !process_alive(pid) {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        sleep(Duration::from_millis(20)).await;
    }
}
