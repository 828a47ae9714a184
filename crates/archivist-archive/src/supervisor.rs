//! Launches the archiving command and owns its termination.
//!
//! # Design
//! - `ArchiveProcess` is a scoped handle: `finish`/`terminate` release it explicitly and
//!   `Drop` releases it when a task is aborted or unwinds before either ran.
//! - Termination escalates SIGTERM → grace period → SIGKILL and always reaps the child.
//! - stderr is drained in the background and only ever logged.

use std::ffi::{OsStr, OsString};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::error::{ArchiveError, ArchiveResult};
use crate::resolver::ArchiveRequest;

/// Default wait between SIGTERM and SIGKILL.
pub const DEFAULT_TERMINATE_GRACE: Duration = Duration::from_secs(2);

/// Command line used to produce an archive on stdout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiverCommand {
    program: OsString,
    args: Vec<OsString>,
}

impl ArchiverCommand {
    /// Build a command from a program and its arguments.
    #[must_use]
    pub fn new<P, I, A>(program: P, args: I) -> Self
    where
        P: Into<OsString>,
        I: IntoIterator<Item = A>,
        A: Into<OsString>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// `zip -r - .`: recursive zip of the working directory written to stdout.
    #[must_use]
    pub fn zip() -> Self {
        Self::new("zip", ["-r", "-", "."])
    }

    /// Program to execute.
    #[must_use]
    pub fn program(&self) -> &OsStr {
        &self.program
    }

    /// Arguments passed to the program.
    #[must_use]
    pub fn args(&self) -> &[OsString] {
        &self.args
    }

    fn program_label(&self) -> String {
        self.program.to_string_lossy().into_owned()
    }
}

impl Default for ArchiverCommand {
    fn default() -> Self {
        Self::zip()
    }
}

/// Spawns archivers scoped to resolved directories.
#[derive(Debug, Clone)]
pub struct ProcessSupervisor {
    command: ArchiverCommand,
    terminate_grace: Duration,
}

impl ProcessSupervisor {
    /// Create a supervisor for the given command.
    #[must_use]
    pub const fn new(command: ArchiverCommand, terminate_grace: Duration) -> Self {
        Self {
            command,
            terminate_grace,
        }
    }

    /// Command this supervisor launches.
    #[must_use]
    pub const fn command(&self) -> &ArchiverCommand {
        &self.command
    }

    /// Launch the archiver with its working directory set to the request's directory.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::SpawnFailure`] when the program cannot be started.
    pub fn spawn(&self, request: &ArchiveRequest) -> ArchiveResult<ArchiveProcess> {
        let program = self.command.program_label();
        let mut child = Command::new(&self.command.program)
            .args(&self.command.args)
            .current_dir(request.resolved_path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ArchiveError::SpawnFailure {
                program: program.clone(),
                source,
            })?;

        let pid = child.id();
        let Some(stdout) = child.stdout.take() else {
            return Err(ArchiveError::SpawnFailure {
                program,
                source: std::io::Error::other("archiver stdout was not captured"),
            });
        };
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(drain_stderr(pid, stderr));
        }

        info!(
            pid,
            program = %program,
            identifier = request.identifier(),
            "archiver started"
        );

        Ok(ArchiveProcess {
            child: Some(child),
            stdout,
            pid,
            terminate_grace: self.terminate_grace,
        })
    }
}

/// How an archiver ended once it was released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Termination {
    /// Exit status collected when reaping.
    pub status: ExitStatus,
    /// `true` when SIGKILL was needed.
    pub forced: bool,
}

/// Handle to one running archiver, owned by a single request.
#[derive(Debug)]
pub struct ArchiveProcess {
    child: Option<Child>,
    stdout: ChildStdout,
    pid: Option<u32>,
    terminate_grace: Duration,
}

impl ArchiveProcess {
    /// OS process identifier, if the process was still running at spawn time.
    #[must_use]
    pub const fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// The archive byte stream.
    pub fn stdout(&mut self) -> &mut ChildStdout {
        &mut self.stdout
    }

    /// `true` once the process has been reaped through `finish` or `terminate`.
    #[must_use]
    pub const fn is_released(&self) -> bool {
        self.child.is_none()
    }

    /// Release after end-of-stream: give the archiver the grace period to exit on its own,
    /// then fall back to [`Self::terminate`].
    ///
    /// # Errors
    ///
    /// Returns an error if waiting on or signalling the process fails.
    pub async fn finish(&mut self) -> ArchiveResult<Option<Termination>> {
        let Some(child) = self.child.as_mut() else {
            return Ok(None);
        };
        let waited = timeout(self.terminate_grace, child.wait()).await;
        match waited {
            Ok(Ok(status)) => {
                self.child = None;
                debug!(pid = self.pid, status = %status, "archiver exited");
                Ok(Some(Termination {
                    status,
                    forced: false,
                }))
            }
            Ok(Err(err)) => {
                warn!(pid = self.pid, error = %err, "waiting on archiver failed");
                self.terminate().await
            }
            Err(_) => self.terminate().await,
        }
    }

    /// Stop the archiver if it is still running and reap it.
    ///
    /// Idempotent: the first call returns the termination, later calls return `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be signalled or waited on. The handle is
    /// released either way; a child that could not be reaped is killed on drop.
    pub async fn terminate(&mut self) -> ArchiveResult<Option<Termination>> {
        let Some(mut child) = self.child.take() else {
            return Ok(None);
        };
        let termination = terminate_child(&mut child, self.terminate_grace).await?;
        info!(
            pid = self.pid,
            status = %termination.status,
            forced = termination.forced,
            "archiver terminated"
        );
        Ok(Some(termination))
    }
}

impl Drop for ArchiveProcess {
    fn drop(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };
        let pid = self.pid;
        let grace = self.terminate_grace;
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                match terminate_child(&mut child, grace).await {
                    Ok(termination) => debug!(
                        pid,
                        status = %termination.status,
                        forced = termination.forced,
                        "archiver released on drop"
                    ),
                    Err(err) => warn!(pid, error = %err, "failed to release archiver on drop"),
                }
            });
        } else if let Err(err) = child.start_kill() {
            warn!(pid, error = %err, "failed to kill archiver outside runtime");
        }
    }
}

async fn terminate_child(child: &mut Child, grace: Duration) -> ArchiveResult<Termination> {
    if let Some(status) = child
        .try_wait()
        .map_err(|source| ArchiveError::stream_io("archiver.try_wait", source))?
    {
        return Ok(Termination {
            status,
            forced: false,
        });
    }

    if let Some(pid) = child.id() {
        request_stop(pid)?;
        if let Ok(waited) = timeout(grace, child.wait()).await {
            let status =
                waited.map_err(|source| ArchiveError::stream_io("archiver.wait", source))?;
            return Ok(Termination {
                status,
                forced: false,
            });
        }
        warn!(pid, grace_ms = grace.as_millis(), "archiver ignored SIGTERM; killing");
    }

    child
        .kill()
        .await
        .map_err(|source| ArchiveError::stream_io("archiver.kill", source))?;
    let status = child
        .wait()
        .await
        .map_err(|source| ArchiveError::stream_io("archiver.wait", source))?;
    Ok(Termination {
        status,
        forced: true,
    })
}

#[cfg(unix)]
fn request_stop(pid: u32) -> ArchiveResult<()> {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    let raw = i32::try_from(pid).map_err(|_| ArchiveError::Signal {
        pid,
        source: Errno::EINVAL,
    })?;
    match kill(Pid::from_raw(raw), Signal::SIGTERM) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(source) => Err(ArchiveError::Signal { pid, source }),
    }
}

#[cfg(not(unix))]
fn request_stop(_pid: u32) -> ArchiveResult<()> {
    Ok(())
}

async fn drain_stderr(pid: Option<u32>, stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => debug!(pid, line = %line, "archiver stderr"),
            Ok(None) => break,
            Err(err) => {
                debug!(pid, error = %err, "archiver stderr unreadable");
                break;
            }
        }
    }
}
