//! Interrupt confirmation gate.
//!
//! # Design
//! - The gate only asks when it is enabled and downloads are in flight; otherwise a
//!   stop request proceeds immediately.
//! - Console access sits behind [`OperatorConsole`] so the decision logic is testable
//!   without a terminal.
//! - A console that cannot answer (closed stdin, read error) never blocks shutdown.

use std::io;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin, Stderr};
use tracing::{info, warn};

use crate::signals::StopSignal;

/// Question shown to the operator before active downloads are interrupted.
pub const CONFIRM_PROMPT: &str =
    "Ctrl-c нажат. Внимание, текущие процессы архивации остановятся. Действительно остановить сервис? y/n ";

/// Interactive yes/no channel to an operator.
#[async_trait]
pub trait OperatorConsole: Send {
    /// Show `question` and wait for one answer line.
    ///
    /// Returns `Ok(None)` when the console has no more input.
    async fn ask(&mut self, question: &str) -> io::Result<Option<String>>;
}

/// Console backed by the process stdin/stderr.
#[derive(Debug)]
pub struct StdinConsole {
    lines: Lines<BufReader<Stdin>>,
    out: Stderr,
}

impl StdinConsole {
    /// Attach to the process console.
    #[must_use]
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
            out: tokio::io::stderr(),
        }
    }
}

impl Default for StdinConsole {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OperatorConsole for StdinConsole {
    async fn ask(&mut self, question: &str) -> io::Result<Option<String>> {
        self.out.write_all(question.as_bytes()).await?;
        self.out.flush().await?;
        self.lines.next_line().await
    }
}

/// Whether `answer` confirms the shutdown.
#[must_use]
pub fn is_confirmation(answer: &str) -> bool {
    answer.trim().eq_ignore_ascii_case("y")
}

/// Decides whether a stop request may interrupt active downloads.
pub struct ConfirmationGate {
    enabled: bool,
    console: Box<dyn OperatorConsole>,
}

impl ConfirmationGate {
    /// Build a gate. A disabled gate lets every stop request through.
    #[must_use]
    pub fn new(enabled: bool, console: Box<dyn OperatorConsole>) -> Self {
        Self { enabled, console }
    }

    /// Gate that never asks.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(false, Box::new(StdinConsole::new()))
    }

    /// Decide whether `signal` should stop the server while `active_streams` downloads run.
    pub async fn permits(&mut self, signal: StopSignal, active_streams: usize) -> bool {
        if !self.enabled || active_streams == 0 {
            return true;
        }
        info!(%signal, active_streams, "asking operator to confirm shutdown");
        match self.console.ask(CONFIRM_PROMPT).await {
            Ok(Some(answer)) if is_confirmation(&answer) => {
                info!("archiving interrupted by operator");
                true
            }
            Ok(Some(_)) => {
                info!("shutdown declined; resuming service");
                false
            }
            Ok(None) => {
                warn!("console closed; proceeding with shutdown");
                true
            }
            Err(err) => {
                warn!(error = %err, "console unavailable; proceeding with shutdown");
                true
            }
        }
    }
}
