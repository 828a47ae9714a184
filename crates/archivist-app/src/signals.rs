//! Termination signal sources.

use std::fmt;
use std::io;

use async_trait::async_trait;
use tokio::signal::unix::{Signal, SignalKind, signal};
use tokio::sync::mpsc;

/// Signals that ask the server to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopSignal {
    /// SIGINT, usually Ctrl-C on the console.
    Interrupt,
    /// SIGTERM from a supervisor.
    Terminate,
}

impl fmt::Display for StopSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Interrupt => "SIGINT",
            Self::Terminate => "SIGTERM",
        })
    }
}

/// Source of stop requests.
#[async_trait]
pub trait SignalSource: Send {
    /// Wait for the next stop request. `None` means no further signals will arrive.
    async fn next(&mut self) -> Option<StopSignal>;
}

/// SIGINT and SIGTERM listeners installed on the tokio runtime.
#[derive(Debug)]
pub struct UnixSignals {
    interrupt: Signal,
    terminate: Signal,
}

impl UnixSignals {
    /// Install both handlers. Their default process-killing effect is suppressed from here on.
    ///
    /// # Errors
    ///
    /// Returns an error if a handler cannot be registered.
    pub fn install() -> io::Result<Self> {
        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }
}

#[async_trait]
impl SignalSource for UnixSignals {
    async fn next(&mut self) -> Option<StopSignal> {
        tokio::select! {
            received = self.interrupt.recv() => received.map(|()| StopSignal::Interrupt),
            received = self.terminate.recv() => received.map(|()| StopSignal::Terminate),
        }
    }
}

/// In-process stop requests, for embedding the server and for tests.
#[async_trait]
impl SignalSource for mpsc::UnboundedReceiver<StopSignal> {
    async fn next(&mut self) -> Option<StopSignal> {
        self.recv().await
    }
}
