//! # Design
//!
//! - One error taxonomy for the archive pipeline: resolution, spawning, streaming and cancellation.
//! - Keep error messages constant; identifiers, programs and operations travel as fields.
//! - Cancellation is an error variant so callers cannot mistake it for a completed stream.

use std::fmt::{self, Display, Formatter};
use std::io;

use thiserror::Error;

/// Result alias for archive pipeline operations.
pub type ArchiveResult<T> = Result<T, ArchiveError>;

/// Why a stream stopped before the archiver reached end-of-stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// The HTTP client went away (or the response body was dropped).
    ClientDisconnected,
    /// The server entered its abort phase while the stream was running.
    ServerShutdown,
}

impl CancelReason {
    /// Stable label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ClientDisconnected => "client_disconnected",
            Self::ServerShutdown => "server_shutdown",
        }
    }
}

impl Display for CancelReason {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Errors produced while resolving, spawning or relaying an archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// The identifier does not name a directory under the archive root.
    #[error("archive not found")]
    NotFound {
        /// Identifier taken from the request path.
        identifier: String,
        /// Machine-readable reason for the rejection.
        reason: &'static str,
    },
    /// The archiving command could not be started.
    #[error("failed to spawn archiver")]
    SpawnFailure {
        /// Program that failed to launch.
        program: String,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Reading from the archiver or waiting on it failed.
    #[error("archive stream io failure")]
    StreamIo {
        /// Operation that triggered the failure.
        operation: &'static str,
        /// Underlying IO error.
        source: io::Error,
    },
    /// The stream was cancelled before end-of-stream.
    #[error("archive stream cancelled")]
    Cancelled {
        /// Reason for the cancellation.
        reason: CancelReason,
    },
    /// Delivering a signal to the archiver failed.
    #[error("failed to signal archiver")]
    Signal {
        /// Process identifier of the archiver.
        pid: u32,
        /// Underlying errno.
        source: nix::Error,
    },
}

impl ArchiveError {
    pub(crate) fn not_found(identifier: impl Into<String>, reason: &'static str) -> Self {
        Self::NotFound {
            identifier: identifier.into(),
            reason,
        }
    }

    pub(crate) const fn stream_io(operation: &'static str, source: io::Error) -> Self {
        Self::StreamIo { operation, source }
    }

    pub(crate) const fn cancelled(reason: CancelReason) -> Self {
        Self::Cancelled { reason }
    }

    /// Returns `true` when the error represents a cancellation rather than a failure.
    #[must_use]
    pub const fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// Outcome label recorded in metrics for a stream that ended with this error.
    #[must_use]
    pub const fn outcome(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::SpawnFailure { .. } => "spawn_failed",
            Self::Cancelled {
                reason: CancelReason::ClientDisconnected,
            } => "cancelled",
            Self::Cancelled {
                reason: CancelReason::ServerShutdown,
            } => "shutdown",
            Self::StreamIo { .. } | Self::Signal { .. } => "failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn archive_error_messages_stay_constant() {
        let not_found = ArchiveError::not_found("7kna", "missing");
        assert_eq!(not_found.to_string(), "archive not found");
        assert!(not_found.source().is_none());

        let spawn = ArchiveError::SpawnFailure {
            program: "zip".to_string(),
            source: io::Error::new(io::ErrorKind::NotFound, "no such file"),
        };
        assert_eq!(spawn.to_string(), "failed to spawn archiver");
        assert!(spawn.source().is_some());

        let stream = ArchiveError::stream_io("archiver.read", io::Error::other("broken"));
        assert_eq!(stream.to_string(), "archive stream io failure");
        assert!(stream.source().is_some());
    }

    #[test]
    fn cancellation_is_distinguished_from_failure() {
        let client = ArchiveError::cancelled(CancelReason::ClientDisconnected);
        assert!(client.is_cancellation());
        assert_eq!(client.outcome(), "cancelled");

        let shutdown = ArchiveError::cancelled(CancelReason::ServerShutdown);
        assert!(shutdown.is_cancellation());
        assert_eq!(shutdown.outcome(), "shutdown");

        let failure = ArchiveError::stream_io("archiver.read", io::Error::other("eof"));
        assert!(!failure.is_cancellation());
        assert_eq!(failure.outcome(), "failed");
    }

    #[test]
    fn cancel_reason_labels() {
        assert_eq!(
            CancelReason::ClientDisconnected.to_string(),
            "client_disconnected"
        );
        assert_eq!(CancelReason::ServerShutdown.as_str(), "server_shutdown");
    }
}
