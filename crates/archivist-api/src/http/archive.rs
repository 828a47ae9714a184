//! Archive request orchestration: resolve, spawn, stream, finalize.
//!
//! # Design
//! - Everything that can fail with a status code (resolution, header construction,
//!   spawning) happens before the response is returned.
//! - Streaming runs in its own task that owns the archiver; the response body only holds
//!   the receiving end of a one-slot channel.
//! - The task always finalizes the archiver after the relay returns, whatever the outcome.
//! - A non-zero archiver exit after end-of-stream is logged; the body still ends cleanly.
//! - Failures after headers are sent surface as an error item in the body, which makes
//!   hyper drop the connection instead of ending the body cleanly.

use std::io;
use std::sync::Arc;

use archivist_archive::{
    ArchiveError, ArchiveProcess, CancelReason, ChannelWriter, RelaySettings, RelayStats,
    ShutdownPhase, ShutdownWatch, StreamLease, Termination, relay,
};
use archivist_telemetry::Metrics;
use axum::{
    body::Body,
    extract::{Path, State},
    http::{
        HeaderValue, StatusCode,
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::http::constants::CONTENT_TYPE_ARCHIVE;
use crate::http::errors::ApiError;
use crate::state::ApiState;

/// Outcome label for a stream that reached end-of-stream and a clean archiver exit.
const OUTCOME_COMPLETED: &str = "completed";
/// Outcome label for a fully relayed stream whose archiver then exited non-zero.
///
/// The body still ends cleanly: every byte the archiver wrote has been delivered.
const OUTCOME_EXITED_NONZERO: &str = "exited_nonzero";

pub(crate) async fn download_archive(
    State(state): State<Arc<ApiState>>,
    Path(identifier): Path<String>,
) -> Response {
    // Taken before the phase check so a drain that starts now still waits for this request.
    let lease = state.streams.acquire();
    if state.shutdown.phase() != ShutdownPhase::Running {
        return ApiError::service_unavailable("server is shutting down").into_response();
    }

    let request = match state.resolver.resolve(&identifier) {
        Ok(request) => request,
        Err(err) => {
            if let ArchiveError::NotFound { reason, .. } = &err {
                info!(identifier = %identifier, reason, "archive not found");
            }
            state.telemetry.record_stream_outcome(err.outcome());
            return ApiError::archive_not_found().into_response();
        }
    };

    let disposition = match content_disposition(&state.archive_name) {
        Ok(value) => value,
        Err(err) => {
            error!(error = %err, archive_name = %state.archive_name, "invalid archive name");
            return ApiError::internal("invalid archive name").into_response();
        }
    };

    let process = match state.supervisor.spawn(&request) {
        Ok(process) => process,
        Err(err) => {
            error!(error = %err, identifier = %identifier, "failed to start archiver");
            state.telemetry.record_stream_outcome(err.outcome());
            return ApiError::internal("failed to start archiver").into_response();
        }
    };

    let (writer, receiver) = ChannelWriter::channel();
    let span = info_span!(
        "archive.stream",
        identifier = %identifier,
        pid = process.pid().unwrap_or_default()
    );
    let stream = ArchiveStream {
        process,
        writer,
        settings: state.relay,
        shutdown: state.shutdown.watch(),
        telemetry: state.telemetry.clone(),
        lease,
    };
    state.telemetry.stream_opened();
    tokio::spawn(stream.run().instrument(span));

    (
        StatusCode::OK,
        [
            (CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE_ARCHIVE)),
            (CONTENT_DISPOSITION, disposition),
        ],
        Body::from_stream(ReceiverStream::new(receiver)),
    )
        .into_response()
}

fn content_disposition(
    archive_name: &str,
) -> Result<HeaderValue, axum::http::header::InvalidHeaderValue> {
    HeaderValue::from_str(&format!("attachment;filename={archive_name}"))
}

/// One in-flight archive: the archiver, the body channel and its bookkeeping.
struct ArchiveStream {
    process: ArchiveProcess,
    writer: ChannelWriter,
    settings: RelaySettings,
    shutdown: ShutdownWatch,
    telemetry: Metrics,
    lease: StreamLease,
}

impl ArchiveStream {
    async fn run(mut self) {
        info!("archive stream started");
        let relayed = relay(
            self.process.stdout(),
            &mut self.writer,
            &self.settings,
            &mut self.shutdown,
        )
        .await;

        let released = match &relayed {
            Ok(_) => self.process.finish().await,
            Err(_) => self.process.terminate().await,
        };
        let termination = match released {
            Ok(termination) => termination,
            Err(err) => {
                warn!(error = %err, "archiver release reported an error");
                None
            }
        };
        if termination.is_some_and(|t| t.forced) {
            self.telemetry.inc_process_killed();
        }

        let outcome = match relayed {
            Ok(stats) => complete(&self.telemetry, stats, termination),
            Err(err) => fail(&self.writer, err).await,
        };
        self.telemetry.record_stream_outcome(outcome);
        self.telemetry.stream_closed();
        drop(self.lease);
    }
}

fn complete(
    telemetry: &Metrics,
    stats: RelayStats,
    termination: Option<Termination>,
) -> &'static str {
    telemetry.record_relayed(stats.chunks, stats.bytes);
    match termination {
        Some(Termination { status, .. }) if !status.success() => {
            warn!(
                status = %status,
                chunks = stats.chunks,
                bytes = stats.bytes,
                "archiver exited with non-zero status after end of output"
            );
            OUTCOME_EXITED_NONZERO
        }
        _ => {
            info!(
                chunks = stats.chunks,
                bytes = stats.bytes,
                "archive stream complete"
            );
            OUTCOME_COMPLETED
        }
    }
}

async fn fail(writer: &ChannelWriter, err: ArchiveError) -> &'static str {
    match &err {
        ArchiveError::Cancelled {
            reason: CancelReason::ClientDisconnected,
        } => info!("download was interrupted"),
        ArchiveError::Cancelled {
            reason: CancelReason::ServerShutdown,
        } => {
            warn!("download aborted by server shutdown");
            writer.abort(io::Error::other("server shutting down")).await;
        }
        _ => {
            error!(error = %err, "archive stream failed");
            writer.abort(io::Error::other("archive stream failed")).await;
        }
    }
    debug!(outcome = err.outcome(), "archive stream finalized");
    err.outcome()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_disposition_names_the_archive() -> Result<(), Box<dyn std::error::Error>> {
        let value = content_disposition("archive.zip")?;
        assert_eq!(value.to_str()?, "attachment;filename=archive.zip");
        assert!(content_disposition("bad\nname").is_err());
        Ok(())
    }

    #[test]
    fn nonzero_exit_after_full_output_is_not_a_failure() -> Result<(), Box<dyn std::error::Error>> {
        use std::os::unix::process::ExitStatusExt;
        use std::process::ExitStatus;

        let telemetry = Metrics::new()?;
        let stats = RelayStats {
            chunks: 1,
            bytes: 22,
        };
        let exited = |code: i32| {
            Some(Termination {
                status: ExitStatus::from_raw(code << 8),
                forced: false,
            })
        };

        assert_eq!(complete(&telemetry, stats, exited(0)), OUTCOME_COMPLETED);
        assert_eq!(complete(&telemetry, stats, exited(12)), OUTCOME_EXITED_NONZERO);
        assert_eq!(complete(&telemetry, stats, None), OUTCOME_COMPLETED);
        Ok(())
    }
}
