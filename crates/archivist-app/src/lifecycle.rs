//! Stop-request handling and the drain/abort shutdown sequence.
//!
//! # Design
//! - Every stop request passes the confirmation gate; a declined request leaves the
//!   server untouched and waits for the next one.
//! - Shutdown drains first: the listener stops accepting and in-flight downloads may
//!   finish within the grace period.
//! - When the grace period lapses, or a second stop request arrives while draining,
//!   streams are aborted and their archivers terminated.
//! - Waiting for finalization is bounded so a wedged archiver cannot hold the process.

use std::time::Duration;

use archivist_archive::{ActiveStreams, ShutdownController};
use tokio::time::timeout;
use tracing::{info, warn};

use crate::gate::ConfirmationGate;
use crate::signals::{SignalSource, StopSignal};

/// Time allowed for aborted streams to finalize beyond the archiver terminate grace.
pub const FINALIZE_SLACK: Duration = Duration::from_secs(5);

/// How the drain phase ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Every stream finished on its own.
    Idle,
    /// Streams were still running when the grace period lapsed.
    GraceElapsed,
    /// Another stop request arrived while draining.
    Escalated,
}

/// Wait until a stop request passes the gate.
///
/// Returns `None` when the signal source is exhausted, which is treated as a stop.
pub async fn wait_for_stop(
    signals: &mut dyn SignalSource,
    gate: &mut ConfirmationGate,
    streams: &ActiveStreams,
) -> Option<StopSignal> {
    loop {
        let signal = signals.next().await?;
        if gate.permits(signal, streams.count()).await {
            return Some(signal);
        }
    }
}

/// Drain in-flight streams, then abort whatever is left.
pub async fn shut_down(
    controller: &ShutdownController,
    streams: &ActiveStreams,
    signals: &mut dyn SignalSource,
    grace: Duration,
    finalize: Duration,
) -> DrainOutcome {
    controller.begin_drain();
    info!(
        active_streams = streams.count(),
        grace_ms = u64::try_from(grace.as_millis()).unwrap_or(u64::MAX),
        "draining in-flight downloads"
    );

    let outcome = tokio::select! {
        finished = timeout(grace, streams.wait_idle()) => {
            if finished.is_ok() { DrainOutcome::Idle } else { DrainOutcome::GraceElapsed }
        }
        Some(signal) = signals.next() => {
            info!(%signal, "second stop request; aborting downloads now");
            DrainOutcome::Escalated
        }
    };
    if outcome == DrainOutcome::Idle {
        info!("all downloads finished");
        return outcome;
    }

    warn!(
        active_streams = streams.count(),
        "interrupting active downloads"
    );
    controller.abort_streams();
    if timeout(finalize, streams.wait_idle()).await.is_err() {
        warn!(
            active_streams = streams.count(),
            "downloads still finalizing after abort"
        );
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use archivist_archive::ShutdownPhase;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn idle_server_drains_immediately() {
        let controller = ShutdownController::new();
        let streams = ActiveStreams::new();
        let (_sender, mut signals) = mpsc::unbounded_channel::<StopSignal>();

        let outcome = shut_down(
            &controller,
            &streams,
            &mut signals,
            Duration::from_secs(10),
            Duration::from_secs(1),
        )
        .await;

        assert_eq!(outcome, DrainOutcome::Idle);
        assert_eq!(controller.phase(), ShutdownPhase::Draining);
    }

    #[tokio::test]
    async fn lapsed_grace_aborts_streams() {
        let controller = ShutdownController::new();
        let streams = ActiveStreams::new();
        let lease = streams.acquire();
        let mut watch = controller.watch();
        let releaser = tokio::spawn(async move {
            watch.aborted().await;
            drop(lease);
        });
        let (_sender, mut signals) = mpsc::unbounded_channel::<StopSignal>();

        let outcome = shut_down(
            &controller,
            &streams,
            &mut signals,
            Duration::from_millis(50),
            Duration::from_secs(1),
        )
        .await;

        assert_eq!(outcome, DrainOutcome::GraceElapsed);
        assert_eq!(controller.phase(), ShutdownPhase::Aborting);
        assert!(releaser.await.is_ok());
        assert_eq!(streams.count(), 0);
    }

    #[tokio::test]
    async fn second_signal_escalates() {
        let controller = ShutdownController::new();
        let streams = ActiveStreams::new();
        let _lease = streams.acquire();
        let (sender, mut signals) = mpsc::unbounded_channel();
        assert!(sender.send(StopSignal::Interrupt).is_ok());

        let outcome = shut_down(
            &controller,
            &streams,
            &mut signals,
            Duration::from_secs(30),
            Duration::from_millis(20),
        )
        .await;

        assert_eq!(outcome, DrainOutcome::Escalated);
        assert_eq!(controller.phase(), ShutdownPhase::Aborting);
    }

    #[tokio::test]
    async fn exhausted_source_counts_as_stop() {
        let (sender, mut signals) = mpsc::unbounded_channel::<StopSignal>();
        drop(sender);
        let mut gate = ConfirmationGate::disabled();
        let streams = ActiveStreams::new();
        assert_eq!(wait_for_stop(&mut signals, &mut gate, &streams).await, None);
    }
}
