use std::time::Duration;

use archivist_api::ApiServer;
use archivist_archive::{ActiveStreams, ShutdownController};
use archivist_config::ServiceConfig;
use archivist_telemetry::{GlobalContextGuard, LoggingConfig, Metrics, level_from_flag};
use tokio::net::TcpListener;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::cli::AppArgs;
use crate::error::{AppError, AppResult};
use crate::gate::{ConfirmationGate, StdinConsole};
use crate::lifecycle::{FINALIZE_SLACK, shut_down, wait_for_stop};
use crate::signals::{SignalSource, UnixSignals};

/// Upper bound on waiting for the HTTP server task once streams are finalized.
const SERVER_EXIT_BOUND: Duration = Duration::from_secs(5);

/// Dependencies required to run the archive server.
pub struct AppDependencies {
    /// Validated service configuration.
    pub config: ServiceConfig,
    /// Listener the HTTP server accepts on.
    pub listener: TcpListener,
    /// Metrics registry shared with the HTTP layer.
    pub telemetry: Metrics,
    /// Source of stop requests.
    pub signals: Box<dyn SignalSource>,
    /// Gate consulted before a stop request interrupts downloads.
    pub gate: ConfirmationGate,
}

impl AppDependencies {
    /// Bind the configured address and install process signal handlers.
    ///
    /// # Errors
    ///
    /// Returns an error if metrics, the listener or the signal handlers cannot be set up.
    pub async fn production(config: ServiceConfig, confirm_shutdown: bool) -> AppResult<Self> {
        let telemetry =
            Metrics::new().map_err(|err| AppError::telemetry("telemetry.metrics", err))?;
        let listener = ApiServer::bind(config.socket_addr())
            .await
            .map_err(|err| AppError::api_server("api_server.bind", err))?;
        let signals =
            UnixSignals::install().map_err(|err| AppError::io("signals.install", err))?;
        let gate = ConfirmationGate::new(confirm_shutdown, Box::new(StdinConsole::new()));
        Ok(Self {
            config,
            listener,
            telemetry,
            signals: Box::new(signals),
            gate,
        })
    }
}

/// Entry point for the archive server boot sequence.
///
/// # Errors
///
/// Returns an error if configuration, logging, binding or serving fails.
pub async fn run_app(args: AppArgs) -> AppResult<()> {
    let config = ServiceConfig::from_env()
        .map_err(|err| AppError::config("config.from_env", err))?
        .with_delay(args.delay);
    let level = level_from_flag(&args.level).ok_or_else(|| AppError::InvalidFlag {
        flag: "level",
        value: args.level.clone(),
    })?;
    archivist_telemetry::init_logging(&LoggingConfig {
        level,
        format: config.effective_log_format(),
        build_sha: option_env!("ARCHIVIST_BUILD_SHA").unwrap_or("dev"),
    })
    .map_err(|err| AppError::telemetry("telemetry.init", err))?;
    let _context = GlobalContextGuard::new(args.mode());

    info!("archivist bootstrap starting");
    let dependencies = AppDependencies::production(config, args.confirm_shutdown).await?;
    run_app_with(dependencies).await
}

/// Serve until a stop request passes the gate, then drain and abort.
///
/// # Errors
///
/// Returns an error if the HTTP server fails or its task panics.
pub async fn run_app_with(dependencies: AppDependencies) -> AppResult<()> {
    let AppDependencies {
        config,
        listener,
        telemetry,
        mut signals,
        mut gate,
    } = dependencies;

    let addr = listener
        .local_addr()
        .map_err(|err| AppError::io("listener.local_addr", err))?;
    let shutdown = ShutdownController::new();
    let streams = ActiveStreams::new();
    let api = ApiServer::new(&config, telemetry, shutdown.clone(), streams.clone());

    info!(
        addr = %addr,
        photos_dir = %config.photos_dir.display(),
        archiver = %config.archiver,
        chunk_size = config.chunk_size,
        delay_ms = config
            .relay_delay()
            .map(|delay| u64::try_from(delay.as_millis()).unwrap_or(u64::MAX)),
        "archive server starting"
    );
    let mut server = tokio::spawn(api.serve(listener));

    let stop = tokio::select! {
        stop = wait_for_stop(signals.as_mut(), &mut gate, &streams) => stop,
        joined = &mut server => {
            warn!("http server stopped without a shutdown request");
            return joined
                .map_err(|err| AppError::join("api_server.join", err))?
                .map_err(|err| AppError::api_server("api_server.serve", err));
        }
    };
    match stop {
        Some(signal) => info!(%signal, "shutdown requested"),
        None => info!("signal source closed; shutting down"),
    }

    let outcome = shut_down(
        &shutdown,
        &streams,
        signals.as_mut(),
        config.shutdown_grace,
        config.terminate_grace + FINALIZE_SLACK,
    )
    .await;
    info!(outcome = ?outcome, "downloads settled");

    match timeout(SERVER_EXIT_BOUND, &mut server).await {
        Ok(joined) => joined
            .map_err(|err| AppError::join("api_server.join", err))?
            .map_err(|err| AppError::api_server("api_server.serve", err))?,
        Err(_) => {
            warn!("http server did not stop in time; aborting it");
            server.abort();
        }
    }
    info!("archivist stopped");
    Ok(())
}
