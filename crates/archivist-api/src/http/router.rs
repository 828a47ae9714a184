//! Router construction and server host for the archive service.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use archivist_archive::{ActiveStreams, ShutdownController};
use archivist_config::ServiceConfig;
use archivist_telemetry::{Metrics, build_sha};
use axum::{Router, http::Request, middleware::from_fn_with_state, routing::get};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{Span, info};

use crate::error::{ApiServerError, ApiServerResult};
use crate::http::archive::download_archive;
use crate::http::constants::{
    HEADER_REQUEST_ID, ROUTE_ARCHIVE, ROUTE_ARCHIVE_BARE, ROUTE_HEALTH, ROUTE_INDEX,
    ROUTE_METRICS,
};
use crate::http::health::{health, metrics};
use crate::http::index::index;
use crate::http::telemetry::count_requests;
use crate::state::ApiState;

/// Axum router wrapper that hosts the archive endpoints.
pub struct ApiServer {
    router: Router,
    shutdown: ShutdownController,
}

impl ApiServer {
    /// Build the router with shared dependencies wired through application state.
    #[must_use]
    pub fn new(
        config: &ServiceConfig,
        telemetry: Metrics,
        shutdown: ShutdownController,
        streams: ActiveStreams,
    ) -> Self {
        let state = Arc::new(ApiState::new(
            config,
            telemetry.clone(),
            shutdown.clone(),
            streams,
        ));
        let trace_layer = TraceLayer::new_for_http()
            .make_span_with(|request: &Request<_>| {
                let request_id = request
                    .headers()
                    .get(HEADER_REQUEST_ID)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("")
                    .to_string();
                tracing::info_span!(
                    "http.request",
                    method = %request.method(),
                    route = %request.uri().path(),
                    request_id = %request_id,
                    build_sha = %build_sha(),
                    status_code = tracing::field::Empty,
                    latency_ms = tracing::field::Empty
                )
            })
            .on_request(|_request: &Request<_>, _span: &Span| {})
            .on_response(
                |response: &axum::response::Response, latency: Duration, span: &Span| {
                    span.record("status_code", response.status().as_u16());
                    let latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
                    span.record("latency_ms", latency_ms);
                },
            );
        let layered = ServiceBuilder::new()
            .layer(archivist_telemetry::set_request_id_layer())
            .layer(archivist_telemetry::propagate_request_id_layer())
            .layer(trace_layer)
            .layer(from_fn_with_state(telemetry, count_requests));

        let router = Self::build_router().route_layer(layered).with_state(state);
        Self { router, shutdown }
    }

    fn build_router() -> Router<Arc<ApiState>> {
        Router::new()
            .route(ROUTE_INDEX, get(index))
            .route(ROUTE_ARCHIVE, get(download_archive))
            .route(ROUTE_ARCHIVE_BARE, get(download_archive))
            .route(ROUTE_HEALTH, get(health))
            .route(ROUTE_METRICS, get(metrics))
    }

    /// Bind a listener for [`Self::serve`].
    ///
    /// # Errors
    ///
    /// Returns [`ApiServerError::Bind`] if the address cannot be bound.
    pub async fn bind(addr: SocketAddr) -> ApiServerResult<TcpListener> {
        TcpListener::bind(addr)
            .await
            .map_err(|source| ApiServerError::Bind { addr, source })
    }

    /// Serve until the shutdown controller leaves the running phase and every open
    /// connection has finished.
    ///
    /// # Errors
    ///
    /// Returns [`ApiServerError::Serve`] if the server terminates unexpectedly.
    pub async fn serve(self, listener: TcpListener) -> ApiServerResult<()> {
        if let Ok(addr) = listener.local_addr() {
            info!(addr = %addr, "archive server listening");
        }
        let mut draining = self.shutdown.watch();
        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(async move { draining.draining().await })
            .await
            .map_err(|source| ApiServerError::Serve { source })?;
        info!("archive server stopped accepting connections");
        Ok(())
    }

    /// The configured router, for in-process testing.
    #[must_use]
    pub fn into_router(self) -> Router {
        self.router
    }
}
