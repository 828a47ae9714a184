//! Prometheus-backed metrics registry.
//!
//! # Design
//! - Collector registration stays private; callers get intent-named recorders.
//! - The registry is shared behind an `Arc` so clones are cheap for handlers and tasks.

use std::sync::Arc;

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

use crate::error::{Result, TelemetryError};

/// Prometheus-backed metrics registry shared across the service.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    http_requests_total: IntCounterVec,
    archive_streams_total: IntCounterVec,
    archive_bytes_total: IntCounter,
    archive_chunks_total: IntCounter,
    archive_streams_active: IntGauge,
    archive_processes_killed_total: IntCounter,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.debug_struct("Metrics").finish_non_exhaustive()
    }
}

fn collector<T>(name: &'static str, built: prometheus::Result<T>) -> Result<T> {
    built.map_err(|source| TelemetryError::MetricsCollector { name, source })
}

impl Metrics {
    /// Construct a registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any collector cannot be built or registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let http_requests_total = collector(
            "http_requests_total",
            IntCounterVec::new(
                Opts::new("http_requests_total", "Total HTTP requests received"),
                &["route", "code"],
            ),
        )?;
        let archive_streams_total = collector(
            "archive_streams_total",
            IntCounterVec::new(
                Opts::new("archive_streams_total", "Archive requests by terminal outcome"),
                &["outcome"],
            ),
        )?;
        let archive_bytes_total = collector(
            "archive_bytes_total",
            IntCounter::with_opts(Opts::new(
                "archive_bytes_total",
                "Archive bytes forwarded to clients",
            )),
        )?;
        let archive_chunks_total = collector(
            "archive_chunks_total",
            IntCounter::with_opts(Opts::new(
                "archive_chunks_total",
                "Archive chunks forwarded to clients",
            )),
        )?;
        let archive_streams_active = collector(
            "archive_streams_active",
            IntGauge::with_opts(Opts::new(
                "archive_streams_active",
                "Archive streams currently running",
            )),
        )?;
        let archive_processes_killed_total = collector(
            "archive_processes_killed_total",
            IntCounter::with_opts(Opts::new(
                "archive_processes_killed_total",
                "Archivers that needed SIGKILL after ignoring SIGTERM",
            )),
        )?;

        let register = |name: &'static str, collector: Box<dyn prometheus::core::Collector>| {
            registry
                .register(collector)
                .map_err(|source| TelemetryError::MetricsRegister { name, source })
        };
        register("http_requests_total", Box::new(http_requests_total.clone()))?;
        register("archive_streams_total", Box::new(archive_streams_total.clone()))?;
        register("archive_bytes_total", Box::new(archive_bytes_total.clone()))?;
        register("archive_chunks_total", Box::new(archive_chunks_total.clone()))?;
        register("archive_streams_active", Box::new(archive_streams_active.clone()))?;
        register(
            "archive_processes_killed_total",
            Box::new(archive_processes_killed_total.clone()),
        )?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                http_requests_total,
                archive_streams_total,
                archive_bytes_total,
                archive_chunks_total,
                archive_streams_active,
                archive_processes_killed_total,
            }),
        })
    }

    /// Increment the HTTP request counter for the given route and status code.
    pub fn inc_http_request(&self, route: &str, status: u16) {
        let code = status.to_string();
        self.inner
            .http_requests_total
            .with_label_values(&[route, code.as_str()])
            .inc();
    }

    /// Count an archive request that reached a terminal state.
    pub fn record_stream_outcome(&self, outcome: &str) {
        self.inner
            .archive_streams_total
            .with_label_values(&[outcome])
            .inc();
    }

    /// Add relayed chunk and byte totals.
    pub fn record_relayed(&self, chunks: u64, bytes: u64) {
        self.inner.archive_chunks_total.inc_by(chunks);
        self.inner.archive_bytes_total.inc_by(bytes);
    }

    /// Mark a stream as started.
    pub fn stream_opened(&self) {
        self.inner.archive_streams_active.inc();
    }

    /// Mark a stream as finished.
    pub fn stream_closed(&self) {
        self.inner.archive_streams_active.dec();
    }

    /// Current value of the active stream gauge.
    #[must_use]
    pub fn active_streams(&self) -> i64 {
        self.inner.archive_streams_active.get()
    }

    /// Count an archiver that had to be force-killed.
    pub fn inc_process_killed(&self) {
        self.inner.archive_processes_killed_total.inc();
    }

    /// Render all collectors in the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails or produces invalid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder
            .encode(&self.inner.registry.gather(), &mut buffer)
            .map_err(|source| TelemetryError::MetricsEncode { source })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::MetricsUtf8 { source })
    }
}
