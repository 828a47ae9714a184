#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Telemetry primitives shared across the Archivist workspace.
//!
//! Layout: `init.rs` (subscriber installation), `layers.rs` (request-id middleware),
//! `context.rs` (process-wide span), `metrics.rs` (Prometheus registry), `error.rs`.

pub mod context;
pub mod error;
pub mod init;
pub mod layers;
pub mod metrics;

pub use context::GlobalContextGuard;
pub use error::{Result, TelemetryError};
pub use init::{DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, build_sha, init_logging, level_from_flag};
pub use layers::{propagate_request_id_layer, set_request_id_layer};
pub use metrics::Metrics;
