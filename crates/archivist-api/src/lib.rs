#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! HTTP surface for the archive service.
//!
//! Layout: `http/router.rs` (router and server host), `http/archive.rs` (archive request
//! orchestration), `http/index.rs`, `http/health.rs`, `http/telemetry.rs` (metrics layer),
//! `http/errors.rs` (plain-text error responses), `state.rs`, `error.rs`.

pub mod error;
mod http;
mod state;

pub use error::{ApiServerError, ApiServerResult};
pub use http::router::ApiServer;
