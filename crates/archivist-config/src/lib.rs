#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Environment-driven configuration for the archive service.
//!
//! Layout: `model.rs` (typed configuration), `loader.rs` (environment parsing and
//! validation), `defaults.rs` (variable names and default values), `error.rs`.

mod defaults;
pub mod error;
pub mod loader;
pub mod model;

pub use defaults::env_vars;
pub use error::{ConfigError, ConfigResult};
pub use model::{ArchiverLine, ServiceConfig};
