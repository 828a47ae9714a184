#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    unreachable_pub,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Archivist server bootstrap wiring.
//!
//! Layout: `bootstrap.rs` (service wiring), `lifecycle.rs` (drain and abort),
//! `gate.rs` (interrupt confirmation), `signals.rs` (stop requests), `cli.rs` (flags).

/// Application bootstrap and dependency wiring.
pub mod bootstrap;
/// Command-line flags.
pub mod cli;
/// Application error type.
pub mod error;
/// Interrupt confirmation gate and operator console.
pub mod gate;
/// Stop-request handling and the shutdown sequence.
pub mod lifecycle;
/// Termination signal sources.
pub mod signals;

pub use bootstrap::{AppDependencies, run_app, run_app_with};
pub use cli::AppArgs;
pub use error::{AppError, AppResult};
pub use gate::{ConfirmationGate, OperatorConsole, StdinConsole};
pub use signals::{SignalSource, StopSignal, UnixSignals};
