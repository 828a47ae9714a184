#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Binary entrypoint for the Archivist archive server.

use archivist_app::{AppArgs, AppResult, run_app};
use clap::Parser;

/// Parses flags, boots the server and blocks until shutdown.
#[tokio::main]
async fn main() -> AppResult<()> {
    run_app(AppArgs::parse()).await
}
