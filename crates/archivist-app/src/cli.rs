//! Command-line flags for the archive server.

use clap::Parser;
use clap::builder::PossibleValuesParser;

/// Streams zip archives of photo directories over HTTP.
#[derive(Debug, Clone, Parser)]
#[command(name = "archivist", version, about)]
pub struct AppArgs {
    /// Log level used when `RUST_LOG` is unset.
    #[arg(
        short = 'l',
        long,
        default_value = "info",
        value_parser = PossibleValuesParser::new(["debug", "info", "warning", "error"])
    )]
    pub level: String,
    /// Pause between relayed chunks (`ARCHIVIST_DELAY_INTERVAL_MS`, 1s by default).
    #[arg(short = 'd', long)]
    pub delay: bool,
    /// Ask on the console before a signal interrupts active downloads.
    #[arg(long)]
    pub confirm_shutdown: bool,
}

impl AppArgs {
    /// Mode label recorded on the process-wide span.
    #[must_use]
    pub const fn mode(&self) -> &'static str {
        if self.delay { "delay" } else { "normal" }
    }
}
