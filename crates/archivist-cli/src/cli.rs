//! Command-line client for interacting with an Archivist server.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use reqwest::Url;

use crate::client::{AppContext, CliResult};
use crate::commands::download::handle_download;
use crate::commands::upload::handle_upload;

const DEFAULT_UPLOAD_URL: &str = "http://0.0.0.0:8080/archive/save/";
const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8080";
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Parses CLI arguments and executes the requested command. Returns the process exit code.
pub async fn run() -> i32 {
    let cli = Cli::parse();
    match execute(cli).await {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("error: {}", err.display_message());
            err.exit_code()
        }
    }
}

async fn execute(cli: Cli) -> CliResult<()> {
    let ctx = AppContext::from_cli(&cli)?;
    match cli.command {
        Command::Upload(args) => {
            let text = handle_upload(&ctx, args).await?;
            println!("{text}");
        }
        Command::Download(args) => {
            let output = args.output.clone();
            let written = handle_download(&ctx, args).await?;
            println!("wrote {written} bytes to {}", output.display());
        }
    }
    Ok(())
}

#[derive(Parser)]
#[command(name = "archivist-cli", version, about = "Archivist companion client")]
pub(crate) struct Cli {
    #[arg(
        long,
        global = true,
        env = "ARCHIVIST_CONNECT_TIMEOUT_SECS",
        default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS
    )]
    pub(crate) connect_timeout: u64,
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Stream a local file to the server as a POST body.
    Upload(UploadArgs),
    /// Stream an archive from the server to a local file.
    Download(DownloadArgs),
}

#[derive(Args)]
pub(crate) struct UploadArgs {
    /// File to send.
    #[arg(long, env = "ARCHIVIST_UPLOAD_FILE")]
    pub(crate) file: PathBuf,
    /// Endpoint receiving the upload.
    #[arg(
        long,
        env = "ARCHIVIST_UPLOAD_URL",
        value_parser = parse_url,
        default_value = DEFAULT_UPLOAD_URL
    )]
    pub(crate) url: Url,
}

#[derive(Args)]
pub(crate) struct DownloadArgs {
    /// Directory identifier under the server's photo root.
    pub(crate) identifier: String,
    /// Destination file for the archive.
    #[arg(long, short)]
    pub(crate) output: PathBuf,
    /// Server base URL.
    #[arg(
        long,
        env = "ARCHIVIST_BASE_URL",
        value_parser = parse_url,
        default_value = DEFAULT_BASE_URL
    )]
    pub(crate) base_url: Url,
}

fn parse_url(input: &str) -> Result<Url, String> {
    input
        .parse::<Url>()
        .map_err(|err| format!("invalid URL '{input}': {err}"))
}
