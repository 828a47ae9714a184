//! Shared client utilities and error types for the CLI.

use std::fmt::{self, Display, Formatter};
use std::time::Duration;

use anyhow::anyhow;
use reqwest::{Client, Response};

use crate::cli::Cli;

/// CLI-level error type to distinguish validation from operational failures.
#[derive(Debug)]
pub(crate) enum CliError {
    Validation(String),
    Failure(anyhow::Error),
}

/// Convenience alias for functions returning a `CliError`.
pub(crate) type CliResult<T> = Result<T, CliError>;

impl CliError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn failure(error: impl Into<anyhow::Error>) -> Self {
        Self::Failure(error.into())
    }

    pub(crate) const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 2,
            Self::Failure(_) => 3,
        }
    }

    pub(crate) fn display_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::Failure(error) => format!("{error:#}"),
        }
    }
}

impl Display for CliError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str("cli error")
    }
}

impl std::error::Error for CliError {}

/// HTTP client shared by the command handlers.
#[derive(Clone)]
pub(crate) struct AppContext {
    pub(crate) client: Client,
}

impl AppContext {
    /// Build a client. Only connecting is bounded; archive bodies may stream for a long time.
    pub(crate) fn from_cli(cli: &Cli) -> CliResult<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(cli.connect_timeout))
            .build()
            .map_err(|err| CliError::failure(anyhow!("failed to build HTTP client: {err}")))?;
        Ok(Self { client })
    }
}

/// Turn a non-success response into a failure carrying the server's text body.
pub(crate) async fn status_failure(response: Response) -> CliError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let body = body.trim();
    if body.is_empty() {
        CliError::failure(anyhow!("server responded with {status}"))
    } else {
        CliError::failure(anyhow!("server responded with {status}: {body}"))
    }
}
