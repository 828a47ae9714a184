//! Typed service configuration.

use std::fmt::{self, Display, Formatter};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use archivist_telemetry::LogFormat;

use crate::error::ConfigError;

/// Archiving command split into program and arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiverLine {
    /// Program to execute.
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<String>,
}

impl FromStr for ArchiverLine {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let mut parts = value.split_whitespace().map(str::to_string);
        let program = parts.next().ok_or(ConfigError::EmptyArchiver)?;
        Ok(Self {
            program,
            args: parts.collect(),
        })
    }
}

impl Display for ArchiverLine {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.program)?;
        for arg in &self.args {
            write!(formatter, " {arg}")?;
        }
        Ok(())
    }
}

/// Fully parsed service configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Root directory archives are resolved under.
    pub photos_dir: PathBuf,
    /// Listener IP address.
    pub bind_addr: IpAddr,
    /// Listener port.
    pub http_port: u16,
    /// Upper bound for a single relayed chunk, in bytes.
    pub chunk_size: usize,
    /// Inter-chunk delay applied when delay mode is on.
    pub delay_interval: Duration,
    /// Whether delay mode is on. Set from the command line, never from the environment.
    pub delay_enabled: bool,
    /// File name advertised in `Content-Disposition`.
    pub archive_name: String,
    /// Archiving command.
    pub archiver: ArchiverLine,
    /// Wait between SIGTERM and SIGKILL.
    pub terminate_grace: Duration,
    /// Grace period for in-flight streams once shutdown starts.
    pub shutdown_grace: Duration,
    /// Static index page served at `/`.
    pub index_path: PathBuf,
    /// Log format override.
    pub log_format: Option<LogFormat>,
}

impl ServiceConfig {
    /// Socket address the HTTP listener binds.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.http_port)
    }

    /// Toggle delay mode.
    #[must_use]
    pub const fn with_delay(mut self, enabled: bool) -> Self {
        self.delay_enabled = enabled;
        self
    }

    /// Delay to apply between chunks, if delay mode is on and the interval is non-zero.
    #[must_use]
    pub const fn relay_delay(&self) -> Option<Duration> {
        if self.delay_enabled && !self.delay_interval.is_zero() {
            Some(self.delay_interval)
        } else {
            None
        }
    }

    /// Log format to use, falling back to the build-dependent default.
    #[must_use]
    pub fn effective_log_format(&self) -> LogFormat {
        self.log_format.unwrap_or_else(LogFormat::infer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archiver_line_splits_on_whitespace() -> Result<(), ConfigError> {
        let line: ArchiverLine = "  zip   -r - . ".parse()?;
        assert_eq!(line.program, "zip");
        assert_eq!(line.args, vec!["-r", "-", "."]);
        assert_eq!(line.to_string(), "zip -r - .");
        Ok(())
    }

    #[test]
    fn blank_archiver_line_is_rejected() {
        assert_eq!("   ".parse::<ArchiverLine>(), Err(ConfigError::EmptyArchiver));
    }
}
