//! Variable names and default values for the service configuration.
//!
//! # Design
//! - Keep every variable name in one place so docs, loader and tests agree.
//! - Defaults mirror the behaviour of a bare `zip -r - .` deployment on port 8080.

use std::time::Duration;

/// Environment variable names read by [`crate::ServiceConfig::from_env`].
pub mod env_vars {
    /// Archive root directory.
    pub const PHOTOS_DIR: &str = "PHOTOS_DIR";
    /// Listener IP address.
    pub const BIND_ADDR: &str = "ARCHIVIST_BIND_ADDR";
    /// Listener port.
    pub const HTTP_PORT: &str = "ARCHIVIST_HTTP_PORT";
    /// Relay chunk size in bytes.
    pub const CHUNK_SIZE: &str = "ARCHIVIST_CHUNK_SIZE";
    /// Inter-chunk delay in milliseconds for delay mode.
    pub const DELAY_INTERVAL_MS: &str = "ARCHIVIST_DELAY_INTERVAL_MS";
    /// File name advertised in `Content-Disposition`.
    pub const ARCHIVE_NAME: &str = "ARCHIVIST_ARCHIVE_NAME";
    /// Archiver command line.
    pub const ARCHIVER: &str = "ARCHIVIST_ARCHIVER";
    /// Wait between SIGTERM and SIGKILL, in milliseconds.
    pub const TERMINATE_GRACE_MS: &str = "ARCHIVIST_TERMINATE_GRACE_MS";
    /// Grace period for in-flight streams during shutdown, in seconds.
    pub const SHUTDOWN_GRACE_SECS: &str = "ARCHIVIST_SHUTDOWN_GRACE_SECS";
    /// Static index page.
    pub const INDEX_PATH: &str = "ARCHIVIST_INDEX_PATH";
    /// Log output format.
    pub const LOG_FORMAT: &str = "ARCHIVIST_LOG_FORMAT";
}

pub(crate) const PHOTOS_DIR: &str = "test_photos/";
pub(crate) const BIND_ADDR: &str = "0.0.0.0";
pub(crate) const HTTP_PORT: u16 = 8080;
pub(crate) const CHUNK_SIZE: usize = 512_000;
pub(crate) const DELAY_INTERVAL: Duration = Duration::from_secs(1);
pub(crate) const ARCHIVE_NAME: &str = "archive.zip";
pub(crate) const ARCHIVER: &str = "zip -r - .";
pub(crate) const TERMINATE_GRACE: Duration = Duration::from_secs(2);
pub(crate) const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);
pub(crate) const INDEX_PATH: &str = "index.html";
