//! Environment parsing and validation for [`ServiceConfig`].
//!
//! # Design
//! - Reads go through an injectable lookup so tests never touch the real environment.
//! - Unset or blank variables fall back to defaults; malformed values are errors, never
//!   silently replaced.
//! - `validate` runs after parsing so hand-built configs get the same checks.

use std::net::IpAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use archivist_telemetry::LogFormat;

use crate::defaults::{self, env_vars};
use crate::error::{ConfigError, ConfigResult};
use crate::model::{ArchiverLine, ServiceConfig};

impl ServiceConfig {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a variable is malformed or validation fails.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to its value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a variable is malformed or validation fails.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let config = Self {
            photos_dir: PathBuf::from(
                read(env_vars::PHOTOS_DIR).unwrap_or_else(|| defaults::PHOTOS_DIR.to_string()),
            ),
            bind_addr: parse_or(
                env_vars::BIND_ADDR,
                read(env_vars::BIND_ADDR),
                defaults::BIND_ADDR.parse::<IpAddr>().ok(),
                "must be an IP address",
            )?,
            http_port: parse_or(
                env_vars::HTTP_PORT,
                read(env_vars::HTTP_PORT),
                Some(defaults::HTTP_PORT),
                "must be an integer between 1 and 65535",
            )?,
            chunk_size: parse_or(
                env_vars::CHUNK_SIZE,
                read(env_vars::CHUNK_SIZE),
                Some(defaults::CHUNK_SIZE),
                "must be a positive integer",
            )?,
            delay_interval: parse_millis(
                env_vars::DELAY_INTERVAL_MS,
                read(env_vars::DELAY_INTERVAL_MS),
                defaults::DELAY_INTERVAL,
            )?,
            delay_enabled: false,
            archive_name: read(env_vars::ARCHIVE_NAME)
                .unwrap_or_else(|| defaults::ARCHIVE_NAME.to_string()),
            archiver: read(env_vars::ARCHIVER)
                .as_deref()
                .unwrap_or(defaults::ARCHIVER)
                .parse::<ArchiverLine>()?,
            terminate_grace: parse_millis(
                env_vars::TERMINATE_GRACE_MS,
                read(env_vars::TERMINATE_GRACE_MS),
                defaults::TERMINATE_GRACE,
            )?,
            shutdown_grace: parse_or(
                env_vars::SHUTDOWN_GRACE_SECS,
                read(env_vars::SHUTDOWN_GRACE_SECS),
                Some(defaults::SHUTDOWN_GRACE.as_secs()),
                "must be a whole number of seconds",
            )
            .map(Duration::from_secs)?,
            index_path: PathBuf::from(
                read(env_vars::INDEX_PATH).unwrap_or_else(|| defaults::INDEX_PATH.to_string()),
            ),
            log_format: read(env_vars::LOG_FORMAT)
                .map(|value| {
                    value.parse::<LogFormat>().map_err(|()| {
                        ConfigError::invalid(env_vars::LOG_FORMAT, "must be json or pretty", &value)
                    })
                })
                .transpose()?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidField`] for the first violated constraint and
    /// [`ConfigError::EmptyArchiver`] when no archiver program is set.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.http_port == 0 {
            return Err(ConfigError::invalid(
                env_vars::HTTP_PORT,
                "must be an integer between 1 and 65535",
                "0",
            ));
        }
        if self.chunk_size == 0 {
            return Err(ConfigError::invalid(
                env_vars::CHUNK_SIZE,
                "must be a positive integer",
                "0",
            ));
        }
        if self.archiver.program.trim().is_empty() {
            return Err(ConfigError::EmptyArchiver);
        }
        validate_archive_name(&self.archive_name)?;
        if self.terminate_grace.is_zero() {
            return Err(ConfigError::invalid(
                env_vars::TERMINATE_GRACE_MS,
                "must be greater than zero",
                "0",
            ));
        }
        Ok(())
    }
}

fn validate_archive_name(name: &str) -> ConfigResult<()> {
    if name.is_empty() {
        return Err(ConfigError::invalid(
            env_vars::ARCHIVE_NAME,
            "must not be empty",
            name,
        ));
    }
    let unsafe_char = |c: char| c.is_control() || matches!(c, '"' | ';' | '/' | '\\');
    if !name.is_ascii() || name.chars().any(unsafe_char) {
        return Err(ConfigError::invalid(
            env_vars::ARCHIVE_NAME,
            "must be a plain ascii file name",
            name,
        ));
    }
    Ok(())
}

fn parse_or<T: FromStr>(
    field: &'static str,
    raw: Option<String>,
    default: Option<T>,
    reason: &'static str,
) -> ConfigResult<T> {
    match raw {
        Some(value) => value
            .parse::<T>()
            .map_err(|_| ConfigError::invalid(field, reason, &value)),
        None => default.ok_or(ConfigError::InvalidField {
            field,
            reason: "no default available",
            value: None,
        }),
    }
}

fn parse_millis(
    field: &'static str,
    raw: Option<String>,
    default: Duration,
) -> ConfigResult<Duration> {
    match raw {
        Some(value) => value
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|_| ConfigError::invalid(field, "must be a whole number of milliseconds", &value)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::net::Ipv4Addr;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_apply_when_environment_is_empty() -> ConfigResult<()> {
        let config = ServiceConfig::from_lookup(|_| None)?;
        assert_eq!(config.photos_dir, PathBuf::from("test_photos/"));
        assert_eq!(config.bind_addr, IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        assert_eq!(config.http_port, 8080);
        assert_eq!(config.chunk_size, 512_000);
        assert_eq!(config.delay_interval, Duration::from_secs(1));
        assert!(!config.delay_enabled);
        assert_eq!(config.archive_name, "archive.zip");
        assert_eq!(config.archiver.to_string(), "zip -r - .");
        assert_eq!(config.terminate_grace, Duration::from_secs(2));
        assert_eq!(config.shutdown_grace, Duration::from_secs(10));
        assert_eq!(config.index_path, PathBuf::from("index.html"));
        assert_eq!(config.log_format, None);
        assert_eq!(config.socket_addr().port(), 8080);
        Ok(())
    }

    #[test]
    fn overrides_are_parsed() -> ConfigResult<()> {
        let config = ServiceConfig::from_lookup(lookup_from(&[
            ("PHOTOS_DIR", "/srv/photos"),
            ("ARCHIVIST_BIND_ADDR", "127.0.0.1"),
            ("ARCHIVIST_HTTP_PORT", "9000"),
            ("ARCHIVIST_CHUNK_SIZE", "4096"),
            ("ARCHIVIST_DELAY_INTERVAL_MS", "250"),
            ("ARCHIVIST_ARCHIVE_NAME", "photos.zip"),
            ("ARCHIVIST_ARCHIVER", "zip -r -9 - ."),
            ("ARCHIVIST_TERMINATE_GRACE_MS", "100"),
            ("ARCHIVIST_SHUTDOWN_GRACE_SECS", "3"),
            ("ARCHIVIST_LOG_FORMAT", "json"),
        ]))?;
        assert_eq!(config.photos_dir, PathBuf::from("/srv/photos"));
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:9000");
        assert_eq!(config.chunk_size, 4096);
        assert_eq!(config.delay_interval, Duration::from_millis(250));
        assert_eq!(config.archive_name, "photos.zip");
        assert_eq!(config.archiver.args, vec!["-r", "-9", "-", "."]);
        assert_eq!(config.terminate_grace, Duration::from_millis(100));
        assert_eq!(config.shutdown_grace, Duration::from_secs(3));
        assert_eq!(config.log_format, Some(LogFormat::Json));
        Ok(())
    }

    #[test]
    fn blank_values_fall_back_to_defaults() -> ConfigResult<()> {
        let config = ServiceConfig::from_lookup(lookup_from(&[
            ("ARCHIVIST_HTTP_PORT", "   "),
            ("ARCHIVIST_ARCHIVER", ""),
        ]))?;
        assert_eq!(config.http_port, 8080);
        assert_eq!(config.archiver.program, "zip");
        Ok(())
    }

    #[test]
    fn malformed_values_report_the_field() {
        let cases = [
            ("ARCHIVIST_HTTP_PORT", "eighty"),
            ("ARCHIVIST_HTTP_PORT", "70000"),
            ("ARCHIVIST_HTTP_PORT", "0"),
            ("ARCHIVIST_CHUNK_SIZE", "0"),
            ("ARCHIVIST_CHUNK_SIZE", "-1"),
            ("ARCHIVIST_BIND_ADDR", "localhost"),
            ("ARCHIVIST_DELAY_INTERVAL_MS", "1.5"),
            ("ARCHIVIST_TERMINATE_GRACE_MS", "0"),
            ("ARCHIVIST_ARCHIVE_NAME", "a\"b.zip"),
            ("ARCHIVIST_LOG_FORMAT", "xml"),
        ];
        for (name, value) in cases {
            let result = ServiceConfig::from_lookup(lookup_from(&[(name, value)]));
            assert!(
                matches!(result, Err(ConfigError::InvalidField { field, .. }) if field == name),
                "{name}={value} should be rejected"
            );
        }
    }

    #[test]
    fn delay_mode_is_layered_on_top() -> ConfigResult<()> {
        let config = ServiceConfig::from_lookup(|_| None)?;
        assert_eq!(config.relay_delay(), None);

        let delayed = config.with_delay(true);
        assert_eq!(delayed.relay_delay(), Some(Duration::from_secs(1)));

        let mut zero = delayed;
        zero.delay_interval = Duration::ZERO;
        assert_eq!(zero.relay_delay(), None);
        Ok(())
    }

    #[test]
    fn validate_rejects_hand_built_empty_archiver() -> ConfigResult<()> {
        let mut config = ServiceConfig::from_lookup(|_| None)?;
        config.archiver.program = String::new();
        assert_eq!(config.validate(), Err(ConfigError::EmptyArchiver));
        Ok(())
    }
}
