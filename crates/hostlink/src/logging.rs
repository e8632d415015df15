// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Logging initialization.
//!
//! The library itself only emits through the `log` facade; these helpers
//! install an `env_logger` backend for binaries and tests that want output.

use std::fmt;

/// Log level for hostlink logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// A logger was already installed for this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlreadyInitialized;

impl fmt::Display for AlreadyInitialized {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a logger is already installed")
    }
}

impl std::error::Error for AlreadyInitialized {}

/// Initialize logging with console output
///
/// # Arguments
/// * `level` - Minimum log level to display
pub fn init_logging(level: LogLevel) -> Result<(), AlreadyInitialized> {
    let filter: log::LevelFilter = level.into();

    env_logger::Builder::new()
        .filter_level(filter)
        .format_timestamp_millis()
        .try_init()
        .map_err(|_| AlreadyInitialized)
}

/// Initialize logging with environment variable override
///
/// Reads `RUST_LOG` environment variable if set, otherwise uses provided level.
pub fn init_logging_env(default_level: LogLevel) -> Result<(), AlreadyInitialized> {
    let filter: log::LevelFilter = default_level.into();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(filter.to_string()),
    )
    .format_timestamp_millis()
    .try_init()
    .map_err(|_| AlreadyInitialized)
}

/// Initialize logging with custom filter string (e.g. `"hostlink=debug,info"`)
pub fn init_logging_with_filter(filter: &str) -> Result<(), AlreadyInitialized> {
    env_logger::Builder::new()
        .parse_filters(filter)
        .format_timestamp_millis()
        .try_init()
        .map_err(|_| AlreadyInitialized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_conversion() {
        assert_eq!(log::LevelFilter::from(LogLevel::Off), log::LevelFilter::Off);
        assert_eq!(log::LevelFilter::from(LogLevel::Debug), log::LevelFilter::Debug);
        assert_eq!(log::LevelFilter::from(LogLevel::Trace), log::LevelFilter::Trace);
    }

    #[test]
    fn test_second_init_fails() {
        // The first call may lose to a logger installed elsewhere in this
        // binary; the second always finds one.
        let _ = init_logging_with_filter("hostlink=trace");
        assert_eq!(init_logging(LogLevel::Info), Err(AlreadyInitialized));
    }
}
