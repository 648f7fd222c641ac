// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Logging initialization
//!
//! Console output is always on. With the `file-logging` feature and a
//! configured `log_dir`, every run also writes a JSON log:
//! ```text
//! ./logs/
//!   └── run_20250101_120000/
//!       └── cortex-wiring.log
//! ```

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use std::path::{Path, PathBuf};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::cli::CrateDebugFlags;
use crate::config::{LogFormat, ObservabilityConfig};

const RUN_PREFIX: &str = "run_";
const RUN_TIMESTAMP: &str = "%Y%m%d_%H%M%S";

/// Keeps file writers alive; logs are flushed when dropped
pub struct LoggingGuard {
    #[cfg(feature = "file-logging")]
    _file_guard: Option<tracing_appender::non_blocking::WorkerGuard>,
    run_dir: Option<PathBuf>,
}

impl LoggingGuard {
    /// Folder of this run's log file, when file logging is active
    pub fn run_dir(&self) -> Option<&Path> {
        self.run_dir.as_deref()
    }
}

/// Install the global subscriber
///
/// # Errors
/// Fails when the filter directives do not parse, the run folder cannot be
/// created, or a global subscriber is already installed.
pub fn init_logging(
    debug_flags: &CrateDebugFlags,
    config: &ObservabilityConfig,
) -> Result<LoggingGuard> {
    let filter = debug_flags.to_filter_string(&config.level);
    let console_filter = EnvFilter::try_new(&filter)
        .with_context(|| format!("Invalid log filter: {}", filter))?;

    let mut layers = Vec::new();

    let console_layer = match config.format {
        LogFormat::Text => tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_filter(console_filter)
            .boxed(),
        LogFormat::Compact => tracing_subscriber::fmt::layer()
            .compact()
            .with_target(false)
            .with_filter(console_filter)
            .boxed(),
    };
    layers.push(console_layer);

    #[cfg(feature = "file-logging")]
    let mut file_guard = None;
    #[cfg_attr(not(feature = "file-logging"), allow(unused_mut))]
    let mut run_dir = None;

    if let Some(base_log_dir) = &config.log_dir {
        #[cfg(feature = "file-logging")]
        {
            let run_folder = base_log_dir.join(run_folder_name(Utc::now()));
            std::fs::create_dir_all(&run_folder).with_context(|| {
                format!("Failed to create log directory: {}", run_folder.display())
            })?;
            cleanup_old_runs(base_log_dir, config.retention_runs)?;

            let appender = tracing_appender::rolling::never(&run_folder, "cortex-wiring.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let file_filter = EnvFilter::try_new(&filter)
                .with_context(|| format!("Invalid log filter: {}", filter))?;
            let file_layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .json()
                .with_filter(file_filter)
                .boxed();
            layers.push(file_layer);
            file_guard = Some(guard);
            run_dir = Some(run_folder);
        }
        #[cfg(not(feature = "file-logging"))]
        eprintln!(
            "Warning: log_dir {} ignored; built without the file-logging feature",
            base_log_dir.display()
        );
    }

    Registry::default()
        .with(layers)
        .try_init()
        .context("A global tracing subscriber is already installed")?;

    Ok(LoggingGuard {
        #[cfg(feature = "file-logging")]
        _file_guard: file_guard,
        run_dir,
    })
}

/// Console-only logging at the default level
pub fn init_logging_default(debug_flags: &CrateDebugFlags) -> Result<LoggingGuard> {
    init_logging(debug_flags, &ObservabilityConfig::default())
}

/// `run_YYYYMMDD_HHMMSS`
pub fn run_folder_name(now: DateTime<Utc>) -> String {
    format!("{}{}", RUN_PREFIX, now.format(RUN_TIMESTAMP))
}

fn parse_run_folder(name: &str) -> Option<DateTime<Utc>> {
    let stamp = name.strip_prefix(RUN_PREFIX)?;
    NaiveDateTime::parse_from_str(stamp, RUN_TIMESTAMP)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Remove all but the `keep` most recent run folders under `base_log_dir`.
///
/// Entries that are not run folders are left alone. Returns how many were removed.
pub fn cleanup_old_runs(base_log_dir: &Path, keep: usize) -> Result<usize> {
    if !base_log_dir.exists() {
        return Ok(0);
    }

    let mut runs: Vec<(PathBuf, DateTime<Utc>)> = Vec::new();
    for entry in std::fs::read_dir(base_log_dir)? {
        let path = entry?.path();
        if !path.is_dir() {
            continue;
        }
        let stamp = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(parse_run_folder);
        if let Some(stamp) = stamp {
            runs.push((path, stamp));
        }
    }

    // Newest first
    runs.sort_by(|a, b| b.1.cmp(&a.1));

    let mut removed = 0;
    for (path, _) in runs.iter().skip(keep) {
        match std::fs::remove_dir_all(path) {
            Ok(()) => removed += 1,
            Err(e) => eprintln!(
                "Warning: Failed to remove old log directory {}: {}",
                path.display(),
                e
            ),
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    #[test]
    fn test_run_folder_name_round_trip() {
        let now = Utc.with_ymd_and_hms(2025, 3, 4, 5, 6, 7).unwrap();
        let name = run_folder_name(now);
        assert_eq!(name, "run_20250304_050607");
        assert_eq!(parse_run_folder(&name), Some(now));
        assert_eq!(parse_run_folder("notes"), None);
    }

    #[test]
    fn test_cleanup_keeps_most_recent() {
        let dir = tempdir().unwrap();
        for name in [
            "run_20240101_000000",
            "run_20250101_000000",
            "run_20230101_000000",
            "archive",
        ] {
            std::fs::create_dir(dir.path().join(name)).unwrap();
        }

        let removed = cleanup_old_runs(dir.path(), 1).unwrap();

        assert_eq!(removed, 2);
        assert!(dir.path().join("run_20250101_000000").exists());
        assert!(!dir.path().join("run_20240101_000000").exists());
        assert!(!dir.path().join("run_20230101_000000").exists());
        assert!(dir.path().join("archive").exists());
    }

    #[test]
    fn test_cleanup_missing_dir() {
        let dir = tempdir().unwrap();
        assert_eq!(cleanup_old_runs(&dir.path().join("absent"), 3).unwrap(), 0);
    }

    #[test]
    fn test_invalid_level_rejected_before_install() {
        let config = ObservabilityConfig::with_level("cortex-network=verbose");
        assert!(init_logging(&CrateDebugFlags::default(), &config).is_err());
    }

    #[test]
    fn test_second_install_fails() {
        let flags = CrateDebugFlags::from_args(vec!["--debug-cortex-network".to_string()]);
        let guard = init_logging(&flags, &ObservabilityConfig::default());
        assert!(guard.is_ok());
        assert!(guard.unwrap().run_dir().is_none());
        assert!(init_logging_default(&flags).is_err());
    }
}
