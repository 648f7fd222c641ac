// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Observability configuration types

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Console output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Compact,
}

/// Logging setup for one process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Default level for crates without a debug flag
    pub level: String,

    pub format: LogFormat,

    /// Base directory for JSON run logs; `None` logs to the console only
    pub log_dir: Option<PathBuf>,

    /// Keep this many most recent run folders under `log_dir`
    pub retention_runs: usize,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        ObservabilityConfig {
            level: "info".to_string(),
            format: LogFormat::Text,
            log_dir: None,
            retention_runs: 10,
        }
    }
}

impl ObservabilityConfig {
    /// Console-only configuration at `level`
    pub fn with_level(level: impl Into<String>) -> Self {
        ObservabilityConfig {
            level: level.into(),
            ..Default::default()
        }
    }

    /// Enable run logs under `dir`. An empty path keeps console-only output.
    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        self.log_dir = if dir.as_os_str().is_empty() {
            None
        } else {
            Some(dir)
        };
        self
    }
}
