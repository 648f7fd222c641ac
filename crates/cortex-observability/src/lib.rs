// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # cortex-observability
//!
//! Logging setup shared by the cortex-wiring crates and tools, with
//! per-crate debug flag support.
//!
//! ## Features
//! - `file-logging`: JSON log file per run, next to the console output

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod cli;
pub mod config;
pub mod init;

pub use cli::*;
pub use config::*;
pub use init::*;

/// Crate names (and tracing targets) that accept debug flags
pub const KNOWN_CRATES: &[&str] = &[
    "cortex-connectivity",
    "cortex-network",
    "cortex-config",
    "cortex-wiring",
];
