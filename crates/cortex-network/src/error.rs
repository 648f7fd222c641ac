// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Error types for network assembly

use cortex_config::ConfigError;
use cortex_connectivity::ConnectivityError;

/// Result type for network assembly
pub type NetworkResult<T> = Result<T, NetworkError>;

#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    #[error("Connectivity error: {0}")]
    Connectivity(#[from] ConnectivityError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Unknown population, missing reuse handle, duplicate names
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl NetworkError {
    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        NetworkError::Configuration(message.into())
    }
}
