// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration validation
//!
//! Collects every problem in one pass so a user sees all of them at once.

use crate::{ConfigError, ConfigResult, CortexConfig};

/// Validation errors that can occur during config validation
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValidationError {
    MissingRequired { field: String },
    InvalidValue { field: String, reason: String },
    InvalidRange { low: String, high: String },
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingRequired { field } => {
                write!(f, "Missing required configuration: {}", field)
            }
            Self::InvalidValue { field, reason } => {
                write!(f, "Invalid configuration value for {}: {}", field, reason)
            }
            Self::InvalidRange { low, high } => {
                write!(f, "{} must not exceed {}", low, high)
            }
        }
    }
}

/// Validate the complete configuration
///
/// # Errors
///
/// Returns `ConfigError::ValidationError` listing every failed check
pub fn validate_config(config: &CortexConfig) -> ConfigResult<()> {
    let mut errors = Vec::new();

    validate_network(config, &mut errors);
    validate_calibration_inputs(config, &mut errors);
    validate_gap_junctions(config, &mut errors);
    validate_output(config, &mut errors);
    validate_logging(config, &mut errors);

    if !errors.is_empty() {
        let error_messages = errors
            .iter()
            .map(|e| format!("  - {}", e))
            .collect::<Vec<_>>()
            .join("\n");

        return Err(ConfigError::ValidationError(format!(
            "Configuration validation failed:\n{}",
            error_messages
        )));
    }

    Ok(())
}

fn positive(field: &str, value: f64, errors: &mut Vec<ConfigValidationError>) {
    if !(value > 0.0) || !value.is_finite() {
        errors.push(ConfigValidationError::InvalidValue {
            field: field.to_string(),
            reason: "must be positive".to_string(),
        });
    }
}

fn unit_interval(field: &str, value: f64, errors: &mut Vec<ConfigValidationError>) {
    if !(0.0..=1.0).contains(&value) {
        errors.push(ConfigValidationError::InvalidValue {
            field: field.to_string(),
            reason: "must be between 0.0 and 1.0".to_string(),
        });
    }
}

fn validate_network(config: &CortexConfig, errors: &mut Vec<ConfigValidationError>) {
    let net = &config.network;
    // Four cell types, each needing two cells for same-type calibration
    if net.num_cells < 8 {
        errors.push(ConfigValidationError::InvalidValue {
            field: "network.num_cells".to_string(),
            reason: "must be at least 8".to_string(),
        });
    }
    positive("network.column_width", net.column_width, errors);
    positive("network.column_height", net.column_height, errors);
    if !(net.min_conn_dist >= 0.0) {
        errors.push(ConfigValidationError::InvalidValue {
            field: "network.min_conn_dist".to_string(),
            reason: "must be >= 0".to_string(),
        });
    }
    if net.min_conn_dist > net.max_conn_dist {
        errors.push(ConfigValidationError::InvalidRange {
            low: "network.min_conn_dist".to_string(),
            high: "network.max_conn_dist".to_string(),
        });
    }
    if net.edge_effects && !net.max_conn_dist.is_finite() {
        errors.push(ConfigValidationError::InvalidValue {
            field: "network.max_conn_dist".to_string(),
            reason: "must be finite when edge_effects is enabled".to_string(),
        });
    }
    for (field, value) in [
        ("network.uncorrelated_pn_percent", net.uncorrelated_pn_percent),
        ("network.uncorrelated_itn_percent", net.uncorrelated_itn_percent),
    ] {
        if !(0.0..100.0).contains(&value) {
            errors.push(ConfigValidationError::InvalidValue {
                field: field.to_string(),
                reason: "must be in [0, 100)".to_string(),
            });
        }
    }
    if net.use_poisson_disc && net.poisson_candidates == 0 {
        errors.push(ConfigValidationError::InvalidValue {
            field: "network.poisson_candidates".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
}

fn validate_calibration_inputs(config: &CortexConfig, errors: &mut Vec<ConfigValidationError>) {
    if config.reference.num_cells < 8 {
        errors.push(ConfigValidationError::InvalidValue {
            field: "reference.num_cells".to_string(),
            reason: "must be at least 8".to_string(),
        });
    }
    if !(config.reciprocal.nrr >= 0.0) || !config.reciprocal.nrr.is_finite() {
        errors.push(ConfigValidationError::InvalidValue {
            field: "reciprocal.nrr".to_string(),
            reason: "must be a finite value >= 0".to_string(),
        });
    }
}

fn validate_gap_junctions(config: &CortexConfig, errors: &mut Vec<ConfigValidationError>) {
    let gap = &config.gap_junctions;
    unit_interval("gap_junctions.fsi.p", gap.fsi.p, errors);
    unit_interval("gap_junctions.lts.p", gap.lts.p, errors);
    positive("gap_junctions.fsi.conductance", gap.fsi.conductance, errors);
    positive("gap_junctions.lts.conductance", gap.lts.conductance, errors);
}

fn validate_output(config: &CortexConfig, errors: &mut Vec<ConfigValidationError>) {
    let out = &config.output;
    if out.output_dir.as_os_str().is_empty() {
        errors.push(ConfigValidationError::MissingRequired {
            field: "output.output_dir".to_string(),
        });
    }
    for (field, value) in [
        ("output.nodes_file", &out.nodes_file),
        ("output.edges_file", &out.edges_file),
        ("output.summary_file", &out.summary_file),
    ] {
        if value.is_empty() {
            errors.push(ConfigValidationError::MissingRequired {
                field: field.to_string(),
            });
        }
    }
}

fn validate_logging(config: &CortexConfig, errors: &mut Vec<ConfigValidationError>) {
    let level = config.logging.log_level.to_lowercase();
    if !["trace", "debug", "info", "warn", "warning", "error"].contains(&level.as_str()) {
        errors.push(ConfigValidationError::InvalidValue {
            field: "logging.log_level".to_string(),
            reason: "must be one of trace, debug, info, warn, error".to_string(),
        });
    }
}
