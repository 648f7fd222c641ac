// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration type definitions
//!
//! Each struct maps to one section of `cortex_wiring.toml`. Defaults are the
//! layer-5 model values.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CortexConfig {
    pub network: NetworkConfig,
    pub reference: ReferenceConfig,
    pub reciprocal: ReciprocalConfig,
    pub calibration: CalibrationConfig,
    pub gap_junctions: GapJunctionsConfig,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
}

/// Core network size, geometry and optional virtual populations
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub seed: u64,
    pub num_cells: usize,
    /// Column footprint edge (um); the column spans x and y
    pub column_width: f64,
    /// Column depth (um) along z
    pub column_height: f64,
    /// Minimum soma spacing for position sampling (um)
    pub min_conn_dist: f64,
    /// Shell thickness around the core (um)
    pub max_conn_dist: f64,
    /// Gate recurrent cortex and shell edges to [min_conn_dist, max_conn_dist]
    pub distance_gate: bool,
    /// Surround the core with a shell of virtual cells
    pub edge_effects: bool,
    /// Add the uncorrelated virtual input population
    pub uncorrelated: bool,
    /// Share of uncorrelated cells among all PN inputs, in percent
    pub uncorrelated_pn_percent: f64,
    pub uncorrelated_itn_percent: f64,
    /// Poisson-disc sampling (true) or uniform sampling of positions
    pub use_poisson_disc: bool,
    /// Candidates per active sample in Poisson-disc sampling
    pub poisson_candidates: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            seed: 1234,
            num_cells: 2000,
            column_width: 275.0,
            column_height: 250.0,
            min_conn_dist: 16.0,
            max_conn_dist: 300.0,
            distance_gate: false,
            edge_effects: false,
            uncorrelated: true,
            uncorrelated_pn_percent: 30.0,
            uncorrelated_itn_percent: 30.0,
            use_poisson_disc: true,
            poisson_candidates: 30,
        }
    }
}

/// Reference (distance-dependent) model the connection counts come from
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ReferenceConfig {
    pub num_cells: usize,
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        Self { num_cells: 10000 }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ReciprocalConfig {
    /// Normalized reciprocal rate applied to every reciprocal edge type
    pub nrr: f64,
}

impl Default for ReciprocalConfig {
    fn default() -> Self {
        Self { nrr: 3.0 }
    }
}

/// What to do with a calibrated probability above 1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CalibrationPolicy {
    #[default]
    Strict,
    Clamp,
}

impl std::str::FromStr for CalibrationPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "strict" => Ok(CalibrationPolicy::Strict),
            "clamp" => Ok(CalibrationPolicy::Clamp),
            other => Err(format!(
                "unknown calibration policy '{}', expected 'strict' or 'clamp'",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CalibrationConfig {
    pub policy: CalibrationPolicy,
}

/// Probability and conductance of one gap-junction population
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct GapJunctionPopulation {
    pub p: f64,
    /// Conductance (uS)
    pub conductance: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct GapJunctionsConfig {
    pub enabled: bool,
    pub fsi: GapJunctionPopulation,
    pub lts: GapJunctionPopulation,
}

impl Default for GapJunctionsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            fsi: GapJunctionPopulation {
                p: 0.045,
                conductance: 0.0000726,
            },
            lts: GapJunctionPopulation {
                p: 0.0145,
                conductance: 0.00073,
            },
        }
    }
}

/// Where generated nodes and edges are written
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    pub output_dir: PathBuf,
    pub nodes_file: String,
    pub edges_file: String,
    pub summary_file: String,
    /// Remove existing files in `output_dir` before writing
    pub clean: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("network"),
            nodes_file: "nodes.jsonl".to_string(),
            edges_file: "edges.jsonl".to_string(),
            summary_file: "summary.json".to_string(),
            clean: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// trace, debug, info, warn or error
    pub log_level: String,
    /// Directory for JSON log files; empty disables file logging
    pub log_dir: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_dir: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config: CortexConfig = toml::from_str(
            r#"
            [network]
            num_cells = 500

            [gap_junctions.fsi]
            p = 0.1
            conductance = 0.0001
            "#,
        )
        .unwrap();
        assert_eq!(config.network.num_cells, 500);
        assert_eq!(config.network.column_width, 275.0);
        assert_eq!(config.gap_junctions.fsi.p, 0.1);
        assert_eq!(config.gap_junctions.lts.p, 0.0145);
    }

    #[test]
    fn test_policy_parsing() {
        let config: CortexConfig = toml::from_str("[calibration]\npolicy = \"clamp\"").unwrap();
        assert_eq!(config.calibration.policy, CalibrationPolicy::Clamp);
        assert_eq!("STRICT".parse::<CalibrationPolicy>(), Ok(CalibrationPolicy::Strict));
        assert!("lenient".parse::<CalibrationPolicy>().is_err());
    }

    #[test]
    fn test_round_trip_through_json() {
        let config = CortexConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: CortexConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, back);
    }
}
