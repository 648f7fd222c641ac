// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # cortex-wiring
//!
//! Stochastic connectivity generation for biophysical cortical column
//! models. Edge probabilities are calibrated from the connection counts of a
//! larger distance-dependent reference model, so that a smaller or
//! differently shaped network keeps the same convergence per cell type.
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! cortex-wiring = "0.1"
//! ```
//!
//! ```rust,no_run
//! use cortex_wiring::prelude::*;
//!
//! let mut config = CortexConfig::default();
//! config.network.num_cells = 500;
//! config.calibration.policy = CalibrationPolicy::Clamp;
//!
//! let network = build_l5(&config)?;
//! println!("{} edges", network.summary.total_edges);
//! save_network(&network, &config.output)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  Foundation: cortex-config, cortex-observability        │
//! │  (TOML + overrides, logging and debug flags)            │
//! └─────────────────────────────────────────────────────────┘
//!                         ↓
//! ┌─────────────────────────────────────────────────────────┐
//! │  Algorithms: cortex-connectivity                        │
//! │  (calibration, distance gate, connection rules,         │
//! │   reciprocal rates, edge properties)                    │
//! └─────────────────────────────────────────────────────────┘
//!                         ↓
//! ┌─────────────────────────────────────────────────────────┐
//! │  Assembly: cortex-network                               │
//! │  (populations, positions, builder, L5 model, export)    │
//! └─────────────────────────────────────────────────────────┘
//! ```

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use cortex_config as config;
pub use cortex_connectivity as connectivity;
pub use cortex_network as network;
pub use cortex_observability as observability;

/// Commonly used types
pub mod prelude {
    pub use cortex_config::{
        load_config, validate_config, CalibrationPolicy, CortexConfig, OutputConfig,
    };
    pub use cortex_connectivity::{
        ConnectionRule, Connector, DistanceGate, EdgePropertyAssigner, EdgePropertyRule,
        EdgeRecord, GapJunction, OneToOneSequentialConnector, Population, ProbabilityPolicy,
        ReciprocalConnector, ReciprocalRate, RngHandle, UnidirectionConnector,
    };
    pub use cortex_network::{
        build_l5, l5_model, save_network, BuiltNetwork, ConnectorSpec, EdgeTypeSpec, ModelType,
        NetworkBuilder, PopulationRef, ProbabilitySpec,
    };
}
