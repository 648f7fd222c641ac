// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Core types for connectivity generation.

Populations, pair keys, realized edges and the error type shared by every
connection rule.
*/

use serde::{Deserialize, Serialize};

/// Cell identifier (node id inside its network)
pub type CellId = u64;

/// 3D soma position in micrometers
pub type Position = [f64; 3];

/// Result type for connectivity operations
pub type ConnectivityResult<T> = Result<T, ConnectivityError>;

/// Errors that can occur while generating connectivity
#[derive(Debug, thiserror::Error)]
pub enum ConnectivityError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Calibrated probability for {context} is {value}, outside [0, 1]")]
    ProbabilityOutOfRange { context: String, value: f64 },

    #[error("Insufficient position samples: requested {requested}, available {available}")]
    InsufficientSamples { requested: usize, available: usize },

    #[error("Connector already enumerated: {0}")]
    AlreadyEnumerated(String),

    #[error("Connector not bound to populations: {0}")]
    NotBound(String),
}

/// Ordered sequence of cells sharing a type label.
///
/// Immutable once built; rules hold it through `Arc<Population>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Population {
    /// Owning network (e.g. "cortex", "thalamus", "shell")
    pub network: String,
    /// Type label (CP, CS, FSI, LTS, thal, ...)
    pub label: String,
    ids: Vec<CellId>,
    positions: Option<Vec<Position>>,
}

impl Population {
    pub fn new(network: impl Into<String>, label: impl Into<String>, ids: Vec<CellId>) -> Self {
        Self {
            network: network.into(),
            label: label.into(),
            ids,
            positions: None,
        }
    }

    /// Attach soma positions. Length must match the id list.
    pub fn with_positions(mut self, positions: Vec<Position>) -> ConnectivityResult<Self> {
        if positions.len() != self.ids.len() {
            return Err(ConnectivityError::Configuration(format!(
                "population {}/{} has {} cells but {} positions",
                self.network,
                self.label,
                self.ids.len(),
                positions.len()
            )));
        }
        self.positions = Some(positions);
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &[CellId] {
        &self.ids
    }

    pub fn id(&self, index: usize) -> CellId {
        self.ids[index]
    }

    pub fn positions(&self) -> Option<&[Position]> {
        self.positions.as_deref()
    }

    pub fn position(&self, index: usize) -> Option<Position> {
        self.positions.as_ref().map(|p| p[index])
    }

    /// Same network and same cell ids, i.e. a recurrent connection.
    pub fn same_cells(&self, other: &Population) -> bool {
        self.network == other.network && self.ids == other.ids
    }

    pub fn describe(&self) -> String {
        format!("{}/{}", self.network, self.label)
    }
}

/// Ordered (source, target) cell pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PairKey {
    pub source: CellId,
    pub target: CellId,
}

impl PairKey {
    pub fn new(source: CellId, target: CellId) -> Self {
        Self { source, target }
    }

    pub fn reversed(&self) -> Self {
        Self {
            source: self.target,
            target: self.source,
        }
    }
}

/// An edge a rule decided to realize.
///
/// Indices are positions inside the bound source/target populations so the
/// property assigner can look up soma positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RealizedEdge {
    pub key: PairKey,
    pub source_index: usize,
    pub target_index: usize,
    /// Synapse multiplicity (>= 1)
    pub n_syn: u32,
}

/// Realized edge with all sampled properties. Written once.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub source: CellId,
    pub target: CellId,
    pub n_syn: u32,
    /// Axonal + synaptic delay (ms)
    pub delay: f64,
    pub afferent_section_id: u16,
    /// Fractional location along the section, in [0, 1]
    pub afferent_section_pos: f64,
    /// Synaptic weight, or conductance (uS) for gap junctions
    pub syn_weight: f64,
    pub is_gap_junction: bool,
}

/// Euclidean distance between two positions
pub fn euclidean(a: &Position, b: &Position) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    let dz = a[2] - b[2];
    (dx * dx + dy * dy + dz * dz).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_population_positions_length_checked() {
        let pop = Population::new("cortex", "CP", vec![0, 1, 2]);
        assert!(pop
            .clone()
            .with_positions(vec![[0.0; 3], [1.0; 3]])
            .is_err());
        let pop = pop
            .with_positions(vec![[0.0; 3], [1.0; 3], [2.0; 3]])
            .unwrap();
        assert_eq!(pop.position(2), Some([2.0; 3]));
    }

    #[test]
    fn test_same_cells() {
        let a = Population::new("cortex", "FSI", vec![5, 6]);
        let b = Population::new("cortex", "FSI", vec![5, 6]);
        let shell = Population::new("shell", "FSI", vec![5, 6]);
        assert!(a.same_cells(&b));
        assert!(!a.same_cells(&shell));
    }

    #[test]
    fn test_euclidean() {
        assert_eq!(euclidean(&[0.0, 0.0, 0.0], &[3.0, 4.0, 0.0]), 5.0);
    }
}
