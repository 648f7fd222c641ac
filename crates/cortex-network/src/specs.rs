// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Declarative edge type definitions.

An `EdgeTypeSpec` names its source and target populations, the rule that
decides which pairs connect and the properties assigned to every realized
edge. Specs are resolved in declaration order by the `NetworkBuilder`.
*/

use cortex_connectivity::{DistanceGate, EdgePropertyRule, ReferenceCounts};
use serde::{Deserialize, Serialize};

/// Population selected by network name and type label
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PopulationRef {
    pub network: String,
    pub label: String,
}

impl PopulationRef {
    pub fn new(network: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            network: network.into(),
            label: label.into(),
        }
    }
}

impl std::fmt::Display for PopulationRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.network, self.label)
    }
}

/// Edge probability, given directly or calibrated at build time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProbabilitySpec {
    Value { p: f64 },
    /// Calibrated against the size of the presynaptic population in this model
    Calibrated { counts: ReferenceCounts },
}

impl ProbabilitySpec {
    pub fn value(p: f64) -> Self {
        ProbabilitySpec::Value { p }
    }

    /// Counts for a cross-type connection
    pub fn calibrated(uni_connections: u64, ref_size_b: usize) -> Self {
        ProbabilitySpec::Calibrated {
            counts: ReferenceCounts {
                uni_connections,
                rec_connections: 0,
                ref_size_b,
            },
        }
    }

    /// Counts for a same-type connection including reciprocal pairs
    pub fn calibrated_recurrent(
        uni_connections: u64,
        rec_connections: u64,
        ref_size_b: usize,
    ) -> Self {
        ProbabilitySpec::Calibrated {
            counts: ReferenceCounts {
                uni_connections,
                rec_connections,
                ref_size_b,
            },
        }
    }
}

/// Rule deciding which pairs of an edge type connect
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConnectorSpec {
    Unidirectional {
        p: ProbabilitySpec,
        #[serde(default)]
        n_syn: Option<u32>,
    },
    /// Forward direction of a reciprocal pair; `p1` defaults to `p0`
    Reciprocal {
        p0: ProbabilitySpec,
        #[serde(default)]
        p1: Option<ProbabilitySpec>,
        nrr: f64,
        #[serde(default)]
        n_syn0: Option<u32>,
        #[serde(default)]
        n_syn1: Option<u32>,
    },
    /// Exact k-th to k-th bijection
    OneToOne,
    /// Shared source consumed in slices by consecutive reuses
    PartitionedOneToOne,
    GapJunction { p: f64, conductance: f64 },
    /// Continue the rule of an earlier edge type (backward view or next slice)
    Reuse { of: String },
}

impl ConnectorSpec {
    pub fn reuse(of: impl Into<String>) -> Self {
        ConnectorSpec::Reuse { of: of.into() }
    }
}

/// One edge type of the network
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeTypeSpec {
    pub name: String,
    pub source: PopulationRef,
    pub target: PopulationRef,
    pub connector: ConnectorSpec,
    /// Chemical synapse properties; gap junctions carry their own
    #[serde(default)]
    pub properties: Option<EdgePropertyRule>,
    #[serde(default)]
    pub gate: Option<DistanceGate>,
}

impl EdgeTypeSpec {
    pub fn new(
        name: impl Into<String>,
        source: PopulationRef,
        target: PopulationRef,
        connector: ConnectorSpec,
    ) -> Self {
        Self {
            name: name.into(),
            source,
            target,
            connector,
            properties: None,
            gate: None,
        }
    }

    pub fn with_properties(mut self, properties: EdgePropertyRule) -> Self {
        self.properties = Some(properties);
        self
    }

    pub fn with_gate(mut self, gate: Option<DistanceGate>) -> Self {
        self.gate = gate;
        self
    }

    /// Source and target both live in `network`
    pub fn within(&self, network: &str) -> bool {
        self.source.network == network && self.target.network == network
    }
}
