// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
# Cortex Connectivity

Stochastic connectivity generation for biophysical cortical network models:
- Probability calibration from reference connection counts
- Distance gating of candidate pairs
- Connection rules (unidirectional, reciprocal, one-to-one, gap junction)
- Reciprocal rate normalization
- Per-edge delay, placement and weight assignment

## Determinism

Every component draws from an explicit `RngHandle`. Rules enumerate pairs
row-major (source-major, then target), so the same seed and the same
declaration order reproduce the same graph.

## Example

```rust
use cortex_connectivity::{ConnectionRule, Population, RngHandle, UnidirectionConnector};
use std::sync::Arc;

let cp = Arc::new(Population::new("cortex", "CP", (0..10).collect()));
let mut rule = UnidirectionConnector::new(0.1, RngHandle::seeded(1234))?;
rule.setup(cp.clone(), cp)?;
let edges: Vec<_> = rule.decide_all()?.collect();
assert!(edges.iter().all(|e| e.key.source != e.key.target));
# Ok::<(), cortex_connectivity::ConnectivityError>(())
```
*/

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod calibration;
pub mod connectors;
pub mod distance;
pub mod properties;
pub mod reciprocal_rate;
pub mod rng;
pub mod types;

pub use calibration::{
    calibrated_probability, edge_probability, find_convergence, probability, ProbabilityPolicy,
    ReferenceCounts,
};
pub use connectors::{
    ConnectionRule, Connector, ConnectorKind, Direction, EdgeParams, EdgeStream, GapJunction,
    OneToOneSequentialConnector, PairDecision, PairProbability, ReciprocalConnector,
    ReciprocalStats, ReciprocalVars, ReciprocalView, SharedOneToOne, SharedReciprocal,
    UnidirectionConnector,
};
pub use distance::{DistanceGate, PairTable};
pub use properties::{
    gap_junction_record, Delay, DelayDistance, DelayRule, EdgePropertyAssigner, EdgePropertyRule,
    Placement, WeightRule,
};
pub use reciprocal_rate::{
    backward_given_no_forward, conditional_pr, pr_from_correlation, ReciprocalRate,
};
pub use rng::RngHandle;
pub use types::{
    euclidean, CellId, ConnectivityError, ConnectivityResult, EdgeRecord, PairKey, Population,
    Position, RealizedEdge,
};
