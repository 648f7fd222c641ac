// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
# Cortex Network

Assembly layer on top of `cortex-connectivity`:
- Cell counts per network from the column proportions
- Soma positions (Poisson-disc or uniform) for the core and its shell
- Declarative edge type specs resolved in order by a `NetworkBuilder`
- The layer-5 column model
- JSON Lines export of nodes and edges

## Example

```rust,no_run
use cortex_config::CortexConfig;
use cortex_network::{build_l5, save_network};

let config = CortexConfig::default();
let network = build_l5(&config)?;
save_network(&network, &config.output)?;
# Ok::<(), cortex_network::NetworkError>(())
```
*/

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod builder;
pub mod error;
pub mod export;
pub mod layout;
pub mod model;
pub mod positions;
pub mod specs;

pub use builder::{
    BuildSummary, BuiltNetwork, EdgeTable, EdgeTypeSummary, ModelType, NetworkBuilder, NodeGroup,
};
pub use error::{NetworkError, NetworkResult};
pub use export::{save_network, write_edges_jsonl, write_nodes_jsonl, write_summary_json, SavedFiles};
pub use layout::{num_prop, CellCounts, NetworkLayout, CELL_PROPORTIONS, CELL_TYPES};
pub use model::{build_l5, l5_model};
pub use positions::{
    poisson_disc, sample_positions, ColumnGeometry, PositionSampler, SampledPositions,
};
pub use specs::{ConnectorSpec, EdgeTypeSpec, PopulationRef, ProbabilitySpec};
