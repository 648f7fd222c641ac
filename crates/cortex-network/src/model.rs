// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
The layer-5 cortical column.

Declares the populations and every edge type of the model on a
`NetworkBuilder`:

- 16 recurrent types among CP, CS, FSI and LTS, calibrated from the
  reference model's connection counts, with reciprocal pairs at the
  configured normalized rate
- one thalamic afferent per pyramidal cell and one baseline afferent per
  core cell (partitioned one-to-one)
- 16 unidirectional types from the uncorrelated virtual population
- shell-to-core copies of the recurrent types when edge effects are on
- electrical coupling among FSI and among LTS cells

Declaration order fixes the random stream and therefore the graph.
*/

use crate::builder::{BuiltNetwork, ModelType, NetworkBuilder};
use crate::error::NetworkResult;
use crate::layout::{CellCounts, NetworkLayout};
use crate::positions::{sample_positions, ColumnGeometry, PositionSampler};
use crate::specs::{ConnectorSpec, EdgeTypeSpec, PopulationRef, ProbabilitySpec};
use cortex_config::{validate_config, CalibrationPolicy, CortexConfig};
use cortex_connectivity::{
    Delay, DelayRule, DistanceGate, EdgePropertyRule, Placement, Population, Position,
    ProbabilityPolicy, WeightRule,
};
use tracing::info;

pub const CORTEX: &str = "cortex";
pub const THALAMUS: &str = "thalamus";
pub const BASELINE: &str = "baseline";
pub const UNCORRELATED: &str = "uncorrelated";
pub const SHELL: &str = "shell";

const SYN_WEIGHT: f64 = 1.0;
const WEIGHT_SIGMA: f64 = 0.8;

/// Synapse property family of a recurrent edge type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SynapseClass {
    /// Pyramidal to pyramidal
    E2E,
    /// Pyramidal to interneuron
    E2I,
    FromFsi,
    FromLts,
}

impl SynapseClass {
    fn rule(self, section: (u16, f64)) -> EdgePropertyRule {
        let (section_id, section_pos) = section;
        let fixed = Placement::Fixed {
            section_id,
            section_pos,
        };
        let (delay, placement) = match self {
            SynapseClass::E2E => (
                DelayRule::new(1.6).with_bound(0.2, 2.4),
                Placement::excitatory_pair(),
            ),
            SynapseClass::E2I => (DelayRule::new(1.2), fixed),
            SynapseClass::FromFsi => (DelayRule::new(0.8), fixed),
            SynapseClass::FromLts => (DelayRule::new(1.1), fixed),
        };
        EdgePropertyRule {
            delay: Delay::Sampled(delay),
            placement,
            weight: WeightRule::lognormal(SYN_WEIGHT, WEIGHT_SIGMA),
        }
    }
}

/// Afferent input: no delay, fixed placement
fn input_rule(section: (u16, f64), weight_sigma: f64) -> EdgePropertyRule {
    EdgePropertyRule {
        delay: Delay::Fixed { delay: 0.0 },
        placement: Placement::Fixed {
            section_id: section.0,
            section_pos: section.1,
        },
        weight: WeightRule::lognormal(SYN_WEIGHT, weight_sigma),
    }
}

const PN_SECTION: (u16, f64) = (1, 0.4);
const SOMA: (u16, f64) = (0, 0.5);
const BASAL: (u16, f64) = (1, 0.5);
const APICAL: (u16, f64) = (2, 0.8);

/// Second direction of a recurrent pair, realized through the first one's rule
struct Mirror {
    name: &'static str,
    section: (u16, f64),
    class: SynapseClass,
}

/// One recurrent edge type of the cortex
struct Recurrent {
    name: &'static str,
    source: &'static str,
    target: &'static str,
    /// (uni, rec, reference B label) of the forward direction
    forward: (u64, u64, &'static str),
    /// (uni, reference B label) of the backward direction; same type if absent
    backward: Option<(u64, &'static str)>,
    section: (u16, f64),
    class: SynapseClass,
    mirror: Option<Mirror>,
}

const RECURRENT: [Recurrent; 10] = [
    Recurrent {
        name: "CP2CP",
        source: "CP",
        target: "CP",
        forward: (447042, 95439, "CP"),
        backward: None,
        section: PN_SECTION,
        class: SynapseClass::E2E,
        mirror: None,
    },
    Recurrent {
        name: "CS2CS",
        source: "CS",
        target: "CS",
        forward: (187667, 13118, "CS"),
        backward: None,
        section: PN_SECTION,
        class: SynapseClass::E2E,
        mirror: None,
    },
    Recurrent {
        name: "CP2CS",
        source: "CP",
        target: "CS",
        forward: (34034, 0, "CS"),
        backward: Some((303996, "CP")),
        section: PN_SECTION,
        class: SynapseClass::E2E,
        mirror: Some(Mirror {
            name: "CS2CP",
            section: PN_SECTION,
            class: SynapseClass::E2E,
        }),
    },
    Recurrent {
        name: "FSI2FSI",
        source: "FSI",
        target: "FSI",
        forward: (39246, 27866, "FSI"),
        backward: None,
        section: SOMA,
        class: SynapseClass::FromFsi,
        mirror: None,
    },
    Recurrent {
        name: "LTS2LTS",
        source: "LTS",
        target: "LTS",
        forward: (7206, 753, "LTS"),
        backward: None,
        section: SOMA,
        class: SynapseClass::FromLts,
        mirror: None,
    },
    Recurrent {
        name: "FSI2LTS",
        source: "FSI",
        target: "LTS",
        forward: (14573, 0, "LTS"),
        backward: Some((30280, "FSI")),
        section: SOMA,
        class: SynapseClass::FromFsi,
        mirror: Some(Mirror {
            name: "LTS2FSI",
            section: SOMA,
            class: SynapseClass::FromLts,
        }),
    },
    Recurrent {
        name: "CP2FSI",
        source: "CP",
        target: "FSI",
        forward: (84035, 0, "FSI"),
        backward: Some((191158, "CP")),
        section: BASAL,
        class: SynapseClass::E2I,
        mirror: Some(Mirror {
            name: "FSI2CP",
            section: SOMA,
            class: SynapseClass::FromFsi,
        }),
    },
    Recurrent {
        name: "CS2FSI",
        source: "CS",
        target: "FSI",
        forward: (103106, 0, "FSI"),
        backward: Some((168611, "CS")),
        section: BASAL,
        class: SynapseClass::E2I,
        mirror: Some(Mirror {
            name: "FSI2CS",
            section: SOMA,
            class: SynapseClass::FromFsi,
        }),
    },
    Recurrent {
        name: "CP2LTS",
        source: "CP",
        target: "LTS",
        forward: (84025, 0, "LTS"),
        backward: Some((179164, "CP")),
        section: BASAL,
        class: SynapseClass::E2I,
        mirror: Some(Mirror {
            name: "LTS2CP",
            section: APICAL,
            class: SynapseClass::FromLts,
        }),
    },
    Recurrent {
        name: "CS2LTS",
        source: "CS",
        target: "LTS",
        forward: (93748, 0, "LTS"),
        backward: Some((44384, "CS")),
        section: BASAL,
        class: SynapseClass::E2I,
        mirror: Some(Mirror {
            name: "LTS2CS",
            section: APICAL,
            class: SynapseClass::FromLts,
        }),
    },
];

/// Uncorrelated input counts: (edge type, source, target, uni connections)
const UNCORRELATED_COUNTS: [(&str, &str, &str, u64); 16] = [
    ("CP2CP", "CP", "CP", 218265),
    ("CS2CS", "CS", "CS", 82285),
    ("CP2CS", "CP", "CS", 13836),
    ("CS2CP", "CS", "CP", 120877),
    ("FSI2FSI", "FSI", "FSI", 27265),
    ("LTS2LTS", "LTS", "LTS", 2899),
    ("FSI2LTS", "FSI", "LTS", 5677),
    ("LTS2FSI", "LTS", "FSI", 11499),
    ("CP2FSI", "CP", "FSI", 27253),
    ("FSI2CP", "FSI", "CP", 59321),
    ("CS2FSI", "CS", "FSI", 32821),
    ("FSI2CS", "FSI", "CS", 53425),
    ("CP2LTS", "CP", "LTS", 25691),
    ("LTS2CP", "LTS", "CP", 51324),
    ("CS2LTS", "CS", "LTS", 28674),
    ("LTS2CS", "LTS", "CS", 13068),
];

fn cortex(label: &str) -> PopulationRef {
    PopulationRef::new(CORTEX, label)
}

fn policy(policy: CalibrationPolicy) -> ProbabilityPolicy {
    match policy {
        CalibrationPolicy::Strict => ProbabilityPolicy::Strict,
        CalibrationPolicy::Clamp => ProbabilityPolicy::Clamp,
    }
}

/// Declare the layer-5 column on a fresh builder.
///
/// Soma positions are sampled first, from the builder's own stream.
pub fn l5_model(config: &CortexConfig) -> NetworkResult<NetworkBuilder> {
    validate_config(config)?;
    let net = &config.network;
    let layout = NetworkLayout::from_config(config)?;
    let mut builder = NetworkBuilder::new(net.seed).with_policy(policy(config.calibration.policy));

    info!(
        target: "cortex-network",
        "Layer-5 column: {} core cells {:?}, reference {:?}",
        layout.core.total(),
        layout.core.as_array(),
        layout.reference.as_array()
    );

    let geometry = ColumnGeometry::from_config(config);
    let sampler = if net.use_poisson_disc {
        PositionSampler::PoissonDisc {
            min_spacing: net.min_conn_dist,
            candidates: net.poisson_candidates,
        }
    } else {
        PositionSampler::Uniform
    };
    let positions = sample_positions(
        builder.rng(),
        &geometry,
        sampler,
        layout.core.total(),
        layout.shell.map_or(0, |s| s.total()),
    )?;

    add_typed_network(
        &mut builder,
        CORTEX,
        layout.core,
        Some(positions.core),
        ModelType::Biophysical,
    )?;
    builder.add_population(
        Population::new(THALAMUS, "thal", (0..layout.thalamus as u64).collect()),
        ModelType::Virtual,
    )?;
    builder.add_population(
        Population::new(BASELINE, "base", (0..layout.baseline as u64).collect()),
        ModelType::Virtual,
    )?;
    if let Some(uncorrelated) = layout.uncorrelated {
        add_typed_network(&mut builder, UNCORRELATED, uncorrelated, None, ModelType::Virtual)?;
    }
    if let Some(shell) = layout.shell {
        add_typed_network(
            &mut builder,
            SHELL,
            shell,
            Some(positions.shell),
            ModelType::Virtual,
        )?;
    }

    let gate = if net.distance_gate {
        Some(DistanceGate::new(net.min_conn_dist, net.max_conn_dist)?)
    } else {
        None
    };

    add_recurrent_types(&mut builder, &layout.reference, config.reciprocal.nrr, gate)?;
    add_input_types(&mut builder)?;
    if layout.uncorrelated.is_some() {
        add_uncorrelated_types(&mut builder, &layout.reference)?;
    }
    if layout.shell.is_some() {
        builder.mirror_into_shell(CORTEX, SHELL);
    }
    if config.gap_junctions.enabled {
        let gap = &config.gap_junctions;
        for (label, population) in [("FSI", &gap.fsi), ("LTS", &gap.lts)] {
            builder.add_edge_type(
                EdgeTypeSpec::new(
                    format!("{}_gap", label),
                    cortex(label),
                    cortex(label),
                    ConnectorSpec::GapJunction {
                        p: population.p,
                        conductance: population.conductance,
                    },
                )
                .with_gate(gate),
            )?;
        }
    }

    Ok(builder)
}

/// Declare and build the layer-5 column
pub fn build_l5(config: &CortexConfig) -> NetworkResult<BuiltNetwork> {
    l5_model(config)?.build()
}

/// CP, CS, FSI and LTS populations of one network with sequential node ids
fn add_typed_network(
    builder: &mut NetworkBuilder,
    network: &str,
    counts: CellCounts,
    positions: Option<Vec<Position>>,
    model_type: ModelType,
) -> NetworkResult<()> {
    let mut next_id = 0u64;
    let mut offset = 0usize;
    for (label, count) in counts.iter() {
        let ids = (next_id..next_id + count as u64).collect();
        let mut population = Population::new(network, label, ids);
        if let Some(positions) = &positions {
            population = population.with_positions(positions[offset..offset + count].to_vec())?;
        }
        builder.add_population(population, model_type)?;
        next_id += count as u64;
        offset += count;
    }
    Ok(())
}

fn add_recurrent_types(
    builder: &mut NetworkBuilder,
    reference: &CellCounts,
    nrr: f64,
    gate: Option<DistanceGate>,
) -> NetworkResult<()> {
    for edge in &RECURRENT {
        let (uni, rec, b_label) = edge.forward;
        let p0 = ProbabilitySpec::calibrated_recurrent(uni, rec, reference_size(reference, b_label));
        let p1 = edge
            .backward
            .map(|(uni, b_label)| ProbabilitySpec::calibrated(uni, reference_size(reference, b_label)));
        builder.add_edge_type(
            EdgeTypeSpec::new(
                edge.name,
                cortex(edge.source),
                cortex(edge.target),
                ConnectorSpec::Reciprocal {
                    p0,
                    p1,
                    nrr,
                    n_syn0: None,
                    n_syn1: None,
                },
            )
            .with_properties(edge.class.rule(edge.section))
            .with_gate(gate),
        )?;
        if let Some(mirror) = &edge.mirror {
            builder.add_edge_type(
                EdgeTypeSpec::new(
                    mirror.name,
                    cortex(edge.target),
                    cortex(edge.source),
                    ConnectorSpec::reuse(edge.name),
                )
                .with_properties(mirror.class.rule(mirror.section))
                .with_gate(gate),
            )?;
        }
    }
    Ok(())
}

/// Thalamic and baseline afferents, one per target cell
fn add_input_types(builder: &mut NetworkBuilder) -> NetworkResult<()> {
    let thal = PopulationRef::new(THALAMUS, "thal");
    let base = PopulationRef::new(BASELINE, "base");
    let inputs = [
        ("Thal2CP", &thal, "CP", None, APICAL, 0.3),
        ("Thal2CS", &thal, "CS", Some("Thal2CP"), APICAL, 0.3),
        ("Base2CP", &base, "CP", None, APICAL, 0.3),
        ("Base2CS", &base, "CS", Some("Base2CP"), APICAL, 0.3),
        ("Base2FSI", &base, "FSI", Some("Base2CP"), BASAL, 0.6),
        ("Base2LTS", &base, "LTS", Some("Base2CP"), BASAL, 0.6),
    ];
    for (name, source, target, reuse, section, sigma) in inputs {
        let connector = match reuse {
            Some(of) => ConnectorSpec::reuse(of),
            None => ConnectorSpec::PartitionedOneToOne,
        };
        builder.add_edge_type(
            EdgeTypeSpec::new(name, source.clone(), cortex(target), connector)
                .with_properties(input_rule(section, sigma)),
        )?;
    }
    Ok(())
}

fn add_uncorrelated_types(
    builder: &mut NetworkBuilder,
    reference: &CellCounts,
) -> NetworkResult<()> {
    for (name, source, target, uni) in UNCORRELATED_COUNTS {
        let (section, class) = recurrent_properties(name);
        builder.add_edge_type(
            EdgeTypeSpec::new(
                format!("UNCOR_{}", name),
                PopulationRef::new(UNCORRELATED, source),
                cortex(target),
                ConnectorSpec::Unidirectional {
                    p: ProbabilitySpec::calibrated(uni, reference_size(reference, target)),
                    n_syn: None,
                },
            )
            .with_properties(class.rule(section)),
        )?;
    }
    Ok(())
}

/// Placement and synapse class of the recurrent type named `name`
fn recurrent_properties(name: &str) -> ((u16, f64), SynapseClass) {
    for edge in &RECURRENT {
        if edge.name == name {
            return (edge.section, edge.class);
        }
        if let Some(mirror) = edge.mirror.as_ref().filter(|m| m.name == name) {
            return (mirror.section, mirror.class);
        }
    }
    // Every uncorrelated type has a recurrent counterpart
    (PN_SECTION, SynapseClass::E2E)
}

fn reference_size(reference: &CellCounts, label: &str) -> usize {
    reference.get(label).unwrap_or_default()
}
