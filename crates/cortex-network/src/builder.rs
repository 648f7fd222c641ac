// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Network assembly.

The `NetworkBuilder` owns the populations, the edge type declarations and the
single random stream of a build. `build` walks the declarations in order:

1. **Resolve**: look up source/target populations and calibrate probabilities
   against the size of the presynaptic population
2. **Decide**: bind a connection rule (or reuse an earlier one) and drain its
   edge stream
3. **Assign**: sample delay, placement and weight for every realized edge

Reused rules are looked up by edge type name among the handles the builder
already holds. A shell-mirror step turns every core-to-core type realized so
far into a shell-to-core unidirectional type with the same calibrated
parameters.
*/

use crate::error::{NetworkError, NetworkResult};
use crate::specs::{ConnectorSpec, EdgeTypeSpec, PopulationRef, ProbabilitySpec};
use ahash::AHashMap;
use cortex_connectivity::{
    calibrated_probability, gap_junction_record, ConnectionRule, Connector, ConnectorKind,
    Direction, EdgeParams, EdgePropertyAssigner, EdgeRecord, GapJunction,
    OneToOneSequentialConnector, Population, ProbabilityPolicy, ReciprocalConnector,
    ReciprocalRate, RngHandle, UnidirectionConnector,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Simulated (biophysical) cells or spike sources (virtual)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelType {
    Biophysical,
    Virtual,
}

/// A population together with how it is simulated
#[derive(Debug, Clone)]
pub struct NodeGroup {
    pub population: Arc<Population>,
    pub model_type: ModelType,
}

/// Realized edges of one edge type
#[derive(Debug, Clone)]
pub struct EdgeTable {
    pub name: String,
    pub source: PopulationRef,
    pub target: PopulationRef,
    pub params: EdgeParams,
    pub records: Vec<EdgeRecord>,
}

impl EdgeTable {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Sum of synapse multiplicities
    pub fn synapses(&self) -> u64 {
        self.records.iter().map(|r| u64::from(r.n_syn)).sum()
    }
}

/// Per edge type outcome of a build
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgeTypeSummary {
    pub name: String,
    pub source: String,
    pub target: String,
    pub connector: ConnectorKind,
    pub edges: usize,
    pub synapses: u64,
    /// Realized reciprocal pairs over the independent expectation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reciprocal_ratio: Option<f64>,
}

/// Totals of a build
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildSummary {
    pub seed: u64,
    /// Cells per network name
    pub nodes: BTreeMap<String, usize>,
    pub edge_types: Vec<EdgeTypeSummary>,
    pub total_edges: usize,
    pub total_synapses: u64,
    pub duration_ms: u64,
}

/// Populations and realized edge tables, in declaration order
#[derive(Debug, Clone)]
pub struct BuiltNetwork {
    pub nodes: Vec<NodeGroup>,
    pub edges: Vec<EdgeTable>,
    pub summary: BuildSummary,
}

impl BuiltNetwork {
    pub fn edge_table(&self, name: &str) -> Option<&EdgeTable> {
        self.edges.iter().find(|t| t.name == name)
    }

    pub fn population(&self, population: &PopulationRef) -> Option<&Arc<Population>> {
        self.nodes
            .iter()
            .map(|g| &g.population)
            .find(|p| p.network == population.network && p.label == population.label)
    }

    pub fn total_edges(&self) -> usize {
        self.summary.total_edges
    }
}

/// One entry of the build order
#[derive(Debug, Clone)]
enum BuildStep {
    Edge(EdgeTypeSpec),
    ShellMirror {
        core_network: String,
        shell_network: String,
    },
}

/// Declarative network assembly over one seeded random stream
pub struct NetworkBuilder {
    rng: RngHandle,
    policy: ProbabilityPolicy,
    groups: Vec<NodeGroup>,
    steps: Vec<BuildStep>,
}

impl NetworkBuilder {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: RngHandle::seeded(seed),
            policy: ProbabilityPolicy::default(),
            groups: Vec::new(),
            steps: Vec::new(),
        }
    }

    /// What to do with calibrated probabilities above 1
    pub fn with_policy(mut self, policy: ProbabilityPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The build's random stream; position sampling draws from it too
    pub fn rng(&self) -> &RngHandle {
        &self.rng
    }

    pub fn policy(&self) -> ProbabilityPolicy {
        self.policy
    }

    pub fn add_population(
        &mut self,
        population: Population,
        model_type: ModelType,
    ) -> NetworkResult<Arc<Population>> {
        let exists = self.groups.iter().any(|g| {
            g.population.network == population.network && g.population.label == population.label
        });
        if exists {
            return Err(NetworkError::configuration(format!(
                "population {} declared twice",
                population.describe()
            )));
        }
        let population = Arc::new(population);
        self.groups.push(NodeGroup {
            population: population.clone(),
            model_type,
        });
        Ok(population)
    }

    pub fn add_edge_type(&mut self, spec: EdgeTypeSpec) -> NetworkResult<()> {
        let duplicate = self.edge_specs().any(|s| s.name == spec.name);
        if duplicate {
            return Err(NetworkError::configuration(format!(
                "edge type '{}' declared twice",
                spec.name
            )));
        }
        self.steps.push(BuildStep::Edge(spec));
        Ok(())
    }

    /// Mirror every core-to-core edge type declared so far into shell-to-core
    /// unidirectional types named `shell<name>`
    pub fn mirror_into_shell(
        &mut self,
        core_network: impl Into<String>,
        shell_network: impl Into<String>,
    ) {
        self.steps.push(BuildStep::ShellMirror {
            core_network: core_network.into(),
            shell_network: shell_network.into(),
        });
    }

    pub fn edge_specs(&self) -> impl Iterator<Item = &EdgeTypeSpec> {
        self.steps.iter().filter_map(|step| match step {
            BuildStep::Edge(spec) => Some(spec),
            BuildStep::ShellMirror { .. } => None,
        })
    }

    pub fn populations(&self) -> impl Iterator<Item = &Arc<Population>> {
        self.groups.iter().map(|g| &g.population)
    }

    pub fn population(&self, population: &PopulationRef) -> NetworkResult<Arc<Population>> {
        self.populations()
            .find(|p| p.network == population.network && p.label == population.label)
            .cloned()
            .ok_or_else(|| {
                NetworkError::configuration(format!("unknown population {}", population))
            })
    }

    /// Realize every edge type in declaration order
    pub fn build(self) -> NetworkResult<BuiltNetwork> {
        let start = Instant::now();
        let mut nodes = BTreeMap::new();
        for group in &self.groups {
            *nodes.entry(group.population.network.clone()).or_insert(0) += group.population.len();
        }
        info!(
            target: "cortex-network",
            "Building network (seed {}): {} populations, {} cells",
            self.rng.seed(),
            self.groups.len(),
            nodes.values().sum::<usize>()
        );

        let mut run = BuildRun {
            builder: &self,
            handles: AHashMap::new(),
            realized: Vec::new(),
            tables: Vec::new(),
            summaries: Vec::new(),
        };
        for step in &self.steps {
            match step {
                BuildStep::Edge(spec) => run.edge_type(spec)?,
                BuildStep::ShellMirror {
                    core_network,
                    shell_network,
                } => run.shell_mirror(core_network, shell_network)?,
            }
        }

        let BuildRun {
            tables, summaries, ..
        } = run;
        let summary = BuildSummary {
            seed: self.rng.seed(),
            nodes,
            total_edges: tables.iter().map(EdgeTable::len).sum(),
            total_synapses: tables.iter().map(EdgeTable::synapses).sum(),
            edge_types: summaries,
            duration_ms: start.elapsed().as_millis() as u64,
        };
        info!(
            target: "cortex-network",
            "Network built in {}ms: {} edge types, {} edges, {} synapses",
            summary.duration_ms,
            summary.edge_types.len(),
            summary.total_edges,
            summary.total_synapses
        );

        Ok(BuiltNetwork {
            nodes: self.groups,
            edges: tables,
            summary,
        })
    }
}

/// Mutable state of one `build` call
struct BuildRun<'a> {
    builder: &'a NetworkBuilder,
    /// Rule handles by edge type name, for reuse and shell mirroring
    handles: AHashMap<String, Connector>,
    /// Realized specs in order
    realized: Vec<EdgeTypeSpec>,
    tables: Vec<EdgeTable>,
    summaries: Vec<EdgeTypeSummary>,
}

impl BuildRun<'_> {
    fn edge_type(&mut self, spec: &EdgeTypeSpec) -> NetworkResult<()> {
        let source = self.builder.population(&spec.source)?;
        let target = self.builder.population(&spec.target)?;
        let connector = self.connector(spec, &source, &target)?;
        self.realize(spec, connector, source, target)
    }

    fn connector(
        &self,
        spec: &EdgeTypeSpec,
        source: &Population,
        target: &Population,
    ) -> NetworkResult<Connector> {
        let rng = self.builder.rng.clone();
        let same_type = source.same_cells(target);
        let connector = match &spec.connector {
            ConnectorSpec::Unidirectional { p, n_syn } => {
                let p = self.resolve(&format!("{} p", spec.name), p, source.len(), same_type)?;
                let mut rule = UnidirectionConnector::new(p, rng)?;
                if let Some(cap) = n_syn {
                    rule = rule.with_n_syn(*cap)?;
                }
                if let Some(gate) = spec.gate {
                    rule = rule.with_gate(gate);
                }
                Connector::Unidirectional(rule)
            }
            ConnectorSpec::Reciprocal {
                p0,
                p1,
                nrr,
                n_syn0,
                n_syn1,
            } => {
                let p0 = self.resolve(&format!("{} p0", spec.name), p0, source.len(), same_type)?;
                let mut rule =
                    ReciprocalConnector::new(p0, ReciprocalRate::Normalized { nrr: *nrr }, rng)?
                        .with_n_syn(*n_syn0, *n_syn1)?;
                if let Some(p1) = p1 {
                    // Backward edges start in the target population
                    let p1 =
                        self.resolve(&format!("{} p1", spec.name), p1, target.len(), same_type)?;
                    rule = rule.with_p1(p1)?;
                }
                if let Some(gate) = spec.gate {
                    rule = rule.with_gate(gate);
                }
                Connector::Reciprocal(rule.share().forward())
            }
            ConnectorSpec::OneToOne => Connector::OneToOne(OneToOneSequentialConnector::new().share()),
            ConnectorSpec::PartitionedOneToOne => {
                Connector::OneToOne(OneToOneSequentialConnector::partitioned().share())
            }
            ConnectorSpec::GapJunction { p, conductance } => {
                let mut rule = GapJunction::new(*p, *conductance, rng)?;
                if let Some(gate) = spec.gate {
                    rule = rule.with_gate(gate);
                }
                Connector::GapJunction(rule)
            }
            ConnectorSpec::Reuse { of } => self
                .handles
                .get(of)
                .ok_or_else(|| {
                    NetworkError::configuration(format!(
                        "edge type '{}' reuses '{}', which has no connector declared before it",
                        spec.name, of
                    ))
                })?
                .reuse()?,
        };
        Ok(connector)
    }

    fn resolve(
        &self,
        context: &str,
        p: &ProbabilitySpec,
        presynaptic: usize,
        same_type: bool,
    ) -> NetworkResult<f64> {
        match p {
            ProbabilitySpec::Value { p } => Ok(*p),
            ProbabilitySpec::Calibrated { counts } => Ok(calibrated_probability(
                context,
                *counts,
                presynaptic,
                same_type,
                self.builder.policy,
            )?),
        }
    }

    fn realize(
        &mut self,
        spec: &EdgeTypeSpec,
        mut connector: Connector,
        source: Arc<Population>,
        target: Arc<Population>,
    ) -> NetworkResult<()> {
        debug!(
            target: "cortex-network",
            "Adding edge type {}: {} -> {} ({:?})",
            spec.name,
            spec.source,
            spec.target,
            connector.kind()
        );
        connector.setup(source.clone(), target.clone())?;
        let params = match &spec.properties {
            Some(rule) => connector.edge_params().with_properties(rule),
            None => connector.edge_params(),
        };
        let edges: Vec<_> = connector.decide_all()?.collect();

        let records: Vec<EdgeRecord> = match &spec.connector {
            ConnectorSpec::GapJunction { conductance, .. } => edges
                .iter()
                .map(|edge| gap_junction_record(edge, *conductance))
                .collect(),
            _ => {
                let rule = spec.properties.ok_or_else(|| {
                    NetworkError::configuration(format!(
                        "edge type '{}' has no edge properties",
                        spec.name
                    ))
                })?;
                let assigner = EdgePropertyAssigner::new(rule, self.builder.rng.clone())?;
                edges
                    .iter()
                    .map(|edge| {
                        assigner.assign(
                            edge,
                            source.position(edge.source_index),
                            target.position(edge.target_index),
                        )
                    })
                    .collect::<Result<Vec<_>, _>>()?
            }
        };

        let reciprocal_ratio = match &connector {
            Connector::Reciprocal(view) => view.shared().stats().reciprocal_ratio(),
            _ => None,
        };
        let table = EdgeTable {
            name: spec.name.clone(),
            source: spec.source.clone(),
            target: spec.target.clone(),
            params,
            records,
        };
        info!(
            target: "cortex-network",
            "{}: {} edges, {} synapses",
            table.name,
            table.len(),
            table.synapses()
        );
        self.summaries.push(EdgeTypeSummary {
            name: table.name.clone(),
            source: table.source.to_string(),
            target: table.target.to_string(),
            connector: connector.kind(),
            edges: table.len(),
            synapses: table.synapses(),
            reciprocal_ratio,
        });
        self.tables.push(table);
        self.handles.insert(spec.name.clone(), connector);
        self.realized.push(spec.clone());
        Ok(())
    }

    /// Shell-to-core unidirectional copies of the realized core-to-core types
    fn shell_mirror(&mut self, core_network: &str, shell_network: &str) -> NetworkResult<()> {
        let core_specs: Vec<EdgeTypeSpec> = self
            .realized
            .iter()
            .filter(|s| s.within(core_network))
            .cloned()
            .collect();
        info!(
            target: "cortex-network",
            "Mirroring {} core edge types into {}",
            core_specs.len(),
            shell_network
        );

        for spec in core_specs {
            let Some((p, n_syn)) = self.mirrored_parameters(&spec)? else {
                warn!(
                    target: "cortex-network",
                    "Edge type {} has no unidirectional equivalent; not mirrored into {}",
                    spec.name,
                    shell_network
                );
                continue;
            };
            let mirrored = EdgeTypeSpec {
                name: format!("{}{}", shell_network, spec.name),
                source: PopulationRef::new(shell_network, spec.source.label.clone()),
                target: spec.target.clone(),
                connector: ConnectorSpec::Unidirectional {
                    p: ProbabilitySpec::value(p),
                    n_syn,
                },
                properties: spec.properties,
                gate: spec.gate,
            };
            self.edge_type(&mirrored)?;
        }
        Ok(())
    }

    /// (p, n_syn) a shell copy of `spec` uses: forward reciprocal views give
    /// p0, backward views give p1
    fn mirrored_parameters(&self, spec: &EdgeTypeSpec) -> NetworkResult<Option<(f64, Option<u32>)>> {
        let Some(handle) = self.handles.get(&spec.name) else {
            return Ok(None);
        };
        let (probability, n_syn) = match (handle, handle.reciprocal_vars()) {
            (Connector::Unidirectional(rule), _) => (rule.probability().clone(), rule.n_syn()),
            (_, Some((vars, Direction::Forward))) => (vars.p0, vars.n_syn0),
            (_, Some((vars, Direction::Backward))) => (vars.p1, vars.n_syn1),
            _ => return Ok(None),
        };
        let p = probability.constant().ok_or_else(|| {
            NetworkError::configuration(format!(
                "edge type '{}' has a distance-dependent probability and cannot be mirrored",
                spec.name
            ))
        })?;
        Ok(Some((p, n_syn)))
    }
}
