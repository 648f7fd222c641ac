// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Symmetric electrical coupling within one population.

use super::{
    Binding, ConnectionRule, ConnectorKind, EdgeParams, PairCursor, PairProbability, Phase,
};
use crate::distance::DistanceGate;
use crate::rng::RngHandle;
use crate::types::{ConnectivityError, ConnectivityResult, Population, RealizedEdge};
use std::sync::Arc;
use tracing::info;

/// One Bernoulli trial per unordered pair (i < j). A success yields i -> j
/// immediately followed by j -> i.
#[derive(Debug)]
pub struct GapJunction {
    p: PairProbability,
    /// Conductance shared by both directions (uS)
    conductance: f64,
    gate: Option<DistanceGate>,
    rng: RngHandle,
    phase: Phase,
    binding: Option<Binding>,
    cursor: PairCursor,
    pending: Option<RealizedEdge>,
    evaluated: u64,
    junctions: u64,
}

impl GapJunction {
    pub fn new(
        p: impl Into<PairProbability>,
        conductance: f64,
        rng: RngHandle,
    ) -> ConnectivityResult<Self> {
        let p = p.into();
        p.validate("gap junction probability p")?;
        if !conductance.is_finite() || conductance <= 0.0 {
            return Err(ConnectivityError::Configuration(format!(
                "gap junction conductance must be positive, got {}",
                conductance
            )));
        }
        Ok(Self {
            p,
            conductance,
            gate: None,
            rng,
            phase: Phase::Unbound,
            binding: None,
            cursor: PairCursor::default(),
            pending: None,
            evaluated: 0,
            junctions: 0,
        })
    }

    pub fn with_gate(mut self, gate: DistanceGate) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn conductance(&self) -> f64 {
        self.conductance
    }

    /// Unordered pairs that reached a Bernoulli trial
    pub fn evaluated_pairs(&self) -> u64 {
        self.evaluated
    }

    pub fn junctions(&self) -> u64 {
        self.junctions
    }
}

impl ConnectionRule for GapJunction {
    fn kind(&self) -> ConnectorKind {
        ConnectorKind::GapJunction
    }

    fn setup(
        &mut self,
        source: Arc<Population>,
        target: Arc<Population>,
    ) -> ConnectivityResult<()> {
        if !source.same_cells(&target) {
            return Err(ConnectivityError::Configuration(format!(
                "gap junctions couple one population, got {} -> {}",
                source.describe(),
                target.describe()
            )));
        }
        self.phase.bind("gap junction")?;
        let binding = Binding::new(source, target, self.gate.as_ref(), self.p.needs_distance())?;
        self.cursor = PairCursor::new(binding.source.len(), binding.target.len());
        self.binding = Some(binding);
        Ok(())
    }

    fn begin(&mut self) -> ConnectivityResult<()> {
        self.phase.begin("gap junction")
    }

    fn next_edge(&mut self) -> Option<RealizedEdge> {
        if self.phase != Phase::Enumerating {
            return None;
        }
        if let Some(edge) = self.pending.take() {
            return Some(edge);
        }
        let binding = self.binding.as_mut()?;
        while let Some((i, j)) = self.cursor.advance() {
            if j <= i || !binding.table.eligible(i, j) {
                continue;
            }
            self.evaluated += 1;
            let p = self.p.at(binding.table.distance(i, j));
            if self.rng.bernoulli(p) {
                self.junctions += 1;
                self.pending = Some(binding.edge(j, i, 1));
                return Some(binding.edge(i, j, 1));
            }
        }
        info!(
            target: "cortex-connectivity",
            "Gap junctions on {}: {} junctions from {} pairs",
            binding.source.describe(),
            self.junctions,
            self.evaluated
        );
        binding.release();
        self.phase = Phase::Exhausted;
        None
    }

    fn edge_params(&self) -> EdgeParams {
        let mut params = EdgeParams::new(ConnectorKind::GapJunction)
            .with("p", self.p.to_json())
            .with("conductance", self.conductance);
        params.is_gap_junction = true;
        params
    }
}
