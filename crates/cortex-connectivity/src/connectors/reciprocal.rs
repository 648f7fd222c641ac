// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Reciprocal connector.

Decides the forward edge (i -> j) and the backward edge (j -> i) of each
unordered pair together. The forward edge exists with probability `p0`; the
backward edge uses the conditional probability `pr` when the forward edge
exists and the renormalized `q` otherwise, so that the backward marginal
stays `p1` while the joint rate follows the requested reciprocal rate.

One `SharedReciprocal` instance serves two edge types: the forward view
(A -> B) samples and records every decision, and the backward view (B -> A)
replays the recorded backward decisions without touching the random source.
When A and B are the same population both directions are produced in the
single forward enumeration.
*/

use super::{
    Binding, ConnectionRule, ConnectorKind, EdgeParams, PairCursor, PairProbability, Phase,
};
use crate::distance::DistanceGate;
use crate::reciprocal_rate::{ReciprocalRate, ResolvedPair};
use crate::rng::RngHandle;
use crate::types::{ConnectivityError, ConnectivityResult, PairKey, Population, RealizedEdge};
use ahash::AHashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Which side of a shared reciprocal instance a view enumerates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Forward => "forward",
            Direction::Backward => "backward",
        }
    }
}

/// Read-only snapshot of the calibrated parameters
#[derive(Debug, Clone)]
pub struct ReciprocalVars {
    pub p0: PairProbability,
    pub p1: PairProbability,
    pub rate: ReciprocalRate,
    pub n_syn0: Option<u32>,
    pub n_syn1: Option<u32>,
    pub gate: Option<DistanceGate>,
}

/// Recorded outcome for one unordered pair; values are synapse counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PairDecision {
    pub forward: Option<u32>,
    pub backward: Option<u32>,
}

/// Realized counts of a forward pass
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ReciprocalStats {
    pub pairs_evaluated: u64,
    pub forward_edges: u64,
    pub backward_edges: u64,
    pub reciprocal_pairs: u64,
    /// Sum of p0 * p1 over evaluated pairs, the independent baseline
    pub expected_independent: f64,
    /// Pairs whose branch probabilities had to be clipped
    pub clipped_pairs: u64,
}

impl ReciprocalStats {
    /// Realized reciprocal pairs over the independent expectation
    pub fn reciprocal_ratio(&self) -> Option<f64> {
        if self.expected_independent > 0.0 {
            Some(self.reciprocal_pairs as f64 / self.expected_independent)
        } else {
            None
        }
    }
}

/// Reciprocal connector state. Build with `new`, then `share()` it.
#[derive(Debug)]
pub struct ReciprocalConnector {
    vars: ReciprocalVars,
    rng: RngHandle,
    /// Branch probabilities resolved once when both p0 and p1 are constant
    constant: Option<ResolvedPair>,
    forward_phase: Phase,
    backward_phase: Phase,
    forward: Option<Binding>,
    backward: Option<Binding>,
    forward_cursor: PairCursor,
    backward_cursor: PairCursor,
    state: AHashMap<PairKey, PairDecision>,
    stats: ReciprocalStats,
}

impl ReciprocalConnector {
    /// Symmetric connector: `p1 = p0` unless `with_p1` is called
    pub fn new(
        p0: impl Into<PairProbability>,
        rate: ReciprocalRate,
        rng: RngHandle,
    ) -> ConnectivityResult<Self> {
        let p0 = p0.into();
        p0.validate("reciprocal forward probability p0")?;
        Ok(Self {
            vars: ReciprocalVars {
                p1: p0.clone(),
                p0,
                rate,
                n_syn0: None,
                n_syn1: None,
                gate: None,
            },
            rng,
            constant: None,
            forward_phase: Phase::Unbound,
            backward_phase: Phase::Unbound,
            forward: None,
            backward: None,
            forward_cursor: PairCursor::default(),
            backward_cursor: PairCursor::default(),
            state: AHashMap::new(),
            stats: ReciprocalStats::default(),
        })
    }

    pub fn with_p1(mut self, p1: impl Into<PairProbability>) -> ConnectivityResult<Self> {
        let p1 = p1.into();
        p1.validate("reciprocal backward probability p1")?;
        self.vars.p1 = p1;
        Ok(self)
    }

    /// Synapse-count caps for forward and backward edges
    pub fn with_n_syn(
        mut self,
        n_syn0: Option<u32>,
        n_syn1: Option<u32>,
    ) -> ConnectivityResult<Self> {
        if n_syn0 == Some(0) || n_syn1 == Some(0) {
            return Err(ConnectivityError::Configuration(
                "n_syn cap must be at least 1".to_string(),
            ));
        }
        self.vars.n_syn0 = n_syn0;
        self.vars.n_syn1 = n_syn1;
        Ok(self)
    }

    pub fn with_gate(mut self, gate: DistanceGate) -> Self {
        self.vars.gate = Some(gate);
        self
    }

    pub fn share(self) -> SharedReciprocal {
        SharedReciprocal {
            inner: Arc::new(Mutex::new(self)),
        }
    }

    fn needs_distance(&self) -> bool {
        self.vars.p0.needs_distance() || self.vars.p1.needs_distance()
    }

    fn bind_forward(
        &mut self,
        source: Arc<Population>,
        target: Arc<Population>,
    ) -> ConnectivityResult<()> {
        self.forward_phase.bind("reciprocal connector (forward)")?;
        let binding = Binding::new(
            source,
            target,
            self.vars.gate.as_ref(),
            self.needs_distance(),
        )?;
        if let (Some(p0), Some(p1)) = (self.vars.p0.constant(), self.vars.p1.constant()) {
            let resolved = self.vars.rate.resolve_pair(p0, p1);
            if resolved.clipped {
                warn!(
                    target: "cortex-connectivity",
                    "Infeasible reciprocal rate on {}: p0={:.4} p1={:.4} gives pr={:.4} q={:.4} after clipping",
                    binding.describe(), p0, p1, resolved.pr, resolved.q
                );
            }
            debug!(
                target: "cortex-connectivity",
                "Reciprocal {}: p0={:.6} p1={:.6} pr={:.6} q={:.6}",
                binding.describe(), p0, p1, resolved.pr, resolved.q
            );
            self.constant = Some(resolved);
        }
        self.forward_cursor = PairCursor::new(binding.source.len(), binding.target.len());
        self.forward = Some(binding);
        Ok(())
    }

    fn bind_backward(
        &mut self,
        source: Arc<Population>,
        target: Arc<Population>,
    ) -> ConnectivityResult<()> {
        let forward = self.forward.as_ref().ok_or_else(|| {
            ConnectivityError::Configuration(
                "backward view set up before the forward view of the reciprocal connector"
                    .to_string(),
            )
        })?;
        if forward.table.same_population() {
            return Err(ConnectivityError::Configuration(format!(
                "{} is recurrent; both directions come from the forward view",
                forward.describe()
            )));
        }
        if !source.same_cells(&forward.target) || !target.same_cells(&forward.source) {
            return Err(ConnectivityError::Configuration(format!(
                "backward view {} -> {} does not mirror forward {}",
                source.describe(),
                target.describe(),
                forward.describe()
            )));
        }
        self.backward_phase
            .bind("reciprocal connector (backward)")?;
        // Distances are already folded into the recorded decisions.
        let binding = Binding::new(source, target, None, false)?;
        self.backward_cursor = PairCursor::new(binding.source.len(), binding.target.len());
        self.backward = Some(binding);
        Ok(())
    }

    fn begin_backward(&mut self) -> ConnectivityResult<()> {
        if self.backward_phase == Phase::Bound && self.forward_phase != Phase::Exhausted {
            return Err(ConnectivityError::Configuration(
                "backward view enumerated before the forward pass completed".to_string(),
            ));
        }
        self.backward_phase.begin("reciprocal connector (backward)")
    }

    fn resolve(&self, distance: Option<f64>) -> (ResolvedPair, bool) {
        match self.constant {
            Some(resolved) => (resolved, false),
            None => {
                let p0 = self.vars.p0.at(distance);
                let p1 = self.vars.p1.at(distance);
                let resolved = self.vars.rate.resolve_pair(p0, p1);
                (resolved, resolved.clipped)
            }
        }
    }

    fn multiplicity(&self, cap: Option<u32>) -> u32 {
        match cap {
            Some(cap) => self.rng.int_inclusive(1, cap),
            None => 1,
        }
    }

    /// Draw forward then backward for one unordered pair
    fn sample_pair(&mut self, distance: Option<f64>) -> PairDecision {
        let (resolved, clipped) = self.resolve(distance);
        if clipped {
            self.stats.clipped_pairs += 1;
        }
        let forward = if self.rng.bernoulli(resolved.p0) {
            Some(self.multiplicity(self.vars.n_syn0))
        } else {
            None
        };
        let p_back = if forward.is_some() {
            resolved.pr
        } else {
            resolved.q
        };
        let backward = if self.rng.bernoulli(p_back) {
            Some(self.multiplicity(self.vars.n_syn1))
        } else {
            None
        };

        self.stats.pairs_evaluated += 1;
        self.stats.expected_independent += resolved.p0 * resolved.p1;
        if forward.is_some() {
            self.stats.forward_edges += 1;
        }
        if backward.is_some() {
            self.stats.backward_edges += 1;
        }
        if forward.is_some() && backward.is_some() {
            self.stats.reciprocal_pairs += 1;
        }
        PairDecision { forward, backward }
    }

    fn next_forward(&mut self) -> Option<RealizedEdge> {
        if self.forward_phase != Phase::Enumerating {
            return None;
        }
        loop {
            let Some((i, j)) = self.forward_cursor.advance() else {
                self.finish_forward();
                return None;
            };
            let binding = self.forward.as_ref()?;
            if !binding.table.eligible(i, j) {
                continue;
            }
            let key = PairKey::new(binding.source.id(i), binding.target.id(j));
            let same_population = binding.table.same_population();

            if same_population && i > j {
                // Decided jointly when (j, i) was visited
                let decision = self.state.remove(&key.reversed()).unwrap_or_default();
                if let Some(n_syn) = decision.backward {
                    return self.forward.as_ref().map(|b| b.edge(i, j, n_syn));
                }
                continue;
            }

            let distance = binding.table.distance(i, j);
            let decision = self.sample_pair(distance);
            if decision.forward.is_some() || decision.backward.is_some() {
                self.state.insert(key, decision);
            }
            if let Some(n_syn) = decision.forward {
                return self.forward.as_ref().map(|b| b.edge(i, j, n_syn));
            }
        }
    }

    fn next_backward(&mut self) -> Option<RealizedEdge> {
        if self.backward_phase != Phase::Enumerating {
            return None;
        }
        loop {
            let Some((k, l)) = self.backward_cursor.advance() else {
                self.backward_phase = Phase::Exhausted;
                if let Some(binding) = &mut self.backward {
                    binding.release();
                    info!(
                        target: "cortex-connectivity",
                        "Reciprocal {} (backward view): {} edges replayed",
                        binding.describe(),
                        self.stats.backward_edges
                    );
                }
                return None;
            };
            let binding = self.backward.as_ref()?;
            let forward_key = PairKey::new(binding.target.id(l), binding.source.id(k));
            if let Some(n_syn) = self.state.get(&forward_key).and_then(|d| d.backward) {
                return Some(binding.edge(k, l, n_syn));
            }
        }
    }

    fn finish_forward(&mut self) {
        self.forward_phase = Phase::Exhausted;
        let Some(binding) = &mut self.forward else {
            return;
        };
        binding.release();
        if self.stats.clipped_pairs > 0 {
            warn!(
                target: "cortex-connectivity",
                "Reciprocal {}: branch probabilities clipped for {} of {} pairs",
                binding.describe(),
                self.stats.clipped_pairs,
                self.stats.pairs_evaluated
            );
        }
        info!(
            target: "cortex-connectivity",
            "Reciprocal {}: {} pairs, {} forward, {} backward, {} reciprocal (ratio {})",
            binding.describe(),
            self.stats.pairs_evaluated,
            self.stats.forward_edges,
            self.stats.backward_edges,
            self.stats.reciprocal_pairs,
            self.stats
                .reciprocal_ratio()
                .map_or_else(|| "n/a".to_string(), |r| format!("{:.3}", r))
        );
    }

    fn edge_params(&self, direction: Direction) -> EdgeParams {
        let mut params = EdgeParams::new(ConnectorKind::Reciprocal)
            .with("direction", direction.as_str())
            .with("p0", self.vars.p0.to_json())
            .with("p1", self.vars.p1.to_json())
            .with(
                "rate",
                serde_json::to_value(self.vars.rate).unwrap_or(serde_json::Value::Null),
            );
        if let Some(gate) = &self.vars.gate {
            params = params
                .with("min_dist", gate.min_dist)
                .with("max_dist", gate.max_dist);
        }
        params
    }
}

/// Shared-ownership handle on one reciprocal instance
#[derive(Debug, Clone)]
pub struct SharedReciprocal {
    inner: Arc<Mutex<ReciprocalConnector>>,
}

impl SharedReciprocal {
    pub fn forward(&self) -> ReciprocalView {
        ReciprocalView {
            shared: self.clone(),
            direction: Direction::Forward,
        }
    }

    pub fn backward(&self) -> ReciprocalView {
        ReciprocalView {
            shared: self.clone(),
            direction: Direction::Backward,
        }
    }

    pub fn vars(&self) -> ReciprocalVars {
        self.inner.lock().vars.clone()
    }

    pub fn stats(&self) -> ReciprocalStats {
        self.inner.lock().stats
    }

    /// Decision recorded for the forward pair, if either edge was realized
    pub fn decision(&self, key: &PairKey) -> Option<PairDecision> {
        self.inner.lock().state.get(key).copied()
    }
}

/// One direction of a shared reciprocal instance
#[derive(Debug, Clone)]
pub struct ReciprocalView {
    shared: SharedReciprocal,
    direction: Direction,
}

impl ReciprocalView {
    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn shared(&self) -> &SharedReciprocal {
        &self.shared
    }
}

impl ConnectionRule for ReciprocalView {
    fn kind(&self) -> ConnectorKind {
        ConnectorKind::Reciprocal
    }

    fn setup(
        &mut self,
        source: Arc<Population>,
        target: Arc<Population>,
    ) -> ConnectivityResult<()> {
        let mut inner = self.shared.inner.lock();
        match self.direction {
            Direction::Forward => inner.bind_forward(source, target),
            Direction::Backward => inner.bind_backward(source, target),
        }
    }

    fn begin(&mut self) -> ConnectivityResult<()> {
        let mut inner = self.shared.inner.lock();
        match self.direction {
            Direction::Forward => inner.forward_phase.begin("reciprocal connector (forward)"),
            Direction::Backward => inner.begin_backward(),
        }
    }

    fn next_edge(&mut self) -> Option<RealizedEdge> {
        let mut inner = self.shared.inner.lock();
        match self.direction {
            Direction::Forward => inner.next_forward(),
            Direction::Backward => inner.next_backward(),
        }
    }

    fn edge_params(&self) -> EdgeParams {
        self.shared.inner.lock().edge_params(self.direction)
    }
}
