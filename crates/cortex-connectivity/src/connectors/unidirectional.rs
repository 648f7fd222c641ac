// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Independent Bernoulli trial per ordered pair.

use super::{
    Binding, ConnectionRule, ConnectorKind, EdgeParams, PairCursor, PairProbability, Phase,
};
use crate::distance::DistanceGate;
use crate::rng::RngHandle;
use crate::types::{ConnectivityError, ConnectivityResult, Population, RealizedEdge};
use std::sync::Arc;
use tracing::info;

/// Directed connector with an optional synapse-count cap
#[derive(Debug)]
pub struct UnidirectionConnector {
    p: PairProbability,
    n_syn: Option<u32>,
    gate: Option<DistanceGate>,
    rng: RngHandle,
    phase: Phase,
    binding: Option<Binding>,
    cursor: PairCursor,
    evaluated: u64,
    realized: u64,
}

impl UnidirectionConnector {
    pub fn new(p: impl Into<PairProbability>, rng: RngHandle) -> ConnectivityResult<Self> {
        let p = p.into();
        p.validate("unidirectional probability p")?;
        Ok(Self {
            p,
            n_syn: None,
            gate: None,
            rng,
            phase: Phase::Unbound,
            binding: None,
            cursor: PairCursor::default(),
            evaluated: 0,
            realized: 0,
        })
    }

    /// Draw the synapse count uniformly in `1..=cap` for every realized edge
    pub fn with_n_syn(mut self, cap: u32) -> ConnectivityResult<Self> {
        if cap == 0 {
            return Err(ConnectivityError::Configuration(
                "n_syn cap must be at least 1".to_string(),
            ));
        }
        self.n_syn = Some(cap);
        Ok(self)
    }

    pub fn with_gate(mut self, gate: DistanceGate) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn probability(&self) -> &PairProbability {
        &self.p
    }

    pub fn n_syn(&self) -> Option<u32> {
        self.n_syn
    }

    /// Pairs that reached a Bernoulli trial so far
    pub fn evaluated_pairs(&self) -> u64 {
        self.evaluated
    }

    /// Decide one ordered pair of the bound populations.
    ///
    /// Returns the synapse count when the edge exists. Ineligible pairs
    /// (self pairs, gated out) consume no draws.
    pub fn decide(&mut self, i: usize, j: usize) -> ConnectivityResult<Option<u32>> {
        let binding = self
            .binding
            .as_ref()
            .ok_or_else(|| ConnectivityError::NotBound("unidirectional connector".to_string()))?;
        if self.phase == Phase::Exhausted {
            return Err(ConnectivityError::AlreadyEnumerated(
                "unidirectional connector".to_string(),
            ));
        }
        if i >= binding.source.len() || j >= binding.target.len() {
            return Err(ConnectivityError::Configuration(format!(
                "pair ({}, {}) outside {}",
                i,
                j,
                binding.describe()
            )));
        }
        Ok(self.trial(i, j))
    }

    fn trial(&mut self, i: usize, j: usize) -> Option<u32> {
        let binding = self.binding.as_ref()?;
        if !binding.table.eligible(i, j) {
            return None;
        }
        let p = self.p.at(binding.table.distance(i, j));
        self.evaluated += 1;
        if !self.rng.bernoulli(p) {
            return None;
        }
        Some(match self.n_syn {
            Some(cap) => self.rng.int_inclusive(1, cap),
            None => 1,
        })
    }

    fn finish(&mut self) {
        self.phase = Phase::Exhausted;
        if let Some(binding) = &mut self.binding {
            binding.release();
            info!(
                target: "cortex-connectivity",
                "Unidirectional {}: {} edges from {} candidate pairs",
                binding.describe(),
                self.realized,
                self.evaluated
            );
        }
    }
}

impl ConnectionRule for UnidirectionConnector {
    fn kind(&self) -> ConnectorKind {
        ConnectorKind::Unidirectional
    }

    fn setup(
        &mut self,
        source: Arc<Population>,
        target: Arc<Population>,
    ) -> ConnectivityResult<()> {
        self.phase.bind("unidirectional connector")?;
        let binding = Binding::new(source, target, self.gate.as_ref(), self.p.needs_distance())?;
        self.cursor = PairCursor::new(binding.source.len(), binding.target.len());
        self.binding = Some(binding);
        Ok(())
    }

    fn begin(&mut self) -> ConnectivityResult<()> {
        self.phase.begin("unidirectional connector")
    }

    fn next_edge(&mut self) -> Option<RealizedEdge> {
        if self.phase != Phase::Enumerating {
            return None;
        }
        while let Some((i, j)) = self.cursor.advance() {
            if let Some(n_syn) = self.trial(i, j) {
                self.realized += 1;
                return self.binding.as_ref().map(|b| b.edge(i, j, n_syn));
            }
        }
        self.finish();
        None
    }

    fn edge_params(&self) -> EdgeParams {
        let mut params = EdgeParams::new(ConnectorKind::Unidirectional).with("p", self.p.to_json());
        if let Some(cap) = self.n_syn {
            params = params.with("n_syn", cap);
        }
        if let Some(gate) = &self.gate {
            params = params
                .with("min_dist", gate.min_dist)
                .with("max_dist", gate.max_dist);
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn population(label: &str, n: u64, offset: u64) -> Arc<Population> {
        Arc::new(Population::new(
            "cortex",
            label,
            (offset..offset + n).collect(),
        ))
    }

    #[test]
    fn test_same_population_has_no_self_loops() {
        let pop = population("CP", 50, 0);
        let mut conn = UnidirectionConnector::new(1.0, RngHandle::seeded(1)).unwrap();
        conn.setup(pop.clone(), pop).unwrap();
        let edges: Vec<_> = conn.decide_all().unwrap().collect();
        assert_eq!(edges.len(), 50 * 49);
        assert!(edges.iter().all(|e| e.key.source != e.key.target));
    }

    #[test]
    fn test_row_major_order() {
        let src = population("CP", 3, 0);
        let dst = population("FSI", 4, 100);
        let mut conn = UnidirectionConnector::new(1.0, RngHandle::seeded(1)).unwrap();
        conn.setup(src, dst).unwrap();
        let pairs: Vec<_> = conn
            .decide_all()
            .unwrap()
            .map(|e| (e.source_index, e.target_index))
            .collect();
        let mut expected = Vec::new();
        for i in 0..3 {
            for j in 0..4 {
                expected.push((i, j));
            }
        }
        assert_eq!(pairs, expected);
    }

    #[test]
    fn test_not_restartable() {
        let pop = population("CS", 5, 0);
        let mut conn = UnidirectionConnector::new(0.5, RngHandle::seeded(2)).unwrap();
        conn.setup(pop.clone(), pop).unwrap();
        let _ = conn.decide_all().unwrap().count();
        assert!(matches!(
            conn.decide_all(),
            Err(ConnectivityError::AlreadyEnumerated(_))
        ));
    }

    #[test]
    fn test_unbound_is_error() {
        let mut conn = UnidirectionConnector::new(0.5, RngHandle::seeded(2)).unwrap();
        assert!(matches!(
            conn.decide_all(),
            Err(ConnectivityError::NotBound(_))
        ));
        assert!(conn.decide(0, 1).is_err());
    }

    #[test]
    fn test_n_syn_within_cap() {
        let pop = population("CP", 20, 0);
        let mut conn = UnidirectionConnector::new(1.0, RngHandle::seeded(3))
            .unwrap()
            .with_n_syn(4)
            .unwrap();
        conn.setup(pop.clone(), pop).unwrap();
        let counts: Vec<u32> = conn.decide_all().unwrap().map(|e| e.n_syn).collect();
        assert!(counts.iter().all(|n| (1..=4).contains(n)));
        assert!(counts.contains(&1) && counts.contains(&4));
        assert!(UnidirectionConnector::new(1.0, RngHandle::seeded(3))
            .unwrap()
            .with_n_syn(0)
            .is_err());
    }

    #[test]
    fn test_invalid_probability() {
        assert!(UnidirectionConnector::new(1.5, RngHandle::seeded(0)).is_err());
    }

    #[test]
    fn test_gate_limits_pairs() {
        let positions: Vec<_> = (0..10).map(|k| [k as f64 * 10.0, 0.0, 0.0]).collect();
        let pop = Arc::new(
            Population::new("cortex", "CP", (0..10).collect())
                .with_positions(positions)
                .unwrap(),
        );
        let gate = DistanceGate::new(0.0, 10.0).unwrap();
        let mut conn = UnidirectionConnector::new(1.0, RngHandle::seeded(4))
            .unwrap()
            .with_gate(gate);
        conn.setup(pop.clone(), pop).unwrap();
        let edges: Vec<_> = conn.decide_all().unwrap().collect();
        // Only nearest neighbours on the line, both directions
        assert_eq!(edges.len(), 18);
        assert!(edges
            .iter()
            .all(|e| e.source_index.abs_diff(e.target_index) == 1));
        assert_eq!(conn.evaluated_pairs(), 18);
    }

    #[test]
    fn test_pair_tables_released_after_enumeration() {
        let positions: Vec<_> = (0..10).map(|k| [k as f64 * 10.0, 0.0, 0.0]).collect();
        let pop = Arc::new(
            Population::new("cortex", "CP", (0..10).collect())
                .with_positions(positions)
                .unwrap(),
        );

        let mut plain = UnidirectionConnector::new(0.5, RngHandle::seeded(6)).unwrap();
        plain.setup(pop.clone(), pop.clone()).unwrap();
        assert!(!plain.binding.as_ref().unwrap().table.has_distances());

        let p = PairProbability::by_distance(|d| 1.0 - d / 100.0);
        let mut by_distance = UnidirectionConnector::new(p, RngHandle::seeded(6)).unwrap();
        by_distance.setup(pop.clone(), pop).unwrap();
        assert!(by_distance.binding.as_ref().unwrap().table.has_distances());
        let _ = by_distance.decide_all().unwrap().count();
        assert!(!by_distance.binding.as_ref().unwrap().table.has_distances());
        assert!(matches!(
            by_distance.decide(0, 1),
            Err(ConnectivityError::AlreadyEnumerated(_))
        ));
    }

    #[test]
    fn test_distance_dependent_probability() {
        let positions: Vec<_> = (0..4).map(|k| [k as f64 * 100.0, 0.0, 0.0]).collect();
        let pop = Arc::new(
            Population::new("cortex", "FSI", (0..4).collect())
                .with_positions(positions)
                .unwrap(),
        );
        let p = PairProbability::by_distance(|d| if d < 150.0 { 1.0 } else { 0.0 });
        let mut conn = UnidirectionConnector::new(p, RngHandle::seeded(5)).unwrap();
        conn.setup(pop.clone(), pop).unwrap();
        assert_eq!(conn.decide_all().unwrap().count(), 6);
    }
}
