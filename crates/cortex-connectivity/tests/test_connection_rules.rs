// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Connection Rule Integration Tests
//!
//! Exercises the rules the way an assembly layer drives them:
//! - Several edge types sharing one seeded random source
//! - Reciprocal statistics on a recurrent population
//! - Property assignment for every realized edge

use cortex_connectivity::{
    gap_junction_record, ConnectionRule, Connector, Delay, DelayRule, DistanceGate,
    EdgePropertyAssigner, EdgePropertyRule, EdgeRecord, GapJunction, OneToOneSequentialConnector,
    Placement, Population, ReciprocalConnector, ReciprocalRate, RngHandle,
    UnidirectionConnector, WeightRule,
};
use std::sync::Arc;

/// Helper: populations laid out on a small grid so the gate matters
fn grid_population(label: &str, n: u64, offset: u64) -> Arc<Population> {
    let positions = (0..n)
        .map(|k| {
            let k = k + offset;
            [(k % 10) as f64 * 20.0, ((k / 10) % 10) as f64 * 20.0, (k / 100) as f64 * 20.0]
        })
        .collect();
    Arc::new(
        Population::new("cortex", label, (offset..offset + n).collect())
            .with_positions(positions)
            .expect("positions match ids"),
    )
}

fn e2e_properties() -> EdgePropertyRule {
    EdgePropertyRule {
        delay: Delay::Sampled(DelayRule::new(1.6).with_bound(0.2, 2.4)),
        placement: Placement::excitatory_pair(),
        weight: WeightRule::lognormal(1.0, 0.8),
    }
}

/// Runs a fixed list of edge types in the given order against one stream
fn run_edge_types(seed: u64, order: &[usize]) -> Vec<EdgeRecord> {
    let rng = RngHandle::seeded(seed);
    let cp = grid_population("CP", 60, 0);
    let cs = grid_population("CS", 40, 60);
    let fsi = grid_population("FSI", 20, 100);
    let gate = DistanceGate::new(16.0, 300.0).expect("valid gate");

    let mut records = Vec::new();
    for &index in order {
        let (mut connector, source, target): (Connector, _, _) = match index {
            0 => (
                Connector::Reciprocal(
                    ReciprocalConnector::new(0.1, ReciprocalRate::Normalized { nrr: 3.0 }, rng.clone())
                        .expect("valid reciprocal")
                        .with_gate(gate)
                        .share()
                        .forward(),
                ),
                cp.clone(),
                cp.clone(),
            ),
            1 => (
                Connector::Unidirectional(
                    UnidirectionConnector::new(0.2, rng.clone())
                        .expect("valid unidirectional")
                        .with_gate(gate),
                ),
                cs.clone(),
                fsi.clone(),
            ),
            _ => (
                Connector::Unidirectional(
                    UnidirectionConnector::new(0.05, rng.clone()).expect("valid unidirectional"),
                ),
                fsi.clone(),
                cp.clone(),
            ),
        };
        connector
            .setup(source.clone(), target.clone())
            .expect("setup succeeds");
        let assigner =
            EdgePropertyAssigner::new(e2e_properties(), rng.clone()).expect("valid properties");
        let edges: Vec<_> = connector.decide_all().expect("fresh connector").collect();
        for edge in edges {
            records.push(
                assigner
                    .assign(
                        &edge,
                        source.position(edge.source_index),
                        target.position(edge.target_index),
                    )
                    .expect("assign succeeds"),
            );
        }
    }
    records
}

// ============================================================================
// Reproducibility
// ============================================================================

#[test]
fn test_same_seed_same_order_is_identical() {
    let first = run_edge_types(1234, &[0, 1, 2]);
    let second = run_edge_types(1234, &[0, 1, 2]);
    assert!(!first.is_empty());
    assert_eq!(first, second);

    let bytes_a = serde_json::to_vec(&first).expect("serializable");
    let bytes_b = serde_json::to_vec(&second).expect("serializable");
    assert_eq!(bytes_a, bytes_b);
}

#[test]
fn test_different_order_changes_graph() {
    let declared = run_edge_types(1234, &[0, 1, 2]);
    let mut reordered = run_edge_types(1234, &[2, 1, 0]);

    let key = |r: &EdgeRecord| (r.source, r.target);
    let mut declared_sorted = declared.clone();
    declared_sorted.sort_by_key(key);
    reordered.sort_by_key(key);
    let declared_keys: Vec<_> = declared_sorted.iter().map(key).collect();
    let reordered_keys: Vec<_> = reordered.iter().map(key).collect();
    assert_ne!(declared_keys, reordered_keys);
}

#[test]
fn test_different_seed_changes_graph() {
    assert_ne!(run_edge_types(1, &[0, 1, 2]), run_edge_types(2, &[0, 1, 2]));
}

// ============================================================================
// Reciprocal statistics on a recurrent population
// ============================================================================

#[test]
fn test_recurrent_nrr_three_over_many_pairs() {
    // 100 cells give 4950 unordered pairs per run; 21 runs exceed 100k trials
    let mut reciprocal = 0u64;
    let mut expected = 0.0;
    let mut pairs = 0u64;
    for seed in 0..21u64 {
        let pop = Arc::new(Population::new("cortex", "CP", (0..100).collect()));
        let shared = ReciprocalConnector::new(
            0.1,
            ReciprocalRate::Normalized { nrr: 3.0 },
            RngHandle::seeded(seed),
        )
        .expect("valid reciprocal")
        .share();
        let mut view = shared.forward();
        view.setup(pop.clone(), pop).expect("setup succeeds");
        let _ = view.decide_all().expect("fresh view").count();
        let stats = shared.stats();
        reciprocal += stats.reciprocal_pairs;
        expected += stats.expected_independent;
        pairs += stats.pairs_evaluated;
    }
    assert!(pairs >= 100_000);
    let ratio = reciprocal as f64 / expected;
    assert!((ratio - 3.0).abs() < 0.3, "reciprocal ratio {}", ratio);
}

#[test]
fn test_shared_instance_forward_then_backward() {
    let cp = grid_population("CP", 50, 0);
    let cs = grid_population("CS", 50, 50);
    let rng = RngHandle::seeded(99);
    let mut forward = Connector::Reciprocal(
        ReciprocalConnector::new(0.15, ReciprocalRate::Normalized { nrr: 3.0 }, rng)
            .expect("valid reciprocal")
            .with_p1(0.25)
            .expect("valid p1")
            .share()
            .forward(),
    );
    let mut backward = forward.reuse().expect("forward view can be reused");

    forward.setup(cp.clone(), cs.clone()).expect("forward setup");
    let forward_edges: Vec<_> = forward.decide_all().expect("forward").collect();
    backward.setup(cs, cp).expect("backward setup");
    let backward_edges: Vec<_> = backward.decide_all().expect("backward").collect();

    let (vars, _) = forward.reciprocal_vars().expect("reciprocal vars");
    assert_eq!(vars.p1.constant(), Some(0.25));
    assert!(!forward_edges.is_empty());
    assert!(!backward_edges.is_empty());
    assert!(backward.reuse().is_err());
}

// ============================================================================
// Inputs and electrical coupling
// ============================================================================

#[test]
fn test_partitioned_input_covers_every_target_once() {
    let thal = Arc::new(Population::new("thalamus", "thal", (0..100).collect()));
    let cp = grid_population("CP", 60, 0);
    let cs = grid_population("CS", 40, 60);

    let mut first = Connector::OneToOne(OneToOneSequentialConnector::partitioned().share());
    let mut second = first.reuse().expect("partitioned one-to-one can be reused");

    first.setup(thal.clone(), cp).expect("first slice");
    let mut targets: Vec<u64> = first.decide_all().expect("first").map(|e| e.key.target).collect();
    second.setup(thal, cs).expect("second slice");
    targets.extend(second.decide_all().expect("second").map(|e| e.key.target));

    assert_eq!(targets, (0..100).collect::<Vec<u64>>());
}

#[test]
fn test_gap_junction_records_symmetric() {
    let fsi = grid_population("FSI", 30, 0);
    let mut gap = GapJunction::new(0.3, 7.26e-5, RngHandle::seeded(5)).expect("valid gap junction");
    gap.setup(fsi.clone(), fsi).expect("setup succeeds");
    let conductance = gap.conductance();
    let records: Vec<_> = gap
        .decide_all()
        .expect("fresh")
        .map(|e| gap_junction_record(&e, conductance))
        .collect();
    for pair in records.chunks(2) {
        assert_eq!(pair[0].source, pair[1].target);
        assert_eq!(pair[0].target, pair[1].source);
        assert_eq!(pair[0].syn_weight, pair[1].syn_weight);
        assert!(pair[0].is_gap_junction && pair[1].is_gap_junction);
    }
}
