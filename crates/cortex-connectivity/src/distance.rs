// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Distance gate and pairwise distance tables.
*/

use crate::types::{euclidean, ConnectivityError, ConnectivityResult, Population, Position};
use ndarray::{Array2, Zip};
use serde::{Deserialize, Serialize};

/// Inclusive [min_dist, max_dist] filter on soma distance (um)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistanceGate {
    pub min_dist: f64,
    pub max_dist: f64,
}

impl DistanceGate {
    pub fn new(min_dist: f64, max_dist: f64) -> ConnectivityResult<Self> {
        if min_dist.is_nan() || max_dist.is_nan() || min_dist < 0.0 || min_dist > max_dist {
            return Err(ConnectivityError::Configuration(format!(
                "invalid distance range [{}, {}]",
                min_dist, max_dist
            )));
        }
        Ok(Self { min_dist, max_dist })
    }

    pub fn contains(&self, distance: f64) -> bool {
        self.min_dist <= distance && distance <= self.max_dist
    }

    /// Mask over all ordered pairs, row-major (source, target).
    ///
    /// `same_population` excludes the diagonal regardless of distance.
    pub fn mask(
        &self,
        source: &[Position],
        target: &[Position],
        same_population: bool,
    ) -> Array2<bool> {
        Array2::from_shape_fn((source.len(), target.len()), |(i, j)| {
            if same_population && i == j {
                return false;
            }
            self.contains(euclidean(&source[i], &target[j]))
        })
    }
}

/// Distances and eligibility for a bound (source, target) pair of populations
#[derive(Debug, Clone)]
pub struct PairTable {
    same_population: bool,
    distances: Option<Array2<f64>>,
    mask: Option<Array2<bool>>,
}

impl PairTable {
    /// Precompute what a rule needs.
    ///
    /// A gate yields an eligibility mask; the n x m distance matrix is only
    /// filled for distance-dependent probabilities. Either one requires
    /// positions on both populations.
    pub fn build(
        source: &Population,
        target: &Population,
        gate: Option<&DistanceGate>,
        needs_distance: bool,
    ) -> ConnectivityResult<Self> {
        let same_population = source.same_cells(target);
        if gate.is_none() && !needs_distance {
            return Ok(Self {
                same_population,
                distances: None,
                mask: None,
            });
        }
        let (src, dst) = match (source.positions(), target.positions()) {
            (Some(src), Some(dst)) => (src, dst),
            _ => {
                let what = if gate.is_some() {
                    "distance gate"
                } else {
                    "distance-dependent probability"
                };
                return Err(ConnectivityError::Configuration(format!(
                    "{} on {} -> {} requires positions on both populations",
                    what,
                    source.describe(),
                    target.describe()
                )));
            }
        };
        let mask = gate.map(|gate| gate.mask(src, dst, same_population));
        let distances = needs_distance.then(|| distance_matrix(src, dst));
        Ok(Self {
            same_population,
            distances,
            mask,
        })
    }

    /// Drop the pair matrices once enumeration is over
    pub(crate) fn release(&mut self) {
        self.distances = None;
        self.mask = None;
    }

    pub fn same_population(&self) -> bool {
        self.same_population
    }

    /// Pair may be decided at all (not a self pair, inside the gate)
    pub fn eligible(&self, i: usize, j: usize) -> bool {
        if self.same_population && i == j {
            return false;
        }
        self.mask.as_ref().map_or(true, |m| m[(i, j)])
    }

    pub fn has_distances(&self) -> bool {
        self.distances.is_some()
    }

    pub fn distance(&self, i: usize, j: usize) -> Option<f64> {
        self.distances.as_ref().map(|d| d[(i, j)])
    }
}

/// All pairwise source-to-target distances, filled in parallel
fn distance_matrix(source: &[Position], target: &[Position]) -> Array2<f64> {
    let mut table = Array2::<f64>::zeros((source.len(), target.len()));
    Zip::indexed(&mut table).par_for_each(|(i, j), d| {
        *d = euclidean(&source[i], &target[j]);
    });
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inclusive_bounds() {
        let gate = DistanceGate::new(16.0, 300.0).unwrap();
        assert!(!gate.contains(15.999));
        assert!(gate.contains(16.0));
        assert!(gate.contains(300.0));
        assert!(!gate.contains(300.001));
    }

    #[test]
    fn test_mask_on_positions() {
        let gate = DistanceGate::new(16.0, 300.0).unwrap();
        let source = [[0.0, 0.0, 0.0]];
        let target = [
            [15.999, 0.0, 0.0],
            [16.0, 0.0, 0.0],
            [300.0, 0.0, 0.0],
            [300.001, 0.0, 0.0],
        ];
        let mask = gate.mask(&source, &target, false);
        assert_eq!(mask.row(0).to_vec(), vec![false, true, true, false]);
    }

    #[test]
    fn test_mask_excludes_diagonal() {
        let gate = DistanceGate::new(0.0, f64::INFINITY).unwrap();
        let pos = [[0.0; 3], [1.0, 0.0, 0.0]];
        let mask = gate.mask(&pos, &pos, true);
        assert!(!mask[(0, 0)]);
        assert!(!mask[(1, 1)]);
        assert!(mask[(0, 1)]);
    }

    #[test]
    fn test_distance_matrix_layout() {
        let source = [[0.0; 3], [10.0, 0.0, 0.0]];
        let target = [[0.0, 3.0, 4.0], [10.0, 0.0, 0.0], [0.0; 3]];
        let table = distance_matrix(&source, &target);
        assert_eq!(table.dim(), (2, 3));
        assert_eq!(table[(0, 0)], 5.0);
        assert_eq!(table[(1, 1)], 0.0);
        assert_eq!(table[(1, 2)], 10.0);
    }

    #[test]
    fn test_invalid_range() {
        assert!(DistanceGate::new(300.0, 16.0).is_err());
        assert!(DistanceGate::new(-1.0, 16.0).is_err());
    }

    #[test]
    fn test_gate_requires_positions() {
        let pop = Population::new("thalamus", "thal", vec![0, 1]);
        let gate = DistanceGate::new(0.0, 10.0).unwrap();
        assert!(PairTable::build(&pop, &pop, Some(&gate), false).is_err());
        assert!(PairTable::build(&pop, &pop, None, true).is_err());
        let table = PairTable::build(&pop, &pop, None, false).unwrap();
        assert!(!table.eligible(0, 0));
        assert!(table.eligible(0, 1));
    }

    fn positioned(n: usize) -> Population {
        let positions = (0..n).map(|k| [k as f64, 0.0, 0.0]).collect();
        Population::new("cortex", "CP", (0..n as u64).collect())
            .with_positions(positions)
            .unwrap()
    }

    #[test]
    fn test_ungated_constant_rule_skips_distances() {
        let pop = positioned(2000);
        let table = PairTable::build(&pop, &pop, None, false).unwrap();
        assert!(!table.has_distances());
        assert_eq!(table.distance(0, 1), None);
        assert!(!table.eligible(7, 7));
        assert!(table.eligible(0, 1999));
    }

    #[test]
    fn test_gate_mask_without_distance_matrix() {
        let pop = positioned(5);
        let gate = DistanceGate::new(0.0, 1.0).unwrap();
        let table = PairTable::build(&pop, &pop, Some(&gate), false).unwrap();
        assert!(!table.has_distances());
        assert_eq!(
            table.mask.as_ref(),
            Some(&gate.mask(pop.positions().unwrap(), pop.positions().unwrap(), true))
        );
        assert!(table.eligible(1, 2));
        assert!(!table.eligible(1, 3));
        assert!(!table.eligible(2, 2));
    }

    #[test]
    fn test_distance_dependent_keeps_matrix_until_released() {
        let pop = positioned(3);
        let mut table = PairTable::build(&pop, &pop, None, true).unwrap();
        assert!(table.has_distances());
        assert_eq!(table.distance(0, 2), Some(2.0));
        table.release();
        assert!(!table.has_distances());
    }
}
