// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Cell counts for every network of the layer-5 column.

Core proportions follow 85/15 E/I split evenly over CP and CS, with 57% FSI
and 43% LTS among interneurons. The reference (distance-dependent) model uses
the same proportions at its own size; calibration divides its connection
counts by these reference sizes.
*/

use crate::error::{NetworkError, NetworkResult};
use crate::positions::ColumnGeometry;
use cortex_config::CortexConfig;
use serde::{Deserialize, Serialize};

/// Cell type labels in node order
pub const CELL_TYPES: [&str; 4] = ["CP", "CS", "FSI", "LTS"];

/// Relative abundance of CP, CS, FSI, LTS
pub const CELL_PROPORTIONS: [f64; 4] = [42.5, 42.5, 8.5, 6.5];

/// Split `n` in proportion to `ratios`.
///
/// Rounds the cumulative shares (ties to even) and takes differences, so the
/// parts always sum to exactly `n`.
pub fn num_prop(ratios: &[f64], n: usize) -> NetworkResult<Vec<usize>> {
    if ratios.iter().any(|r| !r.is_finite() || *r < 0.0) {
        return Err(NetworkError::configuration(format!(
            "proportions must be finite and non-negative, got {:?}",
            ratios
        )));
    }
    let total: f64 = ratios.iter().sum();
    if total <= 0.0 {
        if n == 0 {
            return Ok(vec![0; ratios.len()]);
        }
        return Err(NetworkError::configuration(format!(
            "cannot split {} cells over proportions summing to zero",
            n
        )));
    }

    let scale = n as f64 / total;
    let mut counts = Vec::with_capacity(ratios.len());
    let mut cumulative = 0.0;
    let mut previous = 0usize;
    for ratio in ratios {
        cumulative += ratio;
        let boundary = (scale * cumulative).round_ties_even() as usize;
        counts.push(boundary - previous);
        previous = boundary;
    }
    Ok(counts)
}

/// Number of cells of each type in one network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CellCounts {
    pub cp: usize,
    pub cs: usize,
    pub fsi: usize,
    pub lts: usize,
}

impl CellCounts {
    pub fn from_slice(counts: &[usize]) -> NetworkResult<Self> {
        match counts {
            [cp, cs, fsi, lts] => Ok(Self {
                cp: *cp,
                cs: *cs,
                fsi: *fsi,
                lts: *lts,
            }),
            _ => Err(NetworkError::configuration(format!(
                "expected 4 cell counts, got {}",
                counts.len()
            ))),
        }
    }

    /// Split `n` cells with the column proportions
    pub fn proportional(n: usize) -> NetworkResult<Self> {
        Self::from_slice(&num_prop(&CELL_PROPORTIONS, n)?)
    }

    /// Split `n` cells in the same ratio as `self`
    pub fn scaled_to(&self, n: usize) -> NetworkResult<Self> {
        let ratios = self.as_array().map(|c| c as f64);
        Self::from_slice(&num_prop(&ratios, n)?)
    }

    pub fn as_array(&self) -> [usize; 4] {
        [self.cp, self.cs, self.fsi, self.lts]
    }

    pub fn total(&self) -> usize {
        self.cp + self.cs + self.fsi + self.lts
    }

    pub fn pyramidal(&self) -> usize {
        self.cp + self.cs
    }

    pub fn interneurons(&self) -> usize {
        self.fsi + self.lts
    }

    /// Count for a type label (CP, CS, FSI, LTS)
    pub fn get(&self, label: &str) -> Option<usize> {
        CELL_TYPES
            .iter()
            .position(|l| *l == label)
            .map(|k| self.as_array()[k])
    }

    /// (label, count) in node order
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, usize)> {
        CELL_TYPES.into_iter().zip(self.as_array())
    }
}

/// Cell counts of every network in the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkLayout {
    pub core: CellCounts,
    /// Distance-dependent reference model the connection counts come from
    pub reference: CellCounts,
    pub uncorrelated: Option<CellCounts>,
    pub shell: Option<CellCounts>,
    /// One thalamic afferent per pyramidal cell
    pub thalamus: usize,
    /// One baseline afferent per core cell
    pub baseline: usize,
}

impl NetworkLayout {
    pub fn from_config(config: &CortexConfig) -> NetworkResult<Self> {
        let net = &config.network;
        let core = CellCounts::proportional(net.num_cells)?;
        let reference = CellCounts::proportional(config.reference.num_cells)?;

        let uncorrelated = if net.uncorrelated {
            let num_pn = virtual_share(core.pyramidal(), net.uncorrelated_pn_percent)?;
            let num_itn = virtual_share(core.interneurons(), net.uncorrelated_itn_percent)?;
            let pn = num_prop(&[core.cp as f64, core.cs as f64], num_pn)?;
            let itn = num_prop(&[core.fsi as f64, core.lts as f64], num_itn)?;
            Some(CellCounts {
                cp: pn[0],
                cs: pn[1],
                fsi: itn[0],
                lts: itn[1],
            })
        } else {
            None
        };

        let shell = if net.edge_effects {
            let geometry = ColumnGeometry::from_config(config);
            let ratio = geometry.shell_volume() / geometry.core_volume();
            let num_shell = (net.num_cells as f64 * ratio).round_ties_even() as usize;
            Some(core.scaled_to(num_shell)?)
        } else {
            None
        };

        Ok(Self {
            core,
            reference,
            uncorrelated,
            shell,
            thalamus: core.pyramidal(),
            baseline: core.total(),
        })
    }
}

/// Virtual cells so that they make up `percent` of all cells of a class
fn virtual_share(real: usize, percent: f64) -> NetworkResult<usize> {
    if !(0.0..100.0).contains(&percent) {
        return Err(NetworkError::configuration(format!(
            "uncorrelated share must be in [0, 100), got {}",
            percent
        )));
    }
    Ok((real as f64 * percent / (100.0 - percent)).round_ties_even() as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_column_proportions() {
        let counts = CellCounts::proportional(2000).unwrap();
        assert_eq!(counts.as_array(), [850, 850, 170, 130]);
        let reference = CellCounts::proportional(10000).unwrap();
        assert_eq!(reference.as_array(), [4250, 4250, 850, 650]);
    }

    #[test]
    fn test_ties_round_to_even() {
        // 729 over two equal halves puts the boundary at 364.5
        assert_eq!(num_prop(&[850.0, 850.0], 729).unwrap(), vec![364, 365]);
    }

    #[test]
    fn test_uncorrelated_counts() {
        let layout = NetworkLayout::from_config(&CortexConfig::default()).unwrap();
        let uncor = layout.uncorrelated.unwrap();
        assert_eq!(uncor.as_array(), [364, 365, 73, 56]);
        assert_eq!(layout.thalamus, 1700);
        assert_eq!(layout.baseline, 2000);
        assert!(layout.shell.is_none());
    }

    #[test]
    fn test_shell_has_core_density() {
        let mut config = CortexConfig::default();
        config.network.edge_effects = true;
        let layout = NetworkLayout::from_config(&config).unwrap();
        let shell = layout.shell.unwrap();
        // (875^2 - 275^2) / 275^2 of the core
        let expected = (2000.0 * (875.0f64 * 875.0 - 275.0 * 275.0) / (275.0 * 275.0)).round();
        assert_eq!(shell.total(), expected as usize);
        assert!(shell.cp > shell.fsi);
    }

    #[test]
    fn test_zero_proportions() {
        assert_eq!(num_prop(&[0.0, 0.0], 0).unwrap(), vec![0, 0]);
        assert!(num_prop(&[0.0, 0.0], 3).is_err());
        assert!(num_prop(&[-1.0, 2.0], 3).is_err());
    }

    #[test]
    fn test_get_by_label() {
        let counts = CellCounts::proportional(2000).unwrap();
        assert_eq!(counts.get("FSI"), Some(170));
        assert_eq!(counts.get("thal"), None);
        let labels: Vec<_> = counts.iter().map(|(l, _)| l).collect();
        assert_eq!(labels, CELL_TYPES.to_vec());
    }

    proptest! {
        #[test]
        fn prop_parts_sum_to_total(ratios in proptest::collection::vec(0.1f64..100.0, 1..6),
                                   n in 0usize..50_000) {
            let parts = num_prop(&ratios, n).unwrap();
            prop_assert_eq!(parts.len(), ratios.len());
            prop_assert_eq!(parts.iter().sum::<usize>(), n);
        }
    }
}
