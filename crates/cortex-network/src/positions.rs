// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Soma position sampling.

Candidates are drawn in a cube centred at the origin, then split into the
core column and (with edge effects) the surrounding shell. Cells take
positions chosen without replacement from their region.

Two samplers:
- Poisson-disc (dart throwing with an active list) guarantees a minimum
  spacing between somata
- Uniform sampling grows the candidate set until both regions are covered
*/

use crate::error::NetworkResult;
use cortex_config::CortexConfig;
use cortex_connectivity::{ConnectivityError, Position, RngHandle};
use rand::Rng;
use tracing::{debug, info};

/// Column box and optional shell ring (um)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnGeometry {
    /// Edge of the square footprint (x and y)
    pub width: f64,
    /// Depth along z
    pub height: f64,
    /// Shell thickness added on each side in x and y
    pub shell_thickness: Option<f64>,
}

impl ColumnGeometry {
    pub fn from_config(config: &CortexConfig) -> Self {
        let net = &config.network;
        Self {
            width: net.column_width,
            height: net.column_height,
            shell_thickness: net.edge_effects.then_some(net.max_conn_dist),
        }
    }

    /// Side of the sampling cube
    pub fn side_length(&self) -> f64 {
        match self.shell_thickness {
            Some(t) => (self.width + 2.0 * t).max(self.height),
            None => self.width.max(self.height),
        }
    }

    pub fn core_volume(&self) -> f64 {
        self.width * self.width * self.height
    }

    /// Volume of the ring around the core; zero without a shell
    pub fn shell_volume(&self) -> f64 {
        match self.shell_thickness {
            Some(t) => {
                let outer = self.width + 2.0 * t;
                outer * outer * self.height - self.core_volume()
            }
            None => 0.0,
        }
    }

    pub fn in_core(&self, p: &Position) -> bool {
        let hw = self.width / 2.0;
        let hh = self.height / 2.0;
        p[0].abs() <= hw && p[1].abs() <= hw && p[2].abs() <= hh
    }

    /// Inside the shell box (which includes the core)
    fn in_shell_box(&self, p: &Position) -> bool {
        let Some(t) = self.shell_thickness else {
            return false;
        };
        let hw = self.width / 2.0 + t;
        let hh = self.height / 2.0;
        p[0].abs() <= hw && p[1].abs() <= hw && p[2].abs() <= hh
    }

    /// Split candidates into (core, shell) positions
    pub fn split(&self, samples: &[Position]) -> (Vec<Position>, Vec<Position>) {
        let mut core = Vec::new();
        let mut shell = Vec::new();
        for p in samples {
            if self.in_core(p) {
                core.push(*p);
            } else if self.in_shell_box(p) {
                shell.push(*p);
            }
        }
        (core, shell)
    }
}

/// How candidate positions are generated
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PositionSampler {
    PoissonDisc { min_spacing: f64, candidates: usize },
    Uniform,
}

/// Chosen positions for the core and the shell
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampledPositions {
    pub core: Vec<Position>,
    pub shell: Vec<Position>,
}

/// Sample `core_count` core positions and `shell_count` shell positions.
///
/// Fails with `InsufficientSamples` before any selection draw when a region
/// received fewer candidates than requested.
pub fn sample_positions(
    rng: &RngHandle,
    geometry: &ColumnGeometry,
    sampler: PositionSampler,
    core_count: usize,
    shell_count: usize,
) -> NetworkResult<SampledPositions> {
    let (core, shell) = match sampler {
        PositionSampler::PoissonDisc {
            min_spacing,
            candidates,
        } => {
            let samples = poisson_disc(rng, geometry.side_length(), min_spacing, candidates)?;
            geometry.split(&samples)
        }
        PositionSampler::Uniform => uniform_candidates(rng, geometry, core_count, shell_count)?,
    };

    info!(
        target: "cortex-network",
        "Position candidates: {} in core ({} needed), {} in shell ({} needed)",
        core.len(),
        core_count,
        shell.len(),
        shell_count
    );
    check_enough(core.len(), core_count)?;
    if geometry.shell_thickness.is_some() {
        check_enough(shell.len(), shell_count)?;
    }

    let core = choose(rng, &core, core_count);
    let shell = if geometry.shell_thickness.is_some() {
        choose(rng, &shell, shell_count)
    } else {
        Vec::new()
    };
    Ok(SampledPositions { core, shell })
}

fn check_enough(available: usize, requested: usize) -> NetworkResult<()> {
    if available < requested {
        return Err(ConnectivityError::InsufficientSamples {
            requested,
            available,
        }
        .into());
    }
    Ok(())
}

/// `count` entries without replacement, in random order
fn choose(rng: &RngHandle, pool: &[Position], count: usize) -> Vec<Position> {
    let picked = rng.with(|r| rand::seq::index::sample(r, pool.len(), count));
    picked.into_iter().map(|k| pool[k]).collect()
}

/// Candidates in a cube of side `side` centred at the origin, no two closer
/// than `radius`.
pub fn poisson_disc(
    rng: &RngHandle,
    side: f64,
    radius: f64,
    candidates: usize,
) -> NetworkResult<Vec<Position>> {
    if !(radius > 0.0) || !(side > 0.0) || candidates == 0 {
        return Err(ConnectivityError::Configuration(format!(
            "Poisson-disc sampling needs positive side, radius and candidates, got {}, {}, {}",
            side, radius, candidates
        ))
        .into());
    }

    let mut grid = SpacingGrid::new(side, radius)?;
    let half = side / 2.0;
    let mut samples: Vec<Position> = Vec::new();
    let mut active: Vec<usize> = Vec::new();

    let first = rng.with(|r| {
        [
            r.gen::<f64>() * side - half,
            r.gen::<f64>() * side - half,
            r.gen::<f64>() * side - half,
        ]
    });
    grid.insert(&first, 0);
    samples.push(first);
    active.push(0);

    while !active.is_empty() {
        let slot = rng.with(|r| r.gen_range(0..active.len()));
        let center = samples[active[slot]];
        let mut placed = false;
        for _ in 0..candidates {
            let candidate = annulus_point(rng, &center, radius);
            if candidate.iter().any(|c| c.abs() > half) {
                continue;
            }
            if grid.has_neighbor(&candidate, &samples, radius) {
                continue;
            }
            grid.insert(&candidate, samples.len());
            active.push(samples.len());
            samples.push(candidate);
            placed = true;
            break;
        }
        if !placed {
            active.swap_remove(slot);
        }
    }

    debug!(
        target: "cortex-network",
        "Poisson-disc: {} samples in cube of side {:.1} (radius {:.1})",
        samples.len(),
        side,
        radius
    );
    Ok(samples)
}

/// Uniform point in the spherical shell [r, 2r] around `center`
fn annulus_point(rng: &RngHandle, center: &Position, r: f64) -> Position {
    let (direction, u) = loop {
        let v = [
            rng.standard_normal(),
            rng.standard_normal(),
            rng.standard_normal(),
        ];
        let norm = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
        if norm > 0.0 {
            break ([v[0] / norm, v[1] / norm, v[2] / norm], rng.uniform());
        }
    };
    let r3 = r * r * r;
    let distance = (r3 + u * 7.0 * r3).cbrt();
    [
        center[0] + direction[0] * distance,
        center[1] + direction[1] * distance,
        center[2] + direction[2] * distance,
    ]
}

/// Upper bound on background grid cells (16M slots)
const MAX_GRID_CELLS: usize = 1 << 24;

/// Background grid with cell edge r/sqrt(3), so each cell holds at most one sample
struct SpacingGrid {
    cell: f64,
    dim: usize,
    half: f64,
    slots: Vec<Option<usize>>,
}

impl SpacingGrid {
    fn new(side: f64, radius: f64) -> NetworkResult<Self> {
        let cell = radius / 3f64.sqrt();
        let span = (side / cell).ceil().max(1.0);
        if !span.is_finite() || span.powi(3) > MAX_GRID_CELLS as f64 {
            return Err(ConnectivityError::Configuration(format!(
                "min spacing {} is too small for a column of side {} (grid of {:.0}^3 cells, limit {})",
                radius, side, span, MAX_GRID_CELLS
            ))
            .into());
        }
        let dim = span as usize;
        Ok(Self {
            cell,
            dim,
            half: side / 2.0,
            slots: vec![None; dim * dim * dim],
        })
    }

    fn coords(&self, p: &Position) -> [usize; 3] {
        let c = |x: f64| (((x + self.half) / self.cell) as usize).min(self.dim - 1);
        [c(p[0]), c(p[1]), c(p[2])]
    }

    fn index(&self, c: [usize; 3]) -> usize {
        (c[0] * self.dim + c[1]) * self.dim + c[2]
    }

    fn insert(&mut self, p: &Position, sample: usize) {
        let k = self.index(self.coords(p));
        self.slots[k] = Some(sample);
    }

    fn has_neighbor(&self, p: &Position, samples: &[Position], radius: f64) -> bool {
        let c = self.coords(p);
        let range = |x: usize| x.saturating_sub(2)..=(x + 2).min(self.dim - 1);
        for i in range(c[0]) {
            for j in range(c[1]) {
                for k in range(c[2]) {
                    if let Some(s) = self.slots[self.index([i, j, k])] {
                        if cortex_connectivity::types::euclidean(p, &samples[s]) < radius {
                            return true;
                        }
                    }
                }
            }
        }
        false
    }
}

/// Uniform candidates at the core density, topped up in 10% batches until
/// both regions have enough
fn uniform_candidates(
    rng: &RngHandle,
    geometry: &ColumnGeometry,
    core_count: usize,
    shell_count: usize,
) -> NetworkResult<(Vec<Position>, Vec<Position>)> {
    let side = geometry.side_length();
    let density = core_count as f64 / geometry.core_volume();
    let initial = ((density * side * side * side) as usize).max(1);
    let batch = (initial / 10).max(1);

    let mut samples = uniform_cube(rng, side, initial);
    loop {
        let (core, shell) = geometry.split(&samples);
        let short = core.len() < core_count
            || (geometry.shell_thickness.is_some() && shell.len() < shell_count);
        if !short {
            return Ok((core, shell));
        }
        samples.extend(uniform_cube(rng, side, batch));
    }
}

fn uniform_cube(rng: &RngHandle, side: f64, count: usize) -> Vec<Position> {
    rng.with(|r| {
        (0..count)
            .map(|_| {
                [
                    side * (r.gen::<f64>() - 0.5),
                    side * (r.gen::<f64>() - 0.5),
                    side * (r.gen::<f64>() - 0.5),
                ]
            })
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cortex_connectivity::types::euclidean;

    fn column(shell: Option<f64>) -> ColumnGeometry {
        ColumnGeometry {
            width: 100.0,
            height: 80.0,
            shell_thickness: shell,
        }
    }

    #[test]
    fn test_poisson_disc_min_spacing() {
        let rng = RngHandle::seeded(11);
        let samples = poisson_disc(&rng, 100.0, 16.0, 30).unwrap();
        assert!(samples.len() > 50);
        for (a, p) in samples.iter().enumerate() {
            assert!(p.iter().all(|c| c.abs() <= 50.0));
            for q in &samples[a + 1..] {
                assert!(euclidean(p, q) >= 16.0);
            }
        }
    }

    #[test]
    fn test_tiny_spacing_is_rejected() {
        let rng = RngHandle::seeded(11);
        let err = poisson_disc(&rng, 875.0, 1e-3, 30).unwrap_err();
        assert!(matches!(
            err,
            crate::NetworkError::Connectivity(ConnectivityError::Configuration(_))
        ));
        // Largest grid still accepted: 255^3 cells
        assert!(SpacingGrid::new(255.0, 3f64.sqrt()).is_ok());
        assert!(SpacingGrid::new(257.0, 3f64.sqrt()).is_err());
    }

    #[test]
    fn test_geometry_split() {
        let geometry = column(Some(20.0));
        assert_eq!(geometry.side_length(), 140.0);
        let (core, shell) = geometry.split(&[
            [0.0, 0.0, 0.0],
            [60.0, 0.0, 0.0],
            [75.0, 0.0, 0.0],
            [0.0, 0.0, 45.0],
        ]);
        assert_eq!(core, vec![[0.0, 0.0, 0.0]]);
        assert_eq!(shell, vec![[60.0, 0.0, 0.0]]);
    }

    #[test]
    fn test_not_enough_candidates() {
        let rng = RngHandle::seeded(1);
        let sampler = PositionSampler::PoissonDisc {
            min_spacing: 40.0,
            candidates: 30,
        };
        let err = sample_positions(&rng, &column(None), sampler, 500, 0).unwrap_err();
        assert!(matches!(
            err,
            crate::NetworkError::Connectivity(ConnectivityError::InsufficientSamples {
                requested: 500,
                ..
            })
        ));
    }

    #[test]
    fn test_uniform_fills_both_regions() {
        let rng = RngHandle::seeded(3);
        let geometry = column(Some(30.0));
        let positions =
            sample_positions(&rng, &geometry, PositionSampler::Uniform, 200, 400).unwrap();
        assert_eq!(positions.core.len(), 200);
        assert_eq!(positions.shell.len(), 400);
        assert!(positions.core.iter().all(|p| geometry.in_core(p)));
        assert!(positions.shell.iter().all(|p| !geometry.in_core(p)));
    }

    #[test]
    fn test_selection_without_replacement() {
        let rng = RngHandle::seeded(5);
        let sampler = PositionSampler::PoissonDisc {
            min_spacing: 10.0,
            candidates: 30,
        };
        let positions = sample_positions(&rng, &column(None), sampler, 100, 0).unwrap();
        let mut seen = positions.core.clone();
        seen.sort_by(|a, b| a.partial_cmp(b).unwrap());
        seen.dedup();
        assert_eq!(seen.len(), 100);
        assert!(positions.shell.is_empty());
    }

    #[test]
    fn test_same_seed_same_positions() {
        let sampler = PositionSampler::PoissonDisc {
            min_spacing: 12.0,
            candidates: 30,
        };
        let a = sample_positions(&RngHandle::seeded(8), &column(None), sampler, 50, 0).unwrap();
        let b = sample_positions(&RngHandle::seeded(8), &column(None), sampler, 50, 0).unwrap();
        assert_eq!(a, b);
    }
}
