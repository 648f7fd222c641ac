// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Per-edge property assignment.

Runs once per realized chemical edge, after the decision step, and fills the
delay, afferent section placement and synaptic weight of an `EdgeRecord`.

Draw order for one edge is fixed: placement mode (two-mode placement only),
then the delay deviate, then the weight deviate(s).

## Delay

```text
delay = dist / velocity + min_delay + fluc_stdev * N(0, 1)
delay clipped into [max(lo, min_delay), max(hi, min_delay)]
```

## Weight

Log-normal with arithmetic mean `m = syn_weight` and standard deviation
`s = weight_sigma`:

```text
sigma = sqrt(ln(1 + (s/m)^2))
mu    = ln(m) - sigma^2 / 2
w     = exp(mu + sigma * z),  z ~ N(0, 1) resampled while z > sigma_upper_bound
```
*/

use crate::rng::RngHandle;
use crate::types::{
    euclidean, ConnectivityError, ConnectivityResult, EdgeRecord, Position, RealizedEdge,
};
use serde::{Deserialize, Serialize};

/// Axonal conduction velocity (um/ms)
pub const DEFAULT_VELOCITY: f64 = 1000.0;
/// Soma distance used when delays do not follow positions (um)
pub const DEFAULT_DELAY_DISTANCE: f64 = 100.0;
pub const DEFAULT_FLUC_STDEV: f64 = 0.5;
pub const DEFAULT_DELAY_BOUND: (f64, f64) = (0.2, 2.4);

/// Distance term of the delay formula
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DelayDistance {
    /// Fixed nominal distance (um)
    Constant { distance: f64 },
    /// Euclidean soma distance of the pair; needs positions on both ends
    Euclidean,
}

impl Default for DelayDistance {
    fn default() -> Self {
        DelayDistance::Constant {
            distance: DEFAULT_DELAY_DISTANCE,
        }
    }
}

/// Sampled synaptic delay
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DelayRule {
    pub min_delay: f64,
    #[serde(default = "default_velocity")]
    pub velocity: f64,
    #[serde(default = "default_fluc_stdev")]
    pub fluc_stdev: f64,
    #[serde(default = "default_delay_bound")]
    pub delay_bound: (f64, f64),
    #[serde(default)]
    pub distance: DelayDistance,
}

fn default_velocity() -> f64 {
    DEFAULT_VELOCITY
}

fn default_fluc_stdev() -> f64 {
    DEFAULT_FLUC_STDEV
}

fn default_delay_bound() -> (f64, f64) {
    DEFAULT_DELAY_BOUND
}

impl DelayRule {
    pub fn new(min_delay: f64) -> Self {
        Self {
            min_delay,
            velocity: DEFAULT_VELOCITY,
            fluc_stdev: DEFAULT_FLUC_STDEV,
            delay_bound: DEFAULT_DELAY_BOUND,
            distance: DelayDistance::default(),
        }
    }

    pub fn with_bound(mut self, lo: f64, hi: f64) -> Self {
        self.delay_bound = (lo, hi);
        self
    }

    pub fn with_distance(mut self, distance: DelayDistance) -> Self {
        self.distance = distance;
        self
    }

    fn validate(&self) -> ConnectivityResult<()> {
        if !(self.min_delay >= 0.0) {
            return Err(invalid(format!(
                "min_delay must be >= 0, got {}",
                self.min_delay
            )));
        }
        if !(self.velocity > 0.0) {
            return Err(invalid(format!(
                "velocity must be positive, got {}",
                self.velocity
            )));
        }
        if !(self.fluc_stdev >= 0.0) {
            return Err(invalid(format!(
                "fluc_stdev must be >= 0, got {}",
                self.fluc_stdev
            )));
        }
        let (lo, hi) = self.delay_bound;
        if !(lo <= hi) {
            return Err(invalid(format!("delay_bound ({}, {}) is empty", lo, hi)));
        }
        if let DelayDistance::Constant { distance } = self.distance {
            if !(distance >= 0.0) {
                return Err(invalid(format!(
                    "delay distance must be >= 0, got {}",
                    distance
                )));
            }
        }
        Ok(())
    }

    /// Bounds after raising both ends to `min_delay`
    pub fn effective_bound(&self) -> (f64, f64) {
        (
            self.delay_bound.0.max(self.min_delay),
            self.delay_bound.1.max(self.min_delay),
        )
    }

    fn sample(&self, rng: &RngHandle, pair_distance: Option<f64>) -> ConnectivityResult<f64> {
        let distance = match self.distance {
            DelayDistance::Constant { distance } => distance,
            DelayDistance::Euclidean => pair_distance.ok_or_else(|| {
                invalid("distance-based delay requires positions on both cells".to_string())
            })?,
        };
        let raw =
            distance / self.velocity + self.min_delay + self.fluc_stdev * rng.standard_normal();
        let (lo, hi) = self.effective_bound();
        Ok(raw.clamp(lo, hi))
    }
}

/// Delay of an edge type
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Delay {
    /// Constant delay (ms); consumes no draws
    Fixed {
        delay: f64,
    },
    Sampled(DelayRule),
}

/// Afferent section placement
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Placement {
    Fixed {
        section_id: u16,
        section_pos: f64,
    },
    /// Choose `(sec_id.0, sec_x.0)` with probability `p`, else the second mode
    TwoMode {
        p: f64,
        sec_id: (u16, u16),
        sec_x: (f64, f64),
    },
}

impl Placement {
    /// Excitatory-to-excitatory default: mostly basal, some apical
    pub fn excitatory_pair() -> Self {
        Placement::TwoMode {
            p: 0.9,
            sec_id: (1, 2),
            sec_x: (0.4, 0.6),
        }
    }

    fn validate(&self) -> ConnectivityResult<()> {
        let (p, positions) = match *self {
            Placement::Fixed { section_pos, .. } => (0.0, [section_pos, section_pos]),
            Placement::TwoMode { p, sec_x, .. } => (p, [sec_x.0, sec_x.1]),
        };
        if !(0.0..=1.0).contains(&p) {
            return Err(invalid(format!(
                "placement probability must lie in [0, 1], got {}",
                p
            )));
        }
        if positions.iter().any(|x| !(0.0..=1.0).contains(x)) {
            return Err(invalid(format!(
                "section positions must lie in [0, 1], got {:?}",
                positions
            )));
        }
        Ok(())
    }

    fn sample(&self, rng: &RngHandle) -> (u16, f64) {
        match *self {
            Placement::Fixed {
                section_id,
                section_pos,
            } => (section_id, section_pos),
            Placement::TwoMode { p, sec_id, sec_x } => {
                if rng.bernoulli(p) {
                    (sec_id.0, sec_x.0)
                } else {
                    (sec_id.1, sec_x.1)
                }
            }
        }
    }
}

/// Synaptic weight of an edge type
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WeightRule {
    Constant {
        syn_weight: f64,
    },
    LogNormal {
        syn_weight: f64,
        weight_sigma: f64,
        sigma_upper_bound: f64,
    },
}

impl WeightRule {
    pub fn lognormal(syn_weight: f64, weight_sigma: f64) -> Self {
        WeightRule::LogNormal {
            syn_weight,
            weight_sigma,
            sigma_upper_bound: 3.0,
        }
    }

    /// Name recorded in edge metadata
    pub fn function_name(&self) -> &'static str {
        match self {
            WeightRule::Constant { .. } => "constant_weight",
            WeightRule::LogNormal { .. } => "lognormal_weight",
        }
    }

    fn validate(&self) -> ConnectivityResult<()> {
        match *self {
            WeightRule::Constant { syn_weight } => {
                if !syn_weight.is_finite() {
                    return Err(invalid(format!(
                        "syn_weight must be finite, got {}",
                        syn_weight
                    )));
                }
            }
            WeightRule::LogNormal {
                syn_weight,
                weight_sigma,
                sigma_upper_bound,
            } => {
                if !(syn_weight > 0.0) || !syn_weight.is_finite() {
                    return Err(invalid(format!(
                        "log-normal syn_weight must be positive, got {}",
                        syn_weight
                    )));
                }
                if !(weight_sigma >= 0.0) || !weight_sigma.is_finite() {
                    return Err(invalid(format!(
                        "weight_sigma must be >= 0, got {}",
                        weight_sigma
                    )));
                }
                if !(sigma_upper_bound > 0.0) {
                    return Err(invalid(format!(
                        "sigma_upper_bound must be positive, got {}",
                        sigma_upper_bound
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Log-space parameters of a log-normal with the given arithmetic moments
pub fn lognormal_params(mean: f64, stdev: f64) -> (f64, f64) {
    let variance_ratio = (1.0 + (stdev / mean).powi(2)).ln();
    let sigma = variance_ratio.sqrt();
    let mu = mean.ln() - 0.5 * variance_ratio;
    (mu, sigma)
}

/// Everything needed to fill one edge type's records
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EdgePropertyRule {
    pub delay: Delay,
    pub placement: Placement,
    pub weight: WeightRule,
}

impl EdgePropertyRule {
    pub fn validate(&self) -> ConnectivityResult<()> {
        if let Delay::Sampled(rule) = &self.delay {
            rule.validate()?;
        }
        if let Delay::Fixed { delay } = self.delay {
            if !(delay >= 0.0) {
                return Err(invalid(format!("fixed delay must be >= 0, got {}", delay)));
            }
        }
        self.placement.validate()?;
        self.weight.validate()
    }
}

/// Samples properties for realized chemical edges
#[derive(Debug, Clone)]
pub struct EdgePropertyAssigner {
    rule: EdgePropertyRule,
    rng: RngHandle,
    /// (mu, sigma, upper bound) of the log-normal weight
    lognormal: Option<(f64, f64, f64)>,
}

impl EdgePropertyAssigner {
    pub fn new(rule: EdgePropertyRule, rng: RngHandle) -> ConnectivityResult<Self> {
        rule.validate()?;
        let lognormal = match rule.weight {
            WeightRule::LogNormal {
                syn_weight,
                weight_sigma,
                sigma_upper_bound,
            } => {
                let (mu, sigma) = lognormal_params(syn_weight, weight_sigma);
                Some((mu, sigma, sigma_upper_bound))
            }
            WeightRule::Constant { .. } => None,
        };
        Ok(Self {
            rule,
            rng,
            lognormal,
        })
    }

    pub fn rule(&self) -> &EdgePropertyRule {
        &self.rule
    }

    /// Fill an `EdgeRecord` for one realized edge.
    ///
    /// Positions are only consulted when the delay follows soma distance.
    pub fn assign(
        &self,
        edge: &RealizedEdge,
        source_pos: Option<Position>,
        target_pos: Option<Position>,
    ) -> ConnectivityResult<EdgeRecord> {
        let (section_id, section_pos) = self.rule.placement.sample(&self.rng);
        let delay = match &self.rule.delay {
            Delay::Fixed { delay } => *delay,
            Delay::Sampled(rule) => {
                let distance = match (source_pos, target_pos) {
                    (Some(a), Some(b)) => Some(euclidean(&a, &b)),
                    _ => None,
                };
                rule.sample(&self.rng, distance)?
            }
        };
        let syn_weight = self.weight();
        Ok(EdgeRecord {
            source: edge.key.source,
            target: edge.key.target,
            n_syn: edge.n_syn,
            delay,
            afferent_section_id: section_id,
            afferent_section_pos: section_pos,
            syn_weight,
            is_gap_junction: false,
        })
    }

    fn weight(&self) -> f64 {
        match (self.rule.weight, self.lognormal) {
            (WeightRule::Constant { syn_weight }, _) => syn_weight,
            (_, Some((mu, sigma, upper))) => {
                let mut z = self.rng.standard_normal();
                while z > upper {
                    z = self.rng.standard_normal();
                }
                (mu + sigma * z).exp()
            }
            (WeightRule::LogNormal { syn_weight, .. }, None) => syn_weight,
        }
    }
}

/// Record for one direction of a gap junction: soma placement, no delay,
/// conductance as weight.
pub fn gap_junction_record(edge: &RealizedEdge, conductance: f64) -> EdgeRecord {
    EdgeRecord {
        source: edge.key.source,
        target: edge.key.target,
        n_syn: edge.n_syn,
        delay: 0.0,
        afferent_section_id: 0,
        afferent_section_pos: 0.5,
        syn_weight: conductance,
        is_gap_junction: true,
    }
}

fn invalid(message: String) -> ConnectivityError {
    ConnectivityError::Configuration(message)
}
