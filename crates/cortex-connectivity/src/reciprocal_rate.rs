// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Reciprocal rate normalization.

The reciprocal connector needs the probability of the backward edge *given*
that the forward edge exists (`pr`). It can be supplied directly, as a
normalized reciprocal rate (NRR, multiple of the independent baseline) or
as a correlation coefficient between forward and backward existence.
*/

use serde::{Deserialize, Serialize};
use tracing::warn;

/// How the conditional backward probability is specified
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReciprocalRate {
    /// Conditional probability of j->i given i->j
    Conditional { pr: f64 },
    /// Joint reciprocal probability as a multiple of p0 * p1
    Normalized { nrr: f64 },
    /// Pearson correlation between forward and backward existence
    Correlation { rho: f64 },
}

impl ReciprocalRate {
    /// Resolve to the conditional probability for one pair
    pub fn conditional(&self, p0: f64, p1: f64) -> f64 {
        let (pr, clipped) = self.conditional_raw(p0, p1);
        if clipped {
            warn_clipped("conditional backward probability pr", pr);
        }
        pr
    }

    fn conditional_raw(&self, p0: f64, p1: f64) -> (f64, bool) {
        match *self {
            ReciprocalRate::Conditional { pr } => clip(pr),
            ReciprocalRate::Normalized { nrr } => clip(nrr * p1),
            ReciprocalRate::Correlation { rho } => {
                if p0 <= 0.0 {
                    return clip(p1);
                }
                let joint = p0 * p1 + rho * (p0 * (1.0 - p0) * p1 * (1.0 - p1)).sqrt();
                clip(joint / p0)
            }
        }
    }

    /// Both branch probabilities for one pair without logging.
    ///
    /// `clipped` reports whether either value had to be forced into [0, 1];
    /// callers aggregate and warn once.
    pub fn resolve_pair(&self, p0: f64, p1: f64) -> ResolvedPair {
        let (pr, pr_clipped) = self.conditional_raw(p0, p1);
        let (q, q_clipped) = backward_given_no_forward_raw(p0, p1, pr);
        ResolvedPair {
            p0,
            p1,
            pr,
            q,
            clipped: pr_clipped || q_clipped,
        }
    }
}

/// Branch probabilities of the two-branch reciprocal sampler
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedPair {
    pub p0: f64,
    pub p1: f64,
    /// Backward probability when the forward edge exists
    pub pr: f64,
    /// Backward probability when the forward edge does not exist
    pub q: f64,
    pub clipped: bool,
}

/// `pr = NRR * p1`, so that P(i->j and j->i) = NRR * p0 * p1
pub fn conditional_pr(p0: f64, p1: f64, nrr: f64) -> f64 {
    ReciprocalRate::Normalized { nrr }.conditional(p0, p1)
}

/// Conditional probability implied by a correlation coefficient
pub fn pr_from_correlation(p0: f64, p1: f64, rho: f64) -> f64 {
    ReciprocalRate::Correlation { rho }.conditional(p0, p1)
}

/// Backward probability when the forward edge was *not* realized.
///
/// Chosen so the marginal backward rate stays `p1`:
/// `p0 * pr + (1 - p0) * q = p1`.
pub fn backward_given_no_forward(p0: f64, p1: f64, pr: f64) -> f64 {
    let (q, clipped) = backward_given_no_forward_raw(p0, p1, pr);
    if clipped {
        warn_clipped("backward rate without forward edge", q);
    }
    q
}

fn backward_given_no_forward_raw(p0: f64, p1: f64, pr: f64) -> (f64, bool) {
    if p0 >= 1.0 {
        // Forward always exists; this branch is never sampled.
        return (0.0, false);
    }
    clip((p1 - p0 * pr) / (1.0 - p0))
}

fn clip(value: f64) -> (f64, bool) {
    if (0.0..=1.0).contains(&value) {
        (value, false)
    } else {
        (value.clamp(0.0, 1.0), true)
    }
}

fn warn_clipped(what: &str, clipped: f64) {
    warn!(
        target: "cortex-connectivity",
        "Infeasible reciprocal specification: {} clipped to {}",
        what, clipped
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nrr_one_is_independent() {
        let pr = conditional_pr(0.1, 0.2, 1.0);
        assert!((pr - 0.2).abs() < 1e-12);
        let q = backward_given_no_forward(0.1, 0.2, pr);
        assert!((q - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_marginal_preserved() {
        let (p0, p1) = (0.1, 0.15);
        let pr = conditional_pr(p0, p1, 3.0);
        let q = backward_given_no_forward(p0, p1, pr);
        let marginal = p0 * pr + (1.0 - p0) * q;
        assert!((marginal - p1).abs() < 1e-12);
    }

    #[test]
    fn test_infeasible_nrr_is_clipped() {
        assert_eq!(conditional_pr(0.5, 0.5, 4.0), 1.0);
        // Joint exceeds the marginal: no mass left for the other branch.
        assert_eq!(backward_given_no_forward(0.5, 0.2, 1.0), 0.0);
    }

    #[test]
    fn test_zero_correlation_is_independent() {
        let pr = pr_from_correlation(0.3, 0.4, 0.0);
        assert!((pr - 0.4).abs() < 1e-12);
        assert!(pr_from_correlation(0.3, 0.4, 0.2) > 0.4);
    }

    #[test]
    fn test_resolve_pair_reports_clipping() {
        let rate = ReciprocalRate::Normalized { nrr: 3.0 };
        let ok = rate.resolve_pair(0.1, 0.1);
        assert!(!ok.clipped);
        assert!((ok.pr - 0.3).abs() < 1e-12);
        let bad = rate.resolve_pair(0.6, 0.6);
        assert!(bad.clipped);
        assert_eq!(bad.pr, 1.0);
    }

    #[test]
    fn test_rate_enum_dispatch() {
        let rate = ReciprocalRate::Normalized { nrr: 3.0 };
        assert!((rate.conditional(0.1, 0.1) - 0.3).abs() < 1e-12);
        let rate = ReciprocalRate::Conditional { pr: 0.25 };
        assert_eq!(rate.conditional(0.1, 0.1), 0.25);
    }
}
