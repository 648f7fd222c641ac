// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Probability calibration.

Converts connection counts measured in a distance-dependent reference model
into a homogeneous edge probability for a population of a different size:

```text
convergence = (uni_connections + rec_connections) / ref_size_B
probability = convergence / (target_size_A - 1)    same type (no self synapse)
probability = convergence / target_size_A          otherwise
```

The raw functions never clamp. `ProbabilityPolicy` decides what happens to a
value above 1.
*/

use crate::types::{ConnectivityError, ConnectivityResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Reference counts for one connection type
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReferenceCounts {
    /// Unidirectional connections A -> B in the reference model
    pub uni_connections: u64,
    /// Reciprocal connections (same-type only)
    pub rec_connections: u64,
    /// Number of type-B cells in the reference model
    pub ref_size_b: usize,
}

/// Expected number of incoming connections per type-B cell
pub fn find_convergence(
    uni_connections: u64,
    ref_size_b: usize,
    rec_connections: u64,
) -> ConnectivityResult<f64> {
    if ref_size_b == 0 {
        return Err(ConnectivityError::Configuration(
            "reference population size B must be positive".to_string(),
        ));
    }
    let total = (uni_connections + rec_connections) as f64;
    Ok(total / ref_size_b as f64)
}

/// Divide a convergence by the number of candidate presynaptic cells
pub fn edge_probability(
    convergence: f64,
    target_size_a: usize,
    same_type: bool,
) -> ConnectivityResult<f64> {
    let candidates = if same_type {
        if target_size_a <= 1 {
            return Err(ConnectivityError::Configuration(format!(
                "same-type calibration needs more than one cell, got {}",
                target_size_a
            )));
        }
        target_size_a - 1
    } else {
        if target_size_a == 0 {
            return Err(ConnectivityError::Configuration(
                "target population size A must be positive".to_string(),
            ));
        }
        target_size_a
    };
    Ok(convergence / candidates as f64)
}

/// One-step calibration. May return a value above 1.
pub fn probability(
    uni_connections: u64,
    ref_size_b: usize,
    target_size_a: usize,
    rec_connections: u64,
    same_type: bool,
) -> ConnectivityResult<f64> {
    let convergence = find_convergence(uni_connections, ref_size_b, rec_connections)?;
    edge_probability(convergence, target_size_a, same_type)
}

/// What to do with a calibrated probability above 1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbabilityPolicy {
    /// Fail; the reference data does not scale to this population size
    #[default]
    Strict,
    /// Warn and clamp to 1
    Clamp,
}

impl ProbabilityPolicy {
    pub fn apply(&self, context: &str, value: f64) -> ConnectivityResult<f64> {
        if !value.is_finite() || value < 0.0 {
            return Err(ConnectivityError::ProbabilityOutOfRange {
                context: context.to_string(),
                value,
            });
        }
        if value <= 1.0 {
            return Ok(value);
        }
        match self {
            ProbabilityPolicy::Strict => Err(ConnectivityError::ProbabilityOutOfRange {
                context: context.to_string(),
                value,
            }),
            ProbabilityPolicy::Clamp => {
                warn!(
                    target: "cortex-connectivity",
                    "Calibrated probability for {} is {:.4}; clamping to 1",
                    context, value
                );
                Ok(1.0)
            }
        }
    }
}

/// Calibrate and validate in one call
pub fn calibrated_probability(
    context: &str,
    counts: ReferenceCounts,
    target_size_a: usize,
    same_type: bool,
    policy: ProbabilityPolicy,
) -> ConnectivityResult<f64> {
    let raw = probability(
        counts.uni_connections,
        counts.ref_size_b,
        target_size_a,
        counts.rec_connections,
        same_type,
    )?;
    debug!(
        target: "cortex-connectivity",
        "Calibrated {}: uni={} rec={} B={} A={} same_type={} -> p={:.6}",
        context,
        counts.uni_connections,
        counts.rec_connections,
        counts.ref_size_b,
        target_size_a,
        same_type,
        raw
    );
    policy.apply(context, raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_two_step_matches_one_step() {
        let one = probability(447042, 8500, 850, 0, true).unwrap();
        let convergence = 447042.0 / 8500.0;
        let two = edge_probability(convergence, 850, true).unwrap();
        assert_eq!(one, two);
    }

    #[test]
    fn test_same_type_excludes_self() {
        let p = probability(100, 10, 11, 0, true).unwrap();
        assert!((p - 1.0).abs() < 1e-12);
        let p = probability(100, 10, 10, 0, false).unwrap();
        assert!((p - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_reciprocal_counts_added() {
        let p = probability(447042, 4250, 850, 95439, true).unwrap();
        let expected = (447042.0 + 95439.0) / 4250.0 / 849.0;
        assert!((p - expected).abs() < 1e-15);
    }

    #[test]
    fn test_same_type_single_cell_is_error() {
        assert!(matches!(
            probability(10, 10, 1, 0, true),
            Err(ConnectivityError::Configuration(_))
        ));
        assert!(probability(10, 0, 5, 0, false).is_err());
    }

    #[test]
    fn test_policy_strict_rejects_above_one() {
        let p = probability(1000, 10, 10, 0, false).unwrap();
        assert!(p > 1.0);
        assert!(matches!(
            ProbabilityPolicy::Strict.apply("X2Y", p),
            Err(ConnectivityError::ProbabilityOutOfRange { .. })
        ));
        assert_eq!(ProbabilityPolicy::Clamp.apply("X2Y", p).unwrap(), 1.0);
    }

    #[test]
    fn test_policy_rejects_negative() {
        assert!(ProbabilityPolicy::Clamp.apply("X2Y", -0.1).is_err());
    }

    proptest! {
        #[test]
        fn prop_two_step_associative(uni in 0u64..1_000_000, rec in 0u64..100_000,
                                     b in 1usize..20_000, a in 2usize..20_000,
                                     same in any::<bool>()) {
            let one = probability(uni, b, a, rec, same).unwrap();
            let conv = find_convergence(uni, b, rec).unwrap();
            let two = edge_probability(conv, a, same).unwrap();
            prop_assert_eq!(one, two);
        }
    }
}
