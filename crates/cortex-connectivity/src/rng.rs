// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Seeded random source shared by every connectivity component.

There is no ambient generator: each connector and property assigner receives
an `RngHandle` at construction. Clones of a handle share one stream, so the
order in which components draw is the order that defines the graph.
*/

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use std::sync::Arc;

/// Shared handle to a seeded pseudorandom stream
#[derive(Clone)]
pub struct RngHandle {
    inner: Arc<Mutex<StdRng>>,
    seed: u64,
}

impl std::fmt::Debug for RngHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RngHandle")
            .field("seed", &self.seed)
            .finish()
    }
}

impl RngHandle {
    pub fn seeded(seed: u64) -> Self {
        Self {
            inner: Arc::new(Mutex::new(StdRng::seed_from_u64(seed))),
            seed,
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Independent stream derived from this handle's seed.
    ///
    /// Intended for partitioned work where each shard needs its own
    /// deterministic stream; draws never interleave with the parent.
    pub fn substream(&self, stream: u64) -> Self {
        Self::seeded(splitmix64(self.seed ^ splitmix64(stream.wrapping_add(1))))
    }

    /// Run `f` with exclusive access to the underlying generator
    pub fn with<R>(&self, f: impl FnOnce(&mut StdRng) -> R) -> R {
        let mut rng = self.inner.lock();
        f(&mut rng)
    }

    /// Uniform sample in [0, 1)
    pub fn uniform(&self) -> f64 {
        self.with(|rng| rng.gen::<f64>())
    }

    /// Bernoulli trial. Always consumes exactly one draw, even for p of 0 or 1.
    pub fn bernoulli(&self, p: f64) -> bool {
        self.uniform() < p
    }

    pub fn standard_normal(&self) -> f64 {
        self.with(|rng| rng.sample::<f64, _>(StandardNormal))
    }

    /// Uniform integer in `low..=high`
    pub fn int_inclusive(&self, low: u32, high: u32) -> u32 {
        self.with(|rng| rng.gen_range(low..=high))
    }
}

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
