// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Deterministic one-to-one mapping: k-th source to k-th target.
//!
//! In partitioned mode one instance is set up repeatedly against the same
//! source population, and each setup takes the next contiguous slice of
//! sources sized to its target. This is how a single pool of virtual input
//! cells feeds several target populations without reusing a cell.

use super::{ConnectionRule, ConnectorKind, EdgeParams, Phase};
use crate::types::{ConnectivityError, ConnectivityResult, PairKey, Population, RealizedEdge};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::info;

#[derive(Debug)]
pub struct OneToOneSequentialConnector {
    partitioned: bool,
    phase: Phase,
    source: Option<Arc<Population>>,
    target: Option<Arc<Population>>,
    /// First source index of the current slice
    offset: usize,
    /// Next free source index across all setups
    consumed: usize,
    cursor: usize,
}

impl Default for OneToOneSequentialConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl OneToOneSequentialConnector {
    /// Strict mode: source and target must have equal length
    pub fn new() -> Self {
        Self {
            partitioned: false,
            phase: Phase::Unbound,
            source: None,
            target: None,
            offset: 0,
            consumed: 0,
            cursor: 0,
        }
    }

    pub fn partitioned() -> Self {
        Self {
            partitioned: true,
            ..Self::new()
        }
    }

    pub fn is_partitioned(&self) -> bool {
        self.partitioned
    }

    /// Source cells not yet assigned to any target
    pub fn remaining(&self) -> usize {
        self.source
            .as_ref()
            .map_or(0, |s| s.len().saturating_sub(self.consumed))
    }

    pub fn share(self) -> SharedOneToOne {
        SharedOneToOne {
            partitioned: self.partitioned,
            inner: Arc::new(Mutex::new(self)),
        }
    }

    fn setup_strict(
        &mut self,
        source: Arc<Population>,
        target: Arc<Population>,
    ) -> ConnectivityResult<()> {
        if source.len() != target.len() {
            return Err(ConnectivityError::Configuration(format!(
                "one-to-one {} -> {} needs equal lengths, got {} and {}",
                source.describe(),
                target.describe(),
                source.len(),
                target.len()
            )));
        }
        if source.same_cells(&target) && !source.is_empty() {
            return Err(ConnectivityError::Configuration(format!(
                "one-to-one on {} would only create self connections",
                source.describe()
            )));
        }
        self.phase.bind("one-to-one connector")?;
        self.offset = 0;
        self.consumed = source.len();
        self.source = Some(source);
        self.target = Some(target);
        Ok(())
    }

    fn setup_partitioned(
        &mut self,
        source: Arc<Population>,
        target: Arc<Population>,
    ) -> ConnectivityResult<()> {
        match self.phase {
            Phase::Unbound | Phase::Exhausted => {}
            Phase::Bound | Phase::Enumerating => {
                return Err(ConnectivityError::Configuration(
                    "partitioned one-to-one set up again before its previous slice was enumerated"
                        .to_string(),
                ));
            }
        }
        if let Some(previous) = &self.source {
            if !previous.same_cells(&source) {
                return Err(ConnectivityError::Configuration(format!(
                    "partitioned one-to-one reused with source {} instead of {}",
                    source.describe(),
                    previous.describe()
                )));
            }
        }
        let end = self.consumed + target.len();
        if end > source.len() {
            return Err(ConnectivityError::Configuration(format!(
                "partitioned one-to-one source {} exhausted: {} of {} cells used, {} more requested by {}",
                source.describe(),
                self.consumed,
                source.len(),
                target.len(),
                target.describe()
            )));
        }
        self.offset = self.consumed;
        self.consumed = end;
        self.source = Some(source);
        self.target = Some(target);
        self.phase = Phase::Bound;
        Ok(())
    }
}

impl ConnectionRule for OneToOneSequentialConnector {
    fn kind(&self) -> ConnectorKind {
        ConnectorKind::OneToOneSequential
    }

    fn setup(
        &mut self,
        source: Arc<Population>,
        target: Arc<Population>,
    ) -> ConnectivityResult<()> {
        if self.partitioned {
            self.setup_partitioned(source, target)
        } else {
            self.setup_strict(source, target)
        }
    }

    fn begin(&mut self) -> ConnectivityResult<()> {
        self.phase.begin("one-to-one connector")?;
        self.cursor = 0;
        Ok(())
    }

    fn next_edge(&mut self) -> Option<RealizedEdge> {
        if self.phase != Phase::Enumerating {
            return None;
        }
        let source = self.source.as_ref()?;
        let target = self.target.as_ref()?;
        if self.cursor >= target.len() {
            info!(
                target: "cortex-connectivity",
                "One-to-one {} -> {}: {} edges (sources {}..{})",
                source.describe(),
                target.describe(),
                target.len(),
                self.offset,
                self.offset + target.len()
            );
            self.phase = Phase::Exhausted;
            return None;
        }
        let k = self.cursor;
        self.cursor += 1;
        let i = self.offset + k;
        Some(RealizedEdge {
            key: PairKey::new(source.id(i), target.id(k)),
            source_index: i,
            target_index: k,
            n_syn: 1,
        })
    }

    fn edge_params(&self) -> EdgeParams {
        EdgeParams::new(ConnectorKind::OneToOneSequential).with("partitioned", self.partitioned)
    }
}

/// Shared handle so a partitioned instance can serve several edge types
#[derive(Debug, Clone)]
pub struct SharedOneToOne {
    inner: Arc<Mutex<OneToOneSequentialConnector>>,
    /// Fixed at construction; readable without the lock
    partitioned: bool,
}

impl SharedOneToOne {
    pub fn is_partitioned(&self) -> bool {
        self.partitioned
    }

    pub fn remaining(&self) -> usize {
        self.inner.lock().remaining()
    }
}

impl ConnectionRule for SharedOneToOne {
    fn kind(&self) -> ConnectorKind {
        ConnectorKind::OneToOneSequential
    }

    fn setup(
        &mut self,
        source: Arc<Population>,
        target: Arc<Population>,
    ) -> ConnectivityResult<()> {
        self.inner.lock().setup(source, target)
    }

    fn begin(&mut self) -> ConnectivityResult<()> {
        self.inner.lock().begin()
    }

    fn next_edge(&mut self) -> Option<RealizedEdge> {
        self.inner.lock().next_edge()
    }

    fn edge_params(&self) -> EdgeParams {
        self.inner.lock().edge_params()
    }
}
