// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Connection rules.

Each rule decides, pair by pair, whether a synapse exists:
- Unidirectional: independent Bernoulli trial per ordered pair
- Reciprocal: joint forward/backward decision with a target reciprocal rate
- OneToOneSequential: k-th source to k-th target
- GapJunction: symmetric electrical coupling inside one population

Every rule follows the same lifecycle: `setup` binds populations once,
`decide_all` yields the realized edges once, in row-major order
(source-major, then target). A second enumeration is an error.
*/

mod gap_junction;
mod one_to_one;
mod reciprocal;
mod unidirectional;

pub use gap_junction::GapJunction;
pub use one_to_one::{OneToOneSequentialConnector, SharedOneToOne};
pub use reciprocal::{
    Direction, PairDecision, ReciprocalConnector, ReciprocalStats, ReciprocalVars, ReciprocalView,
    SharedReciprocal,
};
pub use unidirectional::UnidirectionConnector;

use crate::distance::{DistanceGate, PairTable};
use crate::properties::{EdgePropertyRule, Placement};
use crate::types::{ConnectivityError, ConnectivityResult, Population, RealizedEdge};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Tag of a rule variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectorKind {
    Unidirectional,
    Reciprocal,
    OneToOneSequential,
    GapJunction,
}

/// Static metadata a rule hands to the persistence layer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgeParams {
    pub connector: ConnectorKind,
    pub is_gap_junction: bool,
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl EdgeParams {
    pub(crate) fn new(connector: ConnectorKind) -> Self {
        Self {
            connector,
            is_gap_junction: false,
            extra: BTreeMap::new(),
        }
    }

    pub(crate) fn with(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.extra.insert(key.to_string(), value.into());
        self
    }

    /// Merge the edge type's weight function and placement defaults.
    ///
    /// A two-mode placement records its first mode as the default section;
    /// per-edge columns carry the sampled one.
    pub fn with_properties(self, rule: &EdgePropertyRule) -> Self {
        let params = self.with("weight_function", rule.weight.function_name());
        match rule.placement {
            Placement::Fixed {
                section_id,
                section_pos,
            } => params
                .with("afferent_section_id", section_id)
                .with("afferent_section_pos", section_pos),
            Placement::TwoMode { p, sec_id, sec_x } => params
                .with("afferent_section_id", sec_id.0)
                .with("afferent_section_pos", sec_x.0)
                .with("placement_p", p)
                .with("sec_id", vec![sec_id.0, sec_id.1])
                .with("sec_x", vec![sec_x.0, sec_x.1]),
        }
    }
}

/// Probability of a pair, constant or a function of soma distance
#[derive(Clone)]
pub enum PairProbability {
    Constant(f64),
    ByDistance(Arc<dyn Fn(f64) -> f64 + Send + Sync>),
}

impl std::fmt::Debug for PairProbability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PairProbability::Constant(p) => write!(f, "Constant({})", p),
            PairProbability::ByDistance(_) => write!(f, "ByDistance(<fn>)"),
        }
    }
}

impl From<f64> for PairProbability {
    fn from(p: f64) -> Self {
        PairProbability::Constant(p)
    }
}

impl PairProbability {
    pub fn by_distance(f: impl Fn(f64) -> f64 + Send + Sync + 'static) -> Self {
        PairProbability::ByDistance(Arc::new(f))
    }

    pub fn constant(&self) -> Option<f64> {
        match self {
            PairProbability::Constant(p) => Some(*p),
            PairProbability::ByDistance(_) => None,
        }
    }

    pub(crate) fn validate(&self, name: &str) -> ConnectivityResult<()> {
        if let PairProbability::Constant(p) = self {
            if !(0.0..=1.0).contains(p) {
                return Err(ConnectivityError::Configuration(format!(
                    "{} must lie in [0, 1], got {}",
                    name, p
                )));
            }
        }
        Ok(())
    }

    pub(crate) fn needs_distance(&self) -> bool {
        matches!(self, PairProbability::ByDistance(_))
    }

    /// Evaluate for one pair. Distance-dependent values are clamped to [0, 1].
    pub(crate) fn at(&self, distance: Option<f64>) -> f64 {
        match self {
            PairProbability::Constant(p) => *p,
            PairProbability::ByDistance(f) => f(distance.unwrap_or(f64::NAN)).clamp(0.0, 1.0),
        }
    }

    pub(crate) fn to_json(&self) -> serde_json::Value {
        match self {
            PairProbability::Constant(p) => serde_json::json!(p),
            PairProbability::ByDistance(_) => serde_json::json!("distance-dependent"),
        }
    }
}

/// Shared decision contract consumed by the assembly layer
pub trait ConnectionRule {
    fn kind(&self) -> ConnectorKind;

    /// Bind source/target populations and precompute per-pair data
    fn setup(&mut self, source: Arc<Population>, target: Arc<Population>)
        -> ConnectivityResult<()>;

    /// Start enumeration; fails when unbound or already enumerated
    fn begin(&mut self) -> ConnectivityResult<()>;

    /// Advance the pair cursor to the next realized edge
    fn next_edge(&mut self) -> Option<RealizedEdge>;

    fn edge_params(&self) -> EdgeParams;

    /// Lazy, finite, non-restartable stream of realized edges
    fn decide_all(&mut self) -> ConnectivityResult<EdgeStream<'_, Self>>
    where
        Self: Sized,
    {
        self.begin()?;
        Ok(EdgeStream { rule: self })
    }
}

/// Iterator over the edges a rule realizes
pub struct EdgeStream<'a, R: ConnectionRule + ?Sized> {
    rule: &'a mut R,
}

impl<'a, R: ConnectionRule + ?Sized> Iterator for EdgeStream<'a, R> {
    type Item = RealizedEdge;

    fn next(&mut self) -> Option<Self::Item> {
        self.rule.next_edge()
    }
}

/// Tagged variant over the four rule kinds
pub enum Connector {
    Unidirectional(UnidirectionConnector),
    Reciprocal(ReciprocalView),
    OneToOne(SharedOneToOne),
    GapJunction(GapJunction),
}

impl Connector {
    /// Handle for a mirrored edge type sharing this rule's state.
    ///
    /// A reciprocal forward view yields its backward view; a partitioned
    /// one-to-one connector yields another handle on the same instance.
    pub fn reuse(&self) -> ConnectivityResult<Connector> {
        match self {
            Connector::Reciprocal(view) if view.direction() == Direction::Forward => {
                Ok(Connector::Reciprocal(view.shared().backward()))
            }
            Connector::Reciprocal(_) => Err(ConnectivityError::Configuration(
                "the backward view of a reciprocal connector cannot be reused again".to_string(),
            )),
            Connector::OneToOne(shared) if shared.is_partitioned() => {
                Ok(Connector::OneToOne(shared.clone()))
            }
            Connector::OneToOne(_) => Err(ConnectivityError::Configuration(
                "only a partitioned one-to-one connector can be reused".to_string(),
            )),
            Connector::Unidirectional(_) | Connector::GapJunction(_) => {
                Err(ConnectivityError::Configuration(format!(
                    "{:?} connectors carry no shared state and cannot be reused",
                    self.kind()
                )))
            }
        }
    }

    /// Calibrated parameters when this is a reciprocal view
    pub fn reciprocal_vars(&self) -> Option<(ReciprocalVars, Direction)> {
        match self {
            Connector::Reciprocal(view) => Some((view.shared().vars(), view.direction())),
            _ => None,
        }
    }
}

impl ConnectionRule for Connector {
    fn kind(&self) -> ConnectorKind {
        match self {
            Connector::Unidirectional(c) => c.kind(),
            Connector::Reciprocal(c) => c.kind(),
            Connector::OneToOne(c) => c.kind(),
            Connector::GapJunction(c) => c.kind(),
        }
    }

    fn setup(
        &mut self,
        source: Arc<Population>,
        target: Arc<Population>,
    ) -> ConnectivityResult<()> {
        match self {
            Connector::Unidirectional(c) => c.setup(source, target),
            Connector::Reciprocal(c) => c.setup(source, target),
            Connector::OneToOne(c) => c.setup(source, target),
            Connector::GapJunction(c) => c.setup(source, target),
        }
    }

    fn begin(&mut self) -> ConnectivityResult<()> {
        match self {
            Connector::Unidirectional(c) => c.begin(),
            Connector::Reciprocal(c) => c.begin(),
            Connector::OneToOne(c) => c.begin(),
            Connector::GapJunction(c) => c.begin(),
        }
    }

    fn next_edge(&mut self) -> Option<RealizedEdge> {
        match self {
            Connector::Unidirectional(c) => c.next_edge(),
            Connector::Reciprocal(c) => c.next_edge(),
            Connector::OneToOne(c) => c.next_edge(),
            Connector::GapJunction(c) => c.next_edge(),
        }
    }

    fn edge_params(&self) -> EdgeParams {
        match self {
            Connector::Unidirectional(c) => c.edge_params(),
            Connector::Reciprocal(c) => c.edge_params(),
            Connector::OneToOne(c) => c.edge_params(),
            Connector::GapJunction(c) => c.edge_params(),
        }
    }
}

/// Enumeration lifecycle of a rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    Unbound,
    Bound,
    Enumerating,
    Exhausted,
}

impl Phase {
    pub(crate) fn begin(&mut self, what: &str) -> ConnectivityResult<()> {
        match *self {
            Phase::Bound => {
                *self = Phase::Enumerating;
                Ok(())
            }
            Phase::Unbound => Err(ConnectivityError::NotBound(what.to_string())),
            Phase::Enumerating | Phase::Exhausted => {
                Err(ConnectivityError::AlreadyEnumerated(what.to_string()))
            }
        }
    }

    pub(crate) fn bind(&mut self, what: &str) -> ConnectivityResult<()> {
        if *self != Phase::Unbound {
            return Err(ConnectivityError::Configuration(format!(
                "{} is already bound to populations",
                what
            )));
        }
        *self = Phase::Bound;
        Ok(())
    }
}

/// Populations plus precomputed pair data
#[derive(Debug, Clone)]
pub(crate) struct Binding {
    pub source: Arc<Population>,
    pub target: Arc<Population>,
    pub table: PairTable,
}

impl Binding {
    pub(crate) fn new(
        source: Arc<Population>,
        target: Arc<Population>,
        gate: Option<&DistanceGate>,
        needs_distance: bool,
    ) -> ConnectivityResult<Self> {
        let table = PairTable::build(&source, &target, gate, needs_distance)?;
        Ok(Self {
            source,
            target,
            table,
        })
    }

    pub(crate) fn describe(&self) -> String {
        format!("{} -> {}", self.source.describe(), self.target.describe())
    }

    /// Free pair matrices; populations stay for logging and edge keys
    pub(crate) fn release(&mut self) {
        self.table.release();
    }

    pub(crate) fn edge(&self, i: usize, j: usize, n_syn: u32) -> RealizedEdge {
        RealizedEdge {
            key: crate::types::PairKey::new(self.source.id(i), self.target.id(j)),
            source_index: i,
            target_index: j,
            n_syn,
        }
    }
}

/// Row-major cursor over an (rows x cols) pair grid
#[derive(Debug, Clone, Default)]
pub(crate) struct PairCursor {
    row: usize,
    col: usize,
    rows: usize,
    cols: usize,
}

impl PairCursor {
    pub(crate) fn new(rows: usize, cols: usize) -> Self {
        Self {
            row: 0,
            col: 0,
            rows,
            cols,
        }
    }

    pub(crate) fn advance(&mut self) -> Option<(usize, usize)> {
        if self.cols == 0 || self.row >= self.rows {
            return None;
        }
        let pair = (self.row, self.col);
        self.col += 1;
        if self.col == self.cols {
            self.col = 0;
            self.row += 1;
        }
        Some(pair)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_row_major() {
        let mut cursor = PairCursor::new(2, 3);
        let pairs: Vec<_> = std::iter::from_fn(|| cursor.advance()).collect();
        assert_eq!(pairs, vec![(0, 0), (0, 1), (0, 2), (1, 0), (1, 1), (1, 2)]);
        assert!(PairCursor::new(3, 0).advance().is_none());
    }

    #[test]
    fn test_phase_transitions() {
        let mut phase = Phase::Unbound;
        assert!(matches!(
            phase.begin("x"),
            Err(ConnectivityError::NotBound(_))
        ));
        phase.bind("x").unwrap();
        assert!(phase.bind("x").is_err());
        phase.begin("x").unwrap();
        assert!(matches!(
            phase.begin("x"),
            Err(ConnectivityError::AlreadyEnumerated(_))
        ));
    }

    #[test]
    fn test_params_carry_property_metadata() {
        use crate::properties::{Delay, WeightRule};

        let fixed = EdgePropertyRule {
            delay: Delay::Fixed { delay: 2.0 },
            placement: Placement::Fixed {
                section_id: 0,
                section_pos: 0.5,
            },
            weight: WeightRule::Constant { syn_weight: 1.0 },
        };
        let params = EdgeParams::new(ConnectorKind::Unidirectional)
            .with("p", 0.1)
            .with_properties(&fixed);
        assert_eq!(params.extra["weight_function"], "constant_weight");
        assert_eq!(params.extra["afferent_section_id"], 0);
        assert_eq!(params.extra["afferent_section_pos"], 0.5);
        assert_eq!(params.extra["p"], 0.1);

        let two_mode = EdgePropertyRule {
            placement: Placement::excitatory_pair(),
            weight: WeightRule::lognormal(0.5, 0.2),
            ..fixed
        };
        let params = EdgeParams::new(ConnectorKind::Reciprocal).with_properties(&two_mode);
        assert_eq!(params.extra["weight_function"], "lognormal_weight");
        assert_eq!(params.extra["afferent_section_id"], 1);
        assert_eq!(params.extra["sec_id"], serde_json::json!([1, 2]));
        assert_eq!(params.extra["sec_x"], serde_json::json!([0.4, 0.6]));
        assert_eq!(params.extra["placement_p"], 0.9);
    }

    #[test]
    fn test_probability_validation() {
        assert!(PairProbability::Constant(1.2).validate("p").is_err());
        assert!(PairProbability::Constant(0.3).validate("p").is_ok());
        let p = PairProbability::by_distance(|d| 1.0 - d / 100.0);
        assert_eq!(p.at(Some(50.0)), 0.5);
        assert_eq!(p.at(Some(500.0)), 0.0);
    }
}
