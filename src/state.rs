//! State normalization and aggregation.
//!
//! Every data source reports entity health in its own vocabulary ("ACTIVE", "up",
//! "SHUTOFF", "CRITICAL", ...). The [StateNormalizer] maps those raw strings through a
//! per-(category, type) [StateTable] into the canonical [ResourceState] vocabulary, and
//! combines multiple opinions about one entity into a single aggregated state by severity.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use crate::properties::EntityCategory;

/// Canonical health-state vocabulary, totally ordered by severity.
///
/// `Undefined` ranks lowest: an unknown opinion never outranks a known one. Aggregation
/// always includes the entity's own state, so an entity with only unknown inputs stays
/// `Undefined` rather than being masked.
#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResourceState {
    #[default]
    Undefined,
    Running,
    Suboptimal,
    Suspended,
    Error,
}

impl ResourceState {
    /// Severity rank. Gaps leave room for vocabulary growth without reordering.
    pub fn severity(&self) -> u8 {
        match self {
            ResourceState::Undefined => 0,
            ResourceState::Running => 10,
            ResourceState::Suboptimal => 20,
            ResourceState::Suspended => 30,
            ResourceState::Error => 40,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceState::Undefined => "UNDEFINED",
            ResourceState::Running => "RUNNING",
            ResourceState::Suboptimal => "SUBOPTIMAL",
            ResourceState::Suspended => "SUSPENDED",
            ResourceState::Error => "ERROR",
        }
    }
}

impl PartialOrd for ResourceState {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ResourceState {
    fn cmp(&self, other: &Self) -> Ordering {
        self.severity().cmp(&other.severity())
    }
}

impl Display for ResourceState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Raw-status lookup table for one (category, type) pair. Raw strings are matched
/// case-insensitively; anything absent normalizes to [ResourceState::Undefined].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateTable(pub BTreeMap<String, ResourceState>);

impl StateTable {
    pub fn lookup(&self, raw: &str) -> ResourceState {
        self.0
            .get(&raw.to_ascii_lowercase())
            .copied()
            .unwrap_or_default()
    }
}

impl<const N: usize> From<[(&str, ResourceState); N]> for StateTable {
    fn from(entries: [(&str, ResourceState); N]) -> StateTable {
        StateTable(
            entries
                .into_iter()
                .map(|(raw, state)| (raw.to_ascii_lowercase(), state))
                .collect(),
        )
    }
}

/// Key addressing one normalization table.
pub type TableKey = (EntityCategory, String);

/// Built-in tables for the stock data sources. Configuration can extend or replace
/// these per deployment, see [crate::config::StateConfig].
static DEFAULT_TABLES: Lazy<BTreeMap<TableKey, StateTable>> = Lazy::new(|| {
    use ResourceState::*;
    BTreeMap::from([
        (
            (EntityCategory::Resource, "host".to_string()),
            StateTable::from([("up", Running), ("down", Error), ("maintenance", Suspended)]),
        ),
        (
            (EntityCategory::Resource, "instance".to_string()),
            StateTable::from([
                ("active", Running),
                ("available", Running),
                ("paused", Suspended),
                ("suspended", Suspended),
                ("shutoff", Suspended),
                ("rescued", Suboptimal),
                ("error", Error),
            ]),
        ),
        (
            (EntityCategory::Resource, "zone".to_string()),
            StateTable::from([("available", Running), ("unavailable", Error)]),
        ),
        (
            (EntityCategory::Resource, "port".to_string()),
            StateTable::from([("active", Running), ("down", Error), ("build", Suboptimal)]),
        ),
        (
            (EntityCategory::Alarm, "nagios-service".to_string()),
            StateTable::from([
                ("ok", Running),
                ("warning", Suboptimal),
                ("unknown", Undefined),
                ("critical", Error),
            ]),
        ),
    ])
});

/// Maps raw data-source status strings to the canonical vocabulary and combines
/// multiple opinions about one entity by severity.
///
/// Pure and deterministic: same inputs, same result, regardless of call order or
/// repetition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateNormalizer {
    tables: BTreeMap<TableKey, StateTable>,
}

impl StateNormalizer {
    pub fn new(tables: BTreeMap<TableKey, StateTable>) -> StateNormalizer {
        StateNormalizer { tables }
    }

    pub fn with_defaults() -> StateNormalizer {
        StateNormalizer {
            tables: DEFAULT_TABLES.clone(),
        }
    }

    pub fn insert_table(&mut self, category: EntityCategory, vertex_type: &str, table: StateTable) {
        self.tables.insert((category, vertex_type.to_string()), table);
    }

    /// Normalize one raw status string. Unknown types and unknown raw values map to
    /// [ResourceState::Undefined] rather than failing.
    pub fn normalize(
        &self,
        category: EntityCategory,
        vertex_type: &str,
        raw_state: &str,
    ) -> ResourceState {
        self.tables
            .get(&(category, vertex_type.to_string()))
            .map(|table| table.lookup(raw_state))
            .unwrap_or_default()
    }

    /// Combine an entity's own normalized state with the normalized states of the
    /// conditions reported against it: the most severe wins, own state included. An
    /// empty condition set yields the own state unchanged.
    pub fn aggregate<I>(&self, own: ResourceState, conditions: I) -> ResourceState
    where
        I: IntoIterator<Item = ResourceState>,
    {
        conditions.into_iter().fold(own, Ord::max)
    }
}
