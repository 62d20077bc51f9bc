//! Attribute-filtered query vocabulary for the entity graph.
//!
//! Filters are conjunctions over attribute names: every entry must match for the item to
//! match. A [FilterValue] is either a single value (exact match) or a set of values
//! (match-any). Filters on attributes the item does not carry never match.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use crate::properties::{keys, Edge, Vertex};

/// Neighbor traversal direction relative to the queried vertex. `Both` is the union of
/// `In` and `Out`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    In,
    Out,
    #[default]
    Both,
}

impl Display for Direction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::In => write!(f, "in"),
            Direction::Out => write!(f, "out"),
            Direction::Both => write!(f, "both"),
        }
    }
}

/// A single filter entry: exact match against one value, or match-any against a set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    One(Value),
    Any(Vec<Value>),
}

impl FilterValue {
    pub fn matches(&self, observed: &Value) -> bool {
        match self {
            FilterValue::One(expected) => expected == observed,
            FilterValue::Any(options) => options.iter().any(|expected| expected == observed),
        }
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> FilterValue {
        FilterValue::One(Value::String(value.to_string()))
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> FilterValue {
        FilterValue::One(Value::Bool(value))
    }
}

impl From<Vec<&str>> for FilterValue {
    fn from(values: Vec<&str>) -> FilterValue {
        FilterValue::Any(
            values
                .into_iter()
                .map(|v| Value::String(v.to_string()))
                .collect(),
        )
    }
}

/// Uniform attribute lookup over reserved fields and the open metadata map. Implemented
/// by [Vertex] and [Edge] so that filters treat both kinds of attributes identically.
pub trait Attributed {
    fn attr(&self, key: &str) -> Option<Value>;
}

impl Attributed for Vertex {
    fn attr(&self, key: &str) -> Option<Value> {
        match key {
            keys::VERTEX_ID => Some(Value::String(self.vertex_id.to_string())),
            keys::CATEGORY => Some(Value::String(self.category.to_string())),
            keys::TYPE => Some(Value::String(self.vertex_type.clone())),
            keys::NAME => self.name.clone().map(Value::String),
            keys::STATE => self.state.clone().map(Value::String),
            keys::AGGREGATED_STATE => self
                .aggregated_state
                .map(|state| Value::String(state.to_string())),
            keys::IS_PLACEHOLDER => Some(Value::Bool(self.is_placeholder)),
            keys::IS_DELETED => Some(Value::Bool(self.is_deleted)),
            _ => self.metadata.get(key).cloned(),
        }
    }
}

impl Attributed for Edge {
    fn attr(&self, key: &str) -> Option<Value> {
        match key {
            keys::RELATIONSHIP => Some(Value::String(self.label.clone())),
            keys::IS_DELETED => Some(Value::Bool(self.is_deleted)),
            _ => self.metadata.get(key).cloned(),
        }
    }
}

/// A conjunction of per-attribute filter entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttrFilter(pub BTreeMap<String, FilterValue>);

impl AttrFilter {
    pub fn new() -> AttrFilter {
        AttrFilter::default()
    }

    pub fn with<V: Into<FilterValue>>(mut self, key: &str, value: V) -> AttrFilter {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True when every entry matches an attribute the item actually carries.
    pub fn matches<A: Attributed>(&self, item: &A) -> bool {
        self.0.iter().all(|(key, expected)| {
            item.attr(key)
                .map(|observed| expected.matches(&observed))
                .unwrap_or(false)
        })
    }
}

impl<const N: usize> From<[(&str, FilterValue); N]> for AttrFilter {
    fn from(entries: [(&str, FilterValue); N]) -> AttrFilter {
        AttrFilter(
            entries
                .into_iter()
                .map(|(key, value)| (key.to_string(), value))
                .collect(),
        )
    }
}
