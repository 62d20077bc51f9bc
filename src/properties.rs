/// [crate::properties] contains the basic building blocks for assembling and manipulating
/// [crate::graph::EntityGraph]s and associated structures.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{
    collections::BTreeMap,
    fmt::{Display, Formatter},
    hash::{Hash, Hasher},
};

use crate::{error::VigilError, state::ResourceState};

/// Separator used when deriving a [VertexId] from its key fields. The same physical entity
/// always yields the same id, across data sources and across restarts.
pub const KEY_SEPARATOR: char = ':';

/// Reserved vertex/edge attribute names. These are promoted to named struct fields on
/// [Vertex]/[Edge] but remain addressable through [crate::query::Attributed] lookups so
/// that attribute filters treat reserved and open keys uniformly.
pub mod keys {
    pub const VERTEX_ID: &str = "vertex_id";
    pub const CATEGORY: &str = "category";
    pub const TYPE: &str = "type";
    pub const NAME: &str = "name";
    pub const STATE: &str = "state";
    pub const AGGREGATED_STATE: &str = "aggregated_state";
    pub const IS_PLACEHOLDER: &str = "is_placeholder";
    pub const IS_DELETED: &str = "is_deleted";
    pub const RELATIONSHIP: &str = "relationship";
}

/// Well-known edge relationship labels.
pub mod labels {
    pub const CONTAINS: &str = "contains";
    pub const ON: &str = "on";
    pub const ATTACHED: &str = "attached";
    pub const MONITORS: &str = "monitors";

    /// Labels whose edges carry health-state influence between their endpoints. State
    /// propagation walks these and only these.
    pub const STATE_INFLUENCE: [&str; 3] = [CONTAINS, ON, ATTACHED];
}

/// Coarse entity kind. Resources are the monitored infrastructure itself; alarms are
/// externally reported conditions about a resource.
#[derive(
    Debug, Default, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "lowercase")]
pub enum EntityCategory {
    #[default]
    Resource,
    Alarm,
}

impl EntityCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityCategory::Resource => "resource",
            EntityCategory::Alarm => "alarm",
        }
    }
}

impl Display for EntityCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for EntityCategory {
    type Error = VigilError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.to_ascii_lowercase().as_str() {
            "resource" => Ok(EntityCategory::Resource),
            "alarm" => Ok(EntityCategory::Alarm),
            other => Err(VigilError::Serialization(format!(
                "Unknown entity category '{other}'"
            ))),
        }
    }
}

/// Globally unique vertex identifier, deterministically derived from
/// `(category, type, natural-key)` joined by [KEY_SEPARATOR].
#[derive(Clone, Debug, Serialize, Deserialize, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct VertexId(String);

impl VertexId {
    pub fn from_key_fields(
        category: EntityCategory,
        vertex_type: &str,
        natural_key: &str,
    ) -> VertexId {
        VertexId(format!(
            "{}{KEY_SEPARATOR}{}{KEY_SEPARATOR}{}",
            category.as_str(),
            vertex_type,
            natural_key
        ))
    }

    /// The id split back into its key fields.
    pub fn key_fields(&self) -> Vec<&str> {
        self.0.split(KEY_SEPARATOR).collect()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for VertexId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for VertexId {
    fn from(id: &str) -> VertexId {
        VertexId(id.to_string())
    }
}

impl From<String> for VertexId {
    fn from(id: String) -> VertexId {
        VertexId(id)
    }
}

impl From<&VertexId> for String {
    fn from(val: &VertexId) -> Self {
        val.0.clone()
    }
}

/// One entity in the topology graph: a compute host, an instance, a network port, an
/// availability zone, a monitoring check.
///
/// Reserved, well-known attributes are promoted to typed fields; source-specific extras
/// live in the open `metadata` map. Identity is `vertex_id`; two vertices with the same
/// id describe the same physical entity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Vertex {
    pub vertex_id: VertexId,
    pub category: EntityCategory,
    #[serde(rename = "type")]
    pub vertex_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Raw state string as last reported by the data source.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    /// Normalized state combined with connected alarm opinions. Maintained by the
    /// processor, never by transformers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregated_state: Option<ResourceState>,
    #[serde(default)]
    pub is_placeholder: bool,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_timestamp: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, Value>,
}

impl Hash for Vertex {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Hash based on vertex_id, two vertices with the same id _should_ be the same entity
        self.vertex_id.hash(state);
    }
}

impl Eq for Vertex {}

impl Vertex {
    pub fn new(category: EntityCategory, vertex_type: &str, natural_key: &str) -> Vertex {
        Vertex {
            vertex_id: VertexId::from_key_fields(category, vertex_type, natural_key),
            category,
            vertex_type: vertex_type.to_string(),
            name: None,
            state: None,
            aggregated_state: None,
            is_placeholder: false,
            is_deleted: false,
            sample_timestamp: None,
            update_timestamp: None,
            metadata: BTreeMap::default(),
        }
    }

    pub fn with_name(mut self, name: &str) -> Vertex {
        self.name = Some(name.to_string());
        self
    }

    pub fn with_state(mut self, state: &str) -> Vertex {
        self.state = Some(state.to_string());
        self
    }

    pub fn with_sample_timestamp(mut self, timestamp: DateTime<Utc>) -> Vertex {
        self.sample_timestamp = Some(timestamp);
        self
    }

    pub fn with_metadata(mut self, key: &str, value: Value) -> Vertex {
        self.metadata.insert(key.to_string(), value);
        self
    }

    pub fn is_live(&self) -> bool {
        !self.is_deleted
    }
}

impl Display for Vertex {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Vertex({}{})",
            self.vertex_id,
            if self.is_placeholder {
                ", placeholder"
            } else {
                ""
            }
        )
    }
}

/// Composite edge identity. Multiple edges between the same ordered vertex pair are
/// permitted when their labels differ.
#[derive(Debug, Clone, Serialize, Deserialize, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct EdgeKey {
    pub source_id: VertexId,
    pub target_id: VertexId,
    pub label: String,
}

impl Display for EdgeKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -{}-> {}", self.source_id, self.label, self.target_id)
    }
}

/// A labeled, directed relationship between two vertices. Edges reference vertices by id
/// only; the [crate::graph::EntityGraph] is the sole authority resolving id to vertex.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Edge {
    pub source_id: VertexId,
    pub target_id: VertexId,
    pub label: String,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, Value>,
}

impl Edge {
    pub fn new(source_id: VertexId, target_id: VertexId, label: &str) -> Edge {
        Edge {
            source_id,
            target_id,
            label: label.to_string(),
            is_deleted: false,
            update_timestamp: None,
            metadata: BTreeMap::default(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: Value) -> Edge {
        self.metadata.insert(key.to_string(), value);
        self
    }

    pub fn key(&self) -> EdgeKey {
        EdgeKey {
            source_id: self.source_id.clone(),
            target_id: self.target_id.clone(),
            label: self.label.clone(),
        }
    }

    /// Whether this edge's relationship carries health-state influence between its
    /// endpoints.
    pub fn influences_state(&self) -> bool {
        labels::STATE_INFLUENCE.contains(&self.label.as_str())
    }

    pub fn is_live(&self) -> bool {
        !self.is_deleted
    }

    /// The endpoint opposite to `id`, or `None` when `id` is not an endpoint.
    pub fn other_endpoint(&self, id: &VertexId) -> Option<&VertexId> {
        if &self.source_id == id {
            Some(&self.target_id)
        } else if &self.target_id == id {
            Some(&self.source_id)
        } else {
            None
        }
    }
}

impl Display for Edge {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Edge({})", self.key())
    }
}
