//! Entity Transformer contract.
//!
//! Transformers are the per-data-source collaborators that normalize a vendor event into
//! the graph's canonical representation: one vertex plus the (neighbor, edge) pairs it
//! asserts. The core never implements vendor logic; it consumes this interface and the
//! output shapes below. Concrete transformers live with their drivers, outside this
//! crate (the test suite carries mock ones).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::{
    error::VigilError,
    event::{EventAction, ExternalEvent},
    properties::{Edge, EntityCategory, Vertex, VertexId},
};

/// A neighbor assertion: the neighbor vertex (possibly a placeholder) and the edge
/// connecting it to the event's primary vertex.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    pub vertex: Vertex,
    pub edge: Edge,
}

impl Neighbor {
    pub fn new(vertex: Vertex, edge: Edge) -> Neighbor {
        Neighbor { vertex, edge }
    }
}

/// Transformer output for one event: the primary vertex, the action, and the ordered
/// neighbor assertions.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityWrapper {
    pub vertex: Vertex,
    pub action: EventAction,
    pub neighbors: Vec<Neighbor>,
}

impl EntityWrapper {
    pub fn new(vertex: Vertex, action: EventAction, neighbors: Vec<Neighbor>) -> EntityWrapper {
        EntityWrapper {
            vertex,
            action,
            neighbors,
        }
    }
}

/// Seed fields for a placeholder vertex: only the natural key and the observation time
/// are known when a neighbor is referenced before its own defining event arrives.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaceholderSeed {
    pub natural_key: String,
    pub sample_timestamp: DateTime<Utc>,
}

/// Builds the minimally-populated vertex for an entity that has only been referenced as
/// a neighbor so far. Identity fields are fully derived, so the placeholder's id matches
/// the full vertex that will later replace it.
pub fn placeholder_vertex(
    category: EntityCategory,
    vertex_type: &str,
    seed: &PlaceholderSeed,
) -> Vertex {
    Vertex {
        name: Some(seed.natural_key.clone()),
        is_placeholder: true,
        sample_timestamp: Some(seed.sample_timestamp),
        ..Vertex::new(category, vertex_type, &seed.natural_key)
    }
}

/// Per-data-source normalization contract consumed by the
/// [crate::processor::Processor].
pub trait Transformer: Send + Sync {
    /// Normalize a raw event into the canonical wrapper. Failures mean the event is
    /// malformed; the processor drops it and continues.
    fn transform(&self, event: &ExternalEvent) -> Result<EntityWrapper, VigilError>;

    /// Derive the primary vertex id without performing a full transform.
    fn extract_key(&self, event: &ExternalEvent) -> Result<VertexId, VigilError>;

    /// Build a placeholder for an entity of this transformer's kind referenced by a
    /// neighbor assertion.
    fn create_placeholder_vertex(&self, seed: &PlaceholderSeed) -> Vertex;

    /// The vertex types this data source asserts. Full-snapshot reconciliation treats
    /// known vertices of these types that a snapshot batch did not assert as implicitly
    /// deleted.
    fn entity_types(&self) -> &[&str];
}

/// Transformers keyed by datasource name, as registered with the processor.
pub type TransformerRegistry = BTreeMap<String, Box<dyn Transformer>>;
