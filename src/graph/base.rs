//! EntityGraph: the owned topology store.
//!
//! A labeled directed multigraph of [Vertex] and [Edge] records with attribute-filtered
//! queries. Every read returns a detached copy of the stored item; only an explicit
//! `update_*` call commits a change. `copy()` yields an independent deep snapshot.

use petgraph::{
    graph::NodeIndex,
    stable_graph::StableDiGraph,
    visit::EdgeRef,
    Direction as PetDirection,
};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};

use crate::{
    error::VigilError,
    properties::{Edge, EdgeKey, Vertex, VertexId},
    query::{AttrFilter, Direction},
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityGraph {
    name: String,
    vertices: BTreeMap<VertexId, Vertex>,
    relations: StableDiGraph<VertexId, Edge>,
    id_to_index: BTreeMap<VertexId, NodeIndex>,
}

impl fmt::Display for EntityGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "EntityGraph({}: {} vertices, {} edges)",
            self.name,
            self.num_vertices(),
            self.num_edges()
        )
    }
}

impl EntityGraph {
    pub fn new(name: &str) -> EntityGraph {
        EntityGraph {
            name: name.to_string(),
            vertices: BTreeMap::default(),
            relations: StableDiGraph::default(),
            id_to_index: BTreeMap::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Insert a new vertex. Fails with [VigilError::DuplicateKey] when a live
    /// (non-tombstoned) vertex already holds the id; an `update_vertex` must be used
    /// instead. Re-adding over a tombstone replaces it, keeping the node's edges.
    pub fn add_vertex(&mut self, vertex: Vertex) -> Result<(), VigilError> {
        match self.vertices.get(&vertex.vertex_id) {
            Some(stored) if stored.is_live() => Err(VigilError::DuplicateKey(format!(
                "vertex {} already exists",
                vertex.vertex_id
            ))),
            Some(_) => {
                self.vertices.insert(vertex.vertex_id.clone(), vertex);
                Ok(())
            }
            None => {
                let index = self.relations.add_node(vertex.vertex_id.clone());
                self.id_to_index.insert(vertex.vertex_id.clone(), index);
                self.vertices.insert(vertex.vertex_id.clone(), vertex);
                Ok(())
            }
        }
    }

    /// Replace the stored properties of an existing vertex. Previously issued snapshots
    /// and previously returned read copies are unaffected.
    pub fn update_vertex(&mut self, vertex: Vertex) -> Result<(), VigilError> {
        match self.vertices.get_mut(&vertex.vertex_id) {
            Some(stored) => {
                *stored = vertex;
                Ok(())
            }
            None => Err(VigilError::NotFound(format!(
                "vertex {} not in graph",
                vertex.vertex_id
            ))),
        }
    }

    /// Detached copy of the stored vertex, or `None` when missing or purged.
    /// Tombstoned-but-not-purged vertices are returned; callers filter on
    /// `is_deleted` when they only want live items.
    pub fn get_vertex(&self, vertex_id: &VertexId) -> Option<Vertex> {
        self.vertices.get(vertex_id).cloned()
    }

    /// Physical removal of the vertex and every edge touching it. Independent of
    /// tombstoning, which is a processor-level convention layered on top.
    pub fn remove_vertex(&mut self, vertex_id: &VertexId) -> Result<(), VigilError> {
        if self.vertices.remove(vertex_id).is_none() {
            return Err(VigilError::NotFound(format!(
                "vertex {vertex_id} not in graph"
            )));
        }
        if let Some(index) = self.id_to_index.remove(vertex_id) {
            self.relations.remove_node(index);
        }
        Ok(())
    }

    /// Insert a new edge. Both endpoints must already be present; fails with
    /// [VigilError::DuplicateKey] when a live edge with the same
    /// `(source, target, label)` identity exists.
    pub fn add_edge(&mut self, edge: Edge) -> Result<(), VigilError> {
        let key = edge.key();
        if let Some(index) = self.edge_index(&key) {
            if self.relations[index].is_live() {
                return Err(VigilError::DuplicateKey(format!("edge {key} already exists")));
            }
            // Tombstoned edge under the same key: replace in place.
            self.relations[index] = edge;
            return Ok(());
        }
        let source = self.node_index(&edge.source_id)?;
        let target = self.node_index(&edge.target_id)?;
        self.relations.add_edge(source, target, edge);
        Ok(())
    }

    /// Replace the stored properties of an existing edge.
    pub fn update_edge(&mut self, edge: Edge) -> Result<(), VigilError> {
        let key = edge.key();
        match self.edge_index(&key) {
            Some(index) => {
                self.relations[index] = edge;
                Ok(())
            }
            None => Err(VigilError::NotFound(format!("edge {key} not in graph"))),
        }
    }

    /// Detached copy of the edge with the given composite identity. A missing endpoint
    /// or unknown label yields `None` rather than an error.
    pub fn get_edge(&self, source_id: &VertexId, target_id: &VertexId, label: &str) -> Option<Edge> {
        let key = EdgeKey {
            source_id: source_id.clone(),
            target_id: target_id.clone(),
            label: label.to_string(),
        };
        self.edge_index(&key).map(|idx| self.relations[idx].clone())
    }

    /// Physical removal of the edge.
    pub fn remove_edge(&mut self, key: &EdgeKey) -> Result<(), VigilError> {
        match self.edge_index(key) {
            Some(index) => {
                self.relations.remove_edge(index);
                Ok(())
            }
            None => Err(VigilError::NotFound(format!("edge {key} not in graph"))),
        }
    }

    /// Every edge touching the vertex, in either direction, tombstoned included.
    pub fn edges_of(&self, vertex_id: &VertexId) -> Vec<Edge> {
        let Some(index) = self.id_to_index.get(vertex_id) else {
            return Vec::new();
        };
        let mut edges: Vec<Edge> = self
            .relations
            .edges_directed(*index, PetDirection::Outgoing)
            .chain(self.relations.edges_directed(*index, PetDirection::Incoming))
            .map(|edge| edge.weight().clone())
            .collect();
        edges.sort_by(|a, b| a.key().cmp(&b.key()));
        edges.dedup_by(|a, b| a.key() == b.key());
        edges
    }

    /// Distinct neighbor vertices reachable via one edge satisfying both filters and
    /// the direction constraint. No traversal beyond one hop.
    pub fn neighbors(
        &self,
        vertex_id: &VertexId,
        vertex_attr_filter: Option<&AttrFilter>,
        edge_attr_filter: Option<&AttrFilter>,
        direction: Direction,
    ) -> Vec<Vertex> {
        let Some(index) = self.id_to_index.get(vertex_id) else {
            return Vec::new();
        };
        let mut directions = Vec::with_capacity(2);
        match direction {
            Direction::Out => directions.push(PetDirection::Outgoing),
            Direction::In => directions.push(PetDirection::Incoming),
            Direction::Both => {
                directions.push(PetDirection::Outgoing);
                directions.push(PetDirection::Incoming);
            }
        }

        let mut neighbor_ids = BTreeSet::new();
        for dir in directions {
            for edge in self.relations.edges_directed(*index, dir) {
                if let Some(filter) = edge_attr_filter {
                    if !filter.matches(edge.weight()) {
                        continue;
                    }
                }
                let neighbor_index = match dir {
                    PetDirection::Outgoing => edge.target(),
                    PetDirection::Incoming => edge.source(),
                };
                neighbor_ids.insert(self.relations[neighbor_index].clone());
            }
        }

        neighbor_ids
            .into_iter()
            .filter_map(|id| self.vertices.get(&id))
            .filter(|vertex| {
                vertex_attr_filter
                    .map(|filter| filter.matches(*vertex))
                    .unwrap_or(true)
            })
            .cloned()
            .collect()
    }

    /// All live (non-tombstoned) vertices matching the filter.
    pub fn get_vertices(&self, vertex_attr_filter: Option<&AttrFilter>) -> Vec<Vertex> {
        self.vertices
            .values()
            .filter(|vertex| vertex.is_live())
            .filter(|vertex| {
                vertex_attr_filter
                    .map(|filter| filter.matches(*vertex))
                    .unwrap_or(true)
            })
            .cloned()
            .collect()
    }

    /// Full independent snapshot. Subsequent mutation of the original does not affect
    /// the copy and vice versa.
    pub fn copy(&self) -> EntityGraph {
        self.clone()
    }

    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    pub fn num_edges(&self) -> usize {
        self.relations.edge_count()
    }

    pub fn len(&self) -> usize {
        self.num_vertices()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    fn node_index(&self, vertex_id: &VertexId) -> Result<NodeIndex, VigilError> {
        self.id_to_index.get(vertex_id).copied().ok_or_else(|| {
            VigilError::InvariantViolation(format!(
                "edge references unknown endpoint {vertex_id}"
            ))
        })
    }

    fn edge_index(&self, key: &EdgeKey) -> Option<petgraph::graph::EdgeIndex> {
        let source = self.id_to_index.get(&key.source_id)?;
        let target = self.id_to_index.get(&key.target_id)?;
        self.relations
            .edges_connecting(*source, *target)
            .find(|edge| edge.weight().label == key.label)
            .map(|edge| edge.id())
    }
}
