//! SharedEntityGraph: concurrent access to one [EntityGraph].
//!
//! Reads may run concurrently with each other and with the processor mid-batch; each
//! read observes either the pre- or post-mutation state of an item, never a torn one,
//! because every store mutation happens under the write lock. `copy()` is atomic
//! relative to writers for the same reason. All mutation is funneled through the single
//! processor task, which takes the write lock per operation.

use parking_lot::{ArcRwLockWriteGuard, RawRwLock, RwLock};
use std::sync::Arc;

use crate::{
    properties::{Edge, Vertex, VertexId},
    query::{AttrFilter, Direction},
};

use super::EntityGraph;

#[derive(Debug, Clone, Default)]
pub struct SharedEntityGraph {
    inner: Arc<RwLock<EntityGraph>>,
}

impl SharedEntityGraph {
    pub fn new(graph: EntityGraph) -> SharedEntityGraph {
        SharedEntityGraph {
            inner: Arc::new(RwLock::new(graph)),
        }
    }

    /// Exclusive access for the single writer path. The guard is self-contained (it
    /// keeps the store alive through its own Arc), so the processor can hold it across
    /// helper calls without borrowing the handle. Never held across an await point.
    pub fn write(&self) -> ArcRwLockWriteGuard<RawRwLock, EntityGraph> {
        self.inner.write_arc()
    }

    pub fn get_vertex(&self, vertex_id: &VertexId) -> Option<Vertex> {
        self.inner.read().get_vertex(vertex_id)
    }

    pub fn get_edge(
        &self,
        source_id: &VertexId,
        target_id: &VertexId,
        label: &str,
    ) -> Option<Edge> {
        self.inner.read().get_edge(source_id, target_id, label)
    }

    pub fn neighbors(
        &self,
        vertex_id: &VertexId,
        vertex_attr_filter: Option<&AttrFilter>,
        edge_attr_filter: Option<&AttrFilter>,
        direction: Direction,
    ) -> Vec<Vertex> {
        self.inner
            .read()
            .neighbors(vertex_id, vertex_attr_filter, edge_attr_filter, direction)
    }

    pub fn get_vertices(&self, vertex_attr_filter: Option<&AttrFilter>) -> Vec<Vertex> {
        self.inner.read().get_vertices(vertex_attr_filter)
    }

    /// Atomic point-in-time snapshot: a writer active during the copy cannot leak a
    /// half-updated item into it.
    pub fn copy(&self) -> EntityGraph {
        self.inner.read().copy()
    }

    pub fn num_vertices(&self) -> usize {
        self.inner.read().num_vertices()
    }

    pub fn num_edges(&self) -> usize {
        self.inner.read().num_edges()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

impl From<EntityGraph> for SharedEntityGraph {
    fn from(graph: EntityGraph) -> SharedEntityGraph {
        SharedEntityGraph::new(graph)
    }
}
