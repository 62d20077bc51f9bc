//! Graph Processor: the single-writer pipeline that keeps the topology correct.
//!
//! Consumes the stream of [IngestMessage]s, applies each event fully (transform, upsert,
//! neighbor resolution, state recomputation, propagation fixed point, tombstone purge)
//! before touching the next, and serializes all graph mutation through one task. Many
//! concurrent producers feed the bounded channel; exactly one [ProcessorService] drains
//! it.

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use tokio::sync::mpsc;

use crate::{
    error::VigilError,
    event::{EventAction, ExternalEvent, IngestMessage},
    graph::{EntityGraph, SharedEntityGraph},
    properties::{labels, Edge, EntityCategory, Vertex, VertexId},
    state::{ResourceState, StateNormalizer},
    transformer::TransformerRegistry,
};

/// What an upsert did to the stored vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    /// A stored placeholder was replaced by full data.
    Promoted,
    Updated,
    /// Incoming data could not improve on the stored vertex (a placeholder arriving
    /// for an already-known entity).
    Unchanged,
    /// Incoming `sample_timestamp` is older than the stored `update_timestamp`;
    /// skipped, recorded, not an error.
    Stale,
}

pub struct Processor {
    graph: SharedEntityGraph,
    transformers: TransformerRegistry,
    normalizer: StateNormalizer,
    /// Vertex ids asserted so far in the current snapshot run, per datasource.
    snapshot_scope: BTreeMap<String, BTreeSet<VertexId>>,
    stale_rejections: u64,
}

impl Processor {
    pub fn new(
        graph: SharedEntityGraph,
        transformers: TransformerRegistry,
        normalizer: StateNormalizer,
    ) -> Processor {
        Processor {
            graph,
            transformers,
            normalizer,
            snapshot_scope: BTreeMap::default(),
            stale_rejections: 0,
        }
    }

    /// The shared read surface over the store this processor maintains.
    pub fn graph(&self) -> &SharedEntityGraph {
        &self.graph
    }

    /// Count of updates skipped for arriving with an older source timestamp than the
    /// stored item. Observability only; stale updates are not errors.
    pub fn stale_rejections(&self) -> u64 {
        self.stale_rejections
    }

    /// Apply one message. Returns the ordered propagation front: every vertex whose
    /// `aggregated_state` changed while processing, in recomputation order.
    pub fn process(&mut self, message: IngestMessage) -> Result<Vec<VertexId>, VigilError> {
        match message {
            IngestMessage::Entity(event) => self.process_event(&event),
            IngestMessage::SnapshotEnd { datasource } => self.snapshot_end(&datasource),
        }
    }

    /// Apply one entity event end to end: transform, upsert the vertex and its
    /// neighbor assertions, tombstone on delete, recompute and propagate aggregated
    /// state to a fixed point, then purge tombstones created by this event.
    pub fn process_event(&mut self, event: &ExternalEvent) -> Result<Vec<VertexId>, VigilError> {
        let transformer = self.transformers.get(&event.datasource).ok_or_else(|| {
            VigilError::Transform(format!(
                "no transformer registered for datasource '{}'",
                event.datasource
            ))
        })?;
        let wrapper = transformer.transform(event)?;
        let sample_timestamp = event.sample_timestamp;
        let primary_id = wrapper.vertex.vertex_id.clone();

        if event.sync_mode.is_snapshot() {
            self.snapshot_scope
                .entry(event.datasource.clone())
                .or_default()
                .insert(primary_id.clone());
        }

        let mut store = self.graph.write();

        let outcome = self.upsert_vertex(&mut store, wrapper.vertex, sample_timestamp)?;
        if outcome == UpsertOutcome::Stale {
            return Ok(Vec::new());
        }

        let mut seeds: VecDeque<VertexId> = VecDeque::from([primary_id.clone()]);
        for neighbor in wrapper.neighbors {
            let neighbor_id = neighbor.vertex.vertex_id.clone();
            self.upsert_vertex(&mut store, neighbor.vertex, sample_timestamp)?;
            self.upsert_edge(&mut store, neighbor.edge, sample_timestamp)?;
            seeds.push_back(neighbor_id);
        }

        let mut purge = Vec::new();
        if wrapper.action == EventAction::DeleteEntity {
            // Capture the influence front while the edges are still live, then
            // tombstone; recomputation must observe the removal, not miss it.
            seeds.extend(influencees(&store, &primary_id));
            self.tombstone_vertex(&mut store, &primary_id, sample_timestamp)?;
            purge.push(primary_id);
        }

        let changed = self.propagate(&mut store, seeds)?;

        for vertex_id in purge {
            store.remove_vertex(&vertex_id)?;
        }
        Ok(changed)
    }

    /// Full-snapshot reconciliation: every previously known, non-placeholder vertex of
    /// the datasource's entity types that the finished batch did not assert is treated
    /// as implicitly deleted.
    pub fn snapshot_end(&mut self, datasource: &str) -> Result<Vec<VertexId>, VigilError> {
        let Some(seen) = self.snapshot_scope.remove(datasource) else {
            tracing::warn!(
                "snapshot end for '{datasource}' without any snapshot events, skipping \
                 reconciliation"
            );
            return Ok(Vec::new());
        };
        let scope_types: Vec<String> = self
            .transformers
            .get(datasource)
            .map(|t| t.entity_types().iter().map(|s| s.to_string()).collect())
            .unwrap_or_default();

        let mut store = self.graph.write();

        let vanished: Vec<VertexId> = store
            .get_vertices(None)
            .into_iter()
            .filter(|vertex| {
                !vertex.is_placeholder
                    && scope_types.contains(&vertex.vertex_type)
                    && !seen.contains(&vertex.vertex_id)
            })
            .map(|vertex| vertex.vertex_id)
            .collect();

        if vanished.is_empty() {
            return Ok(Vec::new());
        }
        tracing::info!(
            "snapshot reconciliation for '{datasource}': {} entities vanished",
            vanished.len()
        );

        let now = Utc::now();
        let mut seeds = VecDeque::new();
        for vertex_id in &vanished {
            seeds.extend(influencees(&store, vertex_id));
            self.tombstone_vertex(&mut store, vertex_id, now)?;
        }
        let changed = self.propagate(&mut store, seeds)?;
        for vertex_id in &vanished {
            store.remove_vertex(vertex_id)?;
        }
        Ok(changed)
    }

    /// Upsert protocol for one vertex, placeholder resolution included:
    ///
    /// - unknown id: insert;
    /// - placeholder arriving for a known vertex: never overwrites;
    /// - full data arriving for a stored placeholder: promotes it, unconditionally;
    /// - full data over full data: last writer wins by source timestamp; an incoming
    ///   `sample_timestamp` older than the stored `update_timestamp` is skipped.
    fn upsert_vertex(
        &mut self,
        store: &mut EntityGraph,
        mut incoming: Vertex,
        sample_timestamp: DateTime<Utc>,
    ) -> Result<UpsertOutcome, VigilError> {
        if incoming.sample_timestamp.is_none() {
            incoming.sample_timestamp = Some(sample_timestamp);
        }
        incoming.update_timestamp = incoming.sample_timestamp;

        let Some(stored) = store.get_vertex(&incoming.vertex_id) else {
            tracing::debug!("adding vertex {}", incoming.vertex_id);
            store.add_vertex(incoming)?;
            return Ok(UpsertOutcome::Created);
        };

        if incoming.is_placeholder {
            // The stored vertex always knows at least as much as a placeholder does.
            return Ok(UpsertOutcome::Unchanged);
        }

        if stored.is_placeholder {
            tracing::debug!("promoting placeholder {}", incoming.vertex_id);
            incoming.aggregated_state = stored.aggregated_state;
            store.update_vertex(incoming)?;
            return Ok(UpsertOutcome::Promoted);
        }

        if let (Some(sample), Some(stored_update)) =
            (incoming.sample_timestamp, stored.update_timestamp)
        {
            if sample < stored_update {
                self.stale_rejections += 1;
                tracing::debug!(
                    "stale update for {} (sample {sample} < stored {stored_update}), skipping",
                    incoming.vertex_id
                );
                return Ok(UpsertOutcome::Stale);
            }
        }

        // Aggregated state is processor-owned; carry it until recomputation replaces it.
        incoming.aggregated_state = stored.aggregated_state;
        store.update_vertex(incoming)?;
        Ok(UpsertOutcome::Updated)
    }

    fn upsert_edge(
        &self,
        store: &mut EntityGraph,
        mut edge: Edge,
        sample_timestamp: DateTime<Utc>,
    ) -> Result<(), VigilError> {
        edge.update_timestamp = Some(sample_timestamp);
        let key = edge.key();
        if store
            .get_edge(&key.source_id, &key.target_id, &key.label)
            .is_some()
        {
            store.update_edge(edge)
        } else {
            store.add_edge(edge)
        }
    }

    /// Mark the vertex and every edge touching it deleted, without physical removal,
    /// so recomputation can still observe the disappearance.
    fn tombstone_vertex(
        &self,
        store: &mut EntityGraph,
        vertex_id: &VertexId,
        timestamp: DateTime<Utc>,
    ) -> Result<(), VigilError> {
        let Some(mut vertex) = store.get_vertex(vertex_id) else {
            return Err(VigilError::NotFound(format!(
                "cannot tombstone unknown vertex {vertex_id}"
            )));
        };
        tracing::debug!("tombstoning vertex {vertex_id}");
        vertex.is_deleted = true;
        vertex.update_timestamp = Some(timestamp);
        store.update_vertex(vertex)?;
        for mut edge in store.edges_of(vertex_id) {
            edge.is_deleted = true;
            edge.update_timestamp = Some(timestamp);
            store.update_edge(edge)?;
        }
        Ok(())
    }

    /// Worklist fixed point: recompute each queued vertex; when its aggregated state
    /// changed, enqueue the vertices it influences. A recomputation that changes
    /// nothing stops its branch, which bounds the walk.
    fn propagate(
        &mut self,
        store: &mut EntityGraph,
        mut queue: VecDeque<VertexId>,
    ) -> Result<Vec<VertexId>, VigilError> {
        let mut changed = Vec::new();
        while let Some(vertex_id) = queue.pop_front() {
            if self.recompute_state(store, &vertex_id)? {
                queue.extend(influencees(store, &vertex_id));
                changed.push(vertex_id);
            }
        }
        Ok(changed)
    }

    /// Recompute one vertex's aggregated state from its current live inputs: its own
    /// raw state through the normalizer, plus the opinions of live connected
    /// influencers. Returns whether the stored value changed.
    fn recompute_state(
        &mut self,
        store: &mut EntityGraph,
        vertex_id: &VertexId,
    ) -> Result<bool, VigilError> {
        let Some(mut vertex) = store.get_vertex(vertex_id) else {
            tracing::warn!("recompute requested for unknown vertex {vertex_id}");
            return Ok(false);
        };
        if !vertex.is_live() {
            return Ok(false);
        }

        let own = vertex
            .state
            .as_deref()
            .map(|raw| {
                self.normalizer
                    .normalize(vertex.category, &vertex.vertex_type, raw)
            })
            .unwrap_or_default();

        let mut conditions = Vec::new();
        for edge in store.edges_of(vertex_id) {
            if !edge.is_live() || !influence_label(&edge.label) {
                continue;
            }
            let Some(other_id) = edge.other_endpoint(vertex_id) else {
                continue;
            };
            let Some(other) = store.get_vertex(other_id) else {
                // Dangling endpoint: should be impossible, contain it and move on.
                tracing::error!(
                    "dangling edge endpoint {other_id} on {}, tombstoning edge",
                    edge.key()
                );
                let mut dangling = edge.clone();
                dangling.is_deleted = true;
                store.update_edge(dangling)?;
                continue;
            };
            if !other.is_live() {
                continue;
            }
            if let Some(state) = self.influence_of(&vertex, &other, &edge) {
                conditions.push(state);
            }
        }

        let aggregated = self.normalizer.aggregate(own, conditions);
        if vertex.aggregated_state == Some(aggregated) {
            return Ok(false);
        }
        tracing::debug!(
            "aggregated state of {vertex_id}: {:?} -> {aggregated}",
            vertex.aggregated_state
        );
        vertex.aggregated_state = Some(aggregated);
        store.update_vertex(vertex)?;
        Ok(true)
    }

    /// The state `other` contributes to `vertex`'s aggregation, if any.
    ///
    /// Alarm neighbors contribute their own normalized raw state whichever way the edge
    /// points. Resource neighbors contribute their aggregated state along the edge's
    /// influence direction: a container degrades what it contains, a platform degrades
    /// what runs on it.
    fn influence_of(&self, vertex: &Vertex, other: &Vertex, edge: &Edge) -> Option<ResourceState> {
        if vertex.category == EntityCategory::Alarm {
            // Alarms report conditions; nothing reports conditions onto an alarm.
            return None;
        }
        if other.category == EntityCategory::Alarm {
            return other
                .state
                .as_deref()
                .map(|raw| self.normalizer.normalize(other.category, &other.vertex_type, raw));
        }
        let downstream = influence_target(edge, &other.vertex_id);
        if downstream.as_ref() == Some(&vertex.vertex_id) {
            other.aggregated_state
        } else {
            None
        }
    }
}

fn influence_label(label: &str) -> bool {
    labels::STATE_INFLUENCE.contains(&label) || label == labels::MONITORS
}

/// For a live influence edge and one endpoint acting as the influencer, the endpoint
/// that receives the influence: `contains` flows source to target, `on`/`attached` flow
/// target to source (the platform degrades what sits on it).
fn influence_target(edge: &Edge, influencer: &VertexId) -> Option<VertexId> {
    match edge.label.as_str() {
        labels::CONTAINS if &edge.source_id == influencer => Some(edge.target_id.clone()),
        labels::ON | labels::ATTACHED if &edge.target_id == influencer => {
            Some(edge.source_id.clone())
        }
        _ => None,
    }
}

/// Every live vertex whose aggregation takes `vertex_id`'s opinion as input: resources
/// downstream of its influence edges and, when the vertex is an alarm, whatever the
/// alarm is connected to.
fn influencees(store: &EntityGraph, vertex_id: &VertexId) -> Vec<VertexId> {
    let is_alarm = store
        .get_vertex(vertex_id)
        .map(|v| v.category == EntityCategory::Alarm)
        .unwrap_or(false);
    let mut out = Vec::new();
    for edge in store.edges_of(vertex_id) {
        if !edge.is_live() || !influence_label(&edge.label) {
            continue;
        }
        let Some(other_id) = edge.other_endpoint(vertex_id) else {
            continue;
        };
        let candidate = if is_alarm {
            Some(other_id.clone())
        } else {
            influence_target(&edge, vertex_id)
        };
        let Some(candidate) = candidate else { continue };
        let live_resource = store
            .get_vertex(&candidate)
            .map(|v| v.is_live() && v.category == EntityCategory::Resource)
            .unwrap_or(false);
        if live_resource && !out.contains(&candidate) {
            out.push(candidate);
        }
    }
    out
}

/// Single consumer over the ingest channel: applies messages strictly one at a time so
/// no two event applications ever interleave their propagation steps. Producers hold
/// the matching bounded `Sender`s; back-pressure is theirs.
pub struct ProcessorService;

impl ProcessorService {
    pub fn spawn(
        mut processor: Processor,
        mut receiver: mpsc::Receiver<IngestMessage>,
    ) -> tokio::task::JoinHandle<Processor> {
        tokio::spawn(async move {
            while let Some(message) = receiver.recv().await {
                let description = message.to_string();
                match processor.process(message) {
                    Ok(changed) if !changed.is_empty() => {
                        tracing::debug!(
                            "{description}: aggregated state changed on {} vertices",
                            changed.len()
                        );
                    }
                    Ok(_) => {}
                    // One bad event never halts the pipeline.
                    Err(error) => tracing::warn!("{description} dropped: {error}"),
                }
            }
            tracing::info!("ingest channel closed, processor shutting down");
            processor
        })
    }
}
