//! # vigil-core
//!
//! A Rust library maintaining a live topology model of cloud infrastructure as a typed
//! property graph, with deterministic health-state propagation for root-cause analysis.
//!
//! ## Overview
//!
//! vigil-core ingests heterogeneous monitoring feeds (compute hosts, instances, network
//! ports, zones, alarm checks) delivered by polling or push drivers, normalizes them
//! into one canonical vertex/edge representation, and keeps an in-memory entity graph
//! correct under out-of-order, partial, and duplicate updates. Whenever any entity's
//! reported state changes, the aggregated health state is recomputed and propagated
//! outward along state-carrying relationships until a fixed point is reached, so
//! downstream consumers always see a consistent picture of what is broken and what it
//! drags down with it.
//!
//! ### Key Features
//!
//! - **Placeholder resolution**: entities referenced before they are known exist
//!   immediately as placeholders and are promoted in place when their defining event
//!   arrives, keeping identity and edges stable across promotion
//! - **Stale-update rejection**: last-writer-wins by source timestamp, not by
//!   wall-clock arrival order
//! - **Snapshot reconciliation**: entities that silently vanish between full polls are
//!   detected and removed
//! - **Deterministic propagation**: aggregated state is a pure function of live
//!   inputs, recomputed via an explicit worklist with a testable stopping condition
//! - **Point-in-time snapshots**: `copy()` yields an independent graph; every read
//!   returns a detached copy
//! - **Single-writer concurrency**: many producers, one processing pipeline, readers
//!   never observe a torn item
//!
//! ## Architecture
//!
//! The library is organized around several key components:
//!
//! - **[`graph`]**: The mutable labeled multigraph store ([`graph::EntityGraph`],
//!   [`graph::SharedEntityGraph`])
//! - **[`processor`]**: Event application, placeholder resolution, state propagation
//! - **[`state`]**: Raw-state normalization and severity aggregation
//! - **[`transformer`]**: The per-data-source normalization contract (consumed, not
//!   implemented, by the core)
//! - **[`driver`]**: The pull/push driver contract and the poll-diff baseline
//! - **[`properties`]**: Vertex/edge records, deterministic ids, reserved attributes
//! - **[`query`]**: Attribute filters and traversal direction
//! - **[`event`]**: Sync modes, actions, and the ingest channel vocabulary
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use vigil_core::{
//!     event::IngestMessage,
//!     graph::{EntityGraph, SharedEntityGraph},
//!     processor::{Processor, ProcessorService},
//!     state::StateNormalizer,
//!     transformer::TransformerRegistry,
//! };
//! use tokio::sync::mpsc;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let graph = SharedEntityGraph::new(EntityGraph::new("topology"));
//!     let transformers = TransformerRegistry::new(); // register per-datasource transformers
//!     let processor = Processor::new(
//!         graph.clone(),
//!         transformers,
//!         StateNormalizer::with_defaults(),
//!     );
//!
//!     // Bounded queue: back-pressure is the producers' responsibility.
//!     let (tx, rx) = mpsc::channel::<IngestMessage>(1024);
//!     let service = ProcessorService::spawn(processor, rx);
//!
//!     // Drivers clone `tx` and send events; queries go through `graph` concurrently.
//!     drop(tx);
//!     service.await.ok();
//! }
//! ```
//!
//! ## Core Concepts
//!
//! ### Placeholder-then-promote lifecycle
//!
//! When an instance event asserts `instance --on--> host` before the host's own event
//! has been seen, the host is created as a minimally-populated placeholder vertex. Its
//! id is derived from the same `(category, type, natural-key)` fields a full event
//! would produce, so when the host's event arrives the placeholder is promoted in
//! place and every edge already pointing at it stays valid. A full vertex never
//! regresses to placeholder.
//!
//! ### Aggregated state
//!
//! Each vertex carries its raw reported state and an aggregated state: the most severe
//! among its own normalized state and the opinions of connected live influencers
//! (alarms on it, the container it sits in, the platform it runs on). Aggregation is
//! recomputed from current inputs, never patched incrementally, and recomputation that
//! changes nothing stops propagation, which makes the fixed point explicit.
//!
//! ### Tombstones
//!
//! Deletion marks vertices and their edges `is_deleted` first so that state
//! recomputation can still observe the removal, then purges them at the end of the
//! processing step. The graph is a rebuildable cache of external truth; nothing here
//! persists.
//!
//! ## Module Guide
//!
//! Start with [`processor::Processor`] for the ingest path, then explore
//! [`graph::EntityGraph`] for the query surface. See [`properties`] for understanding
//! vertex and edge types.

pub mod config;
pub mod driver;
pub mod error;
pub mod event;
pub mod graph;
pub mod processor;
pub mod properties;
pub mod query;
pub mod state;
#[cfg(test)]
mod tests;
pub mod transformer;

pub use error::*;
