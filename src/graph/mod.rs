//! Entity graph module: the mutable topology store.
//!
//! # Module Organization
//!
//! - [`base`]: [EntityGraph], the owned labeled multigraph with attribute queries
//! - [`shared`]: [SharedEntityGraph], the concurrent read surface over one store
//!
//! # Public API
//!
//! ```rust
//! use vigil_core::graph::{EntityGraph, SharedEntityGraph};
//! ```

mod base;
mod shared;


pub use base::EntityGraph;
pub use shared::SharedEntityGraph;
