//! Dependency Graph
//!
//! This module implements the dependency graph that tracks relationships
//! between cells.
//!
//! # Overview
//!
//! The graph is a directed acyclic graph (DAG) where:
//!
//! - Nodes represent cells (sources, computed cells, lazy cells)
//! - Edges represent reads: if A reads B, there is an edge from B to A
//!
//! When a source changes, we traverse the graph to find all affected nodes
//! and mark them as dirty. Computed cells are then pulled lazily, in
//! topological order, only where a reaction needs their value.
//!
//! # Design Decisions
//!
//! 1. We use a centralized arena keyed by [`NodeId`] rather than pointers
//!    between cells:
//!    - It enables topological ordering for each propagation pass
//!    - Cycle detection becomes a plain graph traversal
//!    - Dependents are held by id, so they never keep a cell alive
//!
//! 2. We maintain both forward (dependencies) and reverse (dependents) edges
//!    to enable efficient traversal in both directions.

mod node;
mod scheduler;

pub use node::{Node, NodeId, NodeKind, NodeState};
pub use scheduler::{EdgeDiff, UpdateScheduler};
