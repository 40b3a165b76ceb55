//! Graph Nodes
//!
//! This module defines the node types that live in the dependency graph.
//! A node carries only structural bookkeeping (edges, dirty state, version
//! counters); the typed value lives in the cell that owns the node.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexSet;

/// Unique identifier for a node in the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    /// Generate a new unique node ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<u64> for NodeId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The kind of node in the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// A source cell. Roots of the graph: dependents only, never dependencies.
    Source,

    /// A computed cell. Has dependencies and may have dependents.
    Computed,

    /// A computed cell gated by an activation cell. Always keeps an edge from
    /// its activation cell, even while inactive.
    Lazy,
}

/// Dirty state of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// The cached value is up-to-date.
    Clean,

    /// Something upstream changed, but not a direct dependency. The node has
    /// to check its dependencies before deciding whether to recompute.
    MaybeDirty,

    /// A direct dependency changed. The node must recompute on next pull.
    Dirty,

    /// The node's compute function is currently running.
    Evaluating,
}

/// A node in the dependency graph.
#[derive(Debug)]
pub struct Node {
    id: NodeId,
    kind: NodeKind,
    state: NodeState,

    /// Diagnostic name, if the cell was given one.
    name: Option<String>,

    /// Nodes that this node read during its last successful evaluation.
    dependencies: IndexSet<NodeId>,

    /// Nodes that read this node.
    dependents: IndexSet<NodeId>,

    /// Dependency that survives every evaluation commit (lazy activation).
    pinned: Option<NodeId>,

    /// Bumped each time the node's value changes.
    version: u64,

    /// The version the node's actions last fired for.
    notified_version: u64,

    /// Number of reactions attached to the cell.
    action_count: usize,
}

impl Node {
    /// Create a new node with the given kind.
    pub fn new(kind: NodeKind) -> Self {
        Self {
            id: NodeId::new(),
            kind,
            state: match kind {
                NodeKind::Source => NodeState::Clean,
                // Start dirty to ensure first computation
                NodeKind::Computed => NodeState::Dirty,
                // Lazy cells start inactive; the owner marks them dirty if
                // their activation is already on.
                NodeKind::Lazy => NodeState::Clean,
            },
            name: None,
            dependencies: IndexSet::new(),
            dependents: IndexSet::new(),
            pinned: None,
            version: 0,
            notified_version: 0,
            action_count: 0,
        }
    }

    /// Create a new source node.
    pub fn source() -> Self {
        Self::new(NodeKind::Source)
    }

    /// Create a new computed node.
    pub fn computed() -> Self {
        Self::new(NodeKind::Computed)
    }

    /// Create a new lazy node pinned to its activation node.
    pub fn lazy(activation: NodeId) -> Self {
        let mut node = Self::new(NodeKind::Lazy);
        node.pinned = Some(activation);
        node
    }

    /// Attach a diagnostic name.
    pub fn with_name(mut self, name: Option<String>) -> Self {
        self.name = name;
        self
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Name for diagnostics: the given name, or the node id.
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => self.id.to_string(),
        }
    }

    pub fn state(&self) -> NodeState {
        self.state
    }

    pub fn set_state(&mut self, state: NodeState) {
        self.state = state;
    }

    pub fn is_clean(&self) -> bool {
        self.state == NodeState::Clean
    }

    /// Mark the node as maybe dirty. Never downgrades a dirty node and never
    /// touches a node that is mid-evaluation.
    pub fn mark_maybe_dirty(&mut self) {
        if self.state == NodeState::Clean {
            self.state = NodeState::MaybeDirty;
        }
    }

    /// Mark the node as definitely dirty.
    pub fn mark_dirty(&mut self) {
        if self.state != NodeState::Evaluating {
            self.state = NodeState::Dirty;
        }
    }

    pub fn pinned(&self) -> Option<NodeId> {
        self.pinned
    }

    pub fn add_dependency(&mut self, node_id: NodeId) {
        self.dependencies.insert(node_id);
    }

    pub fn remove_dependency(&mut self, node_id: NodeId) {
        self.dependencies.shift_remove(&node_id);
    }

    pub fn dependencies(&self) -> &IndexSet<NodeId> {
        &self.dependencies
    }

    pub fn add_dependent(&mut self, node_id: NodeId) {
        self.dependents.insert(node_id);
    }

    pub fn remove_dependent(&mut self, node_id: NodeId) {
        self.dependents.shift_remove(&node_id);
    }

    pub fn dependents(&self) -> &IndexSet<NodeId> {
        &self.dependents
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Record a value change.
    pub fn bump_version(&mut self) {
        self.version += 1;
    }

    /// True if the value changed since the actions last fired.
    pub fn needs_notify(&self) -> bool {
        self.version != self.notified_version
    }

    pub fn mark_notified(&mut self) {
        self.notified_version = self.version;
    }

    pub fn action_count(&self) -> usize {
        self.action_count
    }

    pub fn set_action_count(&mut self, count: usize) {
        self.action_count = count;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_ids_are_unique() {
        let id1 = NodeId::new();
        let id2 = NodeId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn source_node_starts_clean() {
        let node = Node::source();
        assert_eq!(node.kind(), NodeKind::Source);
        assert!(node.is_clean());
    }

    #[test]
    fn computed_node_starts_dirty() {
        let node = Node::computed();
        assert_eq!(node.kind(), NodeKind::Computed);
        assert_eq!(node.state(), NodeState::Dirty);
    }

    #[test]
    fn lazy_node_is_pinned_to_activation() {
        let activation = NodeId::new();
        let node = Node::lazy(activation);
        assert_eq!(node.kind(), NodeKind::Lazy);
        assert_eq!(node.pinned(), Some(activation));
        assert!(node.is_clean());
    }

    #[test]
    fn dependency_management() {
        let mut node = Node::computed();
        let dep1 = NodeId::new();
        let dep2 = NodeId::new();

        node.add_dependency(dep1);
        node.add_dependency(dep2);
        node.add_dependency(dep1);

        assert_eq!(node.dependencies().len(), 2);
        assert_eq!(node.dependencies().get_index(0), Some(&dep1));

        node.remove_dependency(dep1);
        assert!(!node.dependencies().contains(&dep1));
        assert_eq!(node.dependencies().len(), 1);
    }

    #[test]
    fn dirty_state_transitions() {
        let mut node = Node::computed();
        assert_eq!(node.state(), NodeState::Dirty);

        node.set_state(NodeState::Clean);
        node.mark_maybe_dirty();
        assert_eq!(node.state(), NodeState::MaybeDirty);

        // Dirty is never downgraded to maybe-dirty
        node.mark_dirty();
        node.mark_maybe_dirty();
        assert_eq!(node.state(), NodeState::Dirty);

        // Evaluating nodes are left alone
        node.set_state(NodeState::Evaluating);
        node.mark_dirty();
        node.mark_maybe_dirty();
        assert_eq!(node.state(), NodeState::Evaluating);
    }

    #[test]
    fn version_tracking() {
        let mut node = Node::source();
        assert!(!node.needs_notify());

        node.bump_version();
        assert!(node.needs_notify());

        node.mark_notified();
        assert!(!node.needs_notify());
        assert_eq!(node.version(), 1);
    }

    #[test]
    fn label_falls_back_to_id() {
        let named = Node::source().with_name(Some("width".into()));
        assert_eq!(named.label(), "width");

        let anonymous = Node::source();
        assert_eq!(anonymous.label(), anonymous.id().to_string());
    }
}
