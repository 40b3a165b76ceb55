//! Update Scheduler
//!
//! The scheduler owns the node arena and decides the order in which dirty
//! nodes are flushed. Dependencies are always flushed before their dependents.
//!
//! # Algorithm
//!
//! Propagation is split into two phases so that no reader ever observes a
//! half-updated graph:
//!
//! 1. **Mark.** When a source changes, a single breadth-first walk over
//!    `dependents` marks direct dependents `Dirty` and everything further
//!    downstream `MaybeDirty`. Each node is visited once, so diamonds cost no
//!    extra work. Nothing is recomputed here.
//! 2. **Flush.** The affected nodes are sorted topologically (Kahn) and the
//!    caller pulls the ones that need it in that order. A `MaybeDirty` node
//!    first pulls its dependencies and only recomputes if one of them
//!    actually changed.

use std::collections::{HashMap, HashSet, VecDeque};

use super::node::{Node, NodeId, NodeState};

/// Result of replacing a node's dependency set.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EdgeDiff {
    pub added: Vec<NodeId>,
    pub removed: Vec<NodeId>,
}

impl EdgeDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// The update scheduler manages the dependency graph and coordinates updates.
pub struct UpdateScheduler {
    /// All nodes in the graph, indexed by ID.
    nodes: HashMap<NodeId, Node>,
}

impl UpdateScheduler {
    /// Create a new empty scheduler.
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
        }
    }

    /// Add a node to the graph.
    pub fn add_node(&mut self, node: Node) -> NodeId {
        let id = node.id();
        self.nodes.insert(id, node);
        id
    }

    /// Remove a node from the graph.
    ///
    /// Also removes all edges involving this node.
    pub fn remove_node(&mut self, node_id: NodeId) {
        if let Some(node) = self.nodes.remove(&node_id) {
            for dep_id in node.dependencies() {
                if let Some(dep) = self.nodes.get_mut(dep_id) {
                    dep.remove_dependent(node_id);
                }
            }

            for dependent_id in node.dependents() {
                if let Some(dependent) = self.nodes.get_mut(dependent_id) {
                    dependent.remove_dependency(node_id);
                }
            }
        }
    }

    pub fn get_node(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes.get(&node_id)
    }

    pub fn get_node_mut(&mut self, node_id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&node_id)
    }

    /// Diagnostic label for a node, even if it has already been released.
    pub fn label(&self, node_id: NodeId) -> String {
        self.nodes
            .get(&node_id)
            .map(Node::label)
            .unwrap_or_else(|| node_id.to_string())
    }

    /// Add a dependency edge: `dependent` depends on `dependency`.
    pub fn add_edge(&mut self, dependency: NodeId, dependent: NodeId) {
        if let Some(dep_node) = self.nodes.get_mut(&dependency) {
            dep_node.add_dependent(dependent);
        }
        if let Some(dependent_node) = self.nodes.get_mut(&dependent) {
            dependent_node.add_dependency(dependency);
        }
    }

    /// Remove a dependency edge.
    pub fn remove_edge(&mut self, dependency: NodeId, dependent: NodeId) {
        if let Some(dep_node) = self.nodes.get_mut(&dependency) {
            dep_node.remove_dependent(dependent);
        }
        if let Some(dependent_node) = self.nodes.get_mut(&dependent) {
            dependent_node.remove_dependency(dependency);
        }
    }

    /// Find a path from `from` to `to` following `dependents` edges.
    ///
    /// A path means `to` (transitively) reads `from`.
    pub fn find_path(&self, from: NodeId, to: NodeId) -> Option<Vec<NodeId>> {
        let mut parents: HashMap<NodeId, NodeId> = HashMap::new();
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();

        visited.insert(from);
        queue.push_back(from);

        while let Some(node_id) = queue.pop_front() {
            if node_id == to {
                let mut path = vec![to];
                let mut current = to;
                while let Some(&parent) = parents.get(&current) {
                    path.push(parent);
                    current = parent;
                }
                path.reverse();
                return Some(path);
            }

            if let Some(node) = self.nodes.get(&node_id) {
                for &dependent_id in node.dependents() {
                    if visited.insert(dependent_id) {
                        parents.insert(dependent_id, node_id);
                        queue.push_back(dependent_id);
                    }
                }
            }
        }

        None
    }

    /// Replace the dependency set of `node_id` with `dependencies`.
    ///
    /// Edges to nodes that are no longer read are removed, new ones added.
    /// A node's pinned dependency is always kept. Unknown ids (cells that were
    /// already released) are skipped.
    ///
    /// If a new edge would close a cycle, nothing is changed and the offending
    /// chain is returned, starting and ending at `node_id`.
    pub fn replace_dependencies<I>(
        &mut self,
        node_id: NodeId,
        dependencies: I,
    ) -> Result<EdgeDiff, Vec<NodeId>>
    where
        I: IntoIterator<Item = NodeId>,
    {
        let Some(node) = self.nodes.get(&node_id) else {
            return Ok(EdgeDiff::default());
        };

        let mut next: Vec<NodeId> = Vec::new();
        if let Some(pinned) = node.pinned() {
            next.push(pinned);
        }
        for dep in dependencies {
            if self.nodes.contains_key(&dep) && !next.contains(&dep) {
                next.push(dep);
            }
        }

        let previous: Vec<NodeId> = node.dependencies().iter().copied().collect();
        let added: Vec<NodeId> = next
            .iter()
            .copied()
            .filter(|dep| !previous.contains(dep))
            .collect();
        let removed: Vec<NodeId> = previous
            .iter()
            .copied()
            .filter(|dep| !next.contains(dep))
            .collect();

        for &dep in &added {
            if dep == node_id {
                return Err(vec![node_id, node_id]);
            }
            if let Some(mut path) = self.find_path(node_id, dep) {
                path.push(node_id);
                return Err(path);
            }
        }

        for &dep in &removed {
            self.remove_edge(dep, node_id);
        }
        for &dep in &added {
            self.add_edge(dep, node_id);
        }

        Ok(EdgeDiff { added, removed })
    }

    /// Record that `source_id` changed and propagate dirty flags.
    ///
    /// Direct dependents become `Dirty`; everything further downstream becomes
    /// `MaybeDirty`. Returns the number of nodes reached.
    pub fn mark_changed(&mut self, source_id: NodeId) -> usize {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();

        let Some(source) = self.nodes.get_mut(&source_id) else {
            return 0;
        };
        source.bump_version();
        visited.insert(source_id);

        for dependent_id in source.dependents().clone() {
            if visited.insert(dependent_id) {
                if let Some(node) = self.nodes.get_mut(&dependent_id) {
                    node.mark_dirty();
                }
                queue.push_back(dependent_id);
            }
        }

        // BFS to propagate maybe-dirty status
        while let Some(node_id) = queue.pop_front() {
            let dependents = match self.nodes.get(&node_id) {
                Some(node) => node.dependents().clone(),
                None => continue,
            };
            for dependent_id in dependents {
                if visited.insert(dependent_id) {
                    if let Some(node) = self.nodes.get_mut(&dependent_id) {
                        node.mark_maybe_dirty();
                    }
                    queue.push_back(dependent_id);
                }
            }
        }

        visited.len() - 1
    }

    /// Mark the direct dependents of `node_id` dirty after its value changed
    /// during a pull.
    pub fn mark_dependents_dirty(&mut self, node_id: NodeId) {
        let dependents = match self.nodes.get(&node_id) {
            Some(node) => node.dependents().clone(),
            None => return,
        };
        for dependent_id in dependents {
            if let Some(node) = self.nodes.get_mut(&dependent_id) {
                node.mark_dirty();
            }
        }
    }

    /// All nodes reachable from `roots` (roots included), in topological
    /// order. Does not change any state.
    pub fn affected_in_order(&self, roots: &[NodeId]) -> Vec<NodeId> {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();
        let mut reached = Vec::new();

        for &root in roots {
            if self.nodes.contains_key(&root) && visited.insert(root) {
                queue.push_back(root);
            }
        }

        while let Some(node_id) = queue.pop_front() {
            reached.push(node_id);
            if let Some(node) = self.nodes.get(&node_id) {
                for &dependent_id in node.dependents() {
                    if visited.insert(dependent_id) {
                        queue.push_back(dependent_id);
                    }
                }
            }
        }

        self.topological_sort(reached)
    }

    /// Perform a topological sort of the given nodes.
    ///
    /// Returns nodes in order such that dependencies come before dependents.
    fn topological_sort(&self, nodes: Vec<NodeId>) -> Vec<NodeId> {
        let node_set: HashSet<_> = nodes.iter().copied().collect();
        let mut in_degree: HashMap<NodeId, usize> = HashMap::new();
        let mut result = Vec::with_capacity(nodes.len());
        let mut queue = VecDeque::new();

        // Only edges within the node set count
        for &node_id in &nodes {
            if let Some(node) = self.nodes.get(&node_id) {
                let degree = node
                    .dependencies()
                    .iter()
                    .filter(|d| node_set.contains(d))
                    .count();
                in_degree.insert(node_id, degree);
                if degree == 0 {
                    queue.push_back(node_id);
                }
            }
        }

        // Kahn's algorithm
        while let Some(node_id) = queue.pop_front() {
            result.push(node_id);

            if let Some(node) = self.nodes.get(&node_id) {
                for &dependent_id in node.dependents() {
                    if let Some(degree) = in_degree.get_mut(&dependent_id) {
                        *degree = degree.saturating_sub(1);
                        if *degree == 0 {
                            queue.push_back(dependent_id);
                        }
                    }
                }
            }
        }

        result
    }

    pub fn state(&self, node_id: NodeId) -> Option<NodeState> {
        self.nodes.get(&node_id).map(Node::state)
    }

    pub fn set_state(&mut self, node_id: NodeId, state: NodeState) {
        if let Some(node) = self.nodes.get_mut(&node_id) {
            node.set_state(state);
        }
    }

    /// Get the total number of nodes in the graph.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

impl Default for UpdateScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clean(scheduler: &mut UpdateScheduler, ids: &[NodeId]) {
        for &id in ids {
            scheduler.set_state(id, NodeState::Clean);
        }
    }

    #[test]
    fn add_and_remove_nodes() {
        let mut scheduler = UpdateScheduler::new();

        let id1 = scheduler.add_node(Node::source());
        let id2 = scheduler.add_node(Node::computed());
        scheduler.add_edge(id1, id2);

        assert_eq!(scheduler.node_count(), 2);

        scheduler.remove_node(id1);
        assert_eq!(scheduler.node_count(), 1);
        assert!(scheduler.get_node(id1).is_none());
        assert!(scheduler.get_node(id2).unwrap().dependencies().is_empty());
    }

    #[test]
    fn add_and_remove_edges() {
        let mut scheduler = UpdateScheduler::new();

        let source_id = scheduler.add_node(Node::source());
        let computed_id = scheduler.add_node(Node::computed());

        scheduler.add_edge(source_id, computed_id);
        assert!(scheduler
            .get_node(source_id)
            .unwrap()
            .dependents()
            .contains(&computed_id));

        scheduler.remove_edge(source_id, computed_id);
        assert!(scheduler.get_node(source_id).unwrap().dependents().is_empty());
        assert!(scheduler
            .get_node(computed_id)
            .unwrap()
            .dependencies()
            .is_empty());
    }

    #[test]
    fn replace_dependencies_diffs_edges() {
        let mut scheduler = UpdateScheduler::new();
        let a = scheduler.add_node(Node::source());
        let b = scheduler.add_node(Node::source());
        let c = scheduler.add_node(Node::source());
        let derived = scheduler.add_node(Node::computed());

        let diff = scheduler.replace_dependencies(derived, [a, b]).unwrap();
        assert_eq!(diff.added, vec![a, b]);

        let diff = scheduler.replace_dependencies(derived, [b, c]).unwrap();
        assert_eq!(diff.added, vec![c]);
        assert_eq!(diff.removed, vec![a]);

        assert!(scheduler.get_node(a).unwrap().dependents().is_empty());
        assert!(scheduler.get_node(c).unwrap().dependents().contains(&derived));
    }

    #[test]
    fn replace_dependencies_keeps_pinned_edge() {
        let mut scheduler = UpdateScheduler::new();
        let activation = scheduler.add_node(Node::source());
        let input = scheduler.add_node(Node::source());
        let lazy = scheduler.add_node(Node::lazy(activation));
        scheduler.add_edge(activation, lazy);

        scheduler.replace_dependencies(lazy, [input]).unwrap();
        scheduler.replace_dependencies(lazy, []).unwrap();

        let deps = scheduler.get_node(lazy).unwrap().dependencies();
        assert_eq!(deps.len(), 1);
        assert!(deps.contains(&activation));
    }

    #[test]
    fn replace_dependencies_rejects_cycles() {
        let mut scheduler = UpdateScheduler::new();
        let a = scheduler.add_node(Node::computed());
        let b = scheduler.add_node(Node::computed());

        scheduler.replace_dependencies(b, [a]).unwrap();
        let cycle = scheduler.replace_dependencies(a, [b]).unwrap_err();

        assert_eq!(cycle, vec![a, b, a]);
        // Nothing was committed
        assert!(scheduler.get_node(a).unwrap().dependencies().is_empty());

        let self_cycle = scheduler.replace_dependencies(a, [a]).unwrap_err();
        assert_eq!(self_cycle, vec![a, a]);
    }

    #[test]
    fn mark_changed_marks_direct_dirty_and_rest_maybe_dirty() {
        let mut scheduler = UpdateScheduler::new();

        // source -> first -> second
        let source = scheduler.add_node(Node::source());
        let first = scheduler.add_node(Node::computed());
        let second = scheduler.add_node(Node::computed());
        scheduler.add_edge(source, first);
        scheduler.add_edge(first, second);
        clean(&mut scheduler, &[first, second]);

        let reached = scheduler.mark_changed(source);

        assert_eq!(reached, 2);
        assert_eq!(scheduler.state(first), Some(NodeState::Dirty));
        assert_eq!(scheduler.state(second), Some(NodeState::MaybeDirty));
        assert_eq!(scheduler.get_node(source).unwrap().version(), 1);
    }

    #[test]
    fn diamond_is_ordered_topologically() {
        let mut scheduler = UpdateScheduler::new();

        let a = scheduler.add_node(Node::source());
        let b = scheduler.add_node(Node::computed());
        let c = scheduler.add_node(Node::computed());
        let d = scheduler.add_node(Node::computed());
        scheduler.add_edge(a, b);
        scheduler.add_edge(a, c);
        scheduler.add_edge(b, d);
        scheduler.add_edge(c, d);

        let order = scheduler.affected_in_order(&[a]);
        assert_eq!(order.len(), 4);

        let pos = |id| order.iter().position(|&n| n == id).unwrap();
        assert_eq!(pos(a), 0);
        assert!(pos(b) < pos(d));
        assert!(pos(c) < pos(d));
    }

    #[test]
    fn find_path_follows_dependents() {
        let mut scheduler = UpdateScheduler::new();
        let a = scheduler.add_node(Node::source());
        let b = scheduler.add_node(Node::computed());
        let c = scheduler.add_node(Node::computed());
        scheduler.add_edge(a, b);
        scheduler.add_edge(b, c);

        assert_eq!(scheduler.find_path(a, c), Some(vec![a, b, c]));
        assert_eq!(scheduler.find_path(c, a), None);
    }
}
