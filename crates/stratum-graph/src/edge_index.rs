use std::collections::{HashMap, HashSet};

use petgraph::algo::is_cyclic_directed;
use petgraph::graphmap::DiGraphMap;

use stratum_domain::RecordId;

use crate::error::GraphError;

/// In-memory bidirectional parent/child multimap over record ids (C1).
///
/// Edges run `child -> parent`, matching the source's `EdgeIndex` ("Edges go
/// 'from' child 'to' parent"). Backed by a `petgraph::graphmap::DiGraphMap`
/// so cycle checks (§3 "Parent relation is a DAG") are a single traversal,
/// plus two plain multimaps for O(1) `get_parents`/`get_children`.
///
/// Not thread-safe on its own; every caller holds the manager's single
/// mutex (§5).
#[derive(Debug, Default)]
pub struct EdgeIndex {
    graph: DiGraphMap<RecordId, ()>,
    children_of: HashMap<RecordId, HashSet<RecordId>>,
    parents_of: HashMap<RecordId, HashSet<RecordId>>,
}

impl EdgeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_parents(&self, child: RecordId) -> Vec<RecordId> {
        self.parents_of
            .get(&child)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn get_children(&self, parent: RecordId) -> Vec<RecordId> {
        self.children_of
            .get(&parent)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default()
    }

    /// All descendants of `root` (not including `root` itself), via BFS over
    /// `get_children`. Used by alert propagation (§4.9) and cascading
    /// delete's scope-expansion helpers.
    pub fn descendants(&self, root: RecordId) -> Vec<RecordId> {
        let mut seen = HashSet::new();
        let mut queue = std::collections::VecDeque::new();
        queue.push_back(root);
        seen.insert(root);
        let mut out = Vec::new();
        while let Some(node) = queue.pop_front() {
            for child in self.get_children(node) {
                if seen.insert(child) {
                    out.push(child);
                    queue.push_back(child);
                }
            }
        }
        out
    }

    /// Add a parent edge, rejecting it if it would close a cycle.
    pub fn add_parent(&mut self, child: RecordId, parent: RecordId) -> Result<(), GraphError> {
        if child == parent {
            return Err(GraphError::ParentCycle { child, parent });
        }
        self.graph.add_edge(child, parent, ());
        if is_cyclic_directed(&self.graph) {
            self.graph.remove_edge(child, parent);
            return Err(GraphError::ParentCycle { child, parent });
        }
        self.children_of.entry(parent).or_default().insert(child);
        self.parents_of.entry(child).or_default().insert(parent);
        Ok(())
    }

    pub fn remove_parent(&mut self, child: RecordId, parent: RecordId) {
        self.graph.remove_edge(child, parent);
        if let Some(set) = self.children_of.get_mut(&parent) {
            set.remove(&child);
        }
        if let Some(set) = self.parents_of.get_mut(&child) {
            set.remove(&parent);
        }
    }

    /// Remove all edges incident to `node`, in either direction, and drop
    /// its now-empty slots.
    pub fn remove_node(&mut self, node: RecordId) {
        let parents: Vec<RecordId> = self.get_parents(node);
        for parent in parents {
            self.remove_parent(node, parent);
        }
        let children: Vec<RecordId> = self.get_children(node);
        for child in children {
            self.remove_parent(child, node);
        }
        self.graph.remove_node(node);
        self.children_of.remove(&node);
        self.parents_of.remove(&node);
    }

    pub fn has_cycle(&self) -> bool {
        is_cyclic_directed(&self.graph)
    }

    /// Rebuild from durable state at startup (§5 "Startup").
    pub fn populate<I>(&mut self, edges: I)
    where
        I: IntoIterator<Item = (RecordId, Vec<RecordId>)>,
    {
        for (child, parents) in edges {
            for parent in parents {
                let _ = self.add_parent(child, parent);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_query_edges() {
        let mut idx = EdgeIndex::new();
        idx.add_parent(RecordId(1), RecordId(2)).unwrap();
        assert_eq!(idx.get_parents(RecordId(1)), vec![RecordId(2)]);
        assert_eq!(idx.get_children(RecordId(2)), vec![RecordId(1)]);
    }

    #[test]
    fn remove_node_clears_both_directions() {
        let mut idx = EdgeIndex::new();
        idx.add_parent(RecordId(1), RecordId(2)).unwrap();
        idx.add_parent(RecordId(3), RecordId(1)).unwrap();
        idx.remove_node(RecordId(1));
        assert!(idx.get_parents(RecordId(1)).is_empty());
        assert!(idx.get_children(RecordId(2)).is_empty());
        assert!(idx.get_parents(RecordId(3)).is_empty());
    }

    #[test]
    fn rejects_self_cycle() {
        let mut idx = EdgeIndex::new();
        assert!(idx.add_parent(RecordId(1), RecordId(1)).is_err());
    }

    #[test]
    fn rejects_transitive_cycle() {
        let mut idx = EdgeIndex::new();
        idx.add_parent(RecordId(1), RecordId(2)).unwrap();
        idx.add_parent(RecordId(2), RecordId(3)).unwrap();
        assert!(idx.add_parent(RecordId(3), RecordId(1)).is_err());
        assert!(!idx.has_cycle());
    }

    #[test]
    fn descendants_are_transitive() {
        let mut idx = EdgeIndex::new();
        // R -> P1 -> P2 (R is descendant of P1, P1 is descendant of P2)
        idx.add_parent(RecordId(1), RecordId(2)).unwrap(); // R=1 child of P1=2
        idx.add_parent(RecordId(2), RecordId(3)).unwrap(); // P1=2 child of P2=3
        let mut d = idx.descendants(RecordId(3));
        d.sort();
        assert_eq!(d, vec![RecordId(1), RecordId(2)]);
    }

    #[test]
    fn populate_rebuilds_from_iterator() {
        let mut idx = EdgeIndex::new();
        idx.populate(vec![(RecordId(1), vec![RecordId(2), RecordId(3)])]);
        let mut parents = idx.get_parents(RecordId(1));
        parents.sort();
        assert_eq!(parents, vec![RecordId(2), RecordId(3)]);
    }
}
