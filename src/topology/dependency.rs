// Copyright (c) 2025 - Cowboy AI, Inc.
//! Dependency DAG
//!
//! Arena-indexed graph of happens-before edges between declared nodes. An
//! edge `from → to` means `from` depends on `to`: `to` is created first and
//! destroyed last.
//!
//! The graph is kept acyclic at all times. Every edge insertion runs a
//! reachability check and is refused with the full cycle path if it would
//! close a loop, so ordering never has to cope with cycles.

use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashMap};

use serde::{Deserialize, Serialize};

use crate::domain::{LogicalId, ValidationError};

/// Position of a node in the arena, equal to its declaration order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeIndex(usize);

impl NodeIndex {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Acyclic dependency graph keyed by logical ID
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    ids: Vec<LogicalId>,
    lookup: HashMap<LogicalId, NodeIndex>,
    /// node → nodes it depends on
    dependencies: Vec<BTreeSet<NodeIndex>>,
    /// node → nodes depending on it
    dependents: Vec<BTreeSet<NodeIndex>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node
    ///
    /// # Errors
    /// - `DuplicateId` if the ID is already registered
    pub fn add_node(&mut self, id: LogicalId) -> Result<NodeIndex, ValidationError> {
        if self.lookup.contains_key(&id) {
            return Err(ValidationError::DuplicateId(id));
        }

        let index = NodeIndex(self.ids.len());
        self.lookup.insert(id.clone(), index);
        self.ids.push(id);
        self.dependencies.push(BTreeSet::new());
        self.dependents.push(BTreeSet::new());
        Ok(index)
    }

    /// Record that `from` depends on `to`
    ///
    /// Re-adding an existing edge is a no-op.
    ///
    /// # Errors
    /// - `Cycle` with the path `from → to → … → from` if `to` already
    ///   depends on `from`, directly or transitively
    pub fn add_edge(&mut self, from: NodeIndex, to: NodeIndex) -> Result<(), ValidationError> {
        if self.dependencies[from.0].contains(&to) {
            return Ok(());
        }

        if let Some(path) = self.path_between(to, from) {
            let mut cycle = vec![self.ids[from.0].clone()];
            cycle.extend(path.into_iter().map(|n| self.ids[n.0].clone()));
            return Err(ValidationError::Cycle { path: cycle });
        }

        self.dependencies[from.0].insert(to);
        self.dependents[to.0].insert(from);
        Ok(())
    }

    /// Dependency path `start → … → goal`, if one exists
    fn path_between(&self, start: NodeIndex, goal: NodeIndex) -> Option<Vec<NodeIndex>> {
        let mut parent: HashMap<NodeIndex, NodeIndex> = HashMap::new();
        let mut stack = vec![start];
        let mut seen = BTreeSet::from([start]);

        while let Some(node) = stack.pop() {
            if node == goal {
                let mut path = vec![node];
                let mut current = node;
                while let Some(&prev) = parent.get(&current) {
                    path.push(prev);
                    current = prev;
                }
                path.reverse();
                return Some(path);
            }

            for &next in &self.dependencies[node.0] {
                if seen.insert(next) {
                    parent.insert(next, node);
                    stack.push(next);
                }
            }
        }
        None
    }

    pub fn index_of(&self, id: &LogicalId) -> Option<NodeIndex> {
        self.lookup.get(id).copied()
    }

    pub fn id(&self, index: NodeIndex) -> &LogicalId {
        &self.ids[index.0]
    }

    pub fn contains(&self, id: &LogicalId) -> bool {
        self.lookup.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Nodes `index` depends on
    pub fn dependencies(&self, index: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        self.dependencies[index.0].iter().copied()
    }

    /// Nodes depending on `index`
    pub fn dependents(&self, index: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        self.dependents[index.0].iter().copied()
    }

    /// All node indices in declaration order
    pub fn indices(&self) -> impl Iterator<Item = NodeIndex> {
        (0..self.ids.len()).map(NodeIndex)
    }

    /// Dependencies-first order (Kahn's algorithm)
    ///
    /// Among ready nodes the smallest `priority` key goes first; ties fall
    /// back to declaration order.
    pub fn topological_order<K, F>(&self, priority: F) -> Vec<NodeIndex>
    where
        K: Ord,
        F: Fn(NodeIndex) -> K,
    {
        let mut remaining: Vec<usize> = self.dependencies.iter().map(BTreeSet::len).collect();
        let mut ready = BinaryHeap::new();

        for index in self.indices() {
            if remaining[index.0] == 0 {
                ready.push(Reverse((priority(index), index)));
            }
        }

        let mut order = Vec::with_capacity(self.ids.len());
        while let Some(Reverse((_, index))) = ready.pop() {
            order.push(index);
            for &dependent in &self.dependents[index.0] {
                remaining[dependent.0] -= 1;
                if remaining[dependent.0] == 0 {
                    ready.push(Reverse((priority(dependent), dependent)));
                }
            }
        }

        order
    }
}
