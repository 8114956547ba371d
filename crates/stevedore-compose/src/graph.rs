//! Dependency graph management using `petgraph`.
//!
//! Services that link to, or take volumes from, other services must be
//! brought up after them. The graph yields that order.

use std::collections::HashMap;

use petgraph::graph::NodeIndex;
use stevedore_common::error::{Result, StevedoreError};

/// A dependency graph of services keyed by name.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    /// Internal petgraph representation.
    graph: petgraph::Graph<String, ()>,
    nodes: HashMap<String, NodeIndex>,
}

impl DependencyGraph {
    /// Creates an empty dependency graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a service node, returning the existing node if already present.
    pub fn add_service(&mut self, name: &str) -> NodeIndex {
        if let Some(&idx) = self.nodes.get(name) {
            return idx;
        }
        let idx = self.graph.add_node(name.to_string());
        let _ = self.nodes.insert(name.to_string(), idx);
        idx
    }

    /// Records that `dependent` needs `dependency` to exist first.
    ///
    /// The edge points from `dependency` to `dependent` so that a
    /// topological sort yields dependencies first.
    ///
    /// # Errors
    ///
    /// Returns an error if either service has not been added.
    pub fn add_dependency(&mut self, dependent: &str, dependency: &str) -> Result<()> {
        let from = self.lookup(dependency, dependent)?;
        let to = self.lookup(dependent, dependent)?;
        let _ = self.graph.update_edge(from, to, ());
        Ok(())
    }

    fn lookup(&self, name: &str, referenced_by: &str) -> Result<NodeIndex> {
        self.nodes.get(name).copied().ok_or_else(|| {
            StevedoreError::config(format!(
                "service \"{referenced_by}\" depends on \"{name}\", which is not defined"
            ))
        })
    }

    /// Returns service names with every dependency before its dependents.
    ///
    /// # Errors
    ///
    /// Returns an error if the graph contains cycles.
    pub fn resolve_order(&self) -> Result<Vec<String>> {
        match petgraph::algo::toposort(&self.graph, None) {
            Ok(indices) => {
                let names: Vec<String> = indices
                    .iter()
                    .filter_map(|&idx| self.graph.node_weight(idx).cloned())
                    .collect();
                Ok(names)
            }
            Err(cycle) => {
                let name = self
                    .graph
                    .node_weight(cycle.node_id())
                    .cloned()
                    .unwrap_or_default();
                Err(StevedoreError::config(format!(
                    "circular dependency between services involving \"{name}\""
                )))
            }
        }
    }
}
