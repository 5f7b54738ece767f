//! Service dependency graph using `petgraph`.
//!
//! Builds a directed graph from `depends_on` declarations, rejects cycles,
//! and resolves a start order where dependencies come first.

use std::collections::HashMap;

use dockmod_common::error::{DockmodError, Result};
use petgraph::graph::NodeIndex;

/// A dependency graph of services.
#[derive(Debug)]
pub struct DependencyGraph {
    graph: petgraph::Graph<String, ()>,
    nodes: HashMap<String, NodeIndex>,
}

impl DependencyGraph {
    /// Creates an empty dependency graph.
    #[must_use]
    pub fn new() -> Self {
        Self {
            graph: petgraph::Graph::new(),
            nodes: HashMap::new(),
        }
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

    /// Adds a dependency edge: `dependent` depends on `dependency`.
    ///
    /// The edge points from `dependency` to `dependent` so that a
    /// topological sort yields dependencies first.
    pub fn add_dependency(&mut self, dependent: &str, dependency: &str) {
        let from = self.add_service(dependency);
        let to = self.add_service(dependent);
        let _ = self.graph.add_edge(from, to, ());
    }

    /// Fails if any services depend on each other in a cycle.
    ///
    /// # Errors
    ///
    /// Returns [`DockmodError::DependencyCycle`] naming the services of
    /// the first cycle found.
    pub fn check_acyclic(&self) -> Result<()> {
        for component in petgraph::algo::tarjan_scc(&self.graph) {
            let self_loop = component.len() == 1
                && self.graph.contains_edge(component[0], component[0]);
            if component.len() > 1 || self_loop {
                let mut names: Vec<&str> = component
                    .iter()
                    .filter_map(|&idx| self.graph.node_weight(idx).map(String::as_str))
                    .collect();
                names.sort_unstable();
                return Err(DockmodError::DependencyCycle {
                    services: names.join(", "),
                });
            }
        }
        Ok(())
    }

    /// Returns a start order where dependencies precede their dependents.
    ///
    /// # Errors
    ///
    /// Returns an error if the graph contains cycles.
    pub fn resolve_order(&self) -> Result<Vec<String>> {
        self.check_acyclic()?;
        petgraph::algo::toposort(&self.graph, None)
            .map(|indices| {
                indices
                    .iter()
                    .filter_map(|&idx| self.graph.node_weight(idx).cloned())
                    .collect()
            })
            .map_err(|cycle| DockmodError::DependencyCycle {
                services: self
                    .graph
                    .node_weight(cycle.node_id())
                    .cloned()
                    .unwrap_or_default(),
            })
    }
}

impl Default for DependencyGraph {
    fn default() -> Self {
        Self::new()
    }
}
