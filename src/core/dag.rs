//! Task DAG for dependency management.
//!
//! This module provides the TaskDAG structure that represents plan node
//! dependencies as a directed acyclic graph, enabling parallel execution
//! of independent nodes.

use crate::core::node::TaskNode;
use crate::error::{Error, Result};
use petgraph::algo::is_cyclic_directed;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{HashMap, HashSet};

/// The task dependency graph.
///
/// TaskDAG uses petgraph's DiGraph to represent dependencies between plan
/// nodes. An edge from A to B means A must complete before B can start.
/// Nodes iterate in insertion order, which is plan order.
pub struct TaskDAG {
    /// The goal this plan was decomposed from.
    root_goal: String,
    /// The underlying directed graph.
    graph: DiGraph<TaskNode, ()>,
    /// Index mapping from node id to NodeIndex for fast lookups.
    node_index: HashMap<String, NodeIndex>,
}

impl TaskDAG {
    /// Create an empty TaskDAG for the given goal.
    pub fn new(root_goal: impl Into<String>) -> Self {
        Self {
            root_goal: root_goal.into(),
            graph: DiGraph::new(),
            node_index: HashMap::new(),
        }
    }

    /// Build a TaskDAG from a normalized plan.
    ///
    /// Adds every node in plan order, then wires an edge from each
    /// dependency to its dependent.
    ///
    /// # Errors
    /// Returns an error if a dependency references an id not in the plan
    /// or if the dependencies form a cycle. Plans that went through
    /// validation never hit either case.
    pub fn from_plan(root_goal: impl Into<String>, nodes: Vec<TaskNode>) -> Result<Self> {
        let mut dag = Self::new(root_goal);

        for node in nodes {
            dag.add_node(node);
        }

        // Collect edges first: wiring borrows the graph mutably.
        let mut edges = Vec::new();
        for node in dag.graph.node_weights() {
            for dep in &node.depends_on {
                edges.push((dep.clone(), node.id.clone()));
            }
        }
        for (from, to) in edges {
            dag.add_dependency(&from, &to)?;
        }

        Ok(dag)
    }

    /// The goal this plan was decomposed from.
    pub fn root_goal(&self) -> &str {
        &self.root_goal
    }

    /// Add a node to the DAG.
    ///
    /// Returns the NodeIndex for the added node. If a node with the same
    /// id already exists, returns the existing NodeIndex.
    pub fn add_node(&mut self, node: TaskNode) -> NodeIndex {
        if let Some(&index) = self.node_index.get(&node.id) {
            return index;
        }

        let id = node.id.clone();
        let index = self.graph.add_node(node);
        self.node_index.insert(id, index);
        index
    }

    /// Add a dependency between two nodes.
    ///
    /// The dependency indicates that `from` must complete before `to` can
    /// start. This method validates that adding the edge won't create a
    /// cycle.
    ///
    /// # Errors
    /// Returns an error if either node is not found or adding the edge
    /// would create a cycle.
    pub fn add_dependency(&mut self, from: &str, to: &str) -> Result<()> {
        let from_index = *self
            .node_index
            .get(from)
            .ok_or_else(|| Error::Decomposition(format!("node '{}' not in plan", from)))?;

        let to_index = *self
            .node_index
            .get(to)
            .ok_or_else(|| Error::Decomposition(format!("node '{}' not in plan", to)))?;

        // Temporarily add the edge to check for cycles
        let edge = self.graph.add_edge(from_index, to_index, ());

        if is_cyclic_directed(&self.graph) {
            self.graph.remove_edge(edge);
            return Err(Error::Decomposition(format!(
                "dependency from '{}' to '{}' creates a cycle",
                from, to
            )));
        }

        Ok(())
    }

    /// Get a reference to a node by its id.
    pub fn get_node(&self, id: &str) -> Option<&TaskNode> {
        self.node_index
            .get(id)
            .and_then(|&index| self.graph.node_weight(index))
    }

    /// Get the NodeIndex for a node by its id.
    pub fn get_node_index(&self, id: &str) -> Option<NodeIndex> {
        self.node_index.get(id).copied()
    }

    /// Get the number of nodes in the DAG.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Get the number of dependencies (edges) in the DAG.
    pub fn dependency_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Check if a dependency edge exists between two nodes.
    pub fn has_dependency(&self, from: &str, to: &str) -> bool {
        if let (Some(&from_idx), Some(&to_idx)) =
            (self.node_index.get(from), self.node_index.get(to))
        {
            self.graph.find_edge(from_idx, to_idx).is_some()
        } else {
            false
        }
    }

    /// Get all nodes the given node depends on (predecessors).
    pub fn dependencies_of(&self, id: &str) -> Vec<&TaskNode> {
        if let Some(&index) = self.node_index.get(id) {
            self.graph
                .neighbors_directed(index, petgraph::Direction::Incoming)
                .filter_map(|neighbor| self.graph.node_weight(neighbor))
                .collect()
        } else {
            Vec::new()
        }
    }

    /// Get all nodes in insertion (plan) order.
    pub fn all_nodes(&self) -> Vec<&TaskNode> {
        self.graph.node_weights().collect()
    }

    /// Check if the DAG is empty.
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Check if the DAG contains a node.
    pub fn contains_node(&self, id: &str) -> bool {
        self.node_index.contains_key(id)
    }

    // ========== Scheduling Operations ==========

    /// Get all nodes ready to execute (dependencies satisfied).
    ///
    /// Readiness follows each node's declared dependency set: a node is
    /// ready when every id it depends on is in the completed set. A
    /// declared dependency with no matching node keeps its dependent
    /// blocked forever, which the scheduler surfaces as a degraded run
    /// rather than hanging. Results come back in plan order.
    pub fn ready_nodes<'a>(&'a self, completed: &HashSet<String>) -> Vec<&'a TaskNode> {
        self.graph
            .node_weights()
            .filter(|node| {
                !completed.contains(&node.id)
                    && node.depends_on.iter().all(|dep| completed.contains(dep))
            })
            .collect()
    }

    /// Get all nodes not yet in the completed set, in plan order.
    pub fn pending_nodes<'a>(&'a self, completed: &HashSet<String>) -> Vec<&'a TaskNode> {
        self.graph
            .node_weights()
            .filter(|node| !completed.contains(&node.id))
            .collect()
    }

    /// Check if every node in the DAG is in the completed set.
    pub fn all_complete(&self, completed: &HashSet<String>) -> bool {
        self.node_index.keys().all(|id| completed.contains(id))
    }
}

impl std::fmt::Debug for TaskDAG {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskDAG")
            .field("root_goal", &self.root_goal)
            .field("nodes", &self.node_count())
            .field("dependencies", &self.dependency_count())
            .finish()
    }
}
