//! Plan validation before scheduling.
//!
//! A normalized plan is checked for duplicate ids, referential integrity,
//! self-dependencies and cycles, in that order. Each check produces its
//! own failure kind so callers can report precisely what was wrong. Any
//! failure aborts planning for that goal; a broken plan must never
//! silently degrade to partial execution.

use crate::core::node::TaskNode;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// A reason a plan failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Two nodes share an id.
    #[error("duplicate node id '{0}'")]
    DuplicateId(String),

    /// A node depends on an id not present in the plan.
    #[error("node '{node}' depends on unknown node '{dep}'")]
    UnknownDependency {
        /// The node carrying the bad reference.
        node: String,
        /// The referenced id that does not exist.
        dep: String,
    },

    /// A node lists itself as a dependency.
    #[error("node '{0}' depends on itself")]
    SelfDependency(String),

    /// The dependency graph contains a cycle through this node.
    #[error("dependency cycle detected through node '{0}'")]
    Cycle(String),
}

/// Node coloring for the cycle-detection traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    /// Not yet visited.
    White,
    /// On the current traversal path.
    Gray,
    /// Fully explored.
    Black,
}

/// Validate a normalized plan.
///
/// Checks run in a fixed order, first failure wins: duplicate ids, then
/// unknown dependencies, then self-dependencies, then cycles.
pub fn validate(nodes: &[TaskNode]) -> Result<(), ValidationError> {
    // (1) duplicate node ids
    let mut ids = HashSet::new();
    for node in nodes {
        if !ids.insert(node.id.as_str()) {
            return Err(ValidationError::DuplicateId(node.id.clone()));
        }
    }

    // (2) dependencies referencing nonexistent ids
    for node in nodes {
        for dep in &node.depends_on {
            if !ids.contains(dep.as_str()) {
                return Err(ValidationError::UnknownDependency {
                    node: node.id.clone(),
                    dep: dep.clone(),
                });
            }
        }
    }

    // (3) nodes depending on themselves
    for node in nodes {
        if node.depends_on.iter().any(|dep| dep == &node.id) {
            return Err(ValidationError::SelfDependency(node.id.clone()));
        }
    }

    // (4) cycles anywhere in the dependency graph
    let by_id: HashMap<&str, &TaskNode> =
        nodes.iter().map(|node| (node.id.as_str(), node)).collect();
    let mut colors: HashMap<&str, Color> = HashMap::new();

    for node in nodes {
        let color = colors.get(node.id.as_str()).copied().unwrap_or(Color::White);
        if color == Color::White {
            if let Some(entry) = visit(node.id.as_str(), &by_id, &mut colors) {
                return Err(ValidationError::Cycle(entry));
            }
        }
    }

    Ok(())
}

/// Depth-first visit following dependency edges.
///
/// An edge into a gray node means the traversal re-entered its own path,
/// which is a cycle. Returns the id where the cycle closed.
fn visit<'a>(
    id: &'a str,
    by_id: &HashMap<&'a str, &'a TaskNode>,
    colors: &mut HashMap<&'a str, Color>,
) -> Option<String> {
    colors.insert(id, Color::Gray);

    if let Some(node) = by_id.get(id) {
        for dep in &node.depends_on {
            match colors.get(dep.as_str()).copied().unwrap_or(Color::White) {
                Color::Gray => return Some(dep.clone()),
                Color::Black => {}
                Color::White => {
                    if let Some(entry) = visit(dep.as_str(), by_id, colors) {
                        return Some(entry);
                    }
                }
            }
        }
    }

    colors.insert(id, Color::Black);
    None
}
