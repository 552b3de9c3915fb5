//! Core domain models for troupe orchestration.
//!
//! This module contains the fundamental data structures used throughout
//! the orchestration system, including plan nodes, execution results and
//! the execution DAG.

pub mod dag;
pub mod node;

pub use dag::TaskDAG;
pub use node::{AgentType, LoopSignal, SignalSeverity, TaskNode, TaskResult};
