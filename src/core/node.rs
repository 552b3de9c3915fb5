//! Task-node data model for the execution DAG.
//!
//! Nodes are the atomic units of work produced by plan normalization.
//! Each node names the agent role that runs it, the instruction text,
//! and the dependencies whose results feed its prompt context.

use serde::{Deserialize, Serialize};

/// The closed set of agent roles a node can be assigned to.
///
/// Reviewer and analyst are full-context roles: when executed they see
/// every completed result so far, not just their declared dependencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentType {
    Researcher,
    Coder,
    Writer,
    Analyst,
    Executor,
    Reviewer,
}

impl AgentType {
    /// Every role, in declaration order.
    pub const ALL: [AgentType; 6] = [
        AgentType::Researcher,
        AgentType::Coder,
        AgentType::Writer,
        AgentType::Analyst,
        AgentType::Executor,
        AgentType::Reviewer,
    ];

    /// Parse a role name as it appears in decomposition output.
    ///
    /// Matching is case-insensitive over the trimmed input; anything
    /// outside the closed set yields `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "researcher" => Some(AgentType::Researcher),
            "coder" => Some(AgentType::Coder),
            "writer" => Some(AgentType::Writer),
            "analyst" => Some(AgentType::Analyst),
            "executor" => Some(AgentType::Executor),
            "reviewer" => Some(AgentType::Reviewer),
            _ => None,
        }
    }

    /// Whether this role gathers context from every completed result
    /// rather than only its declared dependencies.
    pub fn is_full_context(&self) -> bool {
        matches!(self, AgentType::Reviewer | AgentType::Analyst)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentType::Researcher => "researcher",
            AgentType::Coder => "coder",
            AgentType::Writer => "writer",
            AgentType::Analyst => "analyst",
            AgentType::Executor => "executor",
            AgentType::Reviewer => "reviewer",
        }
    }
}

impl std::fmt::Display for AgentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single node in the execution DAG.
///
/// Created once by plan normalization and immutable thereafter; the
/// scheduler and monitor only read it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskNode {
    /// Identifier unique within its plan. Supplied by the decomposition
    /// (e.g. "t1"), or generated for fallback plans.
    pub id: String,
    /// Free-text instruction for the agent.
    pub task: String,
    /// Role that executes this node.
    pub agent_type: AgentType,
    /// Ids of nodes whose results feed this node's context.
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// Optional seed context used when no dependency context exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    /// Extra attempts beyond the first (0-2).
    pub max_retries: u32,
}

impl TaskNode {
    /// Create a node with no dependencies, no seed context, and one
    /// extra attempt.
    pub fn new(id: &str, task: &str, agent_type: AgentType) -> Self {
        Self {
            id: id.to_string(),
            task: task.to_string(),
            agent_type,
            depends_on: Vec::new(),
            context: None,
            max_retries: 1,
        }
    }

    /// Set the dependency list.
    pub fn with_dependencies(mut self, deps: &[&str]) -> Self {
        self.depends_on = deps.iter().map(|d| d.to_string()).collect();
        self
    }

    /// Set the seed context.
    pub fn with_context(mut self, context: &str) -> Self {
        self.context = Some(context.to_string());
        self
    }

    /// Set the number of extra attempts.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Total attempts the monitor may spend on this node.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }
}

/// Severity attached to a loop-detector signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignalSeverity {
    Warning,
    CircuitBreak,
}

impl std::fmt::Display for SignalSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalSeverity::Warning => write!(f, "warning"),
            SignalSeverity::CircuitBreak => write!(f, "circuit-break"),
        }
    }
}

/// Verdict from the loop detector about a recorded tool invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopSignal {
    pub severity: SignalSeverity,
    pub should_stop: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl LoopSignal {
    pub fn warning(reason: &str) -> Self {
        Self {
            severity: SignalSeverity::Warning,
            should_stop: false,
            reason: Some(reason.to_string()),
        }
    }

    pub fn circuit_break(reason: &str) -> Self {
        Self {
            severity: SignalSeverity::CircuitBreak,
            should_stop: true,
            reason: Some(reason.to_string()),
        }
    }
}

/// Outcome of driving one node to completion.
///
/// Produced exactly once per node by the execution monitor. Failure is
/// data here, not an error: exhausted retries and loop circuit breaks
/// both surface as `success = false`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    pub node_id: String,
    pub success: bool,
    pub output: String,
    /// Attempts actually spent, starting at 1.
    pub attempts: u32,
    /// Failure messages in the order they occurred.
    #[serde(default)]
    pub error_history: Vec<String>,
    /// True when an anomaly signal forced the failure.
    #[serde(default)]
    pub loop_break: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loop_signal: Option<LoopSignal>,
}

impl TaskResult {
    /// Successful completion.
    pub fn succeeded(node_id: &str, output: &str, attempts: u32, error_history: Vec<String>) -> Self {
        Self {
            node_id: node_id.to_string(),
            success: true,
            output: output.to_string(),
            attempts,
            error_history,
            loop_break: false,
            loop_signal: None,
        }
    }

    /// Failure after exhausting every attempt.
    pub fn failed(node_id: &str, output: &str, attempts: u32, error_history: Vec<String>) -> Self {
        Self {
            node_id: node_id.to_string(),
            success: false,
            output: output.to_string(),
            attempts,
            error_history,
            loop_break: false,
            loop_signal: None,
        }
    }

    /// Failure forced by a stop signal despite a successful call.
    pub fn loop_broken(
        node_id: &str,
        output: &str,
        attempts: u32,
        error_history: Vec<String>,
        signal: LoopSignal,
    ) -> Self {
        Self {
            node_id: node_id.to_string(),
            success: false,
            output: output.to_string(),
            attempts,
            error_history,
            loop_break: true,
            loop_signal: Some(signal),
        }
    }
}
