//! Goal decomposition and plan normalization.
//!
//! A [`DecompositionSource`] turns a goal into raw text that should
//! contain a JSON array of node-shaped objects, optionally fenced in a
//! markdown code block. The [`PlanNormalizer`] strips the fencing,
//! parses and normalizes the array into [`TaskNode`]s, runs validation,
//! and falls back to a single-node plan whenever anything about the
//! decomposition is unusable. Planning never fails outright: a goal
//! always yields an executable DAG.

use crate::config::Config;
use crate::core::dag::TaskDAG;
use crate::core::node::{AgentType, TaskNode};
use crate::error::{Error, Result};
use crate::orchestration::validator;
use crate::{tlog_debug, tlog_warn};
use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

/// Produces a raw decomposition for a planning prompt.
///
/// Typically backed by an LLM call; tests use scripted sources.
#[async_trait]
pub trait DecompositionSource: Send + Sync {
    /// Generate decomposition text for the given prompt.
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Normalizes raw decomposition output into a validated plan.
#[derive(Debug, Clone)]
pub struct PlanNormalizer {
    /// Maximum nodes kept per plan; surplus is dropped.
    max_nodes: usize,
    /// `max_retries` applied when a node doesn't specify one.
    default_max_retries: u32,
    /// Upper bound for a node's `max_retries`.
    retry_cap: u32,
}

impl PlanNormalizer {
    /// Create a normalizer with default limits.
    pub fn new() -> Self {
        Self::from_config(&Config::default())
    }

    /// Create a normalizer using the configured limits.
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_nodes: config.max_nodes,
            default_max_retries: config.default_max_retries,
            retry_cap: config.retry_cap,
        }
    }

    /// The prompt sent to the decomposition source for a goal.
    pub fn decomposition_prompt(goal: &str) -> String {
        format!(
            concat!(
                "Decompose this goal into a plan of sub-tasks:\n{}\n\n",
                "Respond with a JSON array in this exact format:\n",
                "[\n",
                "  {{\n",
                "    \"id\": \"<unique-id>\",\n",
                "    \"task\": \"<what this node does>\",\n",
                "    \"agent_type\": \"<agent>\",\n",
                "    \"depends_on\": [\"<ids this node depends on>\"]\n",
                "  }}\n",
                "]\n\n",
                "Allowed agent types: researcher, coder, writer, analyst, ",
                "executor, reviewer.\n",
                "Optional per-node fields: \"context\" (seed text) and ",
                "\"max_retries\" (0-2).\n",
                "Nodes with no dependencies use \"depends_on\": [].\n",
                "Use at most 8 nodes. Wrap the JSON in a ```json code fence.",
            ),
            goal
        )
    }

    /// Isolate the JSON payload in decomposition text.
    ///
    /// Handles ```json fences, bare ``` fences, and prose surrounding a
    /// bare array. Returns `None` when no array-shaped payload is found.
    pub fn extract_json(text: &str) -> Option<&str> {
        if let Some(start) = text.find("```json") {
            let rest = &text[start + "```json".len()..];
            if let Some(end) = rest.find("```") {
                let candidate = rest[..end].trim();
                if !candidate.is_empty() {
                    return Some(candidate);
                }
            }
        }

        if let Some(start) = text.find("```\n[") {
            let rest = &text[start + "```\n".len()..];
            if let Some(end) = rest.find("```") {
                let candidate = rest[..end].trim();
                if !candidate.is_empty() {
                    return Some(candidate);
                }
            }
        }

        let open = text.find('[')?;
        let close = text.rfind(']')?;
        if close > open {
            return Some(&text[open..=close]);
        }

        None
    }

    /// Normalize an untyped decomposition into plan nodes.
    ///
    /// # Errors
    ///
    /// Fails when the input is not a non-empty array or any surviving
    /// element lacks a valid id, task or agent type. Dependency arrays
    /// are filtered, never fatal; surplus nodes beyond the cap are
    /// dropped, never fatal.
    pub fn normalize(&self, raw: &Value, goal: &str) -> Result<Vec<TaskNode>> {
        let elements = raw
            .as_array()
            .filter(|a| !a.is_empty())
            .ok_or_else(|| Error::Decomposition("not a non-empty array".to_string()))?;

        let mut nodes = Vec::with_capacity(elements.len().min(self.max_nodes));
        for (index, element) in elements.iter().enumerate() {
            if nodes.len() == self.max_nodes {
                tlog_warn!(
                    "[planner] Plan for '{}' has {} nodes, keeping the first {}",
                    goal,
                    elements.len(),
                    self.max_nodes
                );
                break;
            }
            nodes.push(self.normalize_element(element, index)?);
        }

        Ok(nodes)
    }

    /// Normalize one array element into a [`TaskNode`].
    fn normalize_element(&self, element: &Value, index: usize) -> Result<TaskNode> {
        let obj = element
            .as_object()
            .ok_or_else(|| Error::Decomposition(format!("node {} is not an object", index)))?;

        let id = obj
            .get("id")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::Decomposition(format!("node {} has no valid id", index)))?;

        let task = obj
            .get("task")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::Decomposition(format!("node '{}' has no task text", id)))?;

        let agent_type = obj
            .get("agent_type")
            .and_then(Value::as_str)
            .and_then(AgentType::parse)
            .ok_or_else(|| {
                Error::Decomposition(format!("node '{}' has no valid agent type", id))
            })?;

        let mut node = TaskNode::new(id, task, agent_type);
        node.depends_on = filter_dependencies(obj.get("depends_on"));

        node.max_retries = obj
            .get("max_retries")
            .and_then(Value::as_i64)
            .map(|n| n.clamp(0, self.retry_cap as i64) as u32)
            .unwrap_or(self.default_max_retries);

        node.context = obj
            .get("context")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from);

        Ok(node)
    }

    /// The single-node plan substituted when decomposition is unusable.
    ///
    /// One analyst node carrying the whole goal, with the maximum retry
    /// allowance.
    pub fn fallback_plan(&self, goal: &str) -> Vec<TaskNode> {
        let id = format!("task-{}", &Uuid::new_v4().to_string()[..8]);
        vec![TaskNode::new(&id, goal, AgentType::Analyst).with_max_retries(self.retry_cap)]
    }

    /// Decompose, normalize and validate a goal into plan nodes.
    ///
    /// # Errors
    ///
    /// Any stage can fail here: generation, JSON extraction/parsing,
    /// normalization, validation. [`PlanNormalizer::plan`] recovers from
    /// all of them; call this directly only when the fallback is not
    /// wanted.
    pub async fn decompose(
        &self,
        source: &dyn DecompositionSource,
        goal: &str,
    ) -> Result<Vec<TaskNode>> {
        let prompt = Self::decomposition_prompt(goal);
        let text = source.generate(&prompt).await?;

        let payload = Self::extract_json(&text)
            .ok_or_else(|| Error::Decomposition("no JSON array in response".to_string()))?;
        let raw: Value = serde_json::from_str(payload)?;

        let nodes = self.normalize(&raw, goal)?;
        validator::validate(&nodes)?;

        tlog_debug!("[planner] Goal '{}' decomposed into {} nodes", goal, nodes.len());
        Ok(nodes)
    }

    /// Turn a goal into an executable DAG, falling back when needed.
    ///
    /// Decomposition or validation failure is recovered, not propagated:
    /// the goal becomes a single-node plan handled by an analyst.
    pub async fn plan(&self, source: &dyn DecompositionSource, goal: &str) -> Result<TaskDAG> {
        let nodes = match self.decompose(source, goal).await {
            Ok(nodes) => nodes,
            Err(err) => {
                tlog_warn!(
                    "[planner] Decomposition for '{}' unusable ({}), using fallback plan",
                    goal,
                    err
                );
                self.fallback_plan(goal)
            }
        };

        TaskDAG::from_plan(goal, nodes)
    }
}

impl Default for PlanNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Keep only well-formed, trimmed, deduplicated string ids.
fn filter_dependencies(value: Option<&Value>) -> Vec<String> {
    let Some(Value::Array(entries)) = value else {
        return Vec::new();
    };

    let mut deps: Vec<String> = Vec::new();
    for entry in entries {
        if let Some(dep) = entry.as_str().map(str::trim).filter(|s| !s.is_empty()) {
            if !deps.iter().any(|d| d == dep) {
                deps.push(dep.to_string());
            }
        }
    }
    deps
}
