//! Drives a single node to completion.
//!
//! The monitor assembles prompt context from dependency results, runs
//! the agent with bounded sequential retries, and consults an optional
//! loop detector after each successful call. A stop signal from the
//! detector fails the node even though the underlying call succeeded.

use crate::config::Config;
use crate::core::node::{LoopSignal, TaskNode, TaskResult};
use crate::orchestration::detection::{RegexToolExtractor, ToolExtractor};
use crate::orchestration::runner::AgentRunner;
use crate::{tlog_debug, tlog_warn};
use serde_json::Value;
use std::sync::Arc;

/// Observes tool invocations and flags anomalous repetition.
///
/// Returning a signal with `should_stop` set circuit-breaks the node;
/// a warning-severity signal is logged and otherwise ignored.
pub trait LoopDetector: Send + Sync {
    fn record(&self, tool: &str, params: &Value, output: &str) -> Option<LoopSignal>;
}

/// Executes one [`TaskNode`] and produces its [`TaskResult`].
pub struct ExecutionMonitor {
    runner: Arc<dyn AgentRunner>,
    detector: Option<Arc<dyn LoopDetector>>,
    extractor: Arc<dyn ToolExtractor>,
    /// Per-dependency output excerpt length, in characters.
    truncate_chars: usize,
}

impl ExecutionMonitor {
    /// Create a monitor with default limits and no loop detector.
    pub fn new(runner: Arc<dyn AgentRunner>) -> Self {
        Self::from_config(runner, &Config::default())
    }

    /// Create a monitor using the configured limits.
    pub fn from_config(runner: Arc<dyn AgentRunner>, config: &Config) -> Self {
        Self {
            runner,
            detector: None,
            extractor: Arc::new(RegexToolExtractor),
            truncate_chars: config.context_truncate_chars,
        }
    }

    /// Attach a loop detector consulted after each successful attempt.
    pub fn with_detector(mut self, detector: Arc<dyn LoopDetector>) -> Self {
        self.detector = Some(detector);
        self
    }

    /// Replace the regex tool-call heuristic with direct instrumentation.
    pub fn with_extractor(mut self, extractor: Arc<dyn ToolExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Run a node to completion against the completed results so far.
    ///
    /// Retries are sequential and bounded by the node's retry allowance.
    /// Failure is returned as data, never as an error: exhausted retries
    /// and loop circuit breaks both yield `success = false`.
    pub async fn execute_node(&self, node: &TaskNode, completed: &[TaskResult]) -> TaskResult {
        let dep_context = self.gather_context(node, completed);
        let mut error_history: Vec<String> = Vec::new();

        for attempt in 1..=node.max_attempts() {
            let context = attempt_context(node, &dep_context, &error_history);
            tlog_debug!(
                "[monitor] Node '{}' attempt {}/{} as {}",
                node.id,
                attempt,
                node.max_attempts(),
                node.agent_type
            );

            match self
                .runner
                .run(node.agent_type, &node.task, context.as_deref())
                .await
            {
                Ok(output) => {
                    if let Some(signal) = self.consult_detector(&output) {
                        let reason = signal.reason.clone().unwrap_or_default();
                        if signal.should_stop {
                            tlog_warn!(
                                "[monitor] Node '{}' circuit-broken on attempt {}: {}",
                                node.id,
                                attempt,
                                reason
                            );
                            return TaskResult::loop_broken(
                                &node.id,
                                &output,
                                attempt,
                                error_history,
                                signal,
                            );
                        }
                        tlog_warn!("[monitor] Node '{}' loop warning: {}", node.id, reason);
                    }
                    return TaskResult::succeeded(&node.id, &output, attempt, error_history);
                }
                Err(err) => {
                    let message = err.to_string();
                    tlog_warn!(
                        "[monitor] Node '{}' attempt {} failed: {}",
                        node.id,
                        attempt,
                        message
                    );
                    error_history.push(message);
                }
            }
        }

        let attempts = node.max_attempts();
        let last = error_history.last().cloned().unwrap_or_default();
        let output = format!("Failed after {} attempts. Last error: {}", attempts, last);
        TaskResult::failed(&node.id, &output, attempts, error_history)
    }

    /// Assemble the dependency context block for a node.
    ///
    /// Full-context roles see every completed result in completion
    /// order; other roles see only their declared dependencies, with a
    /// placeholder line for any dependency that never produced a result.
    fn gather_context(&self, node: &TaskNode, completed: &[TaskResult]) -> String {
        let mut lines: Vec<String> = Vec::new();

        if node.agent_type.is_full_context() {
            for result in completed {
                lines.push(self.result_line(result));
            }
        } else {
            for dep in &node.depends_on {
                match completed.iter().find(|r| &r.node_id == dep) {
                    Some(result) => lines.push(self.result_line(result)),
                    None => lines.push(format!("[Result of {}]: unavailable", dep)),
                }
            }
        }

        lines.join("\n")
    }

    fn result_line(&self, result: &TaskResult) -> String {
        let excerpt: String = result.output.chars().take(self.truncate_chars).collect();
        format!(
            "[Result of {} | success={}]: {}",
            result.node_id, result.success, excerpt
        )
    }

    fn consult_detector(&self, output: &str) -> Option<LoopSignal> {
        let detector = self.detector.as_ref()?;
        let call = self.extractor.extract(output);
        detector.record(&call.tool, &call.params, output)
    }
}

/// Context for one attempt.
///
/// Retries append the most recent failure to the dependency context;
/// the first attempt falls back to the node's seed context when no
/// dependency context exists.
fn attempt_context(node: &TaskNode, dep_context: &str, error_history: &[String]) -> Option<String> {
    match error_history.last() {
        Some(last) => {
            let note = format!(
                "Previous attempt failed with: {}. Try a different approach.",
                last
            );
            if dep_context.is_empty() {
                Some(note)
            } else {
                Some(format!("{}\n\n{}", dep_context, note))
            }
        }
        None if !dep_context.is_empty() => Some(dep_context.to_string()),
        None => node.context.clone(),
    }
}
