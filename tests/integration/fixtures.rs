//! Test fixtures for integration tests.
//!
//! Mock collaborators standing in for the language model, the agent CLI,
//! and protocol handlers, so the suite runs without network access or
//! subprocesses.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;

use troupe::acp::{AcpMessage, AcpState, AgentHandler};
use troupe::core::node::AgentType;
use troupe::error::{Error, Result};
use troupe::orchestration::{AgentRunner, DecompositionSource};

/// Decomposition source returning one canned response.
pub struct ScriptedSource {
    response: String,
}

impl ScriptedSource {
    pub fn new(response: &str) -> Self {
        Self {
            response: response.to_string(),
        }
    }

    /// Wrap plan JSON in the markdown fence a model typically emits.
    pub fn fenced(plan_json: &str) -> Self {
        Self::new(&format!(
            "Here is the plan:\n```json\n{}\n```\n",
            plan_json
        ))
    }
}

#[async_trait]
impl DecompositionSource for ScriptedSource {
    async fn generate(&self, _prompt: &str) -> Result<String> {
        Ok(self.response.clone())
    }
}

/// One recorded call into [`ScriptedRunner`].
#[derive(Debug, Clone)]
pub struct RunnerCall {
    pub agent_type: AgentType,
    pub task: String,
    pub context: Option<String>,
}

/// Agent runner with per-task scripted outcomes.
///
/// Outcomes are queued against a needle matched on the task text and
/// consumed one per attempt. Tasks with no matching script (or an
/// exhausted queue) succeed with an echo of the task.
#[derive(Default)]
pub struct ScriptedRunner {
    scripts: Mutex<Vec<(String, Vec<std::result::Result<String, String>>)>>,
    calls: Mutex<Vec<RunnerCall>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue outcomes for tasks containing `needle`.
    pub fn script(
        self,
        needle: &str,
        outcomes: Vec<std::result::Result<String, String>>,
    ) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .push((needle.to_string(), outcomes));
        self
    }

    pub fn calls(&self) -> Vec<RunnerCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls whose task text contains `needle`.
    pub fn calls_for(&self, needle: &str) -> Vec<RunnerCall> {
        self.calls()
            .into_iter()
            .filter(|call| call.task.contains(needle))
            .collect()
    }
}

#[async_trait]
impl AgentRunner for ScriptedRunner {
    async fn run(
        &self,
        agent_type: AgentType,
        task: &str,
        context: Option<&str>,
    ) -> Result<String> {
        self.calls.lock().unwrap().push(RunnerCall {
            agent_type,
            task: task.to_string(),
            context: context.map(str::to_string),
        });

        let mut scripts = self.scripts.lock().unwrap();
        for (needle, queue) in scripts.iter_mut() {
            if task.contains(needle.as_str()) && !queue.is_empty() {
                return match queue.remove(0) {
                    Ok(output) => Ok(output),
                    Err(message) => Err(Error::AgentFailed(message)),
                };
            }
        }
        Ok(format!("done: {}", task))
    }
}

/// Protocol handler that acknowledges every request.
pub struct AckHandler;

#[async_trait]
impl AgentHandler for AckHandler {
    async fn handle(&self, message: &AcpMessage) -> Result<Option<AcpMessage>> {
        Ok(Some(
            message.response_to(AcpState::Acknowledged, json!({"ok": true})),
        ))
    }
}

/// Protocol handler that accepts messages and never responds.
pub struct SilentHandler;

#[async_trait]
impl AgentHandler for SilentHandler {
    async fn handle(&self, _message: &AcpMessage) -> Result<Option<AcpMessage>> {
        Ok(None)
    }
}

/// Protocol handler that counts invocations and never responds.
#[derive(Default)]
pub struct CountingHandler {
    calls: AtomicUsize,
}

impl CountingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AgentHandler for CountingHandler {
    async fn handle(&self, _message: &AcpMessage) -> Result<Option<AcpMessage>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(None)
    }
}
