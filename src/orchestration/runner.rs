//! Agent execution collaborators.
//!
//! The [`AgentRunner`] trait is the single seam between the orchestration
//! engine and whatever actually performs a task. The default
//! [`HeadlessRunner`] shells out to an agent CLI in headless mode
//! (`-p` flag) with JSON output parsing; tests substitute scripted
//! implementations.

use crate::config::Config;
use crate::core::node::AgentType;
use crate::error::{Error, Result};
use crate::orchestration::planner::DecompositionSource;
use crate::tlog_debug;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;

/// Default timeout for a single agent execution (10 minutes).
pub const DEFAULT_TIMEOUT_SECS: u64 = 600;

/// Executes one task on behalf of the orchestrator.
///
/// Any error is treated identically by the monitor regardless of cause:
/// the attempt failed and may be retried.
#[async_trait]
pub trait AgentRunner: Send + Sync {
    /// Run `task` as the given agent role, with optional accumulated context.
    async fn run(
        &self,
        agent_type: AgentType,
        task: &str,
        context: Option<&str>,
    ) -> Result<String>;
}

/// The result type from a headless agent execution.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// Successful execution with output.
    Success {
        /// The text output from the agent.
        output: String,
    },
    /// Failed execution with error message.
    Error {
        /// The error message describing what went wrong.
        message: String,
    },
}

/// Response from a headless agent execution.
///
/// Contains the session ID (for potential continuation), the outcome,
/// and optional cost information.
#[derive(Debug, Clone)]
pub struct RunnerResponse {
    /// Session ID for potential continuation (if available).
    pub session_id: Option<String>,
    /// The outcome of the execution.
    pub result: RunOutcome,
    /// Cost in USD (if available).
    pub cost_usd: Option<f64>,
    /// Duration in milliseconds (if available).
    pub duration_ms: Option<u64>,
    /// Number of turns/iterations (if available).
    pub num_turns: Option<u32>,
}

impl RunnerResponse {
    /// Check if the response indicates success.
    pub fn is_success(&self) -> bool {
        matches!(self.result, RunOutcome::Success { .. })
    }

    /// Get the output text if successful.
    pub fn output(&self) -> Option<&str> {
        match &self.result {
            RunOutcome::Success { output } => Some(output),
            RunOutcome::Error { .. } => None,
        }
    }

    /// Get the error message if failed.
    pub fn error_message(&self) -> Option<&str> {
        match &self.result {
            RunOutcome::Success { .. } => None,
            RunOutcome::Error { message } => Some(message),
        }
    }
}

/// Internal struct for deserializing the runner's JSON envelope.
#[derive(Debug, Deserialize)]
struct RawRunnerResponse {
    subtype: Option<String>,
    result: Option<String>,
    session_id: Option<String>,
    total_cost_usd: Option<f64>,
    duration_ms: Option<u64>,
    num_turns: Option<u32>,
    #[serde(default)]
    error: Option<String>,
}

/// Headless agent CLI executor.
///
/// Executes the agent binary in non-interactive mode using the `-p` flag
/// with JSON output format, parses the response, and returns structured
/// results.
#[derive(Debug, Clone)]
pub struct HeadlessRunner {
    /// Path to the agent binary.
    binary: PathBuf,
    /// Output format (always "json").
    output_format: String,
    /// Timeout for execution.
    timeout: Duration,
}

impl HeadlessRunner {
    /// Create a new HeadlessRunner using the default agent command.
    ///
    /// Automatically detects the binary using `which`.
    ///
    /// # Errors
    ///
    /// Returns an error if the agent binary cannot be found on PATH.
    pub fn new() -> Result<Self> {
        Self::with_command(Config::DEFAULT_RUNNER_COMMAND)
    }

    /// Create a HeadlessRunner from the configured runner command.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::with_command(config.effective_runner_command())
    }

    /// Create a HeadlessRunner by resolving a command name on PATH.
    pub fn with_command(command: &str) -> Result<Self> {
        let binary = which::which(command).map_err(|_| Error::RunnerBinaryNotFound)?;
        Ok(Self::with_binary(binary))
    }

    /// Create a HeadlessRunner with a specific binary path.
    ///
    /// Useful for testing or non-standard install locations.
    pub fn with_binary(binary: PathBuf) -> Self {
        Self {
            binary,
            output_format: "json".to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Set a custom timeout for execution.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Get the binary path.
    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Get the output format.
    pub fn output_format(&self) -> &str {
        &self.output_format
    }

    /// Get the timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Build the role-prefixed prompt handed to the agent binary.
    fn build_prompt(agent_type: AgentType, task: &str, context: Option<&str>) -> String {
        let mut prompt = format!(
            "You are acting as the {} agent. Complete this task:\n{}",
            agent_type, task
        );

        if let Some(context) = context.filter(|c| !c.trim().is_empty()) {
            prompt.push_str("\n\nContext from earlier tasks:\n");
            prompt.push_str(context);
        }

        prompt
    }

    /// Execute a prompt in headless mode.
    ///
    /// Runs the agent binary with the given prompt, parses the JSON
    /// output, and returns a structured response.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails to spawn or times out.
    pub async fn execute(&self, prompt: &str) -> Result<RunnerResponse> {
        let output = tokio::time::timeout(
            self.timeout,
            Command::new(&self.binary)
                .arg("-p")
                .arg(prompt)
                .arg("--output-format")
                .arg(&self.output_format)
                .output(),
        )
        .await
        .map_err(|_| Error::Timeout(self.timeout))?
        .map_err(Error::Io)?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        // Try to parse JSON response
        if let Ok(response) = Self::parse_json_response(&stdout) {
            return Ok(response);
        }

        // If JSON parsing failed, check exit code
        if !output.status.success() {
            let error_msg = if stderr.is_empty() {
                format!(
                    "agent execution failed with exit code {}",
                    output.status.code().unwrap_or(-1)
                )
            } else {
                stderr.trim().to_string()
            };

            return Ok(RunnerResponse {
                session_id: None,
                result: RunOutcome::Error { message: error_msg },
                cost_usd: None,
                duration_ms: None,
                num_turns: None,
            });
        }

        // Non-JSON success output (shouldn't happen with --output-format json)
        Ok(RunnerResponse {
            session_id: None,
            result: RunOutcome::Success {
                output: stdout.trim().to_string(),
            },
            cost_usd: None,
            duration_ms: None,
            num_turns: None,
        })
    }

    /// Parse the runner's JSON envelope into a [`RunnerResponse`].
    pub fn parse_json_response(json_str: &str) -> Result<RunnerResponse> {
        let raw: RawRunnerResponse = serde_json::from_str(json_str)?;

        let result = match raw.subtype.as_deref() {
            Some("success") => RunOutcome::Success {
                output: raw.result.unwrap_or_default(),
            },
            Some("error") => RunOutcome::Error {
                message: raw.error.or(raw.result).unwrap_or_default(),
            },
            _ => {
                // If no subtype, check if we have a result or error
                if let Some(error) = raw.error {
                    RunOutcome::Error { message: error }
                } else if let Some(result) = raw.result {
                    RunOutcome::Success { output: result }
                } else {
                    RunOutcome::Error {
                        message: "unknown response format".to_string(),
                    }
                }
            }
        };

        Ok(RunnerResponse {
            session_id: raw.session_id,
            result,
            cost_usd: raw.total_cost_usd,
            duration_ms: raw.duration_ms,
            num_turns: raw.num_turns,
        })
    }
}

#[async_trait]
impl AgentRunner for HeadlessRunner {
    async fn run(
        &self,
        agent_type: AgentType,
        task: &str,
        context: Option<&str>,
    ) -> Result<String> {
        let prompt = Self::build_prompt(agent_type, task, context);
        let response = self.execute(&prompt).await?;

        if let Some(ms) = response.duration_ms {
            tlog_debug!("[runner] {} agent finished in {}ms", agent_type, ms);
        }

        match response.result {
            RunOutcome::Success { output } => Ok(output),
            RunOutcome::Error { message } => Err(Error::AgentFailed(message)),
        }
    }
}

#[async_trait]
impl DecompositionSource for HeadlessRunner {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let response = self.execute(prompt).await?;
        match response.result {
            RunOutcome::Success { output } => Ok(output),
            RunOutcome::Error { message } => Err(Error::AgentFailed(message)),
        }
    }
}
