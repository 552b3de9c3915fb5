//! Orchestration layer for the troupe multi-agent system.
//!
//! This module turns a goal into a validated task DAG, partitions the
//! DAG into dependency-ordered waves, and drives each node through an
//! agent runner with retry and loop circuit-breaking. The
//! [`Orchestrator`] facade wires the pieces for end-to-end use.

pub mod detection;
pub mod monitor;
pub mod pipeline;
pub mod planner;
pub mod runner;
pub mod scheduler;
pub mod validator;

pub use detection::{RegexToolExtractor, ToolCall, ToolExtractor, GENERIC_TOOL};
pub use monitor::{ExecutionMonitor, LoopDetector};
pub use pipeline::Orchestrator;
pub use planner::{DecompositionSource, PlanNormalizer};
pub use runner::{AgentRunner, HeadlessRunner, RunOutcome, RunnerResponse, DEFAULT_TIMEOUT_SECS};
pub use scheduler::{ExecutionReport, SchedulerEvent, WavePlan, WaveScheduler};
pub use validator::ValidationError;
