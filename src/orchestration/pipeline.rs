//! End-to-end goal orchestration.
//!
//! Ties planning and execution together: a goal is decomposed into a
//! DAG, the DAG is partitioned into waves, and the waves are executed.
//! Both halves stay independently usable; this facade only wires them.

use crate::config::Config;
use crate::core::dag::TaskDAG;
use crate::error::Result;
use crate::orchestration::monitor::ExecutionMonitor;
use crate::orchestration::planner::{DecompositionSource, PlanNormalizer};
use crate::orchestration::runner::HeadlessRunner;
use crate::orchestration::scheduler::{ExecutionReport, WaveScheduler};
use crate::tlog;
use std::sync::Arc;

/// Plans and executes goals.
///
/// # Example
///
/// ```ignore
/// use troupe::config::Config;
/// use troupe::orchestration::Orchestrator;
///
/// let orchestrator = Orchestrator::headless(&Config::default())?;
/// let report = orchestrator.run_goal("Summarize latest AI news").await?;
/// println!("{} of {} nodes succeeded", report.succeeded_count(), report.results.len());
/// ```
pub struct Orchestrator {
    source: Arc<dyn DecompositionSource>,
    normalizer: PlanNormalizer,
    scheduler: WaveScheduler,
}

impl Orchestrator {
    /// Wire an orchestrator from its parts.
    pub fn new(source: Arc<dyn DecompositionSource>, scheduler: WaveScheduler) -> Self {
        Self {
            source,
            normalizer: PlanNormalizer::new(),
            scheduler,
        }
    }

    /// Build an orchestrator backed by the configured agent binary for
    /// both decomposition and node execution.
    ///
    /// # Errors
    ///
    /// Returns an error if the binary cannot be found on PATH.
    pub fn headless(config: &Config) -> Result<Self> {
        let runner = Arc::new(HeadlessRunner::from_config(config)?);
        Ok(Self {
            source: runner.clone(),
            normalizer: PlanNormalizer::from_config(config),
            scheduler: WaveScheduler::new(ExecutionMonitor::from_config(runner, config)),
        })
    }

    /// Replace the plan normalizer.
    pub fn with_normalizer(mut self, normalizer: PlanNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// Decompose a goal into an executable DAG.
    ///
    /// Unusable decompositions fall back to a single-node plan, so this
    /// fails only on internal errors, not on bad model output.
    pub async fn plan(&self, goal: &str) -> Result<TaskDAG> {
        self.normalizer.plan(self.source.as_ref(), goal).await
    }

    /// Decompose and execute a goal end to end.
    pub async fn run_goal(&self, goal: &str) -> Result<ExecutionReport> {
        tlog!("[orchestrator] Starting goal: {}", goal);
        let dag = self.plan(goal).await?;
        let report = self.scheduler.run(&dag).await;
        Ok(report)
    }
}
