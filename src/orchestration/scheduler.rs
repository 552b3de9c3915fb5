//! Wave-based concurrent plan execution.
//!
//! The scheduler partitions a validated DAG into waves (batches of
//! nodes whose dependencies are already scheduled), runs each wave's
//! nodes concurrently through the execution monitor, and appends their
//! results only at the wave barrier. A plan that gets stuck, which can
//! only happen when validation was bypassed, degrades to one final
//! best-effort wave instead of hanging.

use crate::core::dag::TaskDAG;
use crate::core::node::{TaskNode, TaskResult};
use crate::orchestration::monitor::ExecutionMonitor;
use crate::{tlog, tlog_debug, tlog_warn};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tokio::sync::mpsc;

/// Events emitted by the scheduler for execution lifecycle changes.
///
/// These events let external components observe a run without polling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerEvent {
    /// A wave of nodes began executing concurrently.
    WaveStarted {
        /// Zero-based wave index.
        wave: usize,
        /// Node ids in the wave, in plan order.
        node_ids: Vec<String>,
    },
    /// The wave just started is the best-effort remainder of a stuck
    /// partition; its nodes run with unavailable dependencies.
    DegradedWave { node_ids: Vec<String> },
    /// A node was handed to the execution monitor.
    NodeStarted { node_id: String },
    /// A node finished, successfully or not.
    NodeFinished {
        node_id: String,
        success: bool,
        attempts: u32,
    },
    /// Every wave has resolved.
    RunComplete { succeeded: usize, failed: usize },
}

/// The wave partition computed for a DAG.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WavePlan {
    /// Node ids per wave, outer order = execution order.
    pub waves: Vec<Vec<String>>,
    /// True when an unresolvable remainder was emitted as a final
    /// best-effort wave.
    pub degraded: bool,
}

impl WavePlan {
    /// Wave index a node was scheduled into.
    pub fn wave_of(&self, node_id: &str) -> Option<usize> {
        self.waves
            .iter()
            .position(|wave| wave.iter().any(|id| id == node_id))
    }
}

/// Outcome of executing a whole plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionReport {
    /// The goal the plan was built for.
    pub root_goal: String,
    /// The wave partition that was executed.
    pub waves: Vec<Vec<String>>,
    /// True when the run included a best-effort wave.
    pub degraded: bool,
    /// One result per node, in completion (wave) order.
    pub results: Vec<TaskResult>,
}

impl ExecutionReport {
    pub fn succeeded_count(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|r| !r.success).count()
    }

    pub fn all_succeeded(&self) -> bool {
        self.results.iter().all(|r| r.success)
    }

    /// The result recorded for a node, if it ran.
    pub fn result_for(&self, node_id: &str) -> Option<&TaskResult> {
        self.results.iter().find(|r| r.node_id == node_id)
    }
}

/// Executes a DAG wave by wave.
pub struct WaveScheduler {
    monitor: ExecutionMonitor,
    event_tx: Option<mpsc::Sender<SchedulerEvent>>,
}

impl WaveScheduler {
    /// Create a scheduler driving nodes through the given monitor.
    pub fn new(monitor: ExecutionMonitor) -> Self {
        Self {
            monitor,
            event_tx: None,
        }
    }

    /// Emit lifecycle events on the given channel.
    pub fn with_events(mut self, event_tx: mpsc::Sender<SchedulerEvent>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    /// Partition a DAG into dependency-ordered waves.
    ///
    /// Each wave holds every unscheduled node whose dependencies are all
    /// scheduled. When no node qualifies while some remain, the
    /// remainder becomes one final best-effort wave and the plan is
    /// marked degraded; their dependents see those dependencies as
    /// unavailable rather than never running at all.
    pub fn compute_waves(dag: &TaskDAG) -> WavePlan {
        let mut waves: Vec<Vec<String>> = Vec::new();
        let mut scheduled: HashSet<String> = HashSet::new();
        let mut degraded = false;

        while scheduled.len() < dag.node_count() {
            let ready: Vec<String> = dag
                .ready_nodes(&scheduled)
                .iter()
                .map(|node| node.id.clone())
                .collect();

            if ready.is_empty() {
                let stuck: Vec<String> = dag
                    .pending_nodes(&scheduled)
                    .iter()
                    .map(|node| node.id.clone())
                    .collect();
                tlog_warn!(
                    "[scheduler] No schedulable node among {} remaining, running best-effort wave: {:?}",
                    stuck.len(),
                    stuck
                );
                scheduled.extend(stuck.iter().cloned());
                waves.push(stuck);
                degraded = true;
                break;
            }

            scheduled.extend(ready.iter().cloned());
            waves.push(ready);
        }

        WavePlan { waves, degraded }
    }

    /// Execute every node of the DAG, wave by wave.
    ///
    /// Nodes within a wave run concurrently; their results become
    /// visible to later waves only once the whole wave has resolved.
    /// Node failures are recorded, not propagated, so a run always
    /// produces one result per node.
    pub async fn run(&self, dag: &TaskDAG) -> ExecutionReport {
        let plan = Self::compute_waves(dag);
        let mut results: Vec<TaskResult> = Vec::new();

        for (index, wave) in plan.waves.iter().enumerate() {
            tlog_debug!(
                "[scheduler] Wave {} starting with {} node(s)",
                index,
                wave.len()
            );
            self.emit(SchedulerEvent::WaveStarted {
                wave: index,
                node_ids: wave.clone(),
            })
            .await;
            if plan.degraded && index == plan.waves.len() - 1 {
                self.emit(SchedulerEvent::DegradedWave {
                    node_ids: wave.clone(),
                })
                .await;
            }
            for id in wave {
                self.emit(SchedulerEvent::NodeStarted {
                    node_id: id.clone(),
                })
                .await;
            }

            let wave_nodes: Vec<&TaskNode> =
                wave.iter().filter_map(|id| dag.get_node(id)).collect();
            let pending = wave_nodes
                .iter()
                .copied()
                .map(|node| self.monitor.execute_node(node, &results));
            let wave_results = join_all(pending).await;

            for result in &wave_results {
                self.emit(SchedulerEvent::NodeFinished {
                    node_id: result.node_id.clone(),
                    success: result.success,
                    attempts: result.attempts,
                })
                .await;
            }
            results.extend(wave_results);
        }

        let report = ExecutionReport {
            root_goal: dag.root_goal().to_string(),
            waves: plan.waves,
            degraded: plan.degraded,
            results,
        };

        tlog!(
            "[scheduler] Goal '{}' finished: {} succeeded, {} failed",
            report.root_goal,
            report.succeeded_count(),
            report.failed_count()
        );
        self.emit(SchedulerEvent::RunComplete {
            succeeded: report.succeeded_count(),
            failed: report.failed_count(),
        })
        .await;

        report
    }

    async fn emit(&self, event: SchedulerEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event).await;
        }
    }
}
