//! End-to-end orchestration tests: goal in, execution report out.
//!
//! These tests drive the full pipeline (decomposition, normalization,
//! validation, wave scheduling, monitored execution) with scripted
//! collaborators in place of the model and the agent CLI.

use std::collections::HashSet;
use std::sync::Arc;

use troupe::core::node::AgentType;
use troupe::orchestration::{ExecutionMonitor, Orchestrator, WaveScheduler};

use crate::fixtures::{ScriptedRunner, ScriptedSource};

const NEWS_PLAN: &str = r#"[
    {"id": "t1", "task": "Research the latest AI news", "agent_type": "researcher", "depends_on": [], "max_retries": 2},
    {"id": "t2", "task": "Write an email summarizing the findings", "agent_type": "writer", "depends_on": ["t1"]}
]"#;

const RELEASE_PLAN: &str = r#"[
    {"id": "spec", "task": "Outline the feature requirements", "agent_type": "analyst", "depends_on": []},
    {"id": "api", "task": "Code the API endpoints", "agent_type": "coder", "depends_on": ["spec"]},
    {"id": "ui", "task": "Code the UI widgets", "agent_type": "coder", "depends_on": ["spec"]},
    {"id": "docs", "task": "Write the user documentation", "agent_type": "writer", "depends_on": ["api", "ui"]},
    {"id": "review", "task": "Review the whole release", "agent_type": "reviewer", "depends_on": ["docs"]}
]"#;

fn orchestrator_with(source: ScriptedSource, runner: Arc<ScriptedRunner>) -> Orchestrator {
    let monitor = ExecutionMonitor::new(runner);
    Orchestrator::new(Arc::new(source), WaveScheduler::new(monitor))
}

/// Test: E2E news summary
/// Given a two-node plan where the researcher fails twice before
/// succeeding
/// When the goal runs end to end
/// Then t1 records 3 attempts with both failures, and t2 runs in the
/// next wave with t1's truncated output as context
#[tokio::test]
async fn test_e2e_news_summary_with_retries() {
    let findings = format!("AI headline digest: {}", "x".repeat(520));
    let runner = Arc::new(ScriptedRunner::new().script(
        "Research",
        vec![
            Err("rate limited".to_string()),
            Err("provider unavailable".to_string()),
            Ok(findings.clone()),
        ],
    ));
    let orchestrator = orchestrator_with(ScriptedSource::fenced(NEWS_PLAN), runner.clone());

    let report = orchestrator
        .run_goal("Summarize latest AI news and email it")
        .await
        .unwrap();

    assert_eq!(report.root_goal, "Summarize latest AI news and email it");
    assert_eq!(report.waves, vec![vec!["t1".to_string()], vec!["t2".to_string()]]);
    assert!(!report.degraded);
    assert!(report.all_succeeded());

    let t1 = report.result_for("t1").unwrap();
    assert_eq!(t1.attempts, 3);
    assert_eq!(t1.error_history.len(), 2);
    assert!(t1.error_history[0].contains("rate limited"));
    assert!(t1.error_history[1].contains("provider unavailable"));
    assert_eq!(t1.output, findings);

    let t2 = report.result_for("t2").unwrap();
    assert_eq!(t2.attempts, 1);
    assert!(t2.error_history.is_empty());

    // The writer saw t1's output truncated to the context limit
    let writer_calls = runner.calls_for("email");
    assert_eq!(writer_calls.len(), 1);
    let context = writer_calls[0].context.as_deref().unwrap();
    let excerpt: String = findings.chars().take(500).collect();
    assert!(context.contains(&format!("[Result of t1 | success=true]: {}", excerpt)));
    assert!(!context.contains(&findings), "context should not carry the full output");
}

/// Test: malformed decomposition degrades to the fallback plan
/// Given a source that returns no JSON at all
/// When the goal runs
/// Then a single analyst node carrying the goal text executes
#[tokio::test]
async fn test_e2e_malformed_decomposition_runs_fallback() {
    let runner = Arc::new(ScriptedRunner::new());
    let orchestrator = orchestrator_with(
        ScriptedSource::new("I could not produce a plan, sorry."),
        runner.clone(),
    );

    let report = orchestrator.run_goal("Audit the billing logs").await.unwrap();

    assert_eq!(report.results.len(), 1);
    assert!(report.all_succeeded());
    assert!(!report.degraded);
    assert_eq!(report.waves.len(), 1);

    let calls = runner.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].agent_type, AgentType::Analyst);
    assert_eq!(calls[0].task, "Audit the billing logs");
}

#[tokio::test]
async fn test_e2e_waves_respect_dependency_order() {
    let runner = Arc::new(ScriptedRunner::new());
    let orchestrator = orchestrator_with(ScriptedSource::fenced(RELEASE_PLAN), runner.clone());

    let report = orchestrator.run_goal("Ship the release").await.unwrap();

    let deps: &[(&str, &[&str])] = &[
        ("spec", &[]),
        ("api", &["spec"]),
        ("ui", &["spec"]),
        ("docs", &["api", "ui"]),
        ("review", &["docs"]),
    ];

    // Waves partition the node set
    let scheduled: Vec<&String> = report.waves.iter().flatten().collect();
    assert_eq!(scheduled.len(), 5);
    assert_eq!(scheduled.iter().collect::<HashSet<_>>().len(), 5);

    // Every node lands strictly after each of its dependencies
    let wave_of = |id: &str| {
        report
            .waves
            .iter()
            .position(|wave| wave.iter().any(|node| node == id))
            .unwrap()
    };
    for (id, node_deps) in deps {
        for dep in *node_deps {
            assert!(
                wave_of(id) > wave_of(dep),
                "{} (wave {}) should run after {} (wave {})",
                id,
                wave_of(id),
                dep,
                wave_of(dep)
            );
        }
    }

    assert_eq!(report.results.len(), 5);
    assert!(report.all_succeeded());
}

/// Test: a failed dependency does not block downstream nodes
/// Given t1 exhausting all attempts
/// When t2 (depending on t1) executes in the next wave
/// Then t2 still runs, with the failure visible in its context
#[tokio::test]
async fn test_e2e_failed_dependency_still_executes_downstream() {
    let runner = Arc::new(ScriptedRunner::new().script(
        "Research",
        vec![
            Err("search API down".to_string()),
            Err("search API down".to_string()),
            Err("search API down".to_string()),
        ],
    ));
    let orchestrator = orchestrator_with(ScriptedSource::fenced(NEWS_PLAN), runner.clone());

    let report = orchestrator
        .run_goal("Summarize latest AI news and email it")
        .await
        .unwrap();

    let t1 = report.result_for("t1").unwrap();
    assert!(!t1.success);
    assert_eq!(t1.attempts, 3);
    assert!(t1.output.starts_with("Failed after 3 attempts"));

    let t2 = report.result_for("t2").unwrap();
    assert!(t2.success);

    let context = runner.calls_for("email")[0].context.clone().unwrap();
    assert!(context.starts_with("[Result of t1 | success=false]:"));

    assert_eq!(report.succeeded_count(), 1);
    assert_eq!(report.failed_count(), 1);
}

#[tokio::test]
async fn test_e2e_reviewer_sees_results_beyond_its_dependencies() {
    let plan = r#"[
        {"id": "t1", "task": "Research pricing pages", "agent_type": "researcher", "depends_on": []},
        {"id": "t2", "task": "Research competitor blogs", "agent_type": "researcher", "depends_on": []},
        {"id": "t3", "task": "Review the research", "agent_type": "reviewer", "depends_on": ["t2"]}
    ]"#;
    let runner = Arc::new(
        ScriptedRunner::new()
            .script("pricing", vec![Ok("pricing notes".to_string())])
            .script("blogs", vec![Ok("blog notes".to_string())]),
    );
    let orchestrator = orchestrator_with(ScriptedSource::fenced(plan), runner.clone());

    let report = orchestrator.run_goal("Compare competitors").await.unwrap();
    assert!(report.all_succeeded());

    // Reviewer context covers every completed result, not just t2
    let context = runner.calls_for("Review")[0].context.clone().unwrap();
    assert!(context.contains("[Result of t1 | success=true]: pricing notes"));
    assert!(context.contains("[Result of t2 | success=true]: blog notes"));
}
