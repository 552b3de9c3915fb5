//! End-to-end ACP tests: registration, discovery, delivery, and the
//! request timeout path, with the audit trail checked at each step.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use troupe::acp::{AcpMessage, AcpRouter, AcpState, AgentRegistry, MemoryAuditSink};
use troupe::Error;

use crate::fixtures::{AckHandler, CountingHandler, SilentHandler};

async fn planner_executor_router() -> (AcpRouter, Arc<MemoryAuditSink>, String) {
    let registry = Arc::new(AgentRegistry::new());
    let planner = registry
        .register("planner", &["task.*"], Arc::new(AckHandler))
        .await
        .unwrap();
    registry
        .register("executor", &["task.result"], Arc::new(SilentHandler))
        .await
        .unwrap();
    let audit = Arc::new(MemoryAuditSink::new());
    let router = AcpRouter::new(registry, audit.clone());
    (router, audit, planner.secret)
}

/// Test: silent executor
/// Given a registered executor whose handler never responds
/// When the planner issues a request with a 200ms deadline
/// Then the call fails with a timeout and the flow stays at requested
#[tokio::test]
async fn test_acceptance_silent_executor_request_times_out() {
    let (router, audit, planner_secret) = planner_executor_router().await;

    let err = router
        .request_with_timeout(
            "planner",
            "executor",
            "task.run",
            json!({"target": "build"}),
            &planner_secret,
            Duration::from_millis(200),
        )
        .await
        .unwrap_err();

    let Error::RequestTimeout { flow, elapsed } = err else {
        panic!("expected RequestTimeout, got {err}");
    };
    assert_eq!(elapsed, Duration::from_millis(200));
    assert_eq!(router.flow_state(&flow).await, AcpState::Requested);

    // Delivery itself was accepted, so the audit trail has the transition
    let entries = audit.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].kind, "acp.transition");
    assert_eq!(entries[0].text, "idle -> requested");
}

/// Test: tampered payload
/// Given a request whose payload is altered after signing
/// When it is sent
/// Then the recipient's handler never runs and the rejection is audited
#[tokio::test]
async fn test_tampered_request_never_reaches_the_handler() {
    let registry = Arc::new(AgentRegistry::new());
    let planner = registry
        .register("planner", &["task.*"], Arc::new(AckHandler))
        .await
        .unwrap();
    let counter = Arc::new(CountingHandler::new());
    registry
        .register("executor", &["task.result"], counter.clone())
        .await
        .unwrap();
    let audit = Arc::new(MemoryAuditSink::new());
    let router = AcpRouter::new(registry, audit.clone());

    let mut message =
        AcpMessage::request("planner", "executor", "task.run", json!({"cmd": "deploy"}));
    message.sign(&planner.secret).unwrap();
    message.payload = json!({"cmd": "drop all tables"});

    let delivered = router.send(message, &planner.secret).await;

    assert!(delivered.is_none());
    assert_eq!(counter.call_count(), 0, "handler must not see a tampered message");

    let entries = audit.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].kind, "acp.rejected");
    assert_eq!(entries[0].text, "signature verification failed");
}

#[tokio::test]
async fn test_capability_discovery_round_trip() {
    let registry = Arc::new(AgentRegistry::new());
    let coordinator = registry
        .register("coordinator", &["*"], Arc::new(AckHandler))
        .await
        .unwrap();
    registry
        .register("summarizer", &["report.*"], Arc::new(AckHandler))
        .await
        .unwrap();
    let audit = Arc::new(MemoryAuditSink::new());
    let router = AcpRouter::new(registry, audit.clone());

    let found = router
        .registry()
        .find_agent_by_capability("report.generate")
        .await;
    assert_eq!(found.as_deref(), Some("summarizer"));

    let response = router
        .request(
            "coordinator",
            &found.unwrap(),
            "report.generate",
            json!({"topic": "weekly metrics"}),
            &coordinator.secret,
        )
        .await
        .unwrap();

    assert_eq!(response.from, "summarizer");
    assert_eq!(response.to, "coordinator");
    assert_eq!(response.state, AcpState::Acknowledged);
    assert!(response.correlation_id.is_some());

    let texts: Vec<String> = audit.entries().into_iter().map(|e| e.text).collect();
    assert_eq!(texts, vec!["idle -> requested", "requested -> acknowledged"]);
}

/// Rejections return nothing to the caller but leave a full audit record.
#[tokio::test]
async fn test_rejection_is_silent_at_transport_but_audited() {
    let registry = Arc::new(AgentRegistry::new());
    registry
        .register("executor", &["task.result"], Arc::new(AckHandler))
        .await
        .unwrap();
    let audit = Arc::new(MemoryAuditSink::new());
    let router = AcpRouter::new(registry, audit.clone());

    let mut message = AcpMessage::request("ghost", "executor", "task.run", json!({}));
    message.sign("made-up-secret").unwrap();

    let delivered = router.send(message, "made-up-secret").await;
    assert!(delivered.is_none());

    let entries = audit.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].kind, "acp.rejected");
    assert_eq!(entries[0].actor_id, "ghost");
    assert_eq!(entries[0].text, "sender 'ghost' not registered");
    assert_eq!(entries[0].metadata["action"], "task.run");
}
