//! Message routing between registered agents.
//!
//! The router is the single chokepoint of the protocol. Every message is
//! screened in a fixed order (registration, sender secret, signature,
//! payload scan, capability, flow transition) and either delivered to
//! the recipient's handler or dropped. Senders never learn which check
//! failed; the reason lands in the log and the audit trail.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use lru::LruCache;
use serde_json::{json, Value};
use tokio::sync::{oneshot, Mutex};

use crate::acp::audit::AuditSink;
use crate::acp::message::{AcpMessage, AcpState};
use crate::acp::registry::{action_allowed, AgentRegistry};
use crate::acp::signature;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::{tlog_debug, tlog_warn};

const TRANSPORT: &str = "acp";

/// Verdict from a payload scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOutcome {
    pub safe: bool,
    pub reason: Option<String>,
}

impl ScanOutcome {
    /// Payload is clean.
    pub fn pass() -> Self {
        Self {
            safe: true,
            reason: None,
        }
    }

    /// Payload must not be delivered.
    pub fn block(reason: &str) -> Self {
        Self {
            safe: false,
            reason: Some(reason.to_string()),
        }
    }
}

/// Inspects the JSON-serialized payload of every message before
/// delivery.
pub trait PayloadScanner: Send + Sync {
    fn scan(&self, text: &str) -> ScanOutcome;
}

/// Scanner that lets everything through.
#[derive(Default)]
pub struct PermissiveScanner;

impl PayloadScanner for PermissiveScanner {
    fn scan(&self, _text: &str) -> ScanOutcome {
        ScanOutcome::pass()
    }
}

/// Bounded map from flow key to current state. Least recently used
/// flows fall out once the capacity is reached; an evicted flow reads
/// as `idle` again.
struct FlowMap {
    flows: Mutex<LruCache<String, AcpState>>,
}

impl FlowMap {
    fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            flows: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Check and apply a transition under one lock hold, returning the
    /// state the flow was in before.
    async fn apply(&self, key: &str, to: AcpState) -> Result<AcpState> {
        let mut flows = self.flows.lock().await;
        let mut current = flows.get(key).copied().unwrap_or(AcpState::Idle);
        // A finished flow key reused by a fresh request starts over
        if current.is_terminal() && to == AcpState::Requested {
            current = AcpState::Idle;
        }
        if !current.can_transition(to) {
            return Err(Error::InvalidTransition { from: current, to });
        }
        flows.put(key.to_string(), to);
        Ok(current)
    }

    /// Current state of a key without touching recency.
    async fn state_of(&self, key: &str) -> AcpState {
        let flows = self.flows.lock().await;
        flows.peek(key).copied().unwrap_or(AcpState::Idle)
    }
}

/// Routes signed messages between registered agents.
#[derive(Clone)]
pub struct AcpRouter {
    registry: Arc<AgentRegistry>,
    scanner: Arc<dyn PayloadScanner>,
    audit: Arc<dyn AuditSink>,
    flows: Arc<FlowMap>,
    request_timeout: Duration,
}

impl AcpRouter {
    pub fn new(registry: Arc<AgentRegistry>, audit: Arc<dyn AuditSink>) -> Self {
        Self::from_config(registry, audit, &Config::default())
    }

    pub fn from_config(
        registry: Arc<AgentRegistry>,
        audit: Arc<dyn AuditSink>,
        config: &Config,
    ) -> Self {
        Self {
            registry,
            scanner: Arc::new(PermissiveScanner),
            audit,
            flows: Arc::new(FlowMap::new(config.flow_capacity)),
            request_timeout: Duration::from_millis(config.request_timeout_ms),
        }
    }

    pub fn with_scanner(mut self, scanner: Arc<dyn PayloadScanner>) -> Self {
        self.scanner = scanner;
        self
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    /// Deliver a signed message to its recipient's handler.
    ///
    /// Checks run in order: both endpoints registered, `sender_secret`
    /// matches the stored secret, signature verifies, payload passes the
    /// scanner, sender capability covers the action, and the flow
    /// transition to `message.state` is legal. Any failure drops the
    /// message and returns `None`. An accepted message is audited and
    /// handed to the recipient; a response from the handler advances the
    /// same flow (an illegal response state is dropped) and is returned.
    pub async fn send(&self, message: AcpMessage, sender_secret: &str) -> Option<AcpMessage> {
        let flow_key = message.flow_key();

        if let Err(reason) = self.screen(&message, sender_secret).await {
            self.reject(&message, &flow_key, &reason);
            return None;
        }

        let from_state = match self.flows.apply(&flow_key, message.state).await {
            Ok(state) => state,
            Err(err) => {
                self.reject(&message, &flow_key, &err.to_string());
                return None;
            }
        };
        self.audit_transition(&message, from_state);
        tlog_debug!(
            "[acp] Message {} delivered on flow {} ({} -> {})",
            message.id.short(),
            flow_key,
            from_state,
            message.state
        );

        let handler = self.registry.handler(&message.to).await?;
        match handler.handle(&message).await {
            Ok(Some(response)) => match self.flows.apply(&flow_key, response.state).await {
                Ok(previous) => {
                    self.audit_transition(&response, previous);
                    Some(response)
                }
                Err(err) => {
                    tlog_warn!("[acp] Response on flow {} dropped: {}", flow_key, err);
                    None
                }
            },
            Ok(None) => None,
            Err(err) => {
                tlog_warn!(
                    "[acp] Handler for '{}' failed on flow {}: {}",
                    message.to,
                    flow_key,
                    err
                );
                None
            }
        }
    }

    /// Send a fresh request and wait for the response.
    pub async fn request(
        &self,
        from: &str,
        to: &str,
        action: &str,
        payload: Value,
        sender_secret: &str,
    ) -> Result<AcpMessage> {
        self.request_with_timeout(from, to, action, payload, sender_secret, self.request_timeout)
            .await
    }

    /// Like [`AcpRouter::request`] with an explicit deadline.
    ///
    /// Delivery runs on a spawned task; the caller only races its wait
    /// against the deadline. A rejected request and a silent recipient
    /// both surface as the same timeout at the deadline, and a response
    /// arriving after the caller gave up is logged and dropped.
    pub async fn request_with_timeout(
        &self,
        from: &str,
        to: &str,
        action: &str,
        payload: Value,
        sender_secret: &str,
        timeout: Duration,
    ) -> Result<AcpMessage> {
        let mut message = AcpMessage::request(from, to, action, payload);
        message.sign(sender_secret)?;
        let flow_key = message.flow_key();
        let message_id = message.id;

        let router = self.clone();
        let secret = sender_secret.to_string();
        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            let response = router.send(message, &secret).await;
            let had_response = response.is_some();
            if tx.send(response).is_err() && had_response {
                tlog_warn!(
                    "[acp] Response to {} arrived after the deadline, dropping",
                    message_id.short()
                );
            }
        });

        let started = Instant::now();
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(Some(response))) => return Ok(response),
            // No response is not reported early; the caller waits out
            // the full deadline either way
            Ok(Ok(None)) | Ok(Err(_)) => {
                tokio::time::sleep(timeout.saturating_sub(started.elapsed())).await;
            }
            Err(_) => {}
        }

        tlog_warn!(
            "[acp] Request {} on flow {} timed out after {:?}",
            message_id.short(),
            flow_key,
            timeout
        );
        Err(Error::RequestTimeout {
            flow: flow_key,
            elapsed: timeout,
        })
    }

    /// Current state of a flow key, `idle` when unknown or evicted.
    pub async fn flow_state(&self, flow_key: &str) -> AcpState {
        self.flows.state_of(flow_key).await
    }

    async fn screen(
        &self,
        message: &AcpMessage,
        sender_secret: &str,
    ) -> std::result::Result<(), String> {
        let Some(sender) = self.registry.credential(&message.from).await else {
            return Err(format!("sender '{}' not registered", message.from));
        };
        if !self.registry.is_registered(&message.to).await {
            return Err(format!("recipient '{}' not registered", message.to));
        }
        if !signature::constant_time_eq(sender_secret, &sender.secret) {
            return Err("sender secret mismatch".to_string());
        }
        if !message.verify(&sender.secret) {
            return Err("signature verification failed".to_string());
        }
        let scan = self.scanner.scan(&message.payload.to_string());
        if !scan.safe {
            return Err(format!(
                "payload blocked: {}",
                scan.reason.as_deref().unwrap_or("unspecified")
            ));
        }
        if !action_allowed(&sender.capabilities, &message.action) {
            return Err(format!(
                "action '{}' not authorized for '{}'",
                message.action, message.from
            ));
        }
        Ok(())
    }

    fn reject(&self, message: &AcpMessage, flow_key: &str, reason: &str) {
        tlog_warn!(
            "[acp] Message {} on flow {} rejected: {}",
            message.id.short(),
            flow_key,
            reason
        );
        let metadata = json!({
            "id": message.id,
            "from": message.from,
            "to": message.to,
            "action": message.action,
            "reason": reason,
        });
        if let Err(err) =
            self.audit
                .append(&message.from, "acp.rejected", reason, TRANSPORT, &metadata)
        {
            tlog_warn!("[acp] Audit append failed: {}", err);
        }
    }

    fn audit_transition(&self, message: &AcpMessage, from_state: AcpState) {
        let text = format!("{} -> {}", from_state, message.state);
        let metadata = json!({
            "id": message.id,
            "from": message.from,
            "to": message.to,
            "action": message.action,
            "type": message.kind,
            "fromState": from_state,
            "toState": message.state,
        });
        if let Err(err) =
            self.audit
                .append(&message.from, "acp.transition", &text, TRANSPORT, &metadata)
        {
            tlog_warn!("[acp] Audit append failed: {}", err);
        }
    }
}
