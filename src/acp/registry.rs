//! Agent identity and capability registry.
//!
//! Agents register once under a unique id and receive a generated secret
//! in return. The secret is handed out exactly once, at registration;
//! afterwards the registry only compares against it. Capabilities are
//! plain action strings, a namespace, or `"*"`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::acp::message::AcpMessage;
use crate::acp::signature;
use crate::error::{Error, Result};
use crate::tlog_debug;

/// What an agent is allowed to do, plus the secret it signs with.
#[derive(Clone)]
pub struct AgentCredential {
    pub agent_id: String,
    pub secret: String,
    pub capabilities: Vec<String>,
}

impl std::fmt::Debug for AgentCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentCredential")
            .field("agent_id", &self.agent_id)
            .field("secret", &"<redacted>")
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

/// Receives messages routed to an agent. Returning `Ok(None)` means the
/// agent accepted the message but has nothing to send back.
#[async_trait]
pub trait AgentHandler: Send + Sync {
    async fn handle(&self, message: &AcpMessage) -> Result<Option<AcpMessage>>;
}

/// Check an action against a capability list.
///
/// A capability matches when it is the wildcard `"*"`, equals the action
/// exactly, or names a namespace the action sits under (`"files"` or the
/// equivalent `"files.*"` both cover `"files.read"`). Namespace matches
/// require a `.` boundary, so `"file"` does not cover `"files.read"`.
pub fn action_allowed(capabilities: &[String], action: &str) -> bool {
    capabilities.iter().any(|cap| {
        if cap == "*" || cap == action {
            return true;
        }
        let namespace = cap.strip_suffix(".*").unwrap_or(cap);
        action
            .strip_prefix(namespace)
            .is_some_and(|rest| rest.starts_with('.'))
    })
}

struct RegisteredAgent {
    credential: AgentCredential,
    handler: Arc<dyn AgentHandler>,
}

#[derive(Default)]
struct RegistryInner {
    agents: HashMap<String, RegisteredAgent>,
    order: Vec<String>,
}

/// Shared registry of live agents keyed by id.
#[derive(Default)]
pub struct AgentRegistry {
    inner: RwLock<RegistryInner>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an agent and mint its credential. Capability entries are
    /// trimmed, empties dropped, and duplicates collapsed in order. Fails
    /// if the id is already taken.
    pub async fn register(
        &self,
        agent_id: &str,
        capabilities: &[&str],
        handler: Arc<dyn AgentHandler>,
    ) -> Result<AgentCredential> {
        let mut normalized: Vec<String> = Vec::new();
        for cap in capabilities {
            let cap = cap.trim();
            if cap.is_empty() || normalized.iter().any(|existing| existing == cap) {
                continue;
            }
            normalized.push(cap.to_string());
        }

        let mut inner = self.inner.write().await;
        if inner.agents.contains_key(agent_id) {
            return Err(Error::AgentAlreadyRegistered {
                id: agent_id.to_string(),
            });
        }

        let credential = AgentCredential {
            agent_id: agent_id.to_string(),
            secret: signature::generate_secret(),
            capabilities: normalized,
        };
        tlog_debug!(
            "[acp] Agent '{}' registered with capabilities {:?}",
            agent_id,
            credential.capabilities
        );
        inner.order.push(agent_id.to_string());
        inner.agents.insert(
            agent_id.to_string(),
            RegisteredAgent {
                credential: credential.clone(),
                handler,
            },
        );
        Ok(credential)
    }

    pub async fn credential(&self, agent_id: &str) -> Option<AgentCredential> {
        let inner = self.inner.read().await;
        inner
            .agents
            .get(agent_id)
            .map(|agent| agent.credential.clone())
    }

    pub async fn handler(&self, agent_id: &str) -> Option<Arc<dyn AgentHandler>> {
        let inner = self.inner.read().await;
        inner.agents.get(agent_id).map(|agent| agent.handler.clone())
    }

    pub async fn is_registered(&self, agent_id: &str) -> bool {
        let inner = self.inner.read().await;
        inner.agents.contains_key(agent_id)
    }

    /// First registered agent whose capabilities allow `action`.
    pub async fn find_agent_by_capability(&self, action: &str) -> Option<String> {
        let inner = self.inner.read().await;
        inner
            .order
            .iter()
            .find(|id| {
                inner
                    .agents
                    .get(*id)
                    .is_some_and(|agent| action_allowed(&agent.credential.capabilities, action))
            })
            .cloned()
    }

    /// Registered ids in registration order.
    pub async fn agent_ids(&self) -> Vec<String> {
        let inner = self.inner.read().await;
        inner.order.clone()
    }

    pub async fn len(&self) -> usize {
        let inner = self.inner.read().await;
        inner.agents.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
