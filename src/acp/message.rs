//! Protocol messages and the per-flow state machine.
//!
//! A message is immutable once signed; a response is always a new
//! message correlated to the request's flow, never a mutation of it.

use crate::acp::signature;
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Unique identifier for a protocol message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub Uuid);

impl MessageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// First eight hex characters, for log lines.
    pub fn short(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Direction of a protocol message within its flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Request,
    Response,
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageType::Request => write!(f, "request"),
            MessageType::Response => write!(f, "response"),
        }
    }
}

/// State of one logical request/response exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AcpState {
    /// No message yet for this flow.
    Idle,
    Requested,
    Acknowledged,
    Executing,
    Completed,
    Failed,
    Rejected,
}

impl AcpState {
    /// Whether this state can legally move to `to`.
    ///
    /// The table: `idle -> requested`, `requested -> acknowledged |
    /// rejected`, `acknowledged -> executing`, `executing -> completed |
    /// failed`. Terminal states accept nothing directly; a finished flow
    /// key is reset to idle by the router when a fresh request reuses it.
    pub fn can_transition(self, to: AcpState) -> bool {
        use AcpState::*;
        matches!(
            (self, to),
            (Idle, Requested)
                | (Requested, Acknowledged | Rejected)
                | (Acknowledged, Executing)
                | (Executing, Completed | Failed)
        )
    }

    /// Whether the flow is finished in this state.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            AcpState::Completed | AcpState::Failed | AcpState::Rejected
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AcpState::Idle => "idle",
            AcpState::Requested => "requested",
            AcpState::Acknowledged => "acknowledged",
            AcpState::Executing => "executing",
            AcpState::Completed => "completed",
            AcpState::Failed => "failed",
            AcpState::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for AcpState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A signed, routable protocol message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcpMessage {
    pub id: MessageId,
    /// Sender agent id.
    pub from: String,
    /// Recipient agent id.
    pub to: String,
    #[serde(rename = "type")]
    pub kind: MessageType,
    /// Namespaced action, e.g. `"task.run"`.
    pub action: String,
    /// Opaque payload; scanned but never interpreted by the router.
    pub payload: Value,
    pub timestamp: DateTime<Utc>,
    /// Flow state this message asserts.
    pub state: AcpState,
    /// Flow this message belongs to; responses carry the request's id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<MessageId>,
    /// MAC over the message, hex encoded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl AcpMessage {
    /// A fresh, unsigned request in the `requested` state.
    pub fn request(from: &str, to: &str, action: &str, payload: Value) -> Self {
        Self {
            id: MessageId::new(),
            from: from.to_string(),
            to: to.to_string(),
            kind: MessageType::Request,
            action: action.to_string(),
            payload,
            timestamp: Utc::now(),
            state: AcpState::Requested,
            correlation_id: None,
            signature: None,
        }
    }

    /// A new, unsigned response to this message on the same flow.
    pub fn response_to(&self, state: AcpState, payload: Value) -> Self {
        Self {
            id: MessageId::new(),
            from: self.to.clone(),
            to: self.from.clone(),
            kind: MessageType::Response,
            action: self.action.clone(),
            payload,
            timestamp: Utc::now(),
            state,
            correlation_id: Some(self.correlation_id.unwrap_or(self.id)),
            signature: None,
        }
    }

    /// Key of the flow this message belongs to.
    pub fn flow_key(&self) -> String {
        let correlation = self.correlation_id.unwrap_or(self.id);
        format!("{}->{}:{}", self.from, self.to, correlation)
    }

    /// Bytes covered by the signature: the serialized message with the
    /// signature field absent.
    pub fn signable_bytes(&self) -> Result<Vec<u8>> {
        let mut unsigned = self.clone();
        unsigned.signature = None;
        Ok(serde_json::to_vec(&unsigned)?)
    }

    /// Sign the message in place with the sender's secret.
    pub fn sign(&mut self, secret: &str) -> Result<()> {
        let bytes = self.signable_bytes()?;
        self.signature = Some(signature::sign(secret, &bytes));
        Ok(())
    }

    /// Check the signature against a secret.
    ///
    /// An unsigned message never verifies.
    pub fn verify(&self, secret: &str) -> bool {
        match (&self.signature, self.signable_bytes()) {
            (Some(sig), Ok(bytes)) => signature::verify(secret, &bytes, sig),
            _ => false,
        }
    }
}
