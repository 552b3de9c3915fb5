//! Append-only audit trail for protocol activity.
//!
//! Every accepted transition and every rejection the router makes lands
//! here. The sink is a trait so embedders can forward records wherever
//! they keep their logs; the shipped implementation holds them in memory.

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// One recorded protocol event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub actor_id: String,
    pub kind: String,
    pub text: String,
    pub transport: String,
    pub metadata: Value,
    pub timestamp: DateTime<Utc>,
}

/// Destination for audit records. Implementations are called from
/// concurrent sends and must serialize their own writes.
pub trait AuditSink: Send + Sync {
    fn append(
        &self,
        actor_id: &str,
        kind: &str,
        text: &str,
        transport: &str,
        metadata: &Value,
    ) -> Result<()>;
}

/// In-memory sink for tests and embedded use.
#[derive(Default)]
pub struct MemoryAuditSink {
    entries: Mutex<Vec<AuditEntry>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything appended so far, oldest first.
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AuditSink for MemoryAuditSink {
    fn append(
        &self,
        actor_id: &str,
        kind: &str,
        text: &str,
        transport: &str,
        metadata: &Value,
    ) -> Result<()> {
        let entry = AuditEntry {
            actor_id: actor_id.to_string(),
            kind: kind.to_string(),
            text: text.to_string(),
            transport: transport.to_string(),
            metadata: metadata.clone(),
            timestamp: Utc::now(),
        };
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry);
        Ok(())
    }
}
