//! Agent communication protocol: signed messages, capability checks,
//! per-flow state machines, and an audit trail.

pub mod audit;
pub mod message;
pub mod registry;
pub mod router;
pub mod signature;

pub use audit::{AuditEntry, AuditSink, MemoryAuditSink};
pub use message::{AcpMessage, AcpState, MessageId, MessageType};
pub use registry::{action_allowed, AgentCredential, AgentHandler, AgentRegistry};
pub use router::{AcpRouter, PayloadScanner, PermissiveScanner, ScanOutcome};
