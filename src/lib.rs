//! Multi-agent task orchestration: goals decomposed into a dependency
//! DAG, executed wave by wave with retries and loop detection, plus a
//! signed agent-to-agent communication protocol with capability checks
//! and an audit trail.

pub mod acp;
pub mod config;
pub mod core;
pub mod error;
pub mod log;
pub mod orchestration;

pub use error::{Error, Result};
pub use orchestration::Orchestrator;
