//! Integration test suite for troupe.
//!
//! These tests exercise the full pipeline from goal to execution report
//! and the ACP transport from registration to response. They verify
//! that all components work together correctly.
//!
//! # Test Categories
//!
//! - `orchestration_e2e`: Goal decomposition and wave execution tests
//! - `protocol_e2e`: Signed messaging, discovery, and timeout tests
//!
//! # CI Compatibility
//!
//! These tests use scripted model and runner responses and do not make
//! actual API calls, making them safe to run in CI environments.

mod fixtures;

mod orchestration_e2e;
mod protocol_e2e;
