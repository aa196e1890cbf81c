//! Tracegate workspace-level test utilities.
//!
//! This crate exists solely to support workspace-level integration tests,
//! particularly the BDD/cucumber tests in `tests/cucumber.rs`.
//!
//! The actual tracegate functionality is in the workspace member crates:
//! - `tracegate-types`: Shared wire types and constants
//! - `tracegate-domain`: Pure statistics and gating policy
//! - `tracegate-app`: Multi-trace orchestration and CI rendering
//! - `tracegate` (tracegate-cli): CLI interface
