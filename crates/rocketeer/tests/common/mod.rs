//! Shared test utilities for rocketeer integration tests.
//!
//! This module provides:
//! - `TestHarness` with a local "remote" git repository and an in-memory store
//! - Builders for descriptor documents

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::TestHarness;
