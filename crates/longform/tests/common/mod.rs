//! Shared test utilities for longform integration tests.
//!
//! This module provides:
//! - `TestHarness` wiring an in-memory database, a scripted provider and file storage
//! - Builders for document requests and pipeline settings

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::TestHarness;
