//! Shared test utilities for mailsort integration tests.
//!
//! This module provides:
//! - `TestHarness` for isolated test execution with an in-memory database
//! - Builder patterns for creating test rows programmatically

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::{ScriptedClassifier, TestHarness};
