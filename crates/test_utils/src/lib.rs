//! Test Utilities Crate
//!
//! Provides shared test infrastructure, fixtures, and helpers for the
//! claims workflow test suite.
//!
//! # Modules
//!
//! - `fixtures`: Pre-built images, analyses and estimates
//! - `builders`: Builder patterns for workflows and claim data
//! - `assertions`: Custom assertion helpers for claim types
//! - `generators`: Property-based test data generators

pub mod fixtures;
pub mod builders;
pub mod assertions;
pub mod generators;

pub use fixtures::*;
pub use builders::*;
pub use assertions::*;
pub use generators::*;
