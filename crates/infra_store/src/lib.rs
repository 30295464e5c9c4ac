//! Infrastructure Storage Layer
//!
//! Durable backing for the claim persistence port. A claim session mirrors
//! its state into a [`KeyValueStore`](domain_claims::KeyValueStore); this crate
//! provides the file-backed implementation used by the API server so sessions
//! survive a restart.
//!
//! # Storage Model
//!
//! The whole store is one JSON object of string keys to string values. Every
//! write rewrites the file through a temporary file in the same directory and
//! an atomic rename, so a crash leaves either the old or the new map on disk.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_store::FileKeyValueStore;
//! use std::sync::Arc;
//!
//! let store = Arc::new(FileKeyValueStore::open("data/claims.json")?);
//! let workflow = ClaimWorkflow::restore(session, services, store, settings);
//! ```

pub mod error;
pub mod file_store;

pub use error::StoreError;
pub use file_store::FileKeyValueStore;
