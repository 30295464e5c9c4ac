//! Adapters for the claim backend services
//!
//! - **HttpClaimServices**: talks to the claims processing API over HTTP
//! - **MockClaimServices**: in-memory, for tests (re-exported from the ports module)
//!
//! ```rust,ignore
//! use domain_claims::adapters::{HttpClaimServices, HttpServicesConfig};
//!
//! let adapter = HttpClaimServices::new(HttpServicesConfig::default())?;
//! let services: Arc<dyn ClaimServicesPort> = Arc::new(adapter);
//! ```

pub mod http_services;

pub use http_services::{HttpClaimServices, HttpServicesConfig};

#[cfg(any(test, feature = "mock"))]
pub use crate::ports::mock::MockClaimServices;
