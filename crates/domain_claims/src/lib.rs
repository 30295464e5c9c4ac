//! Claim Workflow Domain
//!
//! This crate walks a vehicle damage claim from image upload through damage
//! analysis, cost estimation, approval and closure, orchestrating calls to
//! the backend services and folding their results into the claim state.
//!
//! # Claim Lifecycle
//!
//! ```text
//! image -> damage analysis -> cost estimation -> approval/denial -> closure
//! ```
//!
//! Damage analysis and cost estimation are gated stages (`locked`, `active`,
//! `completed`); see [`stage`]. How much of the lifecycle runs without a human
//! depends on the [`ProcessingMode`]; see [`orchestrator`].

pub mod claim;
pub mod stage;
pub mod overrides;
pub mod image;
pub mod ports;
pub mod persistence;
pub mod approval;
pub mod orchestrator;
pub mod settings;
pub mod adapters;
pub mod error;

pub use claim::{
    ClaimState, CostEstimate, DamageAnalysis, DamageAssessment, DamageType, Disposition,
    ImageReference, LineItem, ProcessingMode, RepairShop, ReviewResult, Severity, WorkflowStep,
};
pub use stage::{Stage, StageController, StageEvent, StageStatus};
pub use overrides::{CostOverrideEntry, CostOverrideForm, DamageOverride, recompute_estimate};
pub use image::ClaimImage;
pub use ports::ClaimServicesPort;
pub use persistence::{InMemoryStore, KeyValueStore, PersistenceAdapter};
pub use approval::{ApprovalDecisionEngine, ApprovalOutcome};
pub use orchestrator::{ClaimWorkflow, ClosureSummary, PipelineOutcome};
pub use settings::WorkflowSettings;
pub use error::{ClaimError, ValidationError};
