//! Claim workflow errors

use thiserror::Error;

use core_kernel::PortError;
use crate::claim::{Disposition, WorkflowStep};
use crate::stage::{StageEvent, StageStatus};

/// Input rejected before anything was changed
///
/// Always recoverable: the messages are meant for the human actor, and the
/// claim state is untouched when one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please upload an image first")]
    MissingImage,

    #[error("File must be an image (got {0})")]
    UnsupportedImage(String),

    #[error("Image size must be less than {limit_bytes} bytes (got {size_bytes})")]
    ImageTooLarge { size_bytes: u64, limit_bytes: u64 },

    #[error("Uploading a new image will replace all existing claim data; confirm the replacement to continue")]
    ExistingClaimData,

    #[error("Unknown damage label: {0}")]
    UnknownDamageLabel(String),

    #[error("Please select at least one damage label before submitting.")]
    EmptyDamageSelection,

    #[error("No damage assessments are available")]
    NoAssessments,

    #[error("No cost estimate is available")]
    MissingEstimate,

    #[error("Repair costs cannot be $0. Please enter valid non-zero values for at least one cost field (parts or labor) to continue.")]
    AllCostsZero,

    #[error("Denial comments are required. Please provide comments explaining why this claim is being denied before submitting.")]
    EmptyDenialComments,
}

/// Errors that can occur in the claim workflow
#[derive(Debug, Error)]
pub enum ClaimError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("External service failed: {0}")]
    Service(#[from] PortError),

    #[error("Cannot apply {event} while damage analysis is {damage_analysis} and cost estimation is {cost_estimation}")]
    InvalidStageTransition {
        event: StageEvent,
        damage_analysis: StageStatus,
        cost_estimation: StageStatus,
    },

    #[error("Claim is at the {actual} step, expected {expected}")]
    WrongStep {
        expected: WorkflowStep,
        actual: WorkflowStep,
    },

    #[error("Claim already {0}")]
    ClaimFinalized(Disposition),

    #[error("Claim must be approved before closure")]
    NotApproved,

    #[error("Failed to read image {path}: {source}")]
    ImageUnreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl ClaimError {
    /// Returns true for errors the human actor can fix by changing their input
    pub fn is_validation(&self) -> bool {
        matches!(self, ClaimError::Validation(_))
    }

    /// Returns true if an external call failed or timed out
    pub fn is_service(&self) -> bool {
        matches!(self, ClaimError::Service(_))
    }
}
