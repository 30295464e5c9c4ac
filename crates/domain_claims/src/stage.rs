//! Stage status machine
//!
//! The assessment part of a claim runs through two stages, damage analysis
//! and cost estimation, each `locked`, `active` or `completed`. Every legal
//! move between them is listed in [`StageController::next`]; anything not in
//! that table is rejected with [`ClaimError::InvalidStageTransition`] and
//! leaves both statuses as they were.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::error::ClaimError;

/// Status of a single stage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// No action permitted
    #[default]
    Locked,
    /// Stage accepts actions
    Active,
    /// Output is final and forwarded to the next stage
    Completed,
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            StageStatus::Locked => "locked",
            StageStatus::Active => "active",
            StageStatus::Completed => "completed",
        };
        f.write_str(label)
    }
}

/// The gated stages of the assessment step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    DamageAnalysis,
    CostEstimation,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::DamageAnalysis => f.write_str("damage analysis"),
            Stage::CostEstimation => f.write_str("cost estimation"),
        }
    }
}

/// Something that happened to the claim and may move the stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageEvent {
    /// An image was accepted for a fresh claim
    ImageAccepted,
    /// Damage assessments were confirmed, by a human or by an automated run
    DamageConfirmed,
    /// The cost estimate was confirmed as-is or through an override
    EstimateConfirmed,
    /// The human went back from cost estimation to damage analysis
    GoBack,
    /// The claim was reset
    Reset,
}

impl fmt::Display for StageEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            StageEvent::ImageAccepted => "image accepted",
            StageEvent::DamageConfirmed => "damage confirmed",
            StageEvent::EstimateConfirmed => "estimate confirmed",
            StageEvent::GoBack => "go back",
            StageEvent::Reset => "reset",
        };
        f.write_str(label)
    }
}

/// Tracks the status of both stages and enforces the transition table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageController {
    damage_analysis: StageStatus,
    cost_estimation: StageStatus,
}

impl StageController {
    /// Both stages locked, as for a claim with no image yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a controller from persisted statuses
    pub fn from_statuses(damage_analysis: StageStatus, cost_estimation: StageStatus) -> Self {
        Self {
            damage_analysis,
            cost_estimation,
        }
    }

    pub fn damage_analysis(&self) -> StageStatus {
        self.damage_analysis
    }

    pub fn cost_estimation(&self) -> StageStatus {
        self.cost_estimation
    }

    /// Status of the given stage
    pub fn status(&self, stage: Stage) -> StageStatus {
        match stage {
            Stage::DamageAnalysis => self.damage_analysis,
            Stage::CostEstimation => self.cost_estimation,
        }
    }

    /// Returns true if the event is legal from the current statuses
    pub fn can_apply(&self, event: StageEvent) -> bool {
        self.next(event).is_some()
    }

    /// Applies the event, or leaves the statuses untouched and errors
    pub fn apply(&mut self, event: StageEvent) -> Result<(), ClaimError> {
        let (damage_analysis, cost_estimation) =
            self.next(event).ok_or(ClaimError::InvalidStageTransition {
                event,
                damage_analysis: self.damage_analysis,
                cost_estimation: self.cost_estimation,
            })?;

        debug!(
            %event,
            from_damage = %self.damage_analysis,
            from_cost = %self.cost_estimation,
            to_damage = %damage_analysis,
            to_cost = %cost_estimation,
            "Stage transition"
        );

        self.damage_analysis = damage_analysis;
        self.cost_estimation = cost_estimation;
        Ok(())
    }

    /// Checks that a stage is in one of the given statuses before acting on it
    pub fn require(
        &self,
        stage: Stage,
        allowed: &[StageStatus],
        event: StageEvent,
    ) -> Result<(), ClaimError> {
        if allowed.contains(&self.status(stage)) {
            Ok(())
        } else {
            Err(ClaimError::InvalidStageTransition {
                event,
                damage_analysis: self.damage_analysis,
                cost_estimation: self.cost_estimation,
            })
        }
    }

    /// The transition table: (damage analysis, cost estimation) after the event
    fn next(&self, event: StageEvent) -> Option<(StageStatus, StageStatus)> {
        use StageStatus::*;

        match (event, self.damage_analysis, self.cost_estimation) {
            (StageEvent::ImageAccepted, Locked, Locked) => Some((Active, Locked)),
            (StageEvent::DamageConfirmed, Active, Locked) => Some((Locked, Active)),
            (StageEvent::EstimateConfirmed, Locked, Active | Completed) => Some((Locked, Completed)),
            (StageEvent::GoBack, Locked, Active | Completed) => Some((Active, Locked)),
            (StageEvent::Reset, _, _) => Some((Locked, Locked)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use StageStatus::*;

    fn controller(damage: StageStatus, cost: StageStatus) -> StageController {
        StageController::from_statuses(damage, cost)
    }

    #[test]
    fn test_new_controller_is_locked() {
        let stages = StageController::new();
        assert_eq!(stages.damage_analysis(), Locked);
        assert_eq!(stages.cost_estimation(), Locked);
    }

    #[test]
    fn test_image_activates_damage_analysis() {
        let mut stages = StageController::new();
        stages.apply(StageEvent::ImageAccepted).unwrap();
        assert_eq!(stages, controller(Active, Locked));
    }

    #[test]
    fn test_damage_confirmation_hands_over_to_cost_estimation() {
        let mut stages = controller(Active, Locked);
        stages.apply(StageEvent::DamageConfirmed).unwrap();
        assert_eq!(stages, controller(Locked, Active));
    }

    #[test]
    fn test_only_one_stage_active_for_human_input() {
        let mut stages = StageController::new();
        for event in [StageEvent::ImageAccepted, StageEvent::DamageConfirmed, StageEvent::GoBack] {
            stages.apply(event).unwrap();
            assert!(!(stages.damage_analysis() == Active && stages.cost_estimation() == Active));
        }
    }

    #[test]
    fn test_estimate_confirmation_completes_cost_estimation() {
        let mut stages = controller(Locked, Active);
        stages.apply(StageEvent::EstimateConfirmed).unwrap();
        assert_eq!(stages, controller(Locked, Completed));

        // confirming again after an override is still legal
        stages.apply(StageEvent::EstimateConfirmed).unwrap();
        assert_eq!(stages, controller(Locked, Completed));
    }

    #[test]
    fn test_go_back_reactivates_damage_analysis() {
        let mut stages = controller(Locked, Completed);
        stages.apply(StageEvent::GoBack).unwrap();
        assert_eq!(stages, controller(Active, Locked));
    }

    #[test]
    fn test_confirming_locked_stage_is_rejected() {
        let mut stages = StageController::new();
        let err = stages.apply(StageEvent::DamageConfirmed).unwrap_err();
        assert!(matches!(err, ClaimError::InvalidStageTransition { event: StageEvent::DamageConfirmed, .. }));
        assert_eq!(stages, StageController::new());
    }

    #[test]
    fn test_estimate_cannot_be_confirmed_during_damage_analysis() {
        let mut stages = controller(Active, Locked);
        assert!(!stages.can_apply(StageEvent::EstimateConfirmed));
        assert!(stages.apply(StageEvent::EstimateConfirmed).is_err());
    }

    #[test]
    fn test_second_image_requires_reset() {
        let mut stages = controller(Active, Locked);
        assert!(!stages.can_apply(StageEvent::ImageAccepted));
        stages.apply(StageEvent::Reset).unwrap();
        stages.apply(StageEvent::ImageAccepted).unwrap();
        assert_eq!(stages, controller(Active, Locked));
    }

    #[test]
    fn test_require_reports_current_statuses() {
        let stages = controller(Locked, Active);
        assert!(stages.require(Stage::CostEstimation, &[Active], StageEvent::EstimateConfirmed).is_ok());

        let err = stages
            .require(Stage::DamageAnalysis, &[Active], StageEvent::DamageConfirmed)
            .unwrap_err();
        assert!(err.to_string().contains("damage analysis is locked"));
    }

    #[test]
    fn test_statuses_serialize_snake_case() {
        assert_eq!(serde_json::to_string(&Completed).unwrap(), "\"completed\"");
        assert_eq!(serde_json::from_str::<StageStatus>("\"active\"").unwrap(), Active);
    }
}
