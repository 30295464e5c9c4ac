//! Claim workflow orchestrator
//!
//! [`ClaimWorkflow`] owns one claim's [`ClaimState`] and is the only thing
//! that mutates it. Each operation checks the stage controller first, calls
//! out to the services if it has to, and writes the new state through to the
//! persistence adapter before returning.
//!
//! Three pipelines share these operations:
//!
//! | mode | after an image is accepted |
//! |---|---|
//! | assisted | nothing; every step is a human call |
//! | automated | analysis, estimate, handoff to approval |
//! | fully automated | as automated, then a single auto-approval |
//!
//! The auto-approval is guarded by a one-shot flag kept both in the state and
//! in the store. Persistence is synchronous, so the flag is written before the
//! first `.await` of the approval and a second entry, from this instance or
//! another one sharing the store, sees it and backs off.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use core_kernel::{ClaimSessionId, ClosureId, PortError};
use rust_decimal::Decimal;

use crate::approval::{ApprovalDecisionEngine, ApprovalOutcome};
use crate::claim::{
    ClaimState, CostEstimate, DamageAnalysis, DamageAssessment, DamageType, Disposition,
    ProcessingMode, RepairShop, Severity, WorkflowStep,
};
use crate::error::{ClaimError, ValidationError};
use crate::image::ClaimImage;
use crate::overrides::{recompute_estimate, CostOverrideForm, DamageOverride};
use crate::persistence::{KeyValueStore, PersistenceAdapter};
use crate::ports::{AnalyzeDamageRequest, ClaimServicesPort, GenerateEstimateRequest};
use crate::settings::WorkflowSettings;
use crate::stage::{Stage, StageEvent, StageStatus};

/// How far a pipeline run got
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PipelineOutcome {
    /// Assisted mode: waiting for the human to act
    AwaitingInput,
    /// Estimate confirmed and handed to the approval stage
    EstimateReady,
    /// Fully automated run approved the claim
    AutoApproved(ApprovalOutcome),
    /// Fully automated run reached approval but the guard had already fired
    AutoApprovalSkipped,
}

/// Returned when a claim moves into closure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosureSummary {
    pub closure_id: ClosureId,
    pub session: ClaimSessionId,
    pub approved_amount: Option<Decimal>,
    pub review_id: Option<i64>,
    pub repair_shops: Vec<RepairShop>,
}

/// Drives one claim through assessment, approval and closure
pub struct ClaimWorkflow {
    session: ClaimSessionId,
    state: ClaimState,
    image: Option<ClaimImage>,
    services: Arc<dyn ClaimServicesPort>,
    approvals: ApprovalDecisionEngine,
    persistence: PersistenceAdapter,
    settings: WorkflowSettings,
    last_error: Option<String>,
}

impl std::fmt::Debug for ClaimWorkflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClaimWorkflow")
            .field("session", &self.session)
            .field("state", &self.state)
            .field("image", &self.image)
            .field("last_error", &self.last_error)
            .finish_non_exhaustive()
    }
}

impl ClaimWorkflow {
    /// Starts an empty assisted-mode claim
    pub fn new(
        session: ClaimSessionId,
        services: Arc<dyn ClaimServicesPort>,
        store: Arc<dyn KeyValueStore>,
        settings: WorkflowSettings,
    ) -> Self {
        Self {
            session,
            state: ClaimState::default(),
            image: None,
            approvals: ApprovalDecisionEngine::new(services.clone()),
            services,
            persistence: PersistenceAdapter::new(store, session),
            settings,
            last_error: None,
        }
    }

    /// Rebuilds a claim from its persisted mirror
    ///
    /// Image bytes are not persisted; a restored claim must be given the
    /// image again before it can be re-analysed.
    pub fn restore(
        session: ClaimSessionId,
        services: Arc<dyn ClaimServicesPort>,
        store: Arc<dyn KeyValueStore>,
        settings: WorkflowSettings,
    ) -> Self {
        let mut workflow = Self::new(session, services, store, settings);
        workflow.state = workflow.persistence.load_state();
        debug!(
            session = %session,
            mode = %workflow.state.processing_mode,
            step = %workflow.state.step,
            "Restored claim workflow"
        );
        workflow
    }

    pub fn session(&self) -> ClaimSessionId {
        self.session
    }

    pub fn state(&self) -> &ClaimState {
        &self.state
    }

    pub fn settings(&self) -> &WorkflowSettings {
        &self.settings
    }

    /// Message of the last failed service step, cleared by the next success
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn image(&self) -> Option<&ClaimImage> {
        self.image.as_ref()
    }

    /// Switches mode, discarding everything but the new mode
    #[instrument(skip(self), fields(session = %self.session))]
    pub fn select_mode(&mut self, mode: ProcessingMode) {
        info!(from = %self.state.processing_mode, to = %mode, "Processing mode changed; resetting claim");
        self.persistence.clear();
        self.state = ClaimState::new(mode);
        self.image = None;
        self.last_error = None;
        self.persist();
    }

    /// Accepts an image and activates damage analysis
    ///
    /// Replacing an image on a claim that already has analysis or estimate
    /// data needs `replace_existing`; the claim is then reset first.
    #[instrument(skip(self, image), fields(session = %self.session, file = %image.file_name))]
    pub fn accept_image(&mut self, image: ClaimImage, replace_existing: bool) -> Result<(), ClaimError> {
        image.validate(self.settings.max_image_bytes)?;

        if self.state.has_claim_data() && !replace_existing {
            return Err(ValidationError::ExistingClaimData.into());
        }

        if self.state.image.is_some() || self.state.has_claim_data() || !self.stages_pristine() {
            info!("Replacing claim image; resetting claim");
            self.persistence.clear();
            self.state.reset_preserving_mode();
            self.last_error = None;
        }

        self.state.stages.apply(StageEvent::ImageAccepted)?;
        self.state.image = Some(image.reference());
        self.image = Some(image);
        self.persist();
        Ok(())
    }

    /// Runs whatever the current mode does after an image is accepted
    pub async fn run_pipeline(&mut self) -> Result<PipelineOutcome, ClaimError> {
        match self.state.processing_mode {
            ProcessingMode::Assisted => Ok(PipelineOutcome::AwaitingInput),
            ProcessingMode::Automated => self.run_automated().await,
            ProcessingMode::FullyAutomated => self.run_fully_automated().await,
        }
    }

    /// Calls the damage-analysis service and folds the result into the claim
    ///
    /// Bounded by the analysis timeout; on any failure the claim is unchanged.
    #[instrument(skip(self), fields(session = %self.session))]
    pub async fn analyze_damage(&mut self) -> Result<(), ClaimError> {
        self.state.ensure_open()?;
        self.state
            .stages
            .require(Stage::DamageAnalysis, &[StageStatus::Active], StageEvent::DamageConfirmed)?;
        let image = self.image.clone().ok_or(ValidationError::MissingImage)?;

        let analysis = self.call_analysis(image).await;
        let analysis = self.track(analysis)?;
        self.fold_analysis(analysis);
        self.persist();
        Ok(())
    }

    /// Confirms the current assessments and opens cost estimation
    #[instrument(skip(self), fields(session = %self.session))]
    pub fn confirm_damage_analysis(&mut self) -> Result<(), ClaimError> {
        self.state.ensure_open()?;
        if self.state.damage_assessments.is_empty() {
            return Err(ValidationError::NoAssessments.into());
        }
        self.state.stages.apply(StageEvent::DamageConfirmed)?;
        self.persist();
        Ok(())
    }

    /// Replaces the assessments with a human selection
    ///
    /// The AI payload is discarded and the note appended to the reasoning.
    /// Damage analysis stays active until the human confirms.
    #[instrument(skip(self, damage_override), fields(session = %self.session))]
    pub fn submit_damage_override(&mut self, damage_override: &DamageOverride) -> Result<(), ClaimError> {
        self.state.ensure_open()?;
        self.state
            .stages
            .require(Stage::DamageAnalysis, &[StageStatus::Active], StageEvent::DamageConfirmed)?;

        let resolved = damage_override.resolve(self.state.damage_reasoning.as_deref())?;
        info!(assessments = resolved.assessments.len(), "Damage override submitted");

        self.state.damage_assessments = resolved.assessments;
        self.state.confirmed_damage_labels = resolved.labels;
        self.state.damage_analysis = None;
        self.state.damage_reasoning = resolved.reasoning;
        if resolved.note.is_some() {
            self.state.damage_override_notes = resolved.note;
        }
        self.persist();
        Ok(())
    }

    /// Requests an estimate for the confirmed assessments
    #[instrument(skip(self), fields(session = %self.session))]
    pub async fn generate_estimate(&mut self) -> Result<CostEstimate, ClaimError> {
        self.state.ensure_open()?;
        self.state
            .stages
            .require(Stage::CostEstimation, &[StageStatus::Active], StageEvent::EstimateConfirmed)?;

        let assessments = self.assessments_for_estimate()?;
        let labels = self.labels_for_estimate(&assessments);
        let assessment_id = self.state.damage_analysis.as_ref().and_then(|a| a.assessment_id);

        let estimate = self.request_estimate(labels, assessments, assessment_id).await;
        let estimate = self.track(estimate)?;

        self.state.cost_estimate = Some(estimate.clone());
        self.state.cost_override = None;
        self.persist();
        Ok(estimate)
    }

    /// The override form: the saved one, or one pre-filled from the estimate
    pub fn cost_override_form(&self) -> CostOverrideForm {
        self.state.cost_override.clone().unwrap_or_else(|| {
            CostOverrideForm::prefill(self.state.cost_estimate.as_ref(), &self.state.damage_assessments)
        })
    }

    /// Applies a cost override and completes cost estimation
    #[instrument(skip(self, form), fields(session = %self.session))]
    pub fn submit_cost_override(&mut self, form: CostOverrideForm) -> Result<CostEstimate, ClaimError> {
        self.state.ensure_open()?;
        self.require_step(WorkflowStep::Assessment)?;
        self.state.stages.require(
            Stage::CostEstimation,
            &[StageStatus::Active, StageStatus::Completed],
            StageEvent::EstimateConfirmed,
        )?;

        let assessments = self.state.damage_assessments.clone();
        if assessments.is_empty() {
            return Err(ValidationError::NoAssessments.into());
        }
        form.validate(&assessments)?;

        let estimate = recompute_estimate(self.state.cost_estimate.as_ref(), &assessments, &form);
        self.state.stages.apply(StageEvent::EstimateConfirmed)?;

        info!(
            estimate_id = ?estimate.estimate_id,
            total_base_cost = %estimate.total_base_cost,
            "Cost override applied"
        );
        self.state.cost_estimate = Some(estimate.clone());
        self.state.cost_override = Some(form);
        self.persist();
        Ok(estimate)
    }

    /// Confirms the estimate and hands the claim to the approval stage
    #[instrument(skip(self), fields(session = %self.session))]
    pub fn confirm_estimate(&mut self) -> Result<(), ClaimError> {
        self.state.ensure_open()?;
        self.require_step(WorkflowStep::Assessment)?;
        if self.state.cost_estimate.is_none() {
            return Err(ValidationError::MissingEstimate.into());
        }
        self.state.stages.apply(StageEvent::EstimateConfirmed)?;
        self.hand_off_to_approval();
        Ok(())
    }

    /// Discards the estimate and reopens damage analysis
    #[instrument(skip(self), fields(session = %self.session))]
    pub fn go_back_to_damage_analysis(&mut self) -> Result<(), ClaimError> {
        self.state.ensure_open()?;
        self.require_step(WorkflowStep::Assessment)?;
        self.state.stages.apply(StageEvent::GoBack)?;

        self.state.cost_estimate = None;
        self.state.cost_override = None;
        self.last_error = None;
        self.persist();
        Ok(())
    }

    /// Wipes every persisted key of this claim and starts over in assisted mode
    #[instrument(skip(self), fields(session = %self.session))]
    pub fn start_new_claim(&mut self) {
        info!("Starting new claim");
        self.persistence.clear();
        self.state = ClaimState::new(ProcessingMode::Assisted);
        self.image = None;
        self.last_error = None;
    }

    /// Analysis, estimate and handoff without human confirmation
    #[instrument(skip(self), fields(session = %self.session))]
    pub async fn run_automated(&mut self) -> Result<PipelineOutcome, ClaimError> {
        self.run_assessment_pipeline(false).await?;
        Ok(PipelineOutcome::EstimateReady)
    }

    /// The automated pipeline followed by a single auto-approval
    #[instrument(skip(self), fields(session = %self.session))]
    pub async fn run_fully_automated(&mut self) -> Result<PipelineOutcome, ClaimError> {
        self.run_assessment_pipeline(true).await?;
        match self.enter_approval_stage().await? {
            Some(outcome) => Ok(PipelineOutcome::AutoApproved(outcome)),
            None => Ok(PipelineOutcome::AutoApprovalSkipped),
        }
    }

    /// Entry point of the approval stage
    ///
    /// Approves exactly once when the auto-approve signal is up. Every check
    /// and the guard write happen before the first suspension point.
    #[instrument(skip(self), fields(session = %self.session))]
    pub async fn enter_approval_stage(&mut self) -> Result<Option<ApprovalOutcome>, ClaimError> {
        self.require_step(WorkflowStep::Approval)?;

        if self.state.disposition != Disposition::Pending {
            return Ok(None);
        }
        if !self.persistence.auto_approve_signalled() {
            return Ok(None);
        }
        if self.state.auto_approval_triggered() || self.persistence.auto_approval_triggered() {
            info!("Auto-approval already triggered for this claim; skipping");
            if !self.state.auto_approval_triggered() {
                self.state.mark_auto_approval_triggered();
            }
            return Ok(None);
        }

        let estimate = self
            .persistence
            .auto_approve_estimate()
            .or_else(|| self.state.cost_estimate.clone())
            .ok_or(ValidationError::MissingEstimate)?;

        self.state.mark_auto_approval_triggered();
        self.persistence.mark_auto_approval_triggered();
        info!(estimate_id = ?estimate.estimate_id, "Auto-approving claim");

        let outcome = self.approve_with(estimate).await?;
        self.persistence.clear_auto_approve_signal();
        Ok(Some(outcome))
    }

    /// Approves the current estimate
    pub async fn approve(&mut self) -> Result<ApprovalOutcome, ClaimError> {
        let estimate = self
            .state
            .cost_estimate
            .clone()
            .or_else(|| self.persistence.load_handoff().estimate)
            .ok_or(ValidationError::MissingEstimate)?;
        self.approve_with(estimate).await
    }

    /// Approves the given estimate
    #[instrument(skip(self, estimate), fields(session = %self.session, estimate_id = ?estimate.estimate_id))]
    pub async fn approve_with(&mut self, estimate: CostEstimate) -> Result<ApprovalOutcome, ClaimError> {
        self.require_step(WorkflowStep::Approval)?;
        self.state.ensure_open()?;

        let outcome = self.approvals.approve(&estimate).await;
        let outcome = self.track(outcome)?;

        self.state.settle(Disposition::Approved)?;
        self.state.review_result = Some(outcome.review.clone());
        self.state.approved_amount = Some(outcome.approved_amount);
        self.state.repair_shops = outcome.repair_shops.clone();
        self.persist();
        Ok(outcome)
    }

    /// Denies the claim; the comments must not be blank
    #[instrument(skip(self, comments), fields(session = %self.session))]
    pub async fn deny(&mut self, comments: &str) -> Result<(), ClaimError> {
        self.require_step(WorkflowStep::Approval)?;
        self.state.ensure_open()?;

        let estimate_id = self.state.cost_estimate.as_ref().and_then(|e| e.estimate_id);
        let comments = self.approvals.deny(estimate_id, comments).await?;

        self.state.settle(Disposition::Denied)?;
        self.state.denial_comments = Some(comments);
        self.persist();
        Ok(())
    }

    /// Moves an approved claim into closure
    #[instrument(skip(self), fields(session = %self.session))]
    pub fn proceed_to_closure(&mut self) -> Result<ClosureSummary, ClaimError> {
        self.require_step(WorkflowStep::Approval)?;
        if self.state.disposition != Disposition::Approved {
            return Err(ClaimError::NotApproved);
        }

        self.state.step = WorkflowStep::Closure;
        self.persist();

        let summary = ClosureSummary {
            closure_id: ClosureId::generate(),
            session: self.session,
            approved_amount: self.state.approved_amount,
            review_id: self.state.review_result.as_ref().and_then(|r| r.review_id),
            repair_shops: self.state.repair_shops.clone(),
        };
        info!(closure_id = %summary.closure_id, "Claim moved to closure");
        Ok(summary)
    }

    async fn run_assessment_pipeline(&mut self, auto_approve: bool) -> Result<(), ClaimError> {
        self.state.ensure_open()?;
        self.state
            .stages
            .require(Stage::DamageAnalysis, &[StageStatus::Active], StageEvent::DamageConfirmed)?;
        let image = self.image.clone().ok_or(ValidationError::MissingImage)?;
        info!(mode = %self.state.processing_mode, "Starting automated assessment");

        pause(self.settings.automated_settle_delay).await;

        let analysis = self.call_analysis(image).await;
        let analysis = self.track(analysis)?;
        let assessment_id = analysis.assessment_id;
        self.fold_analysis(analysis);

        let assessments = self.state.damage_assessments.clone();
        let labels = self.state.confirmed_damage_labels.clone();
        if assessments.is_empty() {
            self.persist();
            warn!("Analysis found no damage; waiting for a human");
            return self.track(Err(ValidationError::NoAssessments.into()));
        }

        self.state.stages.apply(StageEvent::DamageConfirmed)?;
        self.persist();

        pause(self.settings.stage_gap_delay).await;

        let estimate = self.request_estimate(labels, assessments, assessment_id).await;
        let estimate = self.track(estimate)?;

        self.state.cost_estimate = Some(estimate.clone());
        self.state.stages.apply(StageEvent::EstimateConfirmed)?;
        self.persist();

        pause(self.settings.handoff_delay).await;

        if auto_approve {
            self.persistence.signal_auto_approve(&estimate);
        }
        self.hand_off_to_approval();
        Ok(())
    }

    async fn call_analysis(&self, image: ClaimImage) -> Result<DamageAnalysis, ClaimError> {
        let request = AnalyzeDamageRequest {
            image,
            policy_number: self.settings.policy_number.clone(),
            accident_description: self.settings.accident_description.clone(),
        };
        let timeout = self.settings.analysis_timeout;

        match tokio::time::timeout(timeout, self.services.analyze_damage(request)).await {
            Ok(result) => Ok(result?),
            Err(_) => {
                warn!(timeout_ms = timeout.as_millis() as u64, "Damage analysis timed out");
                Err(PortError::timeout("analyze-damage", timeout).into())
            }
        }
    }

    async fn request_estimate(
        &self,
        damage_labels: Vec<DamageType>,
        damage_assessments: Vec<DamageAssessment>,
        damage_assessment_id: Option<i64>,
    ) -> Result<CostEstimate, ClaimError> {
        let request = GenerateEstimateRequest {
            damage_labels,
            damage_assessments,
            damage_assessment_id,
        };
        let estimate = self.services.generate_estimate(request).await?;

        if !estimate.is_consistent() {
            warn!(estimate_id = ?estimate.estimate_id, "Estimate totals disagree with line items; recomputing");
        }
        Ok(estimate.normalized())
    }

    fn fold_analysis(&mut self, analysis: DamageAnalysis) {
        self.state.damage_assessments = analysis.resolved_assessments();
        self.state.confirmed_damage_labels = analysis.resolved_labels();
        self.state.damage_reasoning = Some(analysis.resolved_reasoning());
        self.state.damage_override_notes = None;
        debug!(
            assessments = self.state.damage_assessments.len(),
            assessment_id = ?analysis.assessment_id,
            "Damage analysis folded into claim"
        );
        self.state.damage_analysis = Some(analysis);
    }

    fn assessments_for_estimate(&self) -> Result<Vec<DamageAssessment>, ClaimError> {
        if !self.state.damage_assessments.is_empty() {
            return Ok(self.state.damage_assessments.clone());
        }
        let synthesized: Vec<DamageAssessment> = self
            .state
            .confirmed_damage_labels
            .iter()
            .map(|label| DamageAssessment::new(*label, Severity::Minor))
            .collect();
        if synthesized.is_empty() {
            return Err(ValidationError::NoAssessments.into());
        }
        Ok(synthesized)
    }

    fn labels_for_estimate(&self, assessments: &[DamageAssessment]) -> Vec<DamageType> {
        if self.state.confirmed_damage_labels.is_empty() {
            assessments.iter().map(|a| a.damage_type).collect()
        } else {
            self.state.confirmed_damage_labels.clone()
        }
    }

    fn hand_off_to_approval(&mut self) {
        self.state.step = WorkflowStep::Approval;
        self.persistence.save_handoff(&self.state);
        self.persist();
        info!(
            estimate_id = ?self.state.cost_estimate.as_ref().and_then(|e| e.estimate_id),
            "Claim handed to approval"
        );
    }

    fn require_step(&self, expected: WorkflowStep) -> Result<(), ClaimError> {
        if self.state.step == expected {
            Ok(())
        } else {
            Err(ClaimError::WrongStep {
                expected,
                actual: self.state.step,
            })
        }
    }

    fn stages_pristine(&self) -> bool {
        self.state.stages.damage_analysis() == StageStatus::Locked
            && self.state.stages.cost_estimation() == StageStatus::Locked
    }

    fn track<T>(&mut self, result: Result<T, ClaimError>) -> Result<T, ClaimError> {
        match &result {
            Ok(_) => self.last_error = None,
            Err(e) => {
                warn!(error = %e, "Claim step failed");
                self.last_error = Some(e.to_string());
            }
        }
        result
    }

    fn persist(&self) {
        self.persistence.save_state(&self.state);
    }
}

async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}
