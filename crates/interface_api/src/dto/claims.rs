//! Claims DTOs

use serde::{Deserialize, Serialize};

use domain_claims::{
    ApprovalOutcome, ClaimState, ClaimWorkflow, CostOverrideForm, DamageAssessment,
    DamageOverride, DamageType, PipelineOutcome, ProcessingMode, Severity,
};

#[derive(Debug, Default, Deserialize)]
pub struct CreateClaimRequest {
    #[serde(default)]
    pub mode: ProcessingMode,
}

#[derive(Debug, Deserialize)]
pub struct SelectModeRequest {
    pub mode: ProcessingMode,
}

#[derive(Debug, Default, Deserialize)]
pub struct ImageUploadQuery {
    /// Acknowledges that existing analysis and estimate data will be discarded
    #[serde(default)]
    pub replace: bool,
}

#[derive(Debug, Deserialize)]
pub struct DamageOverrideRequest {
    pub selections: Vec<DamageAssessment>,
    #[serde(default)]
    pub note: Option<String>,
}

impl DamageOverrideRequest {
    pub fn into_override(self) -> DamageOverride {
        let selected = self
            .selections
            .into_iter()
            .fold(DamageOverride::new(), |o, a| o.select(a.damage_type, a.severity));
        match self.note {
            Some(note) => selected.with_note(note),
            None => selected,
        }
    }
}

/// One assessment's override inputs; omitted fields keep the pre-filled value
#[derive(Debug, Deserialize)]
pub struct CostOverrideLine {
    pub damage_type: DamageType,
    pub severity: Severity,
    #[serde(default)]
    pub parts: Option<String>,
    #[serde(default)]
    pub labor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CostOverrideRequest {
    pub lines: Vec<CostOverrideLine>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl CostOverrideRequest {
    /// Applies the request on top of the claim's current override form
    pub fn apply_to(self, mut form: CostOverrideForm) -> CostOverrideForm {
        for line in self.lines {
            let assessment = DamageAssessment::new(line.damage_type, line.severity);
            if let Some(parts) = line.parts {
                form.set_parts(&assessment, &parts);
            }
            if let Some(labor) = line.labor {
                form.set_labor(&assessment, &labor);
            }
        }
        if let Some(notes) = self.notes {
            form.set_notes(notes);
        }
        form
    }
}

#[derive(Debug, Deserialize)]
pub struct DenyRequest {
    pub comments: String,
}

/// What a client sees of one claim
#[derive(Debug, Serialize)]
pub struct ClaimResponse {
    pub session_id: String,
    pub state: ClaimState,
    /// False after a restore until the image is uploaded again
    pub image_loaded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl From<&ClaimWorkflow> for ClaimResponse {
    fn from(workflow: &ClaimWorkflow) -> Self {
        Self {
            session_id: workflow.session().to_string(),
            state: workflow.state().clone(),
            image_loaded: workflow.image().is_some(),
            last_error: workflow.last_error().map(str::to_string),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ImageAcceptedResponse {
    /// True when an automated pipeline was started in the background
    pub pipeline_started: bool,
    pub claim: ClaimResponse,
}

#[derive(Debug, Serialize)]
pub struct PipelineResponse {
    #[serde(flatten)]
    pub outcome: PipelineOutcome,
    pub claim: ClaimResponse,
}

#[derive(Debug, Serialize)]
pub struct ApprovalResponse {
    pub outcome: ApprovalOutcome,
    pub claim: ClaimResponse,
}

#[derive(Debug, Serialize)]
pub struct ApprovalEntryResponse {
    /// Present only when entering the stage triggered the auto-approval
    pub auto_approval: Option<ApprovalOutcome>,
    pub claim: ClaimResponse,
}
