//! Claim state aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::labor_hours_for;
use crate::error::{ClaimError, ValidationError};
use crate::overrides::CostOverrideForm;
use crate::stage::StageController;

/// Reasoning recorded when the analysis service does not give any
pub const DEFAULT_REASONING: &str = "No reasoning provided.";

/// How much of the pipeline runs without waiting for a human
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingMode {
    /// Every step waits for an explicit human action
    #[default]
    Assisted,
    /// Analysis and estimation run on their own, approval stays manual
    Automated,
    /// Analysis, estimation and approval all run on their own
    FullyAutomated,
}

impl ProcessingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingMode::Assisted => "assisted",
            ProcessingMode::Automated => "automated",
            ProcessingMode::FullyAutomated => "fully_automated",
        }
    }

    /// Returns true if an image upload starts a pipeline
    pub fn is_autonomous(&self) -> bool {
        !matches!(self, ProcessingMode::Assisted)
    }
}

impl fmt::Display for ProcessingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProcessingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "assisted" | "manual" => Ok(ProcessingMode::Assisted),
            "automated" => Ok(ProcessingMode::Automated),
            "fully_automated" | "fully-automated" => Ok(ProcessingMode::FullyAutomated),
            other => Err(format!("Unknown processing mode: {other}")),
        }
    }
}

/// The fixed set of damage labels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DamageType {
    Scratches,
    Dents,
    StructuralDamage,
}

impl DamageType {
    pub const ALL: [DamageType; 3] = [
        DamageType::Scratches,
        DamageType::Dents,
        DamageType::StructuralDamage,
    ];

    /// Canonical stored form
    pub fn as_str(&self) -> &'static str {
        match self {
            DamageType::Scratches => "scratches",
            DamageType::Dents => "dents",
            DamageType::StructuralDamage => "structural_damage",
        }
    }

    /// Reads a label as typed by a human or returned by the analysis service
    ///
    /// `"structural damage"` is accepted as an alias of `structural_damage`.
    pub fn parse_label(label: &str) -> Result<Self, ValidationError> {
        match label.trim().to_ascii_lowercase().as_str() {
            "scratches" => Ok(DamageType::Scratches),
            "dents" => Ok(DamageType::Dents),
            "structural_damage" | "structural damage" => Ok(DamageType::StructuralDamage),
            _ => Err(ValidationError::UnknownDamageLabel(label.to_string())),
        }
    }
}

impl fmt::Display for DamageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Damage severity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    #[default]
    Minor,
    Major,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Minor => "minor",
            Severity::Major => "major",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "minor" => Ok(Severity::Minor),
            "major" => Ok(Severity::Major),
            other => Err(format!("Unknown severity: {other}")),
        }
    }
}

/// One area of vehicle damage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DamageAssessment {
    pub damage_type: DamageType,
    pub severity: Severity,
}

impl DamageAssessment {
    pub fn new(damage_type: DamageType, severity: Severity) -> Self {
        Self { damage_type, severity }
    }

    /// Key used for per-assessment override inputs, e.g. `scratches_minor`
    pub fn key(&self) -> String {
        format!("{}_{}", self.damage_type, self.severity)
    }
}

/// Costed breakdown for one assessment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub damage_type: DamageType,
    pub damage_severity: Severity,
    pub parts_cost: Decimal,
    pub labor_cost: Decimal,
    pub labor_hours: Decimal,
    pub base_cost: Decimal,
    #[serde(default)]
    pub notes: String,
}

impl LineItem {
    /// Prices a line item, deriving hours and base cost from parts and labor
    pub fn priced(
        assessment: DamageAssessment,
        parts_cost: Decimal,
        labor_cost: Decimal,
        notes: impl Into<String>,
    ) -> Self {
        Self {
            damage_type: assessment.damage_type,
            damage_severity: assessment.severity,
            parts_cost,
            labor_cost,
            labor_hours: labor_hours_for(labor_cost),
            base_cost: parts_cost + labor_cost,
            notes: notes.into(),
        }
    }

    /// Returns true if this line item prices the given assessment
    pub fn matches(&self, assessment: &DamageAssessment) -> bool {
        self.damage_type == assessment.damage_type && self.damage_severity == assessment.severity
    }

    pub fn assessment(&self) -> DamageAssessment {
        DamageAssessment::new(self.damage_type, self.damage_severity)
    }
}

/// A priced repair estimate
///
/// Totals are always the in-order sums of the line items; build estimates
/// through [`CostEstimate::from_line_items`] to keep it that way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostEstimate {
    /// Identifier assigned by the estimation service, if any
    #[serde(default)]
    pub estimate_id: Option<i64>,
    pub total_parts_cost: Decimal,
    pub total_labor_cost: Decimal,
    pub total_labor_hours: Decimal,
    pub total_base_cost: Decimal,
    pub line_items: Vec<LineItem>,
}

impl CostEstimate {
    /// Builds an estimate whose totals are summed in line-item order
    pub fn from_line_items(estimate_id: Option<i64>, line_items: Vec<LineItem>) -> Self {
        let mut total_parts_cost = Decimal::ZERO;
        let mut total_labor_cost = Decimal::ZERO;
        let mut total_labor_hours = Decimal::ZERO;

        for item in &line_items {
            total_parts_cost += item.parts_cost;
            total_labor_cost += item.labor_cost;
            total_labor_hours += item.labor_hours;
        }

        Self {
            estimate_id,
            total_parts_cost,
            total_labor_cost,
            total_labor_hours,
            total_base_cost: total_parts_cost + total_labor_cost,
            line_items,
        }
    }

    /// Re-derives every line item and total from parts and labor costs
    pub fn normalized(&self) -> Self {
        let items = self
            .line_items
            .iter()
            .map(|item| LineItem::priced(item.assessment(), item.parts_cost, item.labor_cost, item.notes.clone()))
            .collect();
        Self::from_line_items(self.estimate_id, items)
    }

    /// Checks the sum invariants
    pub fn is_consistent(&self) -> bool {
        let base: Decimal = self.line_items.iter().map(|i| i.base_cost).sum();
        let hours: Decimal = self.line_items.iter().map(|i| i.labor_hours).sum();
        self.total_base_cost == self.total_parts_cost + self.total_labor_cost
            && self.total_base_cost == base
            && self.total_labor_hours == hours
    }

    /// Line item pricing the given assessment
    pub fn find_line_item(&self, assessment: &DamageAssessment) -> Option<&LineItem> {
        self.line_items.iter().find(|item| item.matches(assessment))
    }

    /// The amount an approval covers: parts plus labor as estimated
    pub fn approved_amount(&self) -> Decimal {
        self.total_parts_cost + self.total_labor_cost
    }
}

/// Result of the damage-analysis service, as received
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageAnalysis {
    #[serde(default)]
    pub assessment_id: Option<i64>,
    #[serde(default)]
    pub claim_id: Option<i64>,
    pub damage_labels: Vec<DamageType>,
    #[serde(default)]
    pub damage_assessments: Vec<DamageAssessment>,
    #[serde(default)]
    pub reasoning: Option<String>,
}

impl DamageAnalysis {
    /// Assessments to confirm; labels without assessments default to minor
    pub fn resolved_assessments(&self) -> Vec<DamageAssessment> {
        if !self.damage_assessments.is_empty() {
            return dedup_assessments(self.damage_assessments.iter().copied());
        }
        dedup_assessments(
            self.damage_labels
                .iter()
                .map(|label| DamageAssessment::new(*label, Severity::Minor)),
        )
    }

    /// Labels to confirm, without repeats
    pub fn resolved_labels(&self) -> Vec<DamageType> {
        let mut labels = Vec::new();
        for label in self.damage_labels.iter().copied() {
            if !labels.contains(&label) {
                labels.push(label);
            }
        }
        if labels.is_empty() {
            labels = self.resolved_assessments().iter().map(|a| a.damage_type).collect();
        }
        labels
    }

    pub fn resolved_reasoning(&self) -> String {
        match self.reasoning.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => text.to_string(),
            _ => DEFAULT_REASONING.to_string(),
        }
    }
}

/// Keeps one assessment per damage type: first position, last severity
pub fn dedup_assessments(assessments: impl IntoIterator<Item = DamageAssessment>) -> Vec<DamageAssessment> {
    let mut unique: Vec<DamageAssessment> = Vec::new();
    for assessment in assessments {
        match unique.iter_mut().find(|a| a.damage_type == assessment.damage_type) {
            Some(existing) => existing.severity = assessment.severity,
            None => unique.push(assessment),
        }
    }
    unique
}

/// Outcome recorded by the review service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewResult {
    #[serde(default)]
    pub review_id: Option<i64>,
    pub status: String,
    pub reviewer_id: String,
    pub review_timestamp: DateTime<Utc>,
    #[serde(default)]
    pub notes: Option<String>,
    /// Amount echoed by the review service; never used as the approved amount
    #[serde(default)]
    pub approved_amount: Option<Decimal>,
}

/// Terminal approve/deny outcome
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    #[default]
    Pending,
    Approved,
    Denied,
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Disposition::Pending => "pending",
            Disposition::Approved => "approved",
            Disposition::Denied => "denied",
        };
        f.write_str(label)
    }
}

/// Which part of the workflow currently holds control
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStep {
    /// Damage analysis and cost estimation
    #[default]
    Assessment,
    /// Approval and authorization
    Approval,
    /// Repair and claim closure
    Closure,
}

impl fmt::Display for WorkflowStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            WorkflowStep::Assessment => "assessment",
            WorkflowStep::Approval => "approval",
            WorkflowStep::Closure => "closure",
        };
        f.write_str(label)
    }
}

/// Reference to the uploaded image; the bytes themselves are never persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageReference {
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: u64,
}

/// An approved repair shop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairShop {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

/// The mutable record of one claim
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimState {
    pub processing_mode: ProcessingMode,
    pub step: WorkflowStep,
    pub image: Option<ImageReference>,
    /// AI-attributed analysis payload; dropped when a human overrides it
    pub damage_analysis: Option<DamageAnalysis>,
    pub confirmed_damage_labels: Vec<DamageType>,
    pub damage_assessments: Vec<DamageAssessment>,
    pub damage_reasoning: Option<String>,
    pub damage_override_notes: Option<String>,
    pub cost_estimate: Option<CostEstimate>,
    pub cost_override: Option<CostOverrideForm>,
    pub stages: StageController,
    pub review_result: Option<ReviewResult>,
    pub disposition: Disposition,
    pub denial_comments: Option<String>,
    pub approved_amount: Option<Decimal>,
    pub repair_shops: Vec<RepairShop>,
    auto_approval_triggered: bool,
}

impl Default for ClaimState {
    fn default() -> Self {
        Self::new(ProcessingMode::default())
    }
}

impl ClaimState {
    /// Creates an empty claim in the given mode
    pub fn new(processing_mode: ProcessingMode) -> Self {
        Self {
            processing_mode,
            step: WorkflowStep::Assessment,
            image: None,
            damage_analysis: None,
            confirmed_damage_labels: Vec::new(),
            damage_assessments: Vec::new(),
            damage_reasoning: None,
            damage_override_notes: None,
            cost_estimate: None,
            cost_override: None,
            stages: StageController::new(),
            review_result: None,
            disposition: Disposition::Pending,
            denial_comments: None,
            approved_amount: None,
            repair_shops: Vec::new(),
            auto_approval_triggered: false,
        }
    }

    /// Resets every field to its default except the processing mode
    pub fn reset_preserving_mode(&mut self) {
        *self = Self::new(self.processing_mode);
    }

    /// Returns true once analysis or estimate data exists
    pub fn has_claim_data(&self) -> bool {
        self.damage_analysis.is_some()
            || self.cost_estimate.is_some()
            || !self.confirmed_damage_labels.is_empty()
            || !self.damage_assessments.is_empty()
    }

    /// Whether the one-shot auto-approval guard has fired for this claim
    pub fn auto_approval_triggered(&self) -> bool {
        self.auto_approval_triggered
    }

    /// Fires the one-shot guard; there is no way to unset it short of a reset
    pub fn mark_auto_approval_triggered(&mut self) {
        self.auto_approval_triggered = true;
    }

    /// Moves the disposition out of `pending`; it never moves again
    pub fn settle(&mut self, disposition: Disposition) -> Result<(), ClaimError> {
        match (self.disposition, disposition) {
            (Disposition::Pending, Disposition::Approved | Disposition::Denied) => {
                self.disposition = disposition;
                Ok(())
            }
            (Disposition::Pending, Disposition::Pending) => Ok(()),
            (settled, _) => Err(ClaimError::ClaimFinalized(settled)),
        }
    }

    /// Fails if the claim already has a disposition
    pub fn ensure_open(&self) -> Result<(), ClaimError> {
        match self.disposition {
            Disposition::Pending => Ok(()),
            settled => Err(ClaimError::ClaimFinalized(settled)),
        }
    }

    /// Checks that stage statuses and estimate totals agree with each other
    pub fn is_consistent(&self) -> bool {
        use crate::stage::StageStatus;

        let estimate_ok = self.cost_estimate.as_ref().map_or(true, CostEstimate::is_consistent);
        let completed_has_estimate = self.stages.cost_estimation() != StageStatus::Completed
            || self.cost_estimate.is_some();
        estimate_ok && completed_has_estimate
    }
}
