//! Human overrides of AI-produced damage and cost results
//!
//! Two independent overrides exist. A damage override replaces the confirmed
//! assessments wholesale and appends the agent's note to the AI reasoning.
//! A cost override replaces individual parts/labor amounts per assessment;
//! everything derived from them is recomputed by [`recompute_estimate`], a
//! pure function of the prior estimate, the assessments and the form.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use core_kernel::{format_amount, format_amount_input, labor_hours_for, parse_formatted_amount};
use crate::claim::{dedup_assessments, CostEstimate, DamageAssessment, DamageType, LineItem, Severity};
use crate::error::ValidationError;

/// Prefix put in front of every agent note appended to the reasoning
pub const AGENT_NOTE_PREFIX: &str = "Agent Note: ";

/// A human replacement for the damage labels and severities
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageOverride {
    selections: Vec<DamageAssessment>,
    #[serde(default)]
    note: String,
}

impl DamageOverride {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from the currently confirmed assessments
    pub fn prefill(assessments: &[DamageAssessment]) -> Self {
        Self {
            selections: dedup_assessments(assessments.iter().copied()),
            note: String::new(),
        }
    }

    /// Selects or deselects a label; a newly selected label starts as minor
    pub fn toggle(&mut self, damage_type: DamageType) {
        if let Some(pos) = self.selections.iter().position(|a| a.damage_type == damage_type) {
            self.selections.remove(pos);
        } else {
            self.selections.push(DamageAssessment::new(damage_type, Severity::Minor));
        }
    }

    /// Selects a label with a severity; a repeated label keeps its position and takes the new severity
    pub fn select(mut self, damage_type: DamageType, severity: Severity) -> Self {
        self.selections.push(DamageAssessment::new(damage_type, severity));
        self.selections = dedup_assessments(self.selections.drain(..));
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = note.into();
        self
    }

    pub fn selections(&self) -> &[DamageAssessment] {
        &self.selections
    }

    pub fn note(&self) -> &str {
        &self.note
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.selections.is_empty() {
            return Err(ValidationError::EmptyDamageSelection);
        }
        Ok(())
    }

    /// Validated, de-duplicated assessments plus the combined reasoning
    pub fn resolve(&self, prior_reasoning: Option<&str>) -> Result<ResolvedDamageOverride, ValidationError> {
        self.validate()?;

        let assessments = dedup_assessments(self.selections.iter().copied());
        let labels = assessments.iter().map(|a| a.damage_type).collect();
        let note = self.note.trim();

        Ok(ResolvedDamageOverride {
            assessments,
            labels,
            reasoning: append_agent_note(prior_reasoning, note),
            note: (!note.is_empty()).then(|| note.to_string()),
        })
    }
}

/// The result of applying a [`DamageOverride`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDamageOverride {
    pub assessments: Vec<DamageAssessment>,
    pub labels: Vec<DamageType>,
    pub reasoning: Option<String>,
    pub note: Option<String>,
}

/// Appends an agent note to the existing reasoning, keeping the original text
pub fn append_agent_note(reasoning: Option<&str>, note: &str) -> Option<String> {
    let note = note.trim();
    let existing = reasoning.map(str::trim).filter(|r| !r.is_empty());

    match (existing, note.is_empty()) {
        (existing, true) => existing.map(str::to_string),
        (Some(existing), false) => Some(format!("{existing}\n\n{AGENT_NOTE_PREFIX}{note}")),
        (None, false) => Some(format!("{AGENT_NOTE_PREFIX}{note}")),
    }
}

/// Raw parts/labor input for one assessment, as typed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostOverrideEntry {
    #[serde(default)]
    pub parts: String,
    #[serde(default)]
    pub labor: String,
}

impl CostOverrideEntry {
    fn parts_value(&self) -> Option<Decimal> {
        non_empty_amount(&self.parts)
    }

    fn labor_value(&self) -> Option<Decimal> {
        non_empty_amount(&self.labor)
    }
}

fn non_empty_amount(text: &str) -> Option<Decimal> {
    if text.trim().is_empty() {
        None
    } else {
        Some(parse_formatted_amount(text))
    }
}

/// Per-assessment cost inputs keyed `<damage_type>_<severity>`, plus a note
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostOverrideForm {
    #[serde(default)]
    pub entries: BTreeMap<String, CostOverrideEntry>,
    #[serde(default)]
    pub notes: String,
}

impl CostOverrideForm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-fills every assessment from the matching line item, or zeros
    pub fn prefill(estimate: Option<&CostEstimate>, assessments: &[DamageAssessment]) -> Self {
        let entries = assessments
            .iter()
            .map(|assessment| {
                let (parts, labor) = estimate
                    .and_then(|e| e.find_line_item(assessment))
                    .map(|item| (item.parts_cost, item.labor_cost))
                    .unwrap_or((Decimal::ZERO, Decimal::ZERO));
                let entry = CostOverrideEntry {
                    parts: format_amount_input(&parts.to_string()),
                    labor: format_amount_input(&labor.to_string()),
                };
                (assessment.key(), entry)
            })
            .collect();

        Self {
            entries,
            notes: String::new(),
        }
    }

    /// Sets the parts input, normalised for display
    pub fn set_parts(&mut self, assessment: &DamageAssessment, text: &str) {
        self.entries.entry(assessment.key()).or_default().parts = format_amount_input(text);
    }

    /// Sets the labor input, normalised for display
    pub fn set_labor(&mut self, assessment: &DamageAssessment, text: &str) {
        self.entries.entry(assessment.key()).or_default().labor = format_amount_input(text);
    }

    pub fn set_notes(&mut self, notes: impl Into<String>) {
        self.notes = notes.into();
    }

    pub fn entry(&self, assessment: &DamageAssessment) -> Option<&CostOverrideEntry> {
        self.entries.get(&assessment.key())
    }

    /// Labor hours implied by the labor input, two decimals
    pub fn labor_hours_display(&self, assessment: &DamageAssessment) -> String {
        let labor = self
            .entry(assessment)
            .and_then(CostOverrideEntry::labor_value)
            .unwrap_or(Decimal::ZERO);
        format_amount(labor_hours_for(labor), 2)
    }

    /// At least one parts or labor amount across all assessments must be non-zero
    pub fn validate(&self, assessments: &[DamageAssessment]) -> Result<(), ValidationError> {
        let any_cost = assessments.iter().any(|assessment| {
            self.entry(assessment).is_some_and(|entry| {
                entry.parts_value().is_some_and(|v| v > Decimal::ZERO)
                    || entry.labor_value().is_some_and(|v| v > Decimal::ZERO)
            })
        });

        if any_cost {
            Ok(())
        } else {
            Err(ValidationError::AllCostsZero)
        }
    }
}

/// Rebuilds the estimate from overrides, falling back to the prior line items
///
/// For each assessment, in order: the override amount if entered, else the
/// matching prior line item's amount, else zero. Totals are summed in
/// assessment order so repeated calls give identical results.
pub fn recompute_estimate(
    prior: Option<&CostEstimate>,
    assessments: &[DamageAssessment],
    form: &CostOverrideForm,
) -> CostEstimate {
    let override_notes = form.notes.trim();

    let line_items = assessments
        .iter()
        .map(|assessment| {
            let original = prior.and_then(|e| e.find_line_item(assessment));
            let entry = form.entry(assessment);

            let parts_cost = entry
                .and_then(CostOverrideEntry::parts_value)
                .or_else(|| original.map(|item| item.parts_cost))
                .unwrap_or(Decimal::ZERO);
            let labor_cost = entry
                .and_then(CostOverrideEntry::labor_value)
                .or_else(|| original.map(|item| item.labor_cost))
                .unwrap_or(Decimal::ZERO);

            let notes = if override_notes.is_empty() {
                original.map(|item| item.notes.clone()).unwrap_or_default()
            } else {
                override_notes.to_string()
            };

            LineItem::priced(*assessment, parts_cost, labor_cost, notes)
        })
        .collect();

    CostEstimate::from_line_items(prior.and_then(|e| e.estimate_id), line_items)
}
