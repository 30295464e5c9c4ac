//! Claim persistence
//!
//! A claim keeps a serialized mirror of its state in a key-value store so a
//! session can be recovered after a reload, and so the approval stage can pick
//! up what assessment handed over. The store is a port: [`InMemoryStore`]
//! lives here, the file-backed one in `infra_store`.
//!
//! Every key is namespaced to the claim session. Values are JSON. A value that
//! fails to decode is logged and treated as absent.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use tracing::warn;

use core_kernel::{ClaimSessionId, PortError};

use crate::claim::{
    ClaimState, CostEstimate, DamageAnalysis, DamageAssessment, DamageType, Disposition,
    ImageReference, ProcessingMode, RepairShop, ReviewResult, WorkflowStep,
};
use rust_decimal::Decimal;
use crate::overrides::CostOverrideForm;
use crate::stage::{StageController, StageStatus};

/// Keys of the persisted claim mirror, relative to the claim namespace
pub mod keys {
    pub const PROCESSING_MODE: &str = "processing_mode";
    pub const WORKFLOW_STEP: &str = "workflow_step";
    pub const IMAGE: &str = "image";
    pub const DAMAGE_ANALYSIS: &str = "damage_analysis";
    pub const CONFIRMED_LABELS: &str = "confirmed_damage_labels";
    pub const CONFIRMED_ASSESSMENTS: &str = "confirmed_damage_assessments";
    pub const DAMAGE_REASONING: &str = "damage_reasoning";
    pub const DAMAGE_OVERRIDE_NOTES: &str = "damage_analysis_override_notes";
    pub const COST_ESTIMATE: &str = "cost_estimate";
    pub const COST_OVERRIDE: &str = "cost_override";
    pub const DAMAGE_ANALYSIS_STATUS: &str = "damage_analysis_status";
    pub const COST_ESTIMATION_STATUS: &str = "cost_estimation_status";
    pub const REVIEW_RESULT: &str = "review_result";
    pub const DISPOSITION: &str = "disposition";
    pub const DENIAL_COMMENTS: &str = "denial_comments";
    pub const APPROVED_AMOUNT: &str = "approved_amount";
    pub const REPAIR_SHOPS: &str = "repair_shops";

    /// Snapshot handed from assessment to the approval stage
    pub mod approval {
        pub const CONFIRMED_ASSESSMENTS: &str = "approval/confirmed_damage_assessments";
        pub const COST_ESTIMATE: &str = "approval/cost_estimate";
        pub const IMAGE: &str = "approval/image";
        pub const DAMAGE_REASONING: &str = "approval/damage_reasoning";
        pub const DAMAGE_OVERRIDE_NOTES: &str = "approval/damage_analysis_override_notes";
        /// Durable "auto-approve on arrival" signal
        pub const AUTO_APPROVE: &str = "approval/auto_approve";
        /// Estimate the auto-approval must use
        pub const AUTO_APPROVE_ESTIMATE: &str = "approval/auto_approve_estimate";
        /// One-shot guard, set before the approval call is issued
        pub const AUTO_APPROVAL_TRIGGERED: &str = "approval/auto_approval_triggered";
    }
}

/// Raw key-value storage with get/set/delete/clear semantics
///
/// Implementations are synchronous: a write is complete when the call
/// returns, so callers can order writes before any `.await`.
pub trait KeyValueStore: Send + Sync + 'static {
    fn get(&self, key: &str) -> Result<Option<String>, PortError>;

    fn set(&self, key: &str, value: String) -> Result<(), PortError>;

    fn delete(&self, key: &str) -> Result<(), PortError>;

    /// Removes every key starting with `prefix`
    fn clear_prefix(&self, prefix: &str) -> Result<(), PortError>;
}

/// Process-local store, shared by cloning
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    entries: Arc<RwLock<BTreeMap<String, String>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently held
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries
            .read()
            .map(|e| e.keys().cloned().collect())
            .unwrap_or_default()
    }
}

fn poisoned() -> PortError {
    PortError::internal("in-memory store lock poisoned")
}

impl KeyValueStore for InMemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, PortError> {
        Ok(self.entries.read().map_err(|_| poisoned())?.get(key).cloned())
    }

    fn set(&self, key: &str, value: String) -> Result<(), PortError> {
        self.entries.write().map_err(|_| poisoned())?.insert(key.to_string(), value);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), PortError> {
        self.entries.write().map_err(|_| poisoned())?.remove(key);
        Ok(())
    }

    fn clear_prefix(&self, prefix: &str) -> Result<(), PortError> {
        self.entries
            .write()
            .map_err(|_| poisoned())?
            .retain(|key, _| !key.starts_with(prefix));
        Ok(())
    }
}

/// Snapshot read back by the approval stage
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApprovalHandoff {
    pub assessments: Vec<DamageAssessment>,
    pub estimate: Option<CostEstimate>,
    pub image: Option<ImageReference>,
    pub reasoning: Option<String>,
    pub override_notes: Option<String>,
}

/// Typed save/load of one claim's fields
///
/// Storage failures never abort the workflow: writes are logged, reads of
/// malformed or unreadable values come back as `None`.
#[derive(Clone)]
pub struct PersistenceAdapter {
    store: Arc<dyn KeyValueStore>,
    namespace: String,
}

impl std::fmt::Debug for PersistenceAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceAdapter")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

impl PersistenceAdapter {
    pub fn new(store: Arc<dyn KeyValueStore>, session: ClaimSessionId) -> Self {
        Self {
            store,
            namespace: session.storage_namespace(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.namespace, key)
    }

    /// Serializes and stores a value; failures are logged
    pub fn save<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        let full_key = self.full_key(key);
        let encoded = match serde_json::to_string(value) {
            Ok(encoded) => encoded,
            Err(e) => {
                warn!(key = %full_key, error = %e, "Failed to encode claim value");
                return;
            }
        };
        if let Err(e) = self.store.set(&full_key, encoded) {
            warn!(key = %full_key, error = %e, "Failed to persist claim value");
        }
    }

    /// Stores `Some` values and removes the key for `None`
    pub fn save_optional<T: Serialize>(&self, key: &str, value: Option<&T>) {
        match value {
            Some(value) => self.save(key, value),
            None => self.remove(key),
        }
    }

    /// Loads a value; missing, unreadable or malformed values are `None`
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let full_key = self.full_key(key);
        let raw = match self.store.get(&full_key) {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(key = %full_key, error = %e, "Failed to read claim value");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key = %full_key, error = %e, "Ignoring malformed claim value");
                None
            }
        }
    }

    pub fn remove(&self, key: &str) {
        let full_key = self.full_key(key);
        if let Err(e) = self.store.delete(&full_key) {
            warn!(key = %full_key, error = %e, "Failed to remove claim value");
        }
    }

    /// Drops every key of this claim
    pub fn clear(&self) {
        if let Err(e) = self.store.clear_prefix(&self.namespace) {
            warn!(namespace = %self.namespace, error = %e, "Failed to clear claim namespace");
        }
    }

    /// Persists the whole assessment-side mirror
    pub fn save_state(&self, state: &ClaimState) {
        self.save(keys::PROCESSING_MODE, &state.processing_mode);
        self.save(keys::WORKFLOW_STEP, &state.step);
        self.save_optional(keys::IMAGE, state.image.as_ref());
        self.save_optional(keys::DAMAGE_ANALYSIS, state.damage_analysis.as_ref());
        self.save(keys::CONFIRMED_LABELS, &state.confirmed_damage_labels);
        self.save(keys::CONFIRMED_ASSESSMENTS, &state.damage_assessments);
        self.save_optional(keys::DAMAGE_REASONING, state.damage_reasoning.as_ref());
        self.save_optional(keys::DAMAGE_OVERRIDE_NOTES, state.damage_override_notes.as_ref());
        self.save_optional(keys::COST_ESTIMATE, state.cost_estimate.as_ref());
        self.save_optional(keys::COST_OVERRIDE, state.cost_override.as_ref());
        self.save(keys::DAMAGE_ANALYSIS_STATUS, &state.stages.damage_analysis());
        self.save(keys::COST_ESTIMATION_STATUS, &state.stages.cost_estimation());
        self.save_optional(keys::REVIEW_RESULT, state.review_result.as_ref());
        self.save(keys::DISPOSITION, &state.disposition);
        self.save_optional(keys::DENIAL_COMMENTS, state.denial_comments.as_ref());
        self.save_optional(keys::APPROVED_AMOUNT, state.approved_amount.as_ref());
        self.save(keys::REPAIR_SHOPS, &state.repair_shops);
    }

    /// Rebuilds a claim from the mirror, key by key
    ///
    /// A `completed` cost-estimation status without an estimate is
    /// downgraded to `active`.
    pub fn load_state(&self) -> ClaimState {
        let mut state = ClaimState::new(self.load::<ProcessingMode>(keys::PROCESSING_MODE).unwrap_or_default());

        state.step = self.load::<WorkflowStep>(keys::WORKFLOW_STEP).unwrap_or_default();
        state.image = self.load::<ImageReference>(keys::IMAGE);
        state.damage_analysis = self.load::<DamageAnalysis>(keys::DAMAGE_ANALYSIS);
        state.confirmed_damage_labels = self.load::<Vec<DamageType>>(keys::CONFIRMED_LABELS).unwrap_or_default();
        state.damage_assessments = self
            .load::<Vec<DamageAssessment>>(keys::CONFIRMED_ASSESSMENTS)
            .unwrap_or_default();
        state.damage_reasoning = self.load::<String>(keys::DAMAGE_REASONING);
        state.damage_override_notes = self.load::<String>(keys::DAMAGE_OVERRIDE_NOTES);
        state.cost_estimate = self.load::<CostEstimate>(keys::COST_ESTIMATE);
        state.cost_override = self.load::<CostOverrideForm>(keys::COST_OVERRIDE);
        state.review_result = self.load::<ReviewResult>(keys::REVIEW_RESULT);
        state.disposition = self.load::<Disposition>(keys::DISPOSITION).unwrap_or_default();
        state.denial_comments = self.load::<String>(keys::DENIAL_COMMENTS);
        state.approved_amount = self.load::<Decimal>(keys::APPROVED_AMOUNT);
        state.repair_shops = self.load::<Vec<RepairShop>>(keys::REPAIR_SHOPS).unwrap_or_default();

        let damage_status = self.load::<StageStatus>(keys::DAMAGE_ANALYSIS_STATUS).unwrap_or_default();
        let mut cost_status = self.load::<StageStatus>(keys::COST_ESTIMATION_STATUS).unwrap_or_default();
        if cost_status == StageStatus::Completed && state.cost_estimate.is_none() {
            warn!(namespace = %self.namespace, "Cost estimation marked completed without an estimate; reopening");
            cost_status = StageStatus::Active;
        }
        state.stages = StageController::from_statuses(damage_status, cost_status);

        if self.load::<bool>(keys::approval::AUTO_APPROVAL_TRIGGERED).unwrap_or(false) {
            state.mark_auto_approval_triggered();
        }

        state
    }

    /// Writes the approval-stage snapshot
    pub fn save_handoff(&self, state: &ClaimState) {
        self.save(keys::approval::CONFIRMED_ASSESSMENTS, &state.damage_assessments);
        self.save_optional(keys::approval::COST_ESTIMATE, state.cost_estimate.as_ref());
        self.save_optional(keys::approval::IMAGE, state.image.as_ref());
        self.save_optional(keys::approval::DAMAGE_REASONING, state.damage_reasoning.as_ref());
        self.save_optional(keys::approval::DAMAGE_OVERRIDE_NOTES, state.damage_override_notes.as_ref());
    }

    pub fn load_handoff(&self) -> ApprovalHandoff {
        ApprovalHandoff {
            assessments: self
                .load(keys::approval::CONFIRMED_ASSESSMENTS)
                .unwrap_or_default(),
            estimate: self.load(keys::approval::COST_ESTIMATE),
            image: self.load(keys::approval::IMAGE),
            reasoning: self.load(keys::approval::DAMAGE_REASONING),
            override_notes: self.load(keys::approval::DAMAGE_OVERRIDE_NOTES),
        }
    }

    /// Removes the approval-stage snapshot
    pub fn clear_handoff(&self) {
        for key in [
            keys::approval::CONFIRMED_ASSESSMENTS,
            keys::approval::COST_ESTIMATE,
            keys::approval::IMAGE,
            keys::approval::DAMAGE_REASONING,
            keys::approval::DAMAGE_OVERRIDE_NOTES,
        ] {
            self.remove(key);
        }
    }

    /// Raises the auto-approve signal together with the estimate to approve
    pub fn signal_auto_approve(&self, estimate: &CostEstimate) {
        self.save(keys::approval::AUTO_APPROVE_ESTIMATE, estimate);
        self.save(keys::approval::AUTO_APPROVE, &true);
    }

    pub fn auto_approve_signalled(&self) -> bool {
        self.load::<bool>(keys::approval::AUTO_APPROVE).unwrap_or(false)
    }

    pub fn auto_approve_estimate(&self) -> Option<CostEstimate> {
        self.load(keys::approval::AUTO_APPROVE_ESTIMATE)
    }

    pub fn clear_auto_approve_signal(&self) {
        self.remove(keys::approval::AUTO_APPROVE);
        self.remove(keys::approval::AUTO_APPROVE_ESTIMATE);
    }

    pub fn auto_approval_triggered(&self) -> bool {
        self.load::<bool>(keys::approval::AUTO_APPROVAL_TRIGGERED).unwrap_or(false)
    }

    pub fn mark_auto_approval_triggered(&self) {
        self.save(keys::approval::AUTO_APPROVAL_TRIGGERED, &true);
    }
}
