//! Test Data Builders
//!
//! Builders for claim workflows wired to the mock services and an in-memory
//! store, so tests only spell out what they care about.

use std::sync::Arc;
use std::time::Duration;

use core_kernel::ClaimSessionId;
use domain_claims::ports::mock::{MockClaimServices, ServiceOperation};
use domain_claims::{
    ClaimState, ClaimWorkflow, CostEstimate, DamageAnalysis, InMemoryStore, PersistenceAdapter,
    ProcessingMode, StageController, StageStatus, WorkflowSettings, WorkflowStep,
};

/// Everything a workflow test needs to inspect afterwards
pub struct TestWorkflow {
    pub workflow: ClaimWorkflow,
    pub services: Arc<MockClaimServices>,
    pub store: InMemoryStore,
}

impl TestWorkflow {
    /// A second workflow for the same session, restored from the shared store
    pub fn restore_sibling(&self) -> ClaimWorkflow {
        ClaimWorkflow::restore(
            self.workflow.session(),
            self.services.clone(),
            Arc::new(self.store.clone()),
            self.workflow.settings().clone(),
        )
    }

    /// Direct access to this claim's persisted mirror
    pub fn persistence(&self) -> PersistenceAdapter {
        PersistenceAdapter::new(Arc::new(self.store.clone()), self.workflow.session())
    }
}

/// Builder for constructing a test workflow
pub struct TestWorkflowBuilder {
    session: ClaimSessionId,
    mode: ProcessingMode,
    services: MockClaimServices,
    store: InMemoryStore,
    settings: WorkflowSettings,
}

impl Default for TestWorkflowBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestWorkflowBuilder {
    /// Assisted mode, default mock services, zero delays
    pub fn new() -> Self {
        Self {
            session: ClaimSessionId::generate(),
            mode: ProcessingMode::Assisted,
            services: MockClaimServices::new(),
            store: InMemoryStore::new(),
            settings: WorkflowSettings::immediate(),
        }
    }

    pub fn with_mode(mut self, mode: ProcessingMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_session(mut self, session: ClaimSessionId) -> Self {
        self.session = session;
        self
    }

    pub fn with_analysis(mut self, analysis: DamageAnalysis) -> Self {
        self.services = self.services.with_analysis(analysis);
        self
    }

    pub fn failing(mut self, operation: ServiceOperation) -> Self {
        self.services = self.services.failing(operation);
        self
    }

    pub fn with_delay(mut self, operation: ServiceOperation, delay: Duration) -> Self {
        self.services = self.services.with_delay(operation, delay);
        self
    }

    /// Shares an existing store, e.g. to simulate a second process
    pub fn with_store(mut self, store: InMemoryStore) -> Self {
        self.store = store;
        self
    }

    pub fn with_settings(mut self, settings: WorkflowSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn build(self) -> TestWorkflow {
        let services = Arc::new(self.services);
        let mut workflow = ClaimWorkflow::new(
            self.session,
            services.clone(),
            Arc::new(self.store.clone()),
            self.settings,
        );
        if self.mode != ProcessingMode::Assisted {
            workflow.select_mode(self.mode);
        }
        TestWorkflow {
            workflow,
            services,
            store: self.store,
        }
    }
}

/// Builder for claim states as they would sit in the store
pub struct ClaimStateBuilder {
    state: ClaimState,
}

impl Default for ClaimStateBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClaimStateBuilder {
    pub fn new() -> Self {
        Self {
            state: ClaimState::default(),
        }
    }

    pub fn with_mode(mut self, mode: ProcessingMode) -> Self {
        self.state.processing_mode = mode;
        self
    }

    /// A claim whose estimate was confirmed and handed to approval
    pub fn awaiting_approval(mut self, estimate: CostEstimate) -> Self {
        self.state.damage_assessments = estimate.line_items.iter().map(|i| i.assessment()).collect();
        self.state.confirmed_damage_labels = self.state.damage_assessments.iter().map(|a| a.damage_type).collect();
        self.state.cost_estimate = Some(estimate);
        self.state.stages = StageController::from_statuses(StageStatus::Locked, StageStatus::Completed);
        self.state.step = WorkflowStep::Approval;
        self
    }

    pub fn build(self) -> ClaimState {
        self.state
    }
}
