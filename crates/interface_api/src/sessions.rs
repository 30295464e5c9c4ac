//! Claim session registry
//!
//! Each session owns one [`ClaimWorkflow`] behind an async mutex. A handler
//! holds the lock for the duration of one operation; pipelines spawned by an
//! image upload take the lock over and keep it until they finish, so requests
//! against that claim queue up behind the pipeline.
//!
//! Sessions not in memory are restored from the store on first use.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use core_kernel::ClaimSessionId;
use domain_claims::persistence::keys;
use domain_claims::{
    ClaimServicesPort, ClaimWorkflow, KeyValueStore, PersistenceAdapter, ProcessingMode,
    WorkflowSettings,
};

/// A workflow shared between handlers and spawned pipelines
pub type SharedWorkflow = Arc<Mutex<ClaimWorkflow>>;

#[derive(Clone)]
pub struct SessionRegistry {
    services: Arc<dyn ClaimServicesPort>,
    store: Arc<dyn KeyValueStore>,
    settings: WorkflowSettings,
    sessions: Arc<RwLock<HashMap<ClaimSessionId, SharedWorkflow>>>,
}

impl SessionRegistry {
    pub fn new(
        services: Arc<dyn ClaimServicesPort>,
        store: Arc<dyn KeyValueStore>,
        settings: WorkflowSettings,
    ) -> Self {
        Self {
            services,
            store,
            settings,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn services(&self) -> &Arc<dyn ClaimServicesPort> {
        &self.services
    }

    pub fn settings(&self) -> &WorkflowSettings {
        &self.settings
    }

    /// Starts a new claim in the given mode and persists it
    pub async fn create(&self, mode: ProcessingMode) -> (ClaimSessionId, SharedWorkflow) {
        let session = ClaimSessionId::generate();
        let mut workflow = ClaimWorkflow::new(
            session,
            self.services.clone(),
            self.store.clone(),
            self.settings.clone(),
        );
        workflow.select_mode(mode);

        let shared = Arc::new(Mutex::new(workflow));
        self.sessions.write().await.insert(session, shared.clone());
        info!(session = %session, mode = %mode, "Claim session created");
        (session, shared)
    }

    /// Looks up a session, restoring it from the store when not in memory
    ///
    /// Returns `None` when the store holds nothing for the session.
    pub async fn get(&self, session: ClaimSessionId) -> Option<SharedWorkflow> {
        if let Some(shared) = self.sessions.read().await.get(&session) {
            return Some(shared.clone());
        }

        let persistence = PersistenceAdapter::new(self.store.clone(), session);
        persistence.load::<ProcessingMode>(keys::PROCESSING_MODE)?;

        let mut sessions = self.sessions.write().await;
        let shared = sessions.entry(session).or_insert_with(|| {
            debug!(session = %session, "Restoring claim session from store");
            Arc::new(Mutex::new(ClaimWorkflow::restore(
                session,
                self.services.clone(),
                self.store.clone(),
                self.settings.clone(),
            )))
        });
        Some(shared.clone())
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drops the in-memory workflow; the persisted mirror stays
    pub async fn evict(&self, session: ClaimSessionId) -> bool {
        self.sessions.write().await.remove(&session).is_some()
    }
}
