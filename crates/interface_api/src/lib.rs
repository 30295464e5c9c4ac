//! HTTP API Layer
//!
//! This crate exposes the claim workflow over HTTP using Axum. Every claim is
//! a session addressed by its id; each route maps onto one workflow operation.
//!
//! # Architecture
//!
//! - **Sessions**: In-memory registry of claim workflows, restored from the store on demand
//! - **Handlers**: Request handlers for each workflow operation
//! - **Middleware**: Request ids, tracing, audit logging
//! - **DTOs**: Request/Response data transfer objects
//! - **Error Handling**: Consistent error responses
//!
//! # Example
//!
//! ```rust,ignore
//! use interface_api::{create_router, AppState};
//!
//! let state = AppState::new(config, services, store);
//! let app = create_router(state);
//! axum::serve(listener, app).await?;
//! ```

pub mod config;
pub mod error;
pub mod middleware;
pub mod handlers;
pub mod dto;
pub mod sessions;

use axum::{
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use core_kernel::HealthCheckable;
use domain_claims::{ClaimServicesPort, KeyValueStore};

use crate::config::ApiConfig;
use crate::handlers::{claims, health};
use crate::middleware::audit_middleware;
use crate::sessions::SessionRegistry;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub sessions: SessionRegistry,
    pub config: ApiConfig,
    /// Adapters reported by the readiness check besides the claim services
    pub health_checks: Vec<Arc<dyn HealthCheckable>>,
}

impl AppState {
    pub fn new(
        config: ApiConfig,
        services: Arc<dyn ClaimServicesPort>,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self {
            sessions: SessionRegistry::new(services, store, config.workflow_settings()),
            config,
            health_checks: Vec::new(),
        }
    }

    pub fn with_health_check(mut self, adapter: Arc<dyn HealthCheckable>) -> Self {
        self.health_checks.push(adapter);
        self
    }
}

/// Creates the main API router
///
/// # Arguments
///
/// * `state` - Session registry, configuration and health-checked adapters
///
/// # Returns
///
/// Configured Axum router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    let body_limit = state.config.body_limit();

    // Public routes
    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check));

    // Claims routes
    let claims_routes = Router::new()
        .route("/", post(claims::create_claim))
        .route("/:id", get(claims::get_claim))
        .route("/:id/mode", put(claims::select_mode))
        .route(
            "/:id/image",
            post(claims::upload_image).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/:id/analyze", post(claims::analyze_damage))
        .route("/:id/pipeline", post(claims::run_pipeline))
        .route("/:id/damage/confirm", post(claims::confirm_damage))
        .route("/:id/damage/override", post(claims::override_damage))
        .route("/:id/estimate", post(claims::generate_estimate))
        .route(
            "/:id/estimate/override",
            get(claims::cost_override_form).post(claims::override_estimate),
        )
        .route("/:id/estimate/confirm", post(claims::confirm_estimate))
        .route("/:id/estimate/back", post(claims::back_to_damage))
        .route("/:id/approval/enter", post(claims::enter_approval))
        .route("/:id/approve", post(claims::approve))
        .route("/:id/deny", post(claims::deny))
        .route("/:id/close", post(claims::close))
        .route("/:id/new", post(claims::start_new_claim));

    let api_routes = Router::new()
        .nest("/claims", claims_routes)
        .layer(axum_middleware::from_fn(audit_middleware));

    // Combine all routes
    Router::new()
        .merge(public_routes)
        .nest("/api/v1", api_routes)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                ),
        )
        .with_state(state)
}
