//! Claims handlers
//!
//! One handler per workflow operation. Each locks the session's workflow,
//! runs the operation and answers with the resulting claim snapshot.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    Json,
};
use tokio::sync::OwnedMutexGuard;
use tracing::{info, warn};

use core_kernel::ClaimSessionId;
use domain_claims::{ClaimImage, ClaimWorkflow, ClosureSummary, CostEstimate, CostOverrideForm};

use crate::dto::claims::*;
use crate::{error::ApiError, AppState};

/// Header carrying the uploaded file's name
pub const FILE_NAME_HEADER: &str = "x-file-name";

async fn lock_claim(state: &AppState, id: &str) -> Result<OwnedMutexGuard<ClaimWorkflow>, ApiError> {
    let session: ClaimSessionId = id
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid claim session id '{id}'")))?;
    let shared = state
        .sessions
        .get(session)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("Claim session {session} not found")))?;
    Ok(shared.lock_owned().await)
}

/// Creates a new claim session
pub async fn create_claim(
    State(state): State<AppState>,
    Json(request): Json<CreateClaimRequest>,
) -> (StatusCode, Json<ClaimResponse>) {
    let (_, shared) = state.sessions.create(request.mode).await;
    let workflow = shared.lock().await;
    (StatusCode::CREATED, Json(ClaimResponse::from(&*workflow)))
}

/// Gets a claim snapshot
pub async fn get_claim(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ClaimResponse>, ApiError> {
    let workflow = lock_claim(&state, &id).await?;
    Ok(Json(ClaimResponse::from(&*workflow)))
}

/// Switches processing mode, resetting the claim
pub async fn select_mode(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<SelectModeRequest>,
) -> Result<Json<ClaimResponse>, ApiError> {
    let mut workflow = lock_claim(&state, &id).await?;
    workflow.select_mode(request.mode);
    Ok(Json(ClaimResponse::from(&*workflow)))
}

/// Accepts the raw image body
///
/// In the automated modes the pipeline is started on a background task that
/// keeps the claim locked until it finishes; the upload answers right away.
pub async fn upload_image(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ImageUploadQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<ImageAcceptedResponse>), ApiError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();
    let file_name = headers
        .get(FILE_NAME_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("upload")
        .to_string();

    let mut workflow = lock_claim(&state, &id).await?;
    workflow.accept_image(ClaimImage::new(file_name, content_type, body.to_vec()), query.replace)?;

    let pipeline_started = workflow.state().processing_mode.is_autonomous();
    let claim = ClaimResponse::from(&*workflow);

    if pipeline_started {
        let session = workflow.session();
        tokio::spawn(async move {
            let mut workflow = workflow;
            match workflow.run_pipeline().await {
                Ok(outcome) => info!(session = %session, outcome = ?outcome, "Claim pipeline finished"),
                Err(e) => warn!(session = %session, error = %e, "Claim pipeline stopped"),
            }
        });
    }

    Ok((StatusCode::ACCEPTED, Json(ImageAcceptedResponse { pipeline_started, claim })))
}

/// Runs damage analysis on the uploaded image
pub async fn analyze_damage(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ClaimResponse>, ApiError> {
    let mut workflow = lock_claim(&state, &id).await?;
    workflow.analyze_damage().await?;
    Ok(Json(ClaimResponse::from(&*workflow)))
}

/// Re-runs the pipeline of the claim's mode in the foreground
pub async fn run_pipeline(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PipelineResponse>, ApiError> {
    let mut workflow = lock_claim(&state, &id).await?;
    let outcome = workflow.run_pipeline().await?;
    Ok(Json(PipelineResponse {
        outcome,
        claim: ClaimResponse::from(&*workflow),
    }))
}

pub async fn confirm_damage(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ClaimResponse>, ApiError> {
    let mut workflow = lock_claim(&state, &id).await?;
    workflow.confirm_damage_analysis()?;
    Ok(Json(ClaimResponse::from(&*workflow)))
}

pub async fn override_damage(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<DamageOverrideRequest>,
) -> Result<Json<ClaimResponse>, ApiError> {
    let mut workflow = lock_claim(&state, &id).await?;
    workflow.submit_damage_override(&request.into_override())?;
    Ok(Json(ClaimResponse::from(&*workflow)))
}

pub async fn generate_estimate(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CostEstimate>, ApiError> {
    let mut workflow = lock_claim(&state, &id).await?;
    Ok(Json(workflow.generate_estimate().await?))
}

/// The cost override form, pre-filled from the current estimate
pub async fn cost_override_form(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CostOverrideForm>, ApiError> {
    let workflow = lock_claim(&state, &id).await?;
    Ok(Json(workflow.cost_override_form()))
}

pub async fn override_estimate(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<CostOverrideRequest>,
) -> Result<Json<CostEstimate>, ApiError> {
    let mut workflow = lock_claim(&state, &id).await?;
    let form = request.apply_to(workflow.cost_override_form());
    Ok(Json(workflow.submit_cost_override(form)?))
}

pub async fn confirm_estimate(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ClaimResponse>, ApiError> {
    let mut workflow = lock_claim(&state, &id).await?;
    workflow.confirm_estimate()?;
    Ok(Json(ClaimResponse::from(&*workflow)))
}

pub async fn back_to_damage(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ClaimResponse>, ApiError> {
    let mut workflow = lock_claim(&state, &id).await?;
    workflow.go_back_to_damage_analysis()?;
    Ok(Json(ClaimResponse::from(&*workflow)))
}

/// Entry point of the approval stage; fires the one-shot auto-approval if signalled
pub async fn enter_approval(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApprovalEntryResponse>, ApiError> {
    let mut workflow = lock_claim(&state, &id).await?;
    let auto_approval = workflow.enter_approval_stage().await?;
    Ok(Json(ApprovalEntryResponse {
        auto_approval,
        claim: ClaimResponse::from(&*workflow),
    }))
}

pub async fn approve(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApprovalResponse>, ApiError> {
    let mut workflow = lock_claim(&state, &id).await?;
    let outcome = workflow.approve().await?;
    Ok(Json(ApprovalResponse {
        outcome,
        claim: ClaimResponse::from(&*workflow),
    }))
}

pub async fn deny(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<DenyRequest>,
) -> Result<Json<ClaimResponse>, ApiError> {
    let mut workflow = lock_claim(&state, &id).await?;
    workflow.deny(&request.comments).await?;
    Ok(Json(ClaimResponse::from(&*workflow)))
}

pub async fn close(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ClosureSummary>, ApiError> {
    let mut workflow = lock_claim(&state, &id).await?;
    Ok(Json(workflow.proceed_to_closure()?))
}

/// Wipes the claim and starts over in assisted mode
pub async fn start_new_claim(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ClaimResponse>, ApiError> {
    let mut workflow = lock_claim(&state, &id).await?;
    workflow.start_new_claim();
    Ok(Json(ClaimResponse::from(&*workflow)))
}
