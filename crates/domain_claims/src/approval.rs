//! Approval and denial of a finished estimate

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::claim::{CostEstimate, RepairShop, ReviewResult};
use crate::error::{ClaimError, ValidationError};
use crate::ports::{ClaimServicesPort, DenyClaimRequest, ReviewEstimateRequest};

/// What an approval produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalOutcome {
    pub review: ReviewResult,
    /// Parts plus labor of the estimate as submitted
    pub approved_amount: Decimal,
    /// Empty when the shop directory could not be reached
    pub repair_shops: Vec<RepairShop>,
}

/// Records approve/deny decisions with the review services
///
/// Holds no claim state of its own; the workflow applies the outcome.
#[derive(Clone)]
pub struct ApprovalDecisionEngine {
    services: Arc<dyn ClaimServicesPort>,
}

impl ApprovalDecisionEngine {
    pub fn new(services: Arc<dyn ClaimServicesPort>) -> Self {
        Self { services }
    }

    /// Submits the estimate for review and fetches the shop list
    ///
    /// The approved amount is taken from the estimate, never from the review
    /// response. A failed shop lookup is logged and yields an empty list.
    pub async fn approve(&self, estimate: &CostEstimate) -> Result<ApprovalOutcome, ClaimError> {
        let approved_amount = estimate.approved_amount();

        let review = self
            .services
            .review_estimate(ReviewEstimateRequest {
                estimate_id: estimate.estimate_id,
                estimate_data: Some(estimate.clone()),
            })
            .await?;

        if let Some(echoed) = review.approved_amount {
            if echoed != approved_amount {
                warn!(%echoed, %approved_amount, "Review service echoed a different amount; keeping the estimate total");
            }
        }

        let repair_shops = match self.services.approved_repair_shops().await {
            Ok(shops) => shops,
            Err(e) => {
                warn!(error = %e, "Failed to load approved repair shops");
                Vec::new()
            }
        };

        info!(
            estimate_id = ?estimate.estimate_id,
            %approved_amount,
            reviewer = %review.reviewer_id,
            "Claim approved"
        );

        Ok(ApprovalOutcome {
            review,
            approved_amount,
            repair_shops,
        })
    }

    /// Validates the comments and records the denial
    ///
    /// Returns the trimmed comments. Recording is best-effort: a service
    /// failure is logged and the denial still stands.
    pub async fn deny(&self, estimate_id: Option<i64>, comments: &str) -> Result<String, ClaimError> {
        let comments = comments.trim();
        if comments.is_empty() {
            return Err(ValidationError::EmptyDenialComments.into());
        }

        let request = DenyClaimRequest {
            estimate_id,
            denial_comments: comments.to_string(),
        };
        if let Err(e) = self.services.deny_claim(request).await {
            warn!(?estimate_id, error = %e, "Failed to record claim denial");
        }

        info!(?estimate_id, "Claim denied");
        Ok(comments.to_string())
    }
}
