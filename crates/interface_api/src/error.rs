//! API error handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use domain_claims::ClaimError;

/// API error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Upstream service failed: {0}")]
    BadGateway(String),

    #[error("Upstream service timed out: {0}")]
    GatewayTimeout(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            ApiError::GatewayTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_type(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "not_found",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Conflict(_) => "conflict",
            ApiError::Validation(_) => "validation_error",
            ApiError::BadGateway(_) => "upstream_error",
            ApiError::GatewayTimeout(_) => "upstream_timeout",
            ApiError::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::NotFound(msg)
            | ApiError::BadRequest(msg)
            | ApiError::Conflict(msg)
            | ApiError::Validation(msg)
            | ApiError::BadGateway(msg)
            | ApiError::GatewayTimeout(msg)
            | ApiError::Internal(msg) => msg.clone(),
        };

        let body = ErrorResponse {
            error: self.error_type().to_string(),
            message,
            details: None,
        };

        (status, Json(body)).into_response()
    }
}

impl From<ClaimError> for ApiError {
    fn from(err: ClaimError) -> Self {
        match err {
            ClaimError::Validation(e) => ApiError::Validation(e.to_string()),
            ClaimError::Service(e) if e.is_timeout() => ApiError::GatewayTimeout(e.to_string()),
            ClaimError::Service(e) => ApiError::BadGateway(e.to_string()),
            ClaimError::ImageUnreadable { .. } => ApiError::BadRequest(err.to_string()),
            ClaimError::InvalidStageTransition { .. }
            | ClaimError::WrongStep { .. }
            | ClaimError::ClaimFinalized(_)
            | ClaimError::NotApproved => ApiError::Conflict(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::PortError;
    use domain_claims::{Disposition, ValidationError};
    use std::time::Duration;

    #[test]
    fn test_claim_errors_map_to_status_codes() {
        let cases = [
            (ClaimError::from(ValidationError::EmptyDenialComments), StatusCode::UNPROCESSABLE_ENTITY),
            (ClaimError::NotApproved, StatusCode::CONFLICT),
            (ClaimError::ClaimFinalized(Disposition::Denied), StatusCode::CONFLICT),
            (
                ClaimError::from(PortError::timeout("analyze-damage", Duration::from_secs(10))),
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (
                ClaimError::from(PortError::rejected("generate-estimate", 404, "No cost reference found")),
                StatusCode::BAD_GATEWAY,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status(), expected);
        }
    }
}
