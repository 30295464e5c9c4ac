//! HTTP Claim Services Adapter
//!
//! Implements [`ClaimServicesPort`] against the claims processing API. Image
//! analysis is a multipart upload; everything else is JSON. Each success
//! response wraps its payload with the id of the record the backend stored.
//!
//! # Error Handling
//!
//! Failures are mapped to `PortError` variants:
//! - timeouts -> `PortError::Timeout`
//! - connection failures -> `PortError::Connection`
//! - 4xx -> `PortError::Rejected` carrying the response `detail`
//! - 5xx -> `PortError::ServiceUnavailable`
//! - undecodable bodies -> `PortError::Transformation`

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

use core_kernel::{AdapterHealth, DomainPort, HealthCheckResult, HealthCheckable, PortError};

use crate::claim::{
    CostEstimate, DamageAnalysis, DamageAssessment, DamageType, LineItem, RepairShop, ReviewResult, Severity,
};
use crate::ports::{
    AnalyzeDamageRequest, ClaimServicesPort, DenyClaimRequest, GenerateEstimateRequest, ReviewEstimateRequest,
};

/// Connection settings for the claims processing API
#[derive(Debug, Clone)]
pub struct HttpServicesConfig {
    /// Base URL without trailing slash (e.g., "http://localhost:8000")
    pub base_url: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for HttpServicesConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AnalyzeEnvelope {
    assessment_id: Option<i64>,
    claim_id: Option<i64>,
    result: WireAnalysis,
}

#[derive(Debug, Deserialize)]
struct WireAnalysis {
    #[serde(default)]
    damage_labels: Vec<String>,
    #[serde(default)]
    damage_assessments: Option<Vec<WireAssessment>>,
    #[serde(default)]
    reasoning: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireAssessment {
    damage_type: String,
    severity: String,
}

#[derive(Debug, Deserialize)]
struct EstimateEnvelope {
    estimate_id: Option<i64>,
    result: WireEstimate,
}

#[derive(Debug, Deserialize)]
struct WireEstimate {
    total_base_cost: Decimal,
    total_parts_cost: Decimal,
    total_labor_cost: Decimal,
    total_labor_hours: Decimal,
    #[serde(default)]
    line_items: Vec<WireLineItem>,
}

#[derive(Debug, Deserialize)]
struct WireLineItem {
    damage_type: String,
    damage_severity: String,
    parts_cost: Decimal,
    labor_cost: Decimal,
    #[serde(default)]
    notes: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReviewEnvelope {
    review_id: Option<i64>,
    result: WireReview,
}

#[derive(Debug, Deserialize)]
struct WireReview {
    status: String,
    reviewer_id: String,
    #[serde(default)]
    review_timestamp: Option<String>,
    #[serde(default)]
    notes: Option<String>,
    #[serde(default)]
    approved_amount: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
struct RepairShopsEnvelope {
    #[serde(default)]
    repair_shops: Vec<RepairShop>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: serde_json::Value,
}

/// Claim services reached over HTTP
#[derive(Debug, Clone)]
pub struct HttpClaimServices {
    client: Client,
    config: HttpServicesConfig,
}

impl HttpClaimServices {
    pub fn new(config: HttpServicesConfig) -> Result<Self, PortError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PortError::Internal {
                message: "Failed to build HTTP client".to_string(),
                source: Some(Box::new(e)),
            })?;
        Ok(Self { client, config })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn transport_error(&self, operation: &str, error: reqwest::Error) -> PortError {
        if error.is_timeout() {
            PortError::timeout(operation, self.config.timeout)
        } else if error.is_connect() {
            PortError::Connection {
                message: format!("{operation}: {error}"),
                source: Some(Box::new(error)),
            }
        } else if error.is_decode() {
            PortError::transformation(format!("{operation}: {error}"))
        } else {
            PortError::Internal {
                message: format!("{operation} request failed"),
                source: Some(Box::new(error)),
            }
        }
    }

    async fn read<T: DeserializeOwned>(&self, operation: &str, response: Response) -> Result<T, PortError> {
        let status = response.status();
        if status.is_success() {
            return response.json::<T>().await.map_err(|e| self.transport_error(operation, e));
        }

        let body = response.text().await.unwrap_or_default();
        let detail = error_detail(&body);
        if status.is_server_error() {
            warn!(operation, status = status.as_u16(), %detail, "Claim service error");
            return Err(PortError::ServiceUnavailable {
                service: operation.to_string(),
            });
        }
        Err(PortError::rejected(operation, status.as_u16(), detail))
    }

    async fn post_json<B: serde::Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        operation: &str,
        path: &str,
        body: &B,
    ) -> Result<T, PortError> {
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport_error(operation, e))?;
        self.read(operation, response).await
    }
}

/// Pulls `detail` out of an error body, falling back to the raw text
fn error_detail(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody { detail: serde_json::Value::String(text) }) => text,
        Ok(ErrorBody { detail }) => detail.to_string(),
        Err(_) if body.trim().is_empty() => "no detail".to_string(),
        Err(_) => body.trim().to_string(),
    }
}

fn parse_assessment(damage_type: &str, severity: &str) -> Option<DamageAssessment> {
    let damage_type = match DamageType::parse_label(damage_type) {
        Ok(t) => t,
        Err(e) => {
            warn!(error = %e, "Dropping unknown damage type from service response");
            return None;
        }
    };
    let severity = match severity.parse::<Severity>() {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "Dropping assessment with unknown severity");
            return None;
        }
    };
    Some(DamageAssessment::new(damage_type, severity))
}

fn into_analysis(envelope: AnalyzeEnvelope) -> DamageAnalysis {
    let damage_labels = envelope
        .result
        .damage_labels
        .iter()
        .filter_map(|label| match DamageType::parse_label(label) {
            Ok(t) => Some(t),
            Err(e) => {
                warn!(error = %e, "Dropping unknown damage label from analysis");
                None
            }
        })
        .collect();

    let damage_assessments = envelope
        .result
        .damage_assessments
        .unwrap_or_default()
        .iter()
        .filter_map(|a| parse_assessment(&a.damage_type, &a.severity))
        .collect();

    DamageAnalysis {
        assessment_id: envelope.assessment_id,
        claim_id: envelope.claim_id,
        damage_labels,
        damage_assessments,
        reasoning: envelope.result.reasoning,
    }
}

fn into_estimate(envelope: EstimateEnvelope) -> CostEstimate {
    let line_items = envelope
        .result
        .line_items
        .into_iter()
        .filter_map(|item| {
            let assessment = parse_assessment(&item.damage_type, &item.damage_severity)?;
            Some(LineItem::priced(
                assessment,
                item.parts_cost,
                item.labor_cost,
                item.notes.unwrap_or_default(),
            ))
        })
        .collect();

    let estimate = CostEstimate::from_line_items(envelope.estimate_id, line_items);
    if estimate.total_base_cost != envelope.result.total_base_cost
        || estimate.total_labor_hours != envelope.result.total_labor_hours
        || estimate.total_parts_cost != envelope.result.total_parts_cost
        || estimate.total_labor_cost != envelope.result.total_labor_cost
    {
        warn!(
            estimate_id = ?envelope.estimate_id,
            reported = %envelope.result.total_base_cost,
            computed = %estimate.total_base_cost,
            "Estimate totals disagree with line items; using line-item sums"
        );
    }
    estimate
}

/// Accepts RFC 3339 and the naive ISO form the review service writes
fn parse_review_timestamp(raw: Option<&str>) -> DateTime<Utc> {
    let Some(raw) = raw else {
        return Utc::now();
    };
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return ts.with_timezone(&Utc);
    }
    match NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        Ok(naive) => naive.and_utc(),
        Err(e) => {
            warn!(raw, error = %e, "Unreadable review timestamp; using current time");
            Utc::now()
        }
    }
}

fn into_review(envelope: ReviewEnvelope) -> ReviewResult {
    ReviewResult {
        review_id: envelope.review_id,
        review_timestamp: parse_review_timestamp(envelope.result.review_timestamp.as_deref()),
        status: envelope.result.status,
        reviewer_id: envelope.result.reviewer_id,
        notes: envelope.result.notes,
        approved_amount: envelope.result.approved_amount,
    }
}

impl DomainPort for HttpClaimServices {}

#[async_trait]
impl HealthCheckable for HttpClaimServices {
    async fn health_check(&self) -> HealthCheckResult {
        let started = Instant::now();
        let result = self.client.get(self.url("/")).send().await;
        let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let (status, message) = match result {
            Ok(response) if response.status().is_success() => (AdapterHealth::Healthy, None),
            Ok(response) => (
                AdapterHealth::Degraded,
                Some(format!("Claims API answered {}", response.status())),
            ),
            Err(e) => (AdapterHealth::Unhealthy, Some(format!("Claims API unreachable: {e}"))),
        };

        HealthCheckResult {
            adapter_id: "http-claim-services".to_string(),
            status,
            latency_ms,
            message,
            checked_at: Utc::now(),
        }
    }
}

#[async_trait]
impl ClaimServicesPort for HttpClaimServices {
    #[instrument(skip(self, request), fields(file = %request.image.file_name))]
    async fn analyze_damage(&self, request: AnalyzeDamageRequest) -> Result<DamageAnalysis, PortError> {
        const OPERATION: &str = "analyze-damage";

        let image = Part::bytes(request.image.bytes)
            .file_name(request.image.file_name)
            .mime_str(&request.image.content_type)
            .map_err(|e| PortError::validation(format!("Invalid image content type: {e}")))?;
        let form = Form::new()
            .part("image", image)
            .text("policy_number", request.policy_number)
            .text("accident_description", request.accident_description);

        let response = self
            .client
            .post(self.url("/api/analyze-damage"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.transport_error(OPERATION, e))?;

        let envelope: AnalyzeEnvelope = self.read(OPERATION, response).await?;
        debug!(assessment_id = ?envelope.assessment_id, "Damage analysis received");
        Ok(into_analysis(envelope))
    }

    #[instrument(skip(self, request), fields(assessments = request.damage_assessments.len()))]
    async fn generate_estimate(&self, request: GenerateEstimateRequest) -> Result<CostEstimate, PortError> {
        let envelope: EstimateEnvelope = self
            .post_json("generate-estimate", "/api/generate-estimate", &request)
            .await?;
        Ok(into_estimate(envelope))
    }

    #[instrument(skip(self, request), fields(estimate_id = ?request.estimate_id))]
    async fn review_estimate(&self, request: ReviewEstimateRequest) -> Result<ReviewResult, PortError> {
        let envelope: ReviewEnvelope = self
            .post_json("review-estimate", "/api/review-estimate", &request)
            .await?;
        Ok(into_review(envelope))
    }

    #[instrument(skip(self, request), fields(estimate_id = ?request.estimate_id))]
    async fn deny_claim(&self, request: DenyClaimRequest) -> Result<(), PortError> {
        let _: serde_json::Value = self
            .post_json("deny-claim", "/api/deny-claim", &request)
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn approved_repair_shops(&self) -> Result<Vec<RepairShop>, PortError> {
        const OPERATION: &str = "approved-repair-shops";

        let response = self
            .client
            .get(self.url("/api/approved-repair-shops"))
            .send()
            .await
            .map_err(|e| self.transport_error(OPERATION, e))?;
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(Vec::new());
        }
        let envelope: RepairShopsEnvelope = self.read(OPERATION, response).await?;
        Ok(envelope.repair_shops)
    }
}
