//! Claim Service Ports
//!
//! The workflow never analyses images or prices repairs itself. It calls out
//! to a set of backend services through [`ClaimServicesPort`]:
//!
//! - **analyze-damage**: image plus contextual metadata in, labels, assessments and reasoning out
//! - **generate-estimate**: confirmed assessments in, priced line items out
//! - **review-estimate**: records the approval of an estimate
//! - **deny-claim**: records a denial with its comments
//! - **approved-repair-shops**: lists the shops a claimant may use
//!
//! Adapters:
//!
//! - [`crate::adapters::HttpClaimServices`]: JSON/multipart over HTTP
//! - [`mock::MockClaimServices`]: in-memory, for tests
//!
//! ```rust,ignore
//! let services: Arc<dyn ClaimServicesPort> = Arc::new(HttpClaimServices::new(config)?);
//! let workflow = ClaimWorkflow::new(session, services, store, WorkflowSettings::default());
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use core_kernel::{DomainPort, HealthCheckable, PortError};

use crate::claim::{CostEstimate, DamageAnalysis, DamageAssessment, DamageType, RepairShop, ReviewResult};
use crate::image::ClaimImage;

/// Input to the damage-analysis service
#[derive(Debug, Clone)]
pub struct AnalyzeDamageRequest {
    pub image: ClaimImage,
    pub policy_number: String,
    pub accident_description: String,
}

/// Input to the estimate service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateEstimateRequest {
    pub damage_labels: Vec<DamageType>,
    pub damage_assessments: Vec<DamageAssessment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub damage_assessment_id: Option<i64>,
}

/// Input to the review service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewEstimateRequest {
    pub estimate_id: Option<i64>,
    pub estimate_data: Option<CostEstimate>,
}

/// Input to the denial-recording service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DenyClaimRequest {
    pub estimate_id: Option<i64>,
    pub denial_comments: String,
}

/// The backend services a claim workflow depends on
#[async_trait]
pub trait ClaimServicesPort: DomainPort + HealthCheckable {
    /// Detects damage in the claim image
    async fn analyze_damage(&self, request: AnalyzeDamageRequest) -> Result<DamageAnalysis, PortError>;

    /// Prices the confirmed assessments
    async fn generate_estimate(&self, request: GenerateEstimateRequest) -> Result<CostEstimate, PortError>;

    /// Records approval of an estimate
    async fn review_estimate(&self, request: ReviewEstimateRequest) -> Result<ReviewResult, PortError>;

    /// Records a denial
    async fn deny_claim(&self, request: DenyClaimRequest) -> Result<(), PortError>;

    /// Lists approved repair shops, in directory order
    async fn approved_repair_shops(&self) -> Result<Vec<RepairShop>, PortError>;
}

/// Mock implementation of ClaimServicesPort for testing
///
/// Prices assessments from a fixed table, counts every call, and can be told
/// to fail or stall any operation.
#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::RwLock;

    use crate::claim::{LineItem, Severity};
    use core_kernel::{AdapterHealth, HealthCheckResult};

    /// The operations of [`ClaimServicesPort`]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum ServiceOperation {
        AnalyzeDamage,
        GenerateEstimate,
        ReviewEstimate,
        DenyClaim,
        ApprovedRepairShops,
    }

    impl ServiceOperation {
        const ALL: [ServiceOperation; 5] = [
            ServiceOperation::AnalyzeDamage,
            ServiceOperation::GenerateEstimate,
            ServiceOperation::ReviewEstimate,
            ServiceOperation::DenyClaim,
            ServiceOperation::ApprovedRepairShops,
        ];

        pub fn as_str(&self) -> &'static str {
            match self {
                ServiceOperation::AnalyzeDamage => "analyze-damage",
                ServiceOperation::GenerateEstimate => "generate-estimate",
                ServiceOperation::ReviewEstimate => "review-estimate",
                ServiceOperation::DenyClaim => "deny-claim",
                ServiceOperation::ApprovedRepairShops => "approved-repair-shops",
            }
        }

        fn index(&self) -> usize {
            match self {
                ServiceOperation::AnalyzeDamage => 0,
                ServiceOperation::GenerateEstimate => 1,
                ServiceOperation::ReviewEstimate => 2,
                ServiceOperation::DenyClaim => 3,
                ServiceOperation::ApprovedRepairShops => 4,
            }
        }
    }

    /// How a configured operation fails
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum MockFailure {
        Unavailable,
        Rejected { status: u16, detail: String },
    }

    impl MockFailure {
        fn to_error(&self, operation: ServiceOperation) -> PortError {
            match self {
                MockFailure::Unavailable => PortError::ServiceUnavailable {
                    service: operation.as_str().to_string(),
                },
                MockFailure::Rejected { status, detail } => {
                    PortError::rejected(operation.as_str(), *status, detail.clone())
                }
            }
        }
    }

    /// Parts and labor cost for one assessment, as listed in the cost reference
    pub fn reference_costs(assessment: &DamageAssessment) -> (Decimal, Decimal) {
        match (assessment.damage_type, assessment.severity) {
            (DamageType::Scratches, Severity::Minor) => (dec!(100), dec!(200)),
            (DamageType::Scratches, Severity::Major) => (dec!(300), dec!(400)),
            (DamageType::Dents, Severity::Minor) => (dec!(150), dec!(300)),
            (DamageType::Dents, Severity::Major) => (dec!(500), dec!(600)),
            (DamageType::StructuralDamage, Severity::Minor) => (dec!(800), dec!(1000)),
            (DamageType::StructuralDamage, Severity::Major) => (dec!(2500), dec!(2400)),
        }
    }

    /// In-memory stand-in for the claim backend
    #[derive(Debug)]
    pub struct MockClaimServices {
        analysis: DamageAnalysis,
        repair_shops: Vec<RepairShop>,
        failures: HashMap<ServiceOperation, MockFailure>,
        delays: HashMap<ServiceOperation, Duration>,
        calls: [AtomicUsize; 5],
        next_id: AtomicI64,
        estimate_requests: RwLock<Vec<GenerateEstimateRequest>>,
        review_requests: RwLock<Vec<ReviewEstimateRequest>>,
        deny_requests: RwLock<Vec<DenyClaimRequest>>,
    }

    impl Default for MockClaimServices {
        fn default() -> Self {
            Self::new()
        }
    }

    impl MockClaimServices {
        /// Creates a mock that finds minor scratches and lists two shops
        pub fn new() -> Self {
            Self {
                analysis: DamageAnalysis {
                    assessment_id: Some(1),
                    claim_id: Some(1),
                    damage_labels: vec![DamageType::Scratches],
                    damage_assessments: vec![DamageAssessment::new(DamageType::Scratches, Severity::Minor)],
                    reasoning: Some("Surface-level scratches on the front bumper, paint-deep only.".to_string()),
                },
                repair_shops: vec![
                    RepairShop {
                        id: 1,
                        name: "Downtown Collision Center".to_string(),
                        address: Some("120 Main St".to_string()),
                        phone: Some("555-0100".to_string()),
                    },
                    RepairShop {
                        id: 2,
                        name: "Eastside Auto Body".to_string(),
                        address: None,
                        phone: None,
                    },
                ],
                failures: HashMap::new(),
                delays: HashMap::new(),
                calls: Default::default(),
                next_id: AtomicI64::new(1),
                estimate_requests: RwLock::new(Vec::new()),
                review_requests: RwLock::new(Vec::new()),
                deny_requests: RwLock::new(Vec::new()),
            }
        }

        /// Replaces the canned analysis response
        pub fn with_analysis(mut self, analysis: DamageAnalysis) -> Self {
            self.analysis = analysis;
            self
        }

        pub fn with_repair_shops(mut self, shops: Vec<RepairShop>) -> Self {
            self.repair_shops = shops;
            self
        }

        /// Makes an operation fail with `ServiceUnavailable`
        pub fn failing(self, operation: ServiceOperation) -> Self {
            self.with_failure(operation, MockFailure::Unavailable)
        }

        pub fn with_failure(mut self, operation: ServiceOperation, failure: MockFailure) -> Self {
            self.failures.insert(operation, failure);
            self
        }

        /// Makes an operation sleep before answering
        pub fn with_delay(mut self, operation: ServiceOperation, delay: Duration) -> Self {
            self.delays.insert(operation, delay);
            self
        }

        /// Number of calls made to an operation so far, failed ones included
        pub fn calls(&self, operation: ServiceOperation) -> usize {
            self.calls[operation.index()].load(Ordering::SeqCst)
        }

        pub fn total_calls(&self) -> usize {
            ServiceOperation::ALL.iter().map(|op| self.calls(*op)).sum()
        }

        pub async fn estimate_requests(&self) -> Vec<GenerateEstimateRequest> {
            self.estimate_requests.read().await.clone()
        }

        pub async fn review_requests(&self) -> Vec<ReviewEstimateRequest> {
            self.review_requests.read().await.clone()
        }

        pub async fn deny_requests(&self) -> Vec<DenyClaimRequest> {
            self.deny_requests.read().await.clone()
        }

        async fn enter(&self, operation: ServiceOperation) -> Result<(), PortError> {
            self.calls[operation.index()].fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delays.get(&operation) {
                tokio::time::sleep(*delay).await;
            }
            match self.failures.get(&operation) {
                Some(failure) => Err(failure.to_error(operation)),
                None => Ok(()),
            }
        }

        fn next_id(&self) -> i64 {
            self.next_id.fetch_add(1, Ordering::SeqCst)
        }
    }

    impl DomainPort for MockClaimServices {}

    #[async_trait]
    impl HealthCheckable for MockClaimServices {
        async fn health_check(&self) -> HealthCheckResult {
            HealthCheckResult {
                adapter_id: "mock-claim-services".to_string(),
                status: AdapterHealth::Healthy,
                latency_ms: 0,
                message: Some("Mock adapter always healthy".to_string()),
                checked_at: Utc::now(),
            }
        }
    }

    #[async_trait]
    impl ClaimServicesPort for MockClaimServices {
        async fn analyze_damage(&self, _request: AnalyzeDamageRequest) -> Result<DamageAnalysis, PortError> {
            self.enter(ServiceOperation::AnalyzeDamage).await?;
            Ok(self.analysis.clone())
        }

        async fn generate_estimate(&self, request: GenerateEstimateRequest) -> Result<CostEstimate, PortError> {
            self.estimate_requests.write().await.push(request.clone());
            self.enter(ServiceOperation::GenerateEstimate).await?;

            let assessments: Vec<DamageAssessment> = if request.damage_assessments.is_empty() {
                request
                    .damage_labels
                    .iter()
                    .map(|label| DamageAssessment::new(*label, Severity::Minor))
                    .collect()
            } else {
                request.damage_assessments.clone()
            };

            if assessments.is_empty() {
                return Err(PortError::rejected(
                    ServiceOperation::GenerateEstimate.as_str(),
                    400,
                    "damage_labels or damage_assessments are required",
                ));
            }

            let line_items = assessments
                .iter()
                .map(|assessment| {
                    let (parts, labor) = reference_costs(assessment);
                    LineItem::priced(*assessment, parts, labor, format!("Reference repair for {} {}", assessment.severity, assessment.damage_type))
                })
                .collect();

            Ok(CostEstimate::from_line_items(Some(self.next_id()), line_items))
        }

        async fn review_estimate(&self, request: ReviewEstimateRequest) -> Result<ReviewResult, PortError> {
            self.review_requests.write().await.push(request);
            self.enter(ServiceOperation::ReviewEstimate).await?;

            Ok(ReviewResult {
                review_id: Some(self.next_id()),
                status: "approved".to_string(),
                reviewer_id: "senior_reviewer_001".to_string(),
                review_timestamp: Utc::now(),
                notes: Some("Estimate reviewed and approved".to_string()),
                // deliberately unrelated to the estimate
                approved_amount: Some(dec!(999999)),
            })
        }

        async fn deny_claim(&self, request: DenyClaimRequest) -> Result<(), PortError> {
            self.deny_requests.write().await.push(request);
            self.enter(ServiceOperation::DenyClaim).await
        }

        async fn approved_repair_shops(&self) -> Result<Vec<RepairShop>, PortError> {
            self.enter(ServiceOperation::ApprovedRepairShops).await?;
            Ok(self.repair_shops.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::*;
    use super::*;
    use crate::claim::Severity;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_mock_prices_from_reference_table() {
        let services = MockClaimServices::new();
        let estimate = services
            .generate_estimate(GenerateEstimateRequest {
                damage_labels: vec![DamageType::Dents],
                damage_assessments: vec![DamageAssessment::new(DamageType::Dents, Severity::Major)],
                damage_assessment_id: Some(1),
            })
            .await
            .unwrap();

        assert_eq!(estimate.total_parts_cost, dec!(500));
        assert_eq!(estimate.total_labor_cost, dec!(600));
        assert_eq!(estimate.total_labor_hours, dec!(6));
        assert!(estimate.is_consistent());
        assert_eq!(services.calls(ServiceOperation::GenerateEstimate), 1);
    }

    #[tokio::test]
    async fn test_mock_estimate_defaults_labels_to_minor() {
        let services = MockClaimServices::new();
        let estimate = services
            .generate_estimate(GenerateEstimateRequest {
                damage_labels: vec![DamageType::StructuralDamage],
                damage_assessments: vec![],
                damage_assessment_id: None,
            })
            .await
            .unwrap();
        assert_eq!(estimate.line_items[0].damage_severity, Severity::Minor);
        assert_eq!(estimate.total_base_cost, dec!(1800));
    }

    #[tokio::test]
    async fn test_mock_failure_is_counted() {
        let services = MockClaimServices::new().failing(ServiceOperation::ApprovedRepairShops);
        let err = services.approved_repair_shops().await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(services.calls(ServiceOperation::ApprovedRepairShops), 1);
        assert_eq!(services.total_calls(), 1);
    }

    #[tokio::test]
    async fn test_mock_rejection() {
        let services = MockClaimServices::new().with_failure(
            ServiceOperation::GenerateEstimate,
            MockFailure::Rejected { status: 404, detail: "No cost reference found".to_string() },
        );
        let err = services
            .generate_estimate(GenerateEstimateRequest {
                damage_labels: vec![DamageType::Scratches],
                damage_assessments: vec![],
                damage_assessment_id: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::Rejected { status: 404, .. }));
    }
}
