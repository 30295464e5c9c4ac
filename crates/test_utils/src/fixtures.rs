//! Pre-built Test Fixtures
//!
//! Ready-to-use claim data. Costs follow the mock service's reference table
//! so fixtures and mock responses agree.

use chrono::{TimeZone, Utc};
use rust_decimal_macros::dec;

use domain_claims::{
    ClaimImage, CostEstimate, DamageAnalysis, DamageAssessment, DamageType, LineItem,
    ReviewResult, Severity,
};

/// Fixture for uploaded images
pub struct ImageFixtures;

impl ImageFixtures {
    /// A small JPEG upload
    pub fn front_bumper() -> ClaimImage {
        ClaimImage::new("front_bumper.jpg", "image/jpeg", vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10])
    }

    /// A PNG upload with a different name
    pub fn rear_quarter() -> ClaimImage {
        ClaimImage::new("rear_quarter.png", "image/png", vec![0x89, 0x50, 0x4E, 0x47])
    }

    /// A non-image upload
    pub fn pdf_document() -> ClaimImage {
        ClaimImage::new("police_report.pdf", "application/pdf", vec![0x25, 0x50, 0x44, 0x46])
    }
}

/// Fixture for assessments
pub struct AssessmentFixtures;

impl AssessmentFixtures {
    pub fn scratches_minor() -> DamageAssessment {
        DamageAssessment::new(DamageType::Scratches, Severity::Minor)
    }

    pub fn dents_major() -> DamageAssessment {
        DamageAssessment::new(DamageType::Dents, Severity::Major)
    }

    pub fn structural_minor() -> DamageAssessment {
        DamageAssessment::new(DamageType::StructuralDamage, Severity::Minor)
    }
}

/// Fixture for damage-analysis responses
pub struct AnalysisFixtures;

impl AnalysisFixtures {
    /// Scratches and a major dent, with reasoning
    pub fn scratches_and_dents() -> DamageAnalysis {
        DamageAnalysis {
            assessment_id: Some(42),
            claim_id: Some(7),
            damage_labels: vec![DamageType::Scratches, DamageType::Dents],
            damage_assessments: vec![
                AssessmentFixtures::scratches_minor(),
                AssessmentFixtures::dents_major(),
            ],
            reasoning: Some(
                "Surface-level scratches and a localized dent in the front bumper.".to_string(),
            ),
        }
    }

    /// Labels only: assessments must be synthesized as minor
    pub fn labels_only() -> DamageAnalysis {
        DamageAnalysis {
            assessment_id: Some(43),
            claim_id: Some(8),
            damage_labels: vec![DamageType::StructuralDamage],
            damage_assessments: vec![],
            reasoning: None,
        }
    }

    /// Nothing detected
    pub fn no_damage() -> DamageAnalysis {
        DamageAnalysis {
            assessment_id: Some(44),
            claim_id: Some(9),
            damage_labels: vec![],
            damage_assessments: vec![],
            reasoning: Some("No visible damage.".to_string()),
        }
    }
}

/// Fixture for estimates
pub struct EstimateFixtures;

impl EstimateFixtures {
    /// Minor scratches: parts 100, labor 200
    pub fn scratches_minor() -> CostEstimate {
        CostEstimate::from_line_items(
            Some(100),
            vec![LineItem::priced(
                AssessmentFixtures::scratches_minor(),
                dec!(100),
                dec!(200),
                "Buff and polish",
            )],
        )
    }

    /// Minor scratches plus a major dent
    pub fn scratches_and_dents() -> CostEstimate {
        CostEstimate::from_line_items(
            Some(101),
            vec![
                LineItem::priced(AssessmentFixtures::scratches_minor(), dec!(100), dec!(200), "Buff and polish"),
                LineItem::priced(AssessmentFixtures::dents_major(), dec!(500), dec!(600), "Panel replacement"),
            ],
        )
    }
}

/// Fixture for review results
pub struct ReviewFixtures;

impl ReviewFixtures {
    pub fn approved() -> ReviewResult {
        ReviewResult {
            review_id: Some(1),
            status: "approved".to_string(),
            reviewer_id: "senior_reviewer_001".to_string(),
            review_timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap(),
            notes: Some("Estimate reviewed and approved".to_string()),
            approved_amount: None,
        }
    }
}
