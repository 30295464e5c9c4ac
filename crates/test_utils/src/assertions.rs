//! Custom Test Assertions
//!
//! Assertion helpers for claim types that give more meaningful failure
//! messages than bare `assert!` on a boolean.

use rust_decimal::Decimal;
use std::collections::HashSet;

use domain_claims::{ClaimState, CostEstimate, DamageAssessment, StageStatus};

/// Asserts the estimate sum invariants
///
/// # Panics
///
/// Panics if `total_base_cost` differs from parts plus labor or from the
/// line-item sum, or if `total_labor_hours` differs from the line-item sum.
pub fn assert_estimate_consistent(estimate: &CostEstimate) {
    let base_sum: Decimal = estimate.line_items.iter().map(|i| i.base_cost).sum();
    let hours_sum: Decimal = estimate.line_items.iter().map(|i| i.labor_hours).sum();

    assert_eq!(
        estimate.total_base_cost,
        estimate.total_parts_cost + estimate.total_labor_cost,
        "total_base_cost {} != parts {} + labor {}",
        estimate.total_base_cost,
        estimate.total_parts_cost,
        estimate.total_labor_cost
    );
    assert_eq!(
        estimate.total_base_cost, base_sum,
        "total_base_cost {} != sum of line-item base costs {}",
        estimate.total_base_cost, base_sum
    );
    assert_eq!(
        estimate.total_labor_hours, hours_sum,
        "total_labor_hours {} != sum of line-item hours {}",
        estimate.total_labor_hours, hours_sum
    );
}

/// Asserts that no two assessments share a damage type
pub fn assert_unique_damage_types(assessments: &[DamageAssessment]) {
    let mut seen = HashSet::new();
    for assessment in assessments {
        assert!(
            seen.insert(assessment.damage_type),
            "Duplicate damage type {} in {:?}",
            assessment.damage_type,
            assessments
        );
    }
}

/// Asserts the claim's stage statuses
pub fn assert_stages(state: &ClaimState, damage_analysis: StageStatus, cost_estimation: StageStatus) {
    assert_eq!(
        (state.stages.damage_analysis(), state.stages.cost_estimation()),
        (damage_analysis, cost_estimation),
        "Expected stages ({damage_analysis}, {cost_estimation}), got ({}, {})",
        state.stages.damage_analysis(),
        state.stages.cost_estimation()
    );
}

/// Asserts that stage statuses and estimate agree with each other
pub fn assert_claim_consistent(state: &ClaimState) {
    if state.stages.cost_estimation() == StageStatus::Completed {
        assert!(state.cost_estimate.is_some(), "Cost estimation completed without an estimate");
    }
    if let Some(estimate) = &state.cost_estimate {
        assert_estimate_consistent(estimate);
    }
    assert!(state.is_consistent(), "Claim state inconsistent: {state:?}");
}
