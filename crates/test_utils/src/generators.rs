//! Property-Based Test Generators
//!
//! Provides proptest strategies for generating claim data that maintains
//! domain invariants.

use proptest::prelude::*;
use rust_decimal::Decimal;

use domain_claims::{
    CostEstimate, CostOverrideEntry, CostOverrideForm, DamageAssessment, DamageType, LineItem,
    Severity,
};
use domain_claims::claim::dedup_assessments;

/// Strategy for damage types
pub fn damage_type_strategy() -> impl Strategy<Value = DamageType> {
    prop_oneof![
        Just(DamageType::Scratches),
        Just(DamageType::Dents),
        Just(DamageType::StructuralDamage),
    ]
}

/// Strategy for severities
pub fn severity_strategy() -> impl Strategy<Value = Severity> {
    prop_oneof![Just(Severity::Minor), Just(Severity::Major)]
}

pub fn assessment_strategy() -> impl Strategy<Value = DamageAssessment> {
    (damage_type_strategy(), severity_strategy())
        .prop_map(|(damage_type, severity)| DamageAssessment::new(damage_type, severity))
}

/// Selections as a human might make them, repeats included
pub fn raw_selection_strategy() -> impl Strategy<Value = Vec<DamageAssessment>> {
    prop::collection::vec(assessment_strategy(), 1..8)
}

/// Assessments with unique damage types, as a confirmed claim holds them
pub fn confirmed_assessments_strategy() -> impl Strategy<Value = Vec<DamageAssessment>> {
    raw_selection_strategy().prop_map(|selection| dedup_assessments(selection))
}

/// Non-negative amounts with cents
pub fn amount_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..5_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Text as typed into an override field: blank, plain, or thousands-separated
pub fn amount_input_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        amount_strategy().prop_map(|a| a.to_string()),
        amount_strategy().prop_map(|a| core_kernel::format_amount(a, 2)),
    ]
}

/// An estimate pricing the given assessments
pub fn estimate_for(assessments: Vec<DamageAssessment>) -> impl Strategy<Value = CostEstimate> {
    let n = assessments.len();
    prop::collection::vec((amount_strategy(), amount_strategy()), n).prop_map(move |costs| {
        let items = assessments
            .iter()
            .zip(costs)
            .map(|(assessment, (parts, labor))| LineItem::priced(*assessment, parts, labor, ""))
            .collect();
        CostEstimate::from_line_items(Some(1), items)
    })
}

/// Confirmed assessments together with a prior estimate for them
pub fn assessments_with_estimate_strategy() -> impl Strategy<Value = (Vec<DamageAssessment>, CostEstimate)> {
    confirmed_assessments_strategy().prop_flat_map(|assessments| {
        let estimate = estimate_for(assessments.clone());
        (Just(assessments), estimate)
    })
}

/// An override form with arbitrary input for each assessment
pub fn override_form_for(assessments: Vec<DamageAssessment>) -> impl Strategy<Value = CostOverrideForm> {
    let n = assessments.len();
    (
        prop::collection::vec((amount_input_strategy(), amount_input_strategy()), n),
        prop_oneof![Just(String::new()), "[a-z ]{1,20}"],
    )
        .prop_map(move |(inputs, notes)| {
            let entries = assessments
                .iter()
                .zip(inputs)
                .map(|(assessment, (parts, labor))| (assessment.key(), CostOverrideEntry { parts, labor }))
                .collect();
            CostOverrideForm { entries, notes }
        })
}
