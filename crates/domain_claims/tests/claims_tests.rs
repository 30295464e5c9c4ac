//! Comprehensive tests for domain_claims

use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use domain_claims::overrides::recompute_estimate;
use domain_claims::persistence::keys;
use domain_claims::ports::mock::ServiceOperation;
use domain_claims::{
    ClaimError, ClaimWorkflow, CostOverrideForm, DamageOverride, DamageType, Disposition,
    PipelineOutcome, ProcessingMode, Severity, StageStatus, ValidationError, WorkflowSettings,
    WorkflowStep,
};
use test_utils::*;

// ============================================================================
// Assisted Mode
// ============================================================================

mod assisted_mode_tests {
    use super::*;

    #[tokio::test]
    async fn test_image_activates_damage_analysis_only() {
        let mut t = TestWorkflowBuilder::new().build();
        t.workflow.accept_image(ImageFixtures::front_bumper(), false).unwrap();

        assert_stages(t.workflow.state(), StageStatus::Active, StageStatus::Locked);
        assert_eq!(t.workflow.run_pipeline().await.unwrap(), PipelineOutcome::AwaitingInput);
        assert_eq!(t.services.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_rejected_image_leaves_claim_untouched() {
        let mut t = TestWorkflowBuilder::new().build();
        let err = t.workflow.accept_image(ImageFixtures::pdf_document(), false).unwrap_err();

        assert!(matches!(err, ClaimError::Validation(ValidationError::UnsupportedImage(_))));
        assert_stages(t.workflow.state(), StageStatus::Locked, StageStatus::Locked);
        assert!(t.workflow.state().image.is_none());
    }

    #[tokio::test]
    async fn test_analysis_folds_labels_assessments_and_reasoning() {
        let mut t = TestWorkflowBuilder::new()
            .with_analysis(AnalysisFixtures::scratches_and_dents())
            .build();
        t.workflow.accept_image(ImageFixtures::front_bumper(), false).unwrap();
        t.workflow.analyze_damage().await.unwrap();

        let state = t.workflow.state();
        assert_eq!(state.confirmed_damage_labels, vec![DamageType::Scratches, DamageType::Dents]);
        assert_eq!(
            state.damage_assessments,
            vec![AssessmentFixtures::scratches_minor(), AssessmentFixtures::dents_major()]
        );
        assert!(state.damage_reasoning.as_deref().unwrap().contains("front bumper"));
        // analysis alone does not confirm anything
        assert_stages(state, StageStatus::Active, StageStatus::Locked);
    }

    #[tokio::test]
    async fn test_labels_only_analysis_defaults_to_minor() {
        let mut t = TestWorkflowBuilder::new()
            .with_analysis(AnalysisFixtures::labels_only())
            .build();
        t.workflow.accept_image(ImageFixtures::front_bumper(), false).unwrap();
        t.workflow.analyze_damage().await.unwrap();

        let state = t.workflow.state();
        assert_eq!(state.damage_assessments, vec![AssessmentFixtures::structural_minor()]);
        assert_eq!(state.damage_reasoning.as_deref(), Some("No reasoning provided."));
    }

    #[tokio::test]
    async fn test_estimate_request_forwards_assessment_id() {
        let mut t = TestWorkflowBuilder::new()
            .with_analysis(AnalysisFixtures::scratches_and_dents())
            .build();
        t.workflow.accept_image(ImageFixtures::front_bumper(), false).unwrap();
        t.workflow.analyze_damage().await.unwrap();
        t.workflow.confirm_damage_analysis().unwrap();
        assert_stages(t.workflow.state(), StageStatus::Locked, StageStatus::Active);

        let estimate = t.workflow.generate_estimate().await.unwrap();
        assert_eq!(estimate.total_base_cost, dec!(1400));
        assert_estimate_consistent(&estimate);

        let requests = t.services.estimate_requests().await;
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].damage_assessment_id, Some(42));
        assert_eq!(requests[0].damage_labels, vec![DamageType::Scratches, DamageType::Dents]);
    }

    #[tokio::test]
    async fn test_estimate_cannot_be_generated_during_damage_analysis() {
        let mut t = TestWorkflowBuilder::new().build();
        t.workflow.accept_image(ImageFixtures::front_bumper(), false).unwrap();
        t.workflow.analyze_damage().await.unwrap();

        let err = t.workflow.generate_estimate().await.unwrap_err();
        assert!(matches!(err, ClaimError::InvalidStageTransition { .. }));
        assert_eq!(t.services.calls(ServiceOperation::GenerateEstimate), 0);
    }

    #[tokio::test]
    async fn test_go_back_discards_estimate() {
        let mut t = TestWorkflowBuilder::new().build();
        t.workflow.accept_image(ImageFixtures::front_bumper(), false).unwrap();
        t.workflow.analyze_damage().await.unwrap();
        t.workflow.confirm_damage_analysis().unwrap();
        t.workflow.generate_estimate().await.unwrap();

        t.workflow.go_back_to_damage_analysis().unwrap();

        let state = t.workflow.state();
        assert!(state.cost_estimate.is_none());
        assert!(state.cost_override.is_none());
        assert_stages(state, StageStatus::Active, StageStatus::Locked);
        // assessments survive so the human can adjust them
        assert!(!state.damage_assessments.is_empty());
        assert_eq!(t.persistence().load::<domain_claims::CostEstimate>(keys::COST_ESTIMATE), None);
    }

    #[tokio::test]
    async fn test_start_new_claim_wipes_namespace() {
        let mut t = TestWorkflowBuilder::new().with_mode(ProcessingMode::Automated).build();
        t.workflow.accept_image(ImageFixtures::front_bumper(), false).unwrap();
        t.workflow.run_pipeline().await.unwrap();
        assert!(!t.store.is_empty());

        t.workflow.start_new_claim();

        assert!(t.store.is_empty());
        assert_eq!(t.workflow.state().processing_mode, ProcessingMode::Assisted);
        assert_stages(t.workflow.state(), StageStatus::Locked, StageStatus::Locked);
    }
}

// ============================================================================
// Damage Override
// ============================================================================

mod damage_override_tests {
    use super::*;

    async fn analysed() -> TestWorkflow {
        let mut t = TestWorkflowBuilder::new()
            .with_analysis(AnalysisFixtures::scratches_and_dents())
            .build();
        t.workflow.accept_image(ImageFixtures::front_bumper(), false).unwrap();
        t.workflow.analyze_damage().await.unwrap();
        t
    }

    #[tokio::test]
    async fn test_override_replaces_assessments_and_appends_note() {
        let mut t = analysed().await;
        let original = t.workflow.state().damage_reasoning.clone().unwrap();

        let damage_override = DamageOverride::new()
            .select(DamageType::StructuralDamage, Severity::Major)
            .with_note("Frame bent behind bumper");
        t.workflow.submit_damage_override(&damage_override).unwrap();

        let state = t.workflow.state();
        assert_eq!(state.confirmed_damage_labels, vec![DamageType::StructuralDamage]);
        assert!(state.damage_analysis.is_none());
        assert_eq!(
            state.damage_reasoning.as_deref(),
            Some(format!("{original}\n\nAgent Note: Frame bent behind bumper").as_str())
        );
        assert_eq!(state.damage_override_notes.as_deref(), Some("Frame bent behind bumper"));
        assert_stages(state, StageStatus::Active, StageStatus::Locked);
    }

    #[tokio::test]
    async fn test_empty_override_is_rejected_without_change() {
        let mut t = analysed().await;
        let before = t.workflow.state().clone();

        let err = t.workflow.submit_damage_override(&DamageOverride::new()).unwrap_err();

        assert!(matches!(err, ClaimError::Validation(ValidationError::EmptyDamageSelection)));
        assert_eq!(*t.workflow.state(), before);
    }

    #[tokio::test]
    async fn test_override_without_analysis_id_omits_it_from_estimate() {
        let mut t = analysed().await;
        t.workflow
            .submit_damage_override(&DamageOverride::new().select(DamageType::Dents, Severity::Minor))
            .unwrap();
        t.workflow.confirm_damage_analysis().unwrap();
        t.workflow.generate_estimate().await.unwrap();

        let requests = t.services.estimate_requests().await;
        assert_eq!(requests[0].damage_assessment_id, None);
        assert_eq!(requests[0].damage_assessments, vec![domain_claims::DamageAssessment::new(DamageType::Dents, Severity::Minor)]);
    }

    proptest! {
        #[test]
        fn prop_override_never_duplicates_damage_types(selection in raw_selection_strategy()) {
            let damage_override = selection
                .iter()
                .fold(DamageOverride::new(), |o, a| o.select(a.damage_type, a.severity));
            let resolved = damage_override.resolve(None).unwrap();
            assert_unique_damage_types(&resolved.assessments);

            // the last severity chosen for a type wins
            for assessment in &resolved.assessments {
                let last = selection.iter().rev().find(|a| a.damage_type == assessment.damage_type).unwrap();
                prop_assert_eq!(assessment.severity, last.severity);
            }
        }
    }
}

// ============================================================================
// Cost Override
// ============================================================================

mod cost_override_tests {
    use super::*;

    async fn estimated() -> TestWorkflow {
        let mut t = TestWorkflowBuilder::new().build();
        t.workflow.accept_image(ImageFixtures::front_bumper(), false).unwrap();
        t.workflow.analyze_damage().await.unwrap();
        t.workflow.confirm_damage_analysis().unwrap();
        t.workflow.generate_estimate().await.unwrap();
        t
    }

    #[tokio::test]
    async fn test_blank_labor_keeps_original_labor() {
        let mut t = estimated().await;
        let scratches = AssessmentFixtures::scratches_minor();

        let mut form = t.workflow.cost_override_form();
        form.set_parts(&scratches, "150");
        form.set_labor(&scratches, "");
        let estimate = t.workflow.submit_cost_override(form).unwrap();

        let item = &estimate.line_items[0];
        assert_eq!(item.parts_cost, dec!(150));
        assert_eq!(item.labor_cost, dec!(200));
        assert_eq!(item.labor_hours, dec!(2.00));
        assert_eq!(item.base_cost, dec!(350));
        assert_stages(t.workflow.state(), StageStatus::Locked, StageStatus::Completed);
        assert_claim_consistent(t.workflow.state());
    }

    #[tokio::test]
    async fn test_form_prefills_from_estimate() {
        let t = estimated().await;
        let form = t.workflow.cost_override_form();
        let entry = form.entry(&AssessmentFixtures::scratches_minor()).unwrap();
        assert_eq!((entry.parts.as_str(), entry.labor.as_str()), ("100", "200"));
        assert_eq!(form.labor_hours_display(&AssessmentFixtures::scratches_minor()), "2.00");
    }

    #[tokio::test]
    async fn test_all_zero_override_never_commits() {
        let mut t = estimated().await;
        let before = t.workflow.state().clone();
        let scratches = AssessmentFixtures::scratches_minor();

        let mut form = CostOverrideForm::new();
        form.set_parts(&scratches, "0");
        form.set_labor(&scratches, "0.00");
        let err = t.workflow.submit_cost_override(form).unwrap_err();

        assert!(matches!(err, ClaimError::Validation(ValidationError::AllCostsZero)));
        assert_eq!(*t.workflow.state(), before);
    }

    #[tokio::test]
    async fn test_override_notes_replace_line_item_notes() {
        let mut t = estimated().await;
        let scratches = AssessmentFixtures::scratches_minor();

        let mut form = t.workflow.cost_override_form();
        form.set_labor(&scratches, "1,000");
        form.set_notes("Shop quote #4411");
        let estimate = t.workflow.submit_cost_override(form).unwrap();

        assert_eq!(estimate.line_items[0].notes, "Shop quote #4411");
        assert_eq!(estimate.total_labor_hours, dec!(10));
        assert_eq!(estimate.total_base_cost, dec!(1100));
    }

    #[tokio::test]
    async fn test_confirm_after_override_hands_off_override() {
        let mut t = estimated().await;
        let mut form = t.workflow.cost_override_form();
        form.set_parts(&AssessmentFixtures::scratches_minor(), "150");
        t.workflow.submit_cost_override(form).unwrap();
        t.workflow.confirm_estimate().unwrap();

        let handoff = t.persistence().load_handoff();
        assert_eq!(handoff.estimate.unwrap().total_base_cost, dec!(350));
        assert_eq!(t.workflow.state().step, WorkflowStep::Approval);
    }

    proptest! {
        #[test]
        fn prop_recompute_is_idempotent_and_consistent(
            (assessments, prior, form) in assessments_with_estimate_strategy()
                .prop_flat_map(|(a, e)| (Just(a.clone()), Just(e), override_form_for(a)))
        ) {
            let first = recompute_estimate(Some(&prior), &assessments, &form);
            let second = recompute_estimate(Some(&prior), &assessments, &form);

            prop_assert_eq!(&first, &second);
            assert_estimate_consistent(&first);
            prop_assert_eq!(first.line_items.len(), assessments.len());
            prop_assert!(first.total_base_cost >= Decimal::ZERO);
        }

        #[test]
        fn prop_untouched_entries_keep_prior_costs((assessments, prior) in assessments_with_estimate_strategy()) {
            let estimate = recompute_estimate(Some(&prior), &assessments, &CostOverrideForm::new());
            prop_assert_eq!(estimate.total_parts_cost, prior.total_parts_cost);
            prop_assert_eq!(estimate.total_labor_cost, prior.total_labor_cost);
            prop_assert_eq!(estimate.total_base_cost, prior.total_base_cost);
        }
    }
}

// ============================================================================
// Automated Pipelines
// ============================================================================

mod automated_mode_tests {
    use super::*;

    #[tokio::test]
    async fn test_automated_run_reaches_approval_without_confirmation() {
        let mut t = TestWorkflowBuilder::new().with_mode(ProcessingMode::Automated).build();
        t.workflow.accept_image(ImageFixtures::front_bumper(), false).unwrap();

        let outcome = t.workflow.run_pipeline().await.unwrap();

        assert_eq!(outcome, PipelineOutcome::EstimateReady);
        let state = t.workflow.state();
        assert_eq!(state.stages.cost_estimation(), StageStatus::Completed);
        assert!(state.cost_estimate.as_ref().unwrap().total_base_cost > Decimal::ZERO);
        assert_eq!(state.step, WorkflowStep::Approval);
        assert_eq!(state.disposition, Disposition::Pending);
        assert_claim_consistent(state);
        assert_eq!(t.services.calls(ServiceOperation::ReviewEstimate), 0);
        assert!(!t.persistence().auto_approve_signalled());
    }

    #[tokio::test]
    async fn test_estimate_failure_leaves_cost_estimation_open() {
        let mut t = TestWorkflowBuilder::new()
            .with_mode(ProcessingMode::Automated)
            .failing(ServiceOperation::GenerateEstimate)
            .build();
        t.workflow.accept_image(ImageFixtures::front_bumper(), false).unwrap();

        let err = t.workflow.run_pipeline().await.unwrap_err();

        assert!(err.is_service());
        let state = t.workflow.state();
        assert_stages(state, StageStatus::Locked, StageStatus::Active);
        assert!(state.cost_estimate.is_none());
        assert_eq!(state.step, WorkflowStep::Assessment);
        assert!(t.workflow.last_error().is_some());
        assert_claim_consistent(state);
    }

    #[tokio::test]
    async fn test_no_damage_found_stops_at_damage_analysis() {
        let mut t = TestWorkflowBuilder::new()
            .with_mode(ProcessingMode::Automated)
            .with_analysis(AnalysisFixtures::no_damage())
            .build();
        t.workflow.accept_image(ImageFixtures::front_bumper(), false).unwrap();

        let err = t.workflow.run_pipeline().await.unwrap_err();

        assert!(matches!(err, ClaimError::Validation(ValidationError::NoAssessments)));
        assert_stages(t.workflow.state(), StageStatus::Active, StageStatus::Locked);
        assert_eq!(t.services.calls(ServiceOperation::GenerateEstimate), 0);
    }

    #[tokio::test]
    async fn test_analysis_timeout_leaves_claim_unmodified() {
        let mut t = TestWorkflowBuilder::new()
            .with_mode(ProcessingMode::Automated)
            .with_delay(ServiceOperation::AnalyzeDamage, Duration::from_secs(5))
            .with_settings(WorkflowSettings::immediate().with_analysis_timeout(Duration::from_millis(20)))
            .build();
        t.workflow.accept_image(ImageFixtures::front_bumper(), false).unwrap();
        let before = t.workflow.state().clone();

        let err = t.workflow.run_pipeline().await.unwrap_err();

        match err {
            ClaimError::Service(port) => assert!(port.is_timeout()),
            other => panic!("expected timeout, got {other:?}"),
        }
        assert_eq!(*t.workflow.state(), before);
    }

    #[tokio::test]
    async fn test_fully_automated_run_approves_once() {
        let mut t = TestWorkflowBuilder::new().with_mode(ProcessingMode::FullyAutomated).build();
        t.workflow.accept_image(ImageFixtures::front_bumper(), false).unwrap();

        let outcome = t.workflow.run_pipeline().await.unwrap();

        let PipelineOutcome::AutoApproved(approval) = outcome else {
            panic!("expected auto-approval, got {outcome:?}");
        };
        assert_eq!(approval.approved_amount, dec!(300));
        assert_eq!(t.workflow.state().disposition, Disposition::Approved);
        assert_eq!(t.workflow.state().approved_amount, Some(dec!(300)));
        assert_eq!(t.services.calls(ServiceOperation::ReviewEstimate), 1);

        let persistence = t.persistence();
        assert!(!persistence.auto_approve_signalled());
        assert!(persistence.auto_approval_triggered());
    }
}

// ============================================================================
// Auto-approval Guard
// ============================================================================

mod auto_approval_guard_tests {
    use super::*;

    fn signalled_claim() -> TestWorkflow {
        let t = TestWorkflowBuilder::new().with_mode(ProcessingMode::FullyAutomated).build();
        let persistence = t.persistence();
        let state = ClaimStateBuilder::new()
            .with_mode(ProcessingMode::FullyAutomated)
            .awaiting_approval(EstimateFixtures::scratches_and_dents())
            .build();
        persistence.save_state(&state);
        persistence.save_handoff(&state);
        persistence.signal_auto_approve(&EstimateFixtures::scratches_and_dents());
        t
    }

    #[tokio::test]
    async fn test_repeated_entry_approves_once() {
        let t = signalled_claim();
        let mut workflow = t.restore_sibling();

        let first = workflow.enter_approval_stage().await.unwrap();
        let second = workflow.enter_approval_stage().await.unwrap();

        assert!(first.is_some());
        assert!(second.is_none());
        assert_eq!(t.services.calls(ServiceOperation::ReviewEstimate), 1);
        assert!(!t.persistence().auto_approve_signalled());
    }

    #[tokio::test]
    async fn test_concurrent_entries_share_one_approval() {
        let t = TestWorkflowBuilder::new()
            .with_delay(ServiceOperation::ReviewEstimate, Duration::from_millis(50))
            .build();
        let persistence = t.persistence();
        let state = ClaimStateBuilder::new()
            .with_mode(ProcessingMode::FullyAutomated)
            .awaiting_approval(EstimateFixtures::scratches_minor())
            .build();
        persistence.save_state(&state);
        persistence.signal_auto_approve(&EstimateFixtures::scratches_minor());

        let mut first = t.restore_sibling();
        let mut second = t.restore_sibling();
        let (a, b) = tokio::join!(first.enter_approval_stage(), second.enter_approval_stage());

        let approvals = [a.unwrap(), b.unwrap()].into_iter().flatten().count();
        assert_eq!(approvals, 1);
        assert_eq!(t.services.calls(ServiceOperation::ReviewEstimate), 1);
        assert!(!persistence.auto_approve_signalled());
    }

    #[tokio::test]
    async fn test_guard_survives_restart() {
        let t = signalled_claim();
        t.restore_sibling().enter_approval_stage().await.unwrap();

        // a fresh process re-enters the stage and must not approve again
        let mut restarted = t.restore_sibling();
        assert!(restarted.state().auto_approval_triggered());
        assert!(restarted.enter_approval_stage().await.unwrap().is_none());
        assert_eq!(t.services.calls(ServiceOperation::ReviewEstimate), 1);
    }

    #[tokio::test]
    async fn test_auto_approval_uses_signalled_estimate() {
        let t = signalled_claim();
        let outcome = t.restore_sibling().enter_approval_stage().await.unwrap().unwrap();

        assert_eq!(outcome.approved_amount, dec!(1400));
        let requests = t.services.review_requests().await;
        assert_eq!(requests[0].estimate_id, Some(101));
    }

    #[tokio::test]
    async fn test_no_signal_means_no_approval() {
        let t = TestWorkflowBuilder::new().build();
        let state = ClaimStateBuilder::new()
            .awaiting_approval(EstimateFixtures::scratches_minor())
            .build();
        t.persistence().save_state(&state);

        let outcome = t.restore_sibling().enter_approval_stage().await.unwrap();
        assert!(outcome.is_none());
        assert_eq!(t.services.total_calls(), 0);
    }
}

// ============================================================================
// Approval Decisions
// ============================================================================

mod approval_tests {
    use super::*;

    async fn awaiting_approval() -> TestWorkflow {
        let mut t = TestWorkflowBuilder::new().with_mode(ProcessingMode::Automated).build();
        t.workflow.accept_image(ImageFixtures::front_bumper(), false).unwrap();
        t.workflow.run_pipeline().await.unwrap();
        t
    }

    #[tokio::test]
    async fn test_manual_approval_records_review_and_shops() {
        let mut t = awaiting_approval().await;
        let outcome = t.workflow.approve().await.unwrap();

        assert_eq!(outcome.approved_amount, dec!(300));
        assert_eq!(outcome.repair_shops.len(), 2);
        let state = t.workflow.state();
        assert_eq!(state.disposition, Disposition::Approved);
        assert_eq!(state.review_result.as_ref().unwrap().reviewer_id, "senior_reviewer_001");
    }

    #[tokio::test]
    async fn test_blank_denial_never_calls_service() {
        let mut t = awaiting_approval().await;
        let err = t.workflow.deny("   ").await.unwrap_err();

        assert!(matches!(err, ClaimError::Validation(ValidationError::EmptyDenialComments)));
        assert_eq!(t.services.calls(ServiceOperation::DenyClaim), 0);
        assert_eq!(t.workflow.state().disposition, Disposition::Pending);
    }

    #[tokio::test]
    async fn test_denial_is_terminal() {
        let mut t = awaiting_approval().await;
        t.workflow.deny("Damage predates policy start").await.unwrap();

        assert_eq!(t.workflow.state().disposition, Disposition::Denied);
        assert!(matches!(
            t.workflow.approve().await,
            Err(ClaimError::ClaimFinalized(Disposition::Denied))
        ));
        assert!(matches!(t.workflow.proceed_to_closure(), Err(ClaimError::NotApproved)));
        assert_eq!(t.services.calls(ServiceOperation::ReviewEstimate), 0);
    }

    #[tokio::test]
    async fn test_denial_recorded_even_if_service_fails() {
        let mut t = TestWorkflowBuilder::new()
            .with_mode(ProcessingMode::Automated)
            .failing(ServiceOperation::DenyClaim)
            .build();
        t.workflow.accept_image(ImageFixtures::front_bumper(), false).unwrap();
        t.workflow.run_pipeline().await.unwrap();

        t.workflow.deny("Fraud suspected").await.unwrap();
        assert_eq!(t.workflow.state().denial_comments.as_deref(), Some("Fraud suspected"));
    }

    #[tokio::test]
    async fn test_closure_after_approval() {
        let mut t = awaiting_approval().await;
        t.workflow.approve().await.unwrap();

        let summary = t.workflow.proceed_to_closure().unwrap();

        assert_eq!(summary.approved_amount, Some(dec!(300)));
        assert_eq!(summary.repair_shops.len(), 2);
        assert_eq!(t.workflow.state().step, WorkflowStep::Closure);
        assert!(t.workflow.proceed_to_closure().is_err());
    }

    #[tokio::test]
    async fn test_stage_edits_blocked_after_disposition() {
        let mut t = awaiting_approval().await;
        t.workflow.approve().await.unwrap();

        assert!(matches!(
            t.workflow.go_back_to_damage_analysis(),
            Err(ClaimError::ClaimFinalized(Disposition::Approved))
        ));
    }
}

// ============================================================================
// Recovery
// ============================================================================

mod recovery_tests {
    use super::*;

    #[tokio::test]
    async fn test_restore_rebuilds_state() {
        let mut t = TestWorkflowBuilder::new().build();
        t.workflow.accept_image(ImageFixtures::front_bumper(), false).unwrap();
        t.workflow.analyze_damage().await.unwrap();
        t.workflow.confirm_damage_analysis().unwrap();

        let restored = t.restore_sibling();
        assert_eq!(restored.state(), t.workflow.state());
        // bytes are never persisted
        assert!(restored.image().is_none());
    }

    #[tokio::test]
    async fn test_malformed_keys_are_ignored_individually() {
        let mut t = TestWorkflowBuilder::new().build();
        t.workflow.accept_image(ImageFixtures::front_bumper(), false).unwrap();
        t.workflow.analyze_damage().await.unwrap();

        let namespace = t.persistence().namespace().to_string();
        domain_claims::KeyValueStore::set(
            &t.store,
            &format!("{namespace}{}", keys::DAMAGE_REASONING),
            "not json".to_string(),
        )
        .unwrap();

        let restored = t.restore_sibling();
        assert_eq!(restored.state().damage_reasoning, None);
        assert_eq!(restored.state().damage_assessments, t.workflow.state().damage_assessments);
    }

    #[tokio::test]
    async fn test_completed_without_estimate_is_downgraded() {
        let t = TestWorkflowBuilder::new().build();
        let persistence = t.persistence();
        persistence.save(keys::DAMAGE_ANALYSIS_STATUS, &StageStatus::Locked);
        persistence.save(keys::COST_ESTIMATION_STATUS, &StageStatus::Completed);

        let restored = t.restore_sibling();
        assert_stages(restored.state(), StageStatus::Locked, StageStatus::Active);
        assert_claim_consistent(restored.state());
    }

    #[tokio::test]
    async fn test_sessions_do_not_share_state() {
        let store = domain_claims::InMemoryStore::new();
        let mut first = TestWorkflowBuilder::new().with_store(store.clone()).build();
        let second = TestWorkflowBuilder::new().with_store(store.clone()).build();
        first.workflow.accept_image(ImageFixtures::front_bumper(), false).unwrap();

        let restored = ClaimWorkflow::restore(
            second.workflow.session(),
            second.services.clone(),
            Arc::new(store),
            WorkflowSettings::immediate(),
        );
        assert!(restored.state().image.is_none());
    }
}
