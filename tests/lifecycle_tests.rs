mod common;

use commission_engine::domain::actor::ActorId;
use commission_engine::domain::commission::{CommissionStatus, CommissionUpdate, PaymentMethod};
use commission_engine::domain::rule::{NewRule, RuleKind};
use commission_engine::error::CommissionError;
use rust_decimal_macros::dec;

#[tokio::test]
async fn test_create_approve_pay_round_trip() {
    let (engine, _) = common::engine_with_audit();
    let creator = ActorId::new("creator");
    let approver = ActorId::new("approver");
    let payer = ActorId::new("payer");

    let commission = engine
        .create(&creator, common::draft("emp-1"))
        .await
        .unwrap();
    assert_eq!(commission.status, CommissionStatus::Pending);
    assert_eq!(commission.owner, creator);

    let approved = engine
        .approve(&approver, &commission.id, Some("looks right".to_string()))
        .await
        .unwrap();
    assert_eq!(approved.status, CommissionStatus::Approved);

    let paid = engine
        .pay(&payer, &commission.id, "PAY-2026-17", PaymentMethod::BankTransfer)
        .await
        .unwrap();
    assert_eq!(paid.status, CommissionStatus::Paid);

    // Stamps are all present and mutually consistent.
    let approval = paid.approval.expect("approval stamp missing");
    let payment = paid.payment.expect("payment stamp missing");
    assert_eq!(approval.by, approver);
    assert_eq!(approval.notes.as_deref(), Some("looks right"));
    assert_eq!(payment.by, payer);
    assert_eq!(payment.reference, "PAY-2026-17");
    assert_eq!(payment.method, PaymentMethod::BankTransfer);
    assert!(paid.created_at <= approval.at);
    assert!(approval.at <= payment.at);
}

#[tokio::test]
async fn test_pay_from_pending_skipping_approval_fails() {
    let (engine, _) = common::engine_with_audit();
    let admin = ActorId::new("admin");

    let commission = engine.create(&admin, common::draft("emp-1")).await.unwrap();
    let result = engine
        .pay(&admin, &commission.id, "PAY-1", PaymentMethod::Payroll)
        .await;

    assert!(matches!(
        result,
        Err(CommissionError::InvalidTransition {
            action: "pay",
            status: CommissionStatus::Pending,
        })
    ));
}

#[tokio::test]
async fn test_approve_from_paid_fails() {
    let (engine, _) = common::engine_with_audit();
    let admin = ActorId::new("admin");

    let commission = engine.create(&admin, common::draft("emp-1")).await.unwrap();
    engine.approve(&admin, &commission.id, None).await.unwrap();
    engine
        .pay(&admin, &commission.id, "PAY-1", PaymentMethod::Check)
        .await
        .unwrap();

    let result = engine.approve(&admin, &commission.id, None).await;
    assert!(matches!(
        result,
        Err(CommissionError::InvalidTransition {
            action: "approve",
            status: CommissionStatus::Paid,
        })
    ));
}

#[tokio::test]
async fn test_paid_commission_cannot_be_cancelled() {
    let (engine, _) = common::engine_with_audit();
    let admin = ActorId::new("admin");

    let commission = engine.create(&admin, common::draft("emp-1")).await.unwrap();
    engine.approve(&admin, &commission.id, None).await.unwrap();
    engine
        .pay(&admin, &commission.id, "PAY-1", PaymentMethod::Cash)
        .await
        .unwrap();

    let result = engine.cancel(&admin, &commission.id).await;
    assert!(matches!(
        result,
        Err(CommissionError::InvalidTransition { .. })
    ));
}

#[tokio::test]
async fn test_cancel_from_approved_is_allowed() {
    let (engine, _) = common::engine_with_audit();
    let admin = ActorId::new("admin");

    let commission = engine.create(&admin, common::draft("emp-1")).await.unwrap();
    engine.approve(&admin, &commission.id, None).await.unwrap();

    let cancelled = engine.cancel(&admin, &commission.id).await.unwrap();
    assert_eq!(cancelled.status, CommissionStatus::Cancelled);
}

#[tokio::test]
async fn test_permissions_are_distinct_per_operation() {
    let (engine, _) = common::engine_with_audit();
    let creator = ActorId::new("creator");
    let approver = ActorId::new("approver");

    let commission = engine
        .create(&creator, common::draft("emp-1"))
        .await
        .unwrap();

    // The creator cannot approve, the approver cannot pay.
    let result = engine.approve(&creator, &commission.id, None).await;
    assert!(matches!(result, Err(CommissionError::Forbidden { .. })));

    engine.approve(&approver, &commission.id, None).await.unwrap();
    let result = engine
        .pay(&approver, &commission.id, "PAY-1", PaymentMethod::Payroll)
        .await;
    assert!(matches!(result, Err(CommissionError::Forbidden { .. })));

    // And an unregistered actor is rejected outright.
    let result = engine
        .create(&ActorId::new("stranger"), common::draft("emp-2"))
        .await;
    assert!(matches!(result, Err(CommissionError::Unauthorized { .. })));
}

#[tokio::test]
async fn test_soft_delete_hides_record_until_restored() {
    let (engine, _) = common::engine_with_audit();
    let admin = ActorId::new("admin");

    let commission = engine.create(&admin, common::draft("emp-1")).await.unwrap();
    let deleted = engine.delete(&admin, &commission.id).await.unwrap();
    assert!(deleted.is_deleted());

    // Gone from default reads and listings.
    let result = engine.get(&commission.id).await;
    assert!(matches!(result, Err(CommissionError::NotFound { .. })));
    assert!(
        engine
            .list_by_status(CommissionStatus::Pending)
            .await
            .unwrap()
            .is_empty()
    );

    // Transitions and edits refuse deleted records too.
    let result = engine.approve(&admin, &commission.id, None).await;
    assert!(matches!(result, Err(CommissionError::NotFound { .. })));
    let result = engine
        .update(&admin, &commission.id, CommissionUpdate::default())
        .await;
    assert!(matches!(result, Err(CommissionError::NotFound { .. })));

    let restored = engine.restore(&admin, &commission.id).await.unwrap();
    assert!(!restored.is_deleted());
    assert_eq!(engine.get(&commission.id).await.unwrap().id, commission.id);
}

#[tokio::test]
async fn test_restore_is_owner_or_admin_only() {
    let (engine, _) = common::engine_with_audit();
    let creator = ActorId::new("creator");
    let admin = ActorId::new("admin");

    let commission = engine
        .create(&creator, common::draft("emp-1"))
        .await
        .unwrap();
    engine.delete(&admin, &commission.id).await.unwrap();

    // A known actor that is neither owner nor admin is refused.
    let result = engine
        .restore(&ActorId::new("approver"), &commission.id)
        .await;
    assert!(matches!(result, Err(CommissionError::Forbidden { .. })));

    // The owner may restore even without any granted permission key.
    let restored = engine.restore(&creator, &commission.id).await.unwrap();
    assert!(!restored.is_deleted());
}

#[tokio::test]
async fn test_restore_requires_deleted_record() {
    let (engine, _) = common::engine_with_audit();
    let admin = ActorId::new("admin");

    let commission = engine.create(&admin, common::draft("emp-1")).await.unwrap();
    let result = engine.restore(&admin, &commission.id).await;
    assert!(matches!(result, Err(CommissionError::Validation(_))));
}

#[tokio::test]
async fn test_update_revalidates_and_applies_nothing_on_failure() {
    let (engine, _) = common::engine_with_audit();
    let admin = ActorId::new("admin");

    let commission = engine.create(&admin, common::draft("emp-1")).await.unwrap();
    let result = engine
        .update(
            &admin,
            &commission.id,
            CommissionUpdate {
                total_amount: Some(dec!(-50)),
                description: Some("bad edit".to_string()),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(result, Err(CommissionError::Validation(_))));

    // The rejected update left the record untouched.
    let reloaded = engine.get(&commission.id).await.unwrap();
    assert_eq!(reloaded.total_amount, dec!(100));
    assert_eq!(reloaded.description, None);

    let updated = engine
        .update(
            &admin,
            &commission.id,
            CommissionUpdate {
                description: Some("Q3 shipment batch".to_string()),
                notes: Some("verified against ledger".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.description.as_deref(), Some("Q3 shipment batch"));
    assert_eq!(updated.status, CommissionStatus::Pending);
}

#[tokio::test]
async fn test_threshold_gate_flows_through_to_the_record() {
    let (engine, _) = common::engine_with_audit();
    let admin = ActorId::new("admin");

    let rule = engine
        .create_rule(
            &admin,
            NewRule {
                name: "big orders only".to_string(),
                kind: RuleKind::RevenuePercentage { rate: dec!(5) },
                min_margin_percentage: None,
                min_order_value: Some(dec!(2000)),
                min_commission_amount: None,
            },
        )
        .await
        .unwrap();

    let mut draft = common::draft("emp-1");
    draft.commission_percentage = None;
    draft.total_amount = None;
    draft.rule = Some(rule.id);

    let commission = engine.create(&admin, draft).await.unwrap();
    assert_eq!(commission.total_amount, dec!(0));
    assert_eq!(commission.commission_percentage, dec!(0));
}

#[tokio::test]
async fn test_audit_trail_follows_the_lifecycle() {
    let (engine, audit) = common::engine_with_audit();
    let admin = ActorId::new("admin");

    let commission = engine.create(&admin, common::draft("emp-1")).await.unwrap();
    engine.approve(&admin, &commission.id, None).await.unwrap();
    engine
        .pay(&admin, &commission.id, "PAY-9", PaymentMethod::BankTransfer)
        .await
        .unwrap();

    let entries = audit.entries().await;
    let actions: Vec<&str> = entries.iter().map(|e| e.action).collect();
    assert_eq!(
        actions,
        vec!["commission.create", "commission.approve", "commission.pay"]
    );
    assert!(entries.iter().all(|e| e.target == commission.id.to_string()));
}

#[tokio::test]
async fn test_sequence_codes_count_within_the_period() {
    let (engine, _) = common::engine_with_audit();
    let admin = ActorId::new("admin");

    let first = engine.create(&admin, common::draft("emp-1")).await.unwrap();
    let second = engine.create(&admin, common::draft("emp-2")).await.unwrap();

    assert!(first.code.ends_with("-0001"));
    assert!(second.code.ends_with("-0002"));
    assert_eq!(first.period(), second.period());

    let listed = engine.list_by_period(first.period()).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].code, first.code);
}
