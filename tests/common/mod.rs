use commission_engine::application::engine::CommissionEngine;
use commission_engine::domain::actor::{EmployeeId, Permission};
use commission_engine::domain::commission::NewCommission;
use commission_engine::infrastructure::in_memory::{
    InMemoryCommissionStore, InMemoryRuleStore, MemoryAuditSink, SequentialPublicIds,
    StaticAccessPolicy,
};
use rust_decimal_macros::dec;

/// Engine wired to in-memory adapters, plus a handle to the audit sink.
///
/// Registered actors: `admin` (administrator), and `creator`/`approver`/
/// `payer`, each holding exactly the permission their name says.
pub fn engine_with_audit() -> (CommissionEngine, MemoryAuditSink) {
    let audit = MemoryAuditSink::new();
    let policy = StaticAccessPolicy::new()
        .with_admin("admin")
        .with_grants("creator", [Permission::CreateCommission])
        .with_grants("approver", [Permission::ApproveCommission])
        .with_grants("payer", [Permission::PayCommission]);
    let engine = CommissionEngine::new(
        Box::new(InMemoryCommissionStore::new()),
        Box::new(InMemoryRuleStore::new()),
        Box::new(policy),
        Box::new(audit.clone()),
        Box::new(SequentialPublicIds::new()),
    );
    (engine, audit)
}

pub fn draft(employee: &str) -> NewCommission {
    NewCommission {
        employee: EmployeeId::new(employee),
        description: None,
        currency: "USD".to_string(),
        base_amount: dec!(1000),
        cost: None,
        commission_percentage: Some(dec!(10)),
        total_amount: Some(dec!(100)),
        rule: None,
        source: None,
        related_shipments: Vec::new(),
        related_quotes: Vec::new(),
    }
}
