use crate::domain::actor::{ActorId, EmployeeId};
use crate::domain::rule::RuleId;
use chrono::{DateTime, Datelike, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Internal identifier of a commission record. The public-facing id and the
/// period-scoped code live on the record itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommissionId(pub String);

impl CommissionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for CommissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommissionStatus {
    Pending,
    Approved,
    Paid,
    Cancelled,
}

impl fmt::Display for CommissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CommissionStatus::Pending => "pending",
            CommissionStatus::Approved => "approved",
            CommissionStatus::Paid => "paid",
            CommissionStatus::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommissionAction {
    Approve,
    Pay,
    Cancel,
}

impl CommissionAction {
    pub fn name(self) -> &'static str {
        match self {
            CommissionAction::Approve => "approve",
            CommissionAction::Pay => "pay",
            CommissionAction::Cancel => "cancel",
        }
    }
}

/// The full transition table. `Paid` and `Cancelled` appear in no source
/// position, which is what makes them terminal.
const TRANSITIONS: &[(CommissionStatus, CommissionAction, CommissionStatus)] = &[
    (
        CommissionStatus::Pending,
        CommissionAction::Approve,
        CommissionStatus::Approved,
    ),
    (
        CommissionStatus::Approved,
        CommissionAction::Pay,
        CommissionStatus::Paid,
    ),
    (
        CommissionStatus::Pending,
        CommissionAction::Cancel,
        CommissionStatus::Cancelled,
    ),
    (
        CommissionStatus::Approved,
        CommissionAction::Cancel,
        CommissionStatus::Cancelled,
    ),
];

impl CommissionStatus {
    /// Looks the transition up in the table. `None` means the action is not
    /// legal from this status.
    pub fn apply(self, action: CommissionAction) -> Option<CommissionStatus> {
        TRANSITIONS
            .iter()
            .find(|(from, candidate, _)| *from == self && *candidate == action)
            .map(|(_, _, to)| *to)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    BankTransfer,
    Payroll,
    Check,
    Cash,
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::Payroll => "payroll",
            PaymentMethod::Check => "check",
            PaymentMethod::Cash => "cash",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Shipment,
    Quote,
    Invoice,
}

/// Link to the business transaction a commission was earned on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRef {
    pub kind: TransactionKind,
    pub id: String,
}

/// Stamp written when a commission is approved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Approval {
    pub by: ActorId,
    pub at: DateTime<Utc>,
    pub notes: Option<String>,
}

/// Stamp written when a commission is paid out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub by: ActorId,
    pub at: DateTime<Utc>,
    pub reference: String,
    pub method: PaymentMethod,
}

/// Soft-deletion marker. Orthogonal to status and reversible via restore.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deletion {
    pub by: ActorId,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Adjustment {
    pub label: String,
    pub amount: Decimal,
}

/// Snapshot of how an amount was derived, frozen on the record so later rule
/// changes cannot rewrite history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationBreakdown {
    pub base_amount: Decimal,
    pub rate: Decimal,
    pub adjustments: Vec<Adjustment>,
    pub final_amount: Decimal,
}

/// A computed record of money owed to one employee for one transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commission {
    pub id: CommissionId,
    pub public_id: String,
    /// Period-scoped sequence code, e.g. `COMM-2026-0001`.
    pub code: String,
    pub employee: EmployeeId,
    /// The creating actor. Owns the record for access control; not
    /// necessarily the employee earning the commission.
    pub owner: ActorId,
    pub description: Option<String>,
    pub notes: Option<String>,
    pub currency: String,
    pub base_amount: Decimal,
    pub margin: Option<Decimal>,
    pub margin_percentage: Option<Decimal>,
    pub commission_percentage: Decimal,
    pub total_amount: Decimal,
    pub breakdown: Option<CalculationBreakdown>,
    pub rule: Option<RuleId>,
    pub source: Option<TransactionRef>,
    pub related_shipments: Vec<String>,
    pub related_quotes: Vec<String>,
    pub status: CommissionStatus,
    pub created_at: DateTime<Utc>,
    pub approval: Option<Approval>,
    pub payment: Option<Payment>,
    pub deleted: Option<Deletion>,
}

impl Commission {
    /// The calendar year scoping this record's sequence code.
    pub fn period(&self) -> i32 {
        self.created_at.year()
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted.is_some()
    }
}

/// Formats the period-scoped sequence code. The index restarts per year and
/// is only unique within one.
pub fn sequence_code(year: i32, index: u64) -> String {
    format!("COMM-{year}-{index:04}")
}

/// Range checks on the financial payload. Returns every violation so callers
/// can surface them together.
pub fn validate_financials(
    base_amount: Decimal,
    commission_percentage: Decimal,
    total_amount: Decimal,
    currency: &str,
) -> Vec<String> {
    let mut errors = Vec::new();
    if base_amount < Decimal::ZERO {
        errors.push("base_amount must not be negative".to_string());
    }
    if commission_percentage < Decimal::ZERO || commission_percentage > Decimal::ONE_HUNDRED {
        errors.push("commission_percentage must be between 0 and 100".to_string());
    }
    if total_amount < Decimal::ZERO {
        errors.push("total_amount must not be negative".to_string());
    }
    if currency.trim().is_empty() {
        errors.push("currency must not be empty".to_string());
    }
    errors
}

/// Payload for creating a commission. When `rule` is set the engine evaluates
/// it against `base_amount`/`cost` and fills the computed fields; otherwise
/// `commission_percentage` and `total_amount` must be supplied directly.
#[derive(Debug, Clone)]
pub struct NewCommission {
    pub employee: EmployeeId,
    pub description: Option<String>,
    pub currency: String,
    pub base_amount: Decimal,
    pub cost: Option<Decimal>,
    pub commission_percentage: Option<Decimal>,
    pub total_amount: Option<Decimal>,
    pub rule: Option<RuleId>,
    pub source: Option<TransactionRef>,
    pub related_shipments: Vec<String>,
    pub related_quotes: Vec<String>,
}

/// Field-level update to a commission. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct CommissionUpdate {
    pub description: Option<String>,
    pub notes: Option<String>,
    pub base_amount: Option<Decimal>,
    pub commission_percentage: Option<Decimal>,
    pub total_amount: Option<Decimal>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_transition_table_happy_path() {
        assert_eq!(
            CommissionStatus::Pending.apply(CommissionAction::Approve),
            Some(CommissionStatus::Approved)
        );
        assert_eq!(
            CommissionStatus::Approved.apply(CommissionAction::Pay),
            Some(CommissionStatus::Paid)
        );
    }

    #[test]
    fn test_cancel_allowed_from_pending_and_approved_only() {
        assert_eq!(
            CommissionStatus::Pending.apply(CommissionAction::Cancel),
            Some(CommissionStatus::Cancelled)
        );
        assert_eq!(
            CommissionStatus::Approved.apply(CommissionAction::Cancel),
            Some(CommissionStatus::Cancelled)
        );
        assert_eq!(CommissionStatus::Paid.apply(CommissionAction::Cancel), None);
        assert_eq!(
            CommissionStatus::Cancelled.apply(CommissionAction::Cancel),
            None
        );
    }

    #[test]
    fn test_pay_requires_approved() {
        assert_eq!(CommissionStatus::Pending.apply(CommissionAction::Pay), None);
        assert_eq!(CommissionStatus::Paid.apply(CommissionAction::Pay), None);
        assert_eq!(
            CommissionStatus::Cancelled.apply(CommissionAction::Pay),
            None
        );
    }

    #[test]
    fn test_terminal_states_accept_nothing() {
        for action in [
            CommissionAction::Approve,
            CommissionAction::Pay,
            CommissionAction::Cancel,
        ] {
            assert_eq!(CommissionStatus::Paid.apply(action), None);
            assert_eq!(CommissionStatus::Cancelled.apply(action), None);
        }
    }

    #[test]
    fn test_sequence_code_format() {
        assert_eq!(sequence_code(2026, 1), "COMM-2026-0001");
        assert_eq!(sequence_code(2026, 137), "COMM-2026-0137");
    }

    #[test]
    fn test_validate_financials_collects_all_violations() {
        let errors = validate_financials(dec!(-1), dec!(150), dec!(-5), " ");
        assert_eq!(errors.len(), 4);
    }

    #[test]
    fn test_validate_financials_accepts_sane_payload() {
        assert!(validate_financials(dec!(1000), dec!(10), dec!(100), "USD").is_empty());
    }
}
