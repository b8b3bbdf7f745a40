use crate::domain::actor::ActorId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RuleId(pub String);

impl RuleId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A contiguous amount range with its own rate, used by tiered rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tier {
    pub min_amount: Decimal,
    #[serde(default)]
    pub max_amount: Option<Decimal>,
    pub rate: Decimal,
    #[serde(default)]
    pub description: Option<String>,
}

/// The computation strategy of a rule. The serialized form carries a `type`
/// discriminant, so rule files read `{"type": "margin_percentage", "rate": 10}`.
/// An unknown `type` is rejected at deserialization, which keeps the
/// evaluator's match exhaustive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleKind {
    MarginPercentage { rate: Decimal },
    RevenuePercentage { rate: Decimal },
    /// `rate` is the flat payout, not a percentage.
    FixedAmount { rate: Decimal },
    Tiered { tiers: Vec<Tier> },
}

impl RuleKind {
    pub fn name(&self) -> &'static str {
        match self {
            RuleKind::MarginPercentage { .. } => "margin_percentage",
            RuleKind::RevenuePercentage { .. } => "revenue_percentage",
            RuleKind::FixedAmount { .. } => "fixed_amount",
            RuleKind::Tiered { .. } => "tiered",
        }
    }
}

/// A reusable policy turning transaction figures into a commission amount.
///
/// Rules are immutable once created. Policy changes are expressed by creating
/// a replacement rule and deactivating the old one, so amounts on historical
/// records never drift.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommissionRule {
    pub id: RuleId,
    pub name: String,
    #[serde(flatten)]
    pub kind: RuleKind,
    /// Below this margin percentage the commission is suppressed to zero.
    #[serde(default)]
    pub min_margin_percentage: Option<Decimal>,
    /// Below this revenue the commission is suppressed to zero.
    #[serde(default)]
    pub min_order_value: Option<Decimal>,
    /// Computed amounts below this are suppressed to zero.
    #[serde(default)]
    pub min_commission_amount: Option<Decimal>,
    pub active: bool,
    pub created_by: ActorId,
    pub created_at: DateTime<Utc>,
}

/// Outcome of structural rule validation. Failures are data, not errors.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleValidation {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl CommissionRule {
    /// Structural check run before a rule is trusted. Never fails hard; the
    /// caller decides what to do with the collected messages.
    pub fn validate(&self) -> RuleValidation {
        let mut errors = Vec::new();

        match &self.kind {
            RuleKind::Tiered { tiers } => {
                if tiers.is_empty() {
                    errors.push("tiered rules require at least one tier".to_string());
                }
                let mut sorted: Vec<&Tier> = tiers.iter().collect();
                sorted.sort_by(|a, b| a.min_amount.cmp(&b.min_amount));
                for (i, tier) in sorted.iter().enumerate() {
                    if tier.rate < Decimal::ZERO {
                        errors.push(format!("tier {} rate must not be negative", i + 1));
                    }
                    if tier.max_amount.is_some_and(|max| max < tier.min_amount) {
                        errors.push(format!("tier {} max_amount is below its min_amount", i + 1));
                    }
                }
                // A tier with no upper bound is open-ended, so anything after
                // it in min_amount order necessarily intersects it.
                for (i, pair) in sorted.windows(2).enumerate() {
                    if pair[0].max_amount.is_none_or(|max| max >= pair[1].min_amount) {
                        errors.push(format!("tiers {} and {} overlap", i + 1, i + 2));
                    }
                }
            }
            RuleKind::MarginPercentage { rate }
            | RuleKind::RevenuePercentage { rate }
            | RuleKind::FixedAmount { rate } => {
                if *rate < Decimal::ZERO {
                    errors.push("rate must not be negative".to_string());
                }
            }
        }

        for (field, value) in [
            ("min_margin_percentage", self.min_margin_percentage),
            ("min_order_value", self.min_order_value),
            ("min_commission_amount", self.min_commission_amount),
        ] {
            if value.is_some_and(|v| v < Decimal::ZERO) {
                errors.push(format!("{field} must not be negative"));
            }
        }

        RuleValidation {
            valid: errors.is_empty(),
            errors,
        }
    }

    /// Orders tiers by `min_amount` ascending. Run once after validation so
    /// evaluation can assume first-match-wins over a sorted set.
    pub fn sort_tiers(&mut self) {
        if let RuleKind::Tiered { tiers } = &mut self.kind {
            tiers.sort_by(|a, b| a.min_amount.cmp(&b.min_amount));
        }
    }
}

/// Payload for creating a rule; the engine assigns identity and stamps.
#[derive(Debug, Clone, Deserialize)]
pub struct NewRule {
    pub name: String,
    #[serde(flatten)]
    pub kind: RuleKind,
    #[serde(default)]
    pub min_margin_percentage: Option<Decimal>,
    #[serde(default)]
    pub min_order_value: Option<Decimal>,
    #[serde(default)]
    pub min_commission_amount: Option<Decimal>,
}
