//! Pure translation of `(rule, figures)` into a commission amount.
//!
//! Nothing here touches storage or clocks; every function is deterministic
//! and safe to call concurrently. Threshold gating is the only path that
//! produces a zeroed result, and it always runs after the full computation
//! so the informational fields stay populated.

use crate::domain::rule::{CommissionRule, RuleKind, Tier};
use crate::error::{CommissionError, Result};
use rust_decimal::Decimal;

/// Validated financial input of a single transaction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransactionFigures {
    revenue: Decimal,
    cost: Option<Decimal>,
}

impl TransactionFigures {
    pub fn new(revenue: Decimal, cost: Option<Decimal>) -> Result<Self> {
        let mut errors = Vec::new();
        if revenue < Decimal::ZERO {
            errors.push("revenue must not be negative".to_string());
        }
        if cost.is_some_and(|c| c < Decimal::ZERO) {
            errors.push("cost must not be negative".to_string());
        }
        if !errors.is_empty() {
            return Err(CommissionError::Validation(errors));
        }
        Ok(Self { revenue, cost })
    }

    pub fn revenue(&self) -> Decimal {
        self.revenue
    }

    pub fn cost(&self) -> Option<Decimal> {
        self.cost
    }
}

/// Result of evaluating a rule against transaction figures.
///
/// When a threshold gate fires, `commission_rate` and `commission_amount`
/// collapse to zero but the derived fields (`margin`, `margin_percentage`,
/// `applied_tier`) still describe the suppressed computation.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub base_amount: Decimal,
    pub margin: Option<Decimal>,
    pub margin_percentage: Option<Decimal>,
    pub commission_rate: Decimal,
    pub commission_amount: Decimal,
    pub applied_tier: Option<Tier>,
}

impl Evaluation {
    fn suppress(mut self) -> Self {
        self.commission_rate = Decimal::ZERO;
        self.commission_amount = Decimal::ZERO;
        self
    }
}

/// Applies a rule to transaction figures.
///
/// Fails with `Validation` when a margin rule is given no cost, and with
/// `Configuration` when a tiered rule carries no tiers. A gated result is
/// not an error.
pub fn apply_rule(rule: &CommissionRule, figures: &TransactionFigures) -> Result<Evaluation> {
    match &rule.kind {
        RuleKind::MarginPercentage { rate } => {
            let cost = figures.cost().ok_or_else(|| {
                CommissionError::validation("margin_percentage rules require a cost figure")
            })?;
            Ok(margin_commission(rule, figures.revenue(), cost, *rate))
        }
        RuleKind::RevenuePercentage { rate } => {
            Ok(revenue_commission(rule, figures.revenue(), *rate))
        }
        RuleKind::FixedAmount { rate } => Ok(fixed_commission(rule, figures.revenue(), *rate)),
        RuleKind::Tiered { tiers } => tiered_commission(rule, figures, tiers),
    }
}

fn below(threshold: Option<Decimal>, value: Decimal) -> bool {
    threshold.is_some_and(|min| value < min)
}

fn margin_commission(
    rule: &CommissionRule,
    revenue: Decimal,
    cost: Decimal,
    rate: Decimal,
) -> Evaluation {
    let margin = revenue - cost;
    let margin_percentage = if revenue.is_zero() {
        Decimal::ZERO
    } else {
        margin / revenue * Decimal::ONE_HUNDRED
    };
    // A negative margin never produces a negative commission.
    let amount = (margin * rate / Decimal::ONE_HUNDRED).max(Decimal::ZERO);

    let evaluation = Evaluation {
        base_amount: revenue,
        margin: Some(margin),
        margin_percentage: Some(margin_percentage),
        commission_rate: rate,
        commission_amount: amount,
        applied_tier: None,
    };

    if below(rule.min_margin_percentage, margin_percentage)
        || below(rule.min_order_value, revenue)
        || below(rule.min_commission_amount, amount)
    {
        evaluation.suppress()
    } else {
        evaluation
    }
}

fn revenue_commission(rule: &CommissionRule, revenue: Decimal, rate: Decimal) -> Evaluation {
    let amount = (revenue * rate / Decimal::ONE_HUNDRED).max(Decimal::ZERO);

    let evaluation = Evaluation {
        base_amount: revenue,
        margin: None,
        margin_percentage: None,
        commission_rate: rate,
        commission_amount: amount,
        applied_tier: None,
    };

    if below(rule.min_order_value, revenue) || below(rule.min_commission_amount, amount) {
        evaluation.suppress()
    } else {
        evaluation
    }
}

fn fixed_commission(rule: &CommissionRule, revenue: Decimal, rate: Decimal) -> Evaluation {
    let evaluation = Evaluation {
        base_amount: revenue,
        margin: None,
        margin_percentage: None,
        commission_rate: rate,
        commission_amount: rate,
        applied_tier: None,
    };

    if below(rule.min_order_value, revenue) {
        evaluation.suppress()
    } else {
        evaluation
    }
}

fn tiered_commission(
    rule: &CommissionRule,
    figures: &TransactionFigures,
    tiers: &[Tier],
) -> Result<Evaluation> {
    if tiers.is_empty() {
        return Err(CommissionError::Configuration(format!(
            "tiered rule {} has no tiers",
            rule.id
        )));
    }

    let base = match figures.cost() {
        Some(cost) => figures.revenue() - cost,
        None => figures.revenue(),
    };

    // Tiers are sorted and non-overlapping after validation; the first match
    // is the only match.
    let applied = tiers
        .iter()
        .find(|tier| base >= tier.min_amount && tier.max_amount.is_none_or(|max| base <= max));

    let (rate, amount) = match applied {
        Some(tier) => (
            tier.rate,
            (base * tier.rate / Decimal::ONE_HUNDRED).max(Decimal::ZERO),
        ),
        None => (Decimal::ZERO, Decimal::ZERO),
    };

    let evaluation = Evaluation {
        base_amount: base,
        margin: None,
        margin_percentage: None,
        commission_rate: rate,
        commission_amount: amount,
        applied_tier: applied.cloned(),
    };

    if below(rule.min_order_value, figures.revenue())
        || below(rule.min_commission_amount, amount)
    {
        Ok(evaluation.suppress())
    } else {
        Ok(evaluation)
    }
}
