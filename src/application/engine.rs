use crate::domain::actor::{ActorId, Permission};
use crate::domain::commission::{
    Approval, CalculationBreakdown, Commission, CommissionAction, CommissionId, CommissionStatus,
    CommissionUpdate, Deletion, NewCommission, Payment, PaymentMethod, sequence_code,
    validate_financials,
};
use crate::domain::evaluator::{self, Evaluation, TransactionFigures};
use crate::domain::ports::{
    AccessPolicyBox, AuditEntry, AuditSinkBox, CommissionStoreBox, EntityKind, PublicIdSourceBox,
    RuleStoreBox,
};
use crate::domain::rule::{CommissionRule, NewRule, RuleId};
use crate::error::{CommissionError, Result};
use chrono::Utc;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

fn visible(records: Vec<Commission>) -> Vec<Commission> {
    records
        .into_iter()
        .filter(|commission| !commission.is_deleted())
        .collect()
}

/// Per-record lock registry. Every read-modify-write transition holds its
/// record's lock from the load through the store write, so two concurrent
/// transitions on the same record serialize while distinct records proceed
/// independently.
#[derive(Default)]
struct RecordLocks {
    inner: Mutex<HashMap<CommissionId, Arc<Mutex<()>>>>,
}

impl RecordLocks {
    async fn acquire(&self, id: &CommissionId) -> OwnedMutexGuard<()> {
        let cell = {
            let mut locks = self.inner.lock().await;
            Arc::clone(locks.entry(id.clone()).or_default())
        };
        cell.lock_owned().await
    }
}

/// The main entry point for commission management.
///
/// `CommissionEngine` owns the storage, access-policy, audit, and public-id
/// collaborators and drives every lifecycle operation through them. The
/// evaluator stays pure; this type is where authorization, validation, and
/// state transitions meet.
pub struct CommissionEngine {
    commissions: CommissionStoreBox,
    rules: RuleStoreBox,
    access: AccessPolicyBox,
    audit: AuditSinkBox,
    ids: PublicIdSourceBox,
    locks: RecordLocks,
    /// Serializes sequence-code assignment within a period.
    create_lock: Mutex<()>,
}

impl CommissionEngine {
    pub fn new(
        commissions: CommissionStoreBox,
        rules: RuleStoreBox,
        access: AccessPolicyBox,
        audit: AuditSinkBox,
        ids: PublicIdSourceBox,
    ) -> Self {
        Self {
            commissions,
            rules,
            access,
            audit,
            ids,
            locks: RecordLocks::default(),
            create_lock: Mutex::new(()),
        }
    }

    // ---- rules ----------------------------------------------------------

    /// Creates a rule after structural validation. Tiers are stored sorted by
    /// `min_amount` so evaluation can rely on first-match-wins.
    pub async fn create_rule(&self, actor: &ActorId, draft: NewRule) -> Result<CommissionRule> {
        let actor = self
            .access
            .require_permission(actor, Permission::ManageRules)
            .await?;

        let mut rule = CommissionRule {
            id: RuleId::generate(),
            name: draft.name,
            kind: draft.kind,
            min_margin_percentage: draft.min_margin_percentage,
            min_order_value: draft.min_order_value,
            min_commission_amount: draft.min_commission_amount,
            active: true,
            created_by: actor.id.clone(),
            created_at: Utc::now(),
        };

        let report = rule.validate();
        if !report.valid {
            return Err(CommissionError::Validation(report.errors));
        }
        rule.sort_tiers();

        self.rules.insert(rule.clone()).await?;
        tracing::info!(rule = %rule.id, kind = rule.kind.name(), "commission rule created");
        self.emit_audit(
            &actor.id,
            "commission_rule.create",
            rule.id.to_string(),
            format!("commission rule '{}' created", rule.name),
            json!({ "kind": rule.kind.name(), "name": rule.name }),
        )
        .await;
        Ok(rule)
    }

    /// Retires a rule. Existing records keep referencing it; new commissions
    /// can no longer attach to it. Rules are never edited in place, so
    /// amounts on already-paid history cannot drift.
    pub async fn deactivate_rule(&self, actor: &ActorId, id: &RuleId) -> Result<CommissionRule> {
        let actor = self
            .access
            .require_permission(actor, Permission::ManageRules)
            .await?;

        let mut rule = self.rules.get(id).await?.ok_or_else(|| {
            CommissionError::NotFound {
                kind: "commission rule",
                id: id.to_string(),
            }
        })?;
        if !rule.active {
            return Err(CommissionError::validation(format!(
                "rule '{}' is already inactive",
                rule.name
            )));
        }

        rule.active = false;
        self.rules.update(rule.clone()).await?;
        tracing::info!(rule = %rule.id, "commission rule deactivated");
        self.emit_audit(
            &actor.id,
            "commission_rule.deactivate",
            rule.id.to_string(),
            format!("commission rule '{}' deactivated", rule.name),
            json!({ "active": { "from": true, "to": false } }),
        )
        .await;
        Ok(rule)
    }

    pub async fn get_rule(&self, id: &RuleId) -> Result<CommissionRule> {
        self.rules
            .get(id)
            .await?
            .ok_or_else(|| CommissionError::NotFound {
                kind: "commission rule",
                id: id.to_string(),
            })
    }

    // ---- lifecycle ------------------------------------------------------

    /// Creates a commission in `Pending`. Rule-driven drafts are evaluated
    /// and get a calculation breakdown snapshot; direct drafts must carry
    /// their percentage and total.
    pub async fn create(&self, actor: &ActorId, draft: NewCommission) -> Result<Commission> {
        let actor = self
            .access
            .require_permission(actor, Permission::CreateCommission)
            .await?;

        if draft.currency.trim().is_empty() {
            return Err(CommissionError::validation("currency must not be empty"));
        }

        let (commission_percentage, total_amount, margin, margin_percentage, breakdown) =
            match &draft.rule {
                Some(rule_id) => {
                    let evaluation = self.evaluate_draft(rule_id, &draft).await?;
                    (
                        evaluation.commission_rate,
                        evaluation.commission_amount,
                        // Keep the margin even for kinds that do not report it,
                        // so a later recalculation can recover the cost figure.
                        evaluation
                            .margin
                            .or_else(|| draft.cost.map(|cost| draft.base_amount - cost)),
                        evaluation.margin_percentage,
                        Some(CalculationBreakdown {
                            base_amount: evaluation.base_amount,
                            rate: evaluation.commission_rate,
                            adjustments: Vec::new(),
                            final_amount: evaluation.commission_amount,
                        }),
                    )
                }
                None => {
                    let (Some(percentage), Some(total)) =
                        (draft.commission_percentage, draft.total_amount)
                    else {
                        return Err(CommissionError::validation(
                            "commission_percentage and total_amount are required without a rule",
                        ));
                    };
                    let errors = validate_financials(
                        draft.base_amount,
                        percentage,
                        total,
                        &draft.currency,
                    );
                    if !errors.is_empty() {
                        return Err(CommissionError::Validation(errors));
                    }
                    (percentage, total, None, None, None)
                }
            };

        // Sequence codes restart per period; serializing assignment keeps
        // concurrent creates from claiming the same index.
        let _create_guard = self.create_lock.lock().await;
        let now = Utc::now();
        let year = chrono::Datelike::year(&now);
        let index = self.commissions.count_in_period(year).await? + 1;

        let commission = Commission {
            id: CommissionId::generate(),
            public_id: self.ids.mint(EntityKind::Commission),
            code: sequence_code(year, index),
            employee: draft.employee,
            owner: actor.id.clone(),
            description: draft.description,
            notes: None,
            currency: draft.currency,
            base_amount: draft.base_amount,
            margin,
            margin_percentage,
            commission_percentage,
            total_amount,
            breakdown,
            rule: draft.rule,
            source: draft.source,
            related_shipments: draft.related_shipments,
            related_quotes: draft.related_quotes,
            status: CommissionStatus::Pending,
            created_at: now,
            approval: None,
            payment: None,
            deleted: None,
        };

        self.commissions.insert(commission.clone()).await?;
        tracing::info!(code = %commission.code, employee = %commission.employee, "commission created");
        self.emit_audit(
            &actor.id,
            "commission.create",
            commission.id.to_string(),
            format!(
                "commission {} created for employee {}",
                commission.code, commission.employee
            ),
            json!({
                "code": commission.code,
                "total_amount": commission.total_amount,
                "status": commission.status,
            }),
        )
        .await;
        Ok(commission)
    }

    async fn evaluate_draft(&self, rule_id: &RuleId, draft: &NewCommission) -> Result<Evaluation> {
        let rule = self.get_rule(rule_id).await?;
        if !rule.active {
            return Err(CommissionError::validation(format!(
                "rule '{}' is inactive and cannot be applied",
                rule.name
            )));
        }
        let figures = TransactionFigures::new(draft.base_amount, draft.cost)?;
        evaluator::apply_rule(&rule, &figures)
    }

    /// `pending → approved`. Stamps the approver.
    pub async fn approve(
        &self,
        actor: &ActorId,
        id: &CommissionId,
        notes: Option<String>,
    ) -> Result<Commission> {
        let actor = self
            .access
            .require_permission(actor, Permission::ApproveCommission)
            .await?;
        let _guard = self.locks.acquire(id).await;

        let mut commission = self.load_active(id).await?;
        let previous = commission.status;
        commission.status = self.transition(&commission, CommissionAction::Approve)?;
        commission.approval = Some(Approval {
            by: actor.id.clone(),
            at: Utc::now(),
            notes,
        });

        self.commissions.update(commission.clone()).await?;
        tracing::info!(code = %commission.code, "commission approved");
        self.emit_audit(
            &actor.id,
            "commission.approve",
            commission.id.to_string(),
            format!("commission {} approved", commission.code),
            json!({ "status": { "from": previous, "to": commission.status } }),
        )
        .await;
        Ok(commission)
    }

    /// `approved → paid`. Requires a non-empty payment reference. Terminal.
    pub async fn pay(
        &self,
        actor: &ActorId,
        id: &CommissionId,
        reference: &str,
        method: PaymentMethod,
    ) -> Result<Commission> {
        let actor = self
            .access
            .require_permission(actor, Permission::PayCommission)
            .await?;
        if reference.trim().is_empty() {
            return Err(CommissionError::validation(
                "payment reference must not be empty",
            ));
        }
        let _guard = self.locks.acquire(id).await;

        let mut commission = self.load_active(id).await?;
        let previous = commission.status;
        commission.status = self.transition(&commission, CommissionAction::Pay)?;
        commission.payment = Some(Payment {
            by: actor.id.clone(),
            at: Utc::now(),
            reference: reference.to_string(),
            method,
        });

        self.commissions.update(commission.clone()).await?;
        tracing::info!(code = %commission.code, reference, "commission paid");
        self.emit_audit(
            &actor.id,
            "commission.pay",
            commission.id.to_string(),
            format!("commission {} paid", commission.code),
            json!({
                "status": { "from": previous, "to": commission.status },
                "reference": reference,
                "method": method,
            }),
        )
        .await;
        Ok(commission)
    }

    /// Cancels from `pending` or `approved`. Paid commissions cannot be
    /// cancelled; disbursed funds need a financial reversal outside this
    /// engine.
    pub async fn cancel(&self, actor: &ActorId, id: &CommissionId) -> Result<Commission> {
        let actor = self
            .access
            .require_permission(actor, Permission::UpdateCommission)
            .await?;
        let _guard = self.locks.acquire(id).await;

        let mut commission = self.load_active(id).await?;
        let previous = commission.status;
        commission.status = self.transition(&commission, CommissionAction::Cancel)?;

        self.commissions.update(commission.clone()).await?;
        tracing::info!(code = %commission.code, "commission cancelled");
        self.emit_audit(
            &actor.id,
            "commission.cancel",
            commission.id.to_string(),
            format!("commission {} cancelled", commission.code),
            json!({ "status": { "from": previous, "to": commission.status } }),
        )
        .await;
        Ok(commission)
    }

    /// Edits amounts, description, or notes. Never changes status; rejected
    /// on soft-deleted records.
    pub async fn update(
        &self,
        actor: &ActorId,
        id: &CommissionId,
        update: CommissionUpdate,
    ) -> Result<Commission> {
        let actor = self
            .access
            .require_permission(actor, Permission::UpdateCommission)
            .await?;
        let _guard = self.locks.acquire(id).await;

        let mut commission = self.load_active(id).await?;
        let mut changes = serde_json::Map::new();

        if let Some(description) = update.description {
            changes.insert(
                "description".to_string(),
                json!({ "from": commission.description, "to": description }),
            );
            commission.description = Some(description);
        }
        if let Some(notes) = update.notes {
            changes.insert(
                "notes".to_string(),
                json!({ "from": commission.notes, "to": notes }),
            );
            commission.notes = Some(notes);
        }
        if let Some(base_amount) = update.base_amount {
            changes.insert(
                "base_amount".to_string(),
                json!({ "from": commission.base_amount, "to": base_amount }),
            );
            commission.base_amount = base_amount;
        }
        if let Some(percentage) = update.commission_percentage {
            changes.insert(
                "commission_percentage".to_string(),
                json!({ "from": commission.commission_percentage, "to": percentage }),
            );
            commission.commission_percentage = percentage;
        }
        if let Some(total_amount) = update.total_amount {
            changes.insert(
                "total_amount".to_string(),
                json!({ "from": commission.total_amount, "to": total_amount }),
            );
            commission.total_amount = total_amount;
        }

        let errors = validate_financials(
            commission.base_amount,
            commission.commission_percentage,
            commission.total_amount,
            &commission.currency,
        );
        if !errors.is_empty() {
            return Err(CommissionError::Validation(errors));
        }

        self.commissions.update(commission.clone()).await?;
        self.emit_audit(
            &actor.id,
            "commission.update",
            commission.id.to_string(),
            format!("commission {} updated", commission.code),
            serde_json::Value::Object(changes),
        )
        .await;
        Ok(commission)
    }

    /// Re-runs the linked rule against the stored figures. Only `Pending`
    /// records may be recalculated; approved and paid amounts are frozen.
    pub async fn recalculate(&self, actor: &ActorId, id: &CommissionId) -> Result<Commission> {
        let actor = self
            .access
            .require_permission(actor, Permission::UpdateCommission)
            .await?;
        let _guard = self.locks.acquire(id).await;

        let mut commission = self.load_active(id).await?;
        if commission.status != CommissionStatus::Pending {
            return Err(CommissionError::InvalidTransition {
                action: "recalculate",
                status: commission.status,
            });
        }
        let Some(rule_id) = commission.rule.clone() else {
            return Err(CommissionError::validation(
                "commission has no linked rule to recalculate from",
            ));
        };

        let rule = self.get_rule(&rule_id).await?;
        let cost = commission
            .margin
            .map(|margin| commission.base_amount - margin);
        let figures = TransactionFigures::new(commission.base_amount, cost)?;
        let evaluation = evaluator::apply_rule(&rule, &figures)?;

        let previous_total = commission.total_amount;
        commission.margin = evaluation.margin.or(commission.margin);
        commission.margin_percentage = evaluation.margin_percentage;
        commission.commission_percentage = evaluation.commission_rate;
        commission.total_amount = evaluation.commission_amount;
        commission.breakdown = Some(CalculationBreakdown {
            base_amount: evaluation.base_amount,
            rate: evaluation.commission_rate,
            adjustments: Vec::new(),
            final_amount: evaluation.commission_amount,
        });

        self.commissions.update(commission.clone()).await?;
        tracing::info!(code = %commission.code, "commission recalculated");
        self.emit_audit(
            &actor.id,
            "commission.recalculate",
            commission.id.to_string(),
            format!("commission {} recalculated", commission.code),
            json!({ "total_amount": { "from": previous_total, "to": commission.total_amount } }),
        )
        .await;
        Ok(commission)
    }

    /// Soft-deletes. The record vanishes from default reads but keeps its
    /// history and can be restored.
    pub async fn delete(&self, actor: &ActorId, id: &CommissionId) -> Result<Commission> {
        let actor = self
            .access
            .require_permission(actor, Permission::DeleteCommission)
            .await?;
        let _guard = self.locks.acquire(id).await;

        let mut commission = self.load_active(id).await?;
        commission.deleted = Some(Deletion {
            by: actor.id.clone(),
            at: Utc::now(),
        });

        self.commissions.update(commission.clone()).await?;
        tracing::info!(code = %commission.code, "commission soft-deleted");
        self.emit_audit(
            &actor.id,
            "commission.delete",
            commission.id.to_string(),
            format!("commission {} deleted", commission.code),
            json!({ "deleted": true }),
        )
        .await;
        Ok(commission)
    }

    /// Reverses a soft deletion. Only the record's owner or an administrator
    /// may restore.
    pub async fn restore(&self, actor: &ActorId, id: &CommissionId) -> Result<Commission> {
        let actor = self.access.require_actor(actor).await?;
        let _guard = self.locks.acquire(id).await;

        let mut commission =
            self.commissions
                .get(id)
                .await?
                .ok_or_else(|| CommissionError::NotFound {
                    kind: "commission",
                    id: id.to_string(),
                })?;
        if !commission.is_deleted() {
            return Err(CommissionError::validation("commission is not deleted"));
        }
        if commission.owner != actor.id && !actor.admin {
            return Err(CommissionError::Forbidden {
                actor: actor.id.to_string(),
                permission: "commissions:restore",
            });
        }

        commission.deleted = None;
        self.commissions.update(commission.clone()).await?;
        tracing::info!(code = %commission.code, "commission restored");
        self.emit_audit(
            &actor.id,
            "commission.restore",
            commission.id.to_string(),
            format!("commission {} restored", commission.code),
            json!({ "deleted": false }),
        )
        .await;
        Ok(commission)
    }

    // ---- reads ----------------------------------------------------------

    pub async fn get(&self, id: &CommissionId) -> Result<Commission> {
        self.load_active(id).await
    }

    pub async fn list_by_period(&self, year: i32) -> Result<Vec<Commission>> {
        Ok(visible(self.commissions.list_by_period(year).await?))
    }

    pub async fn list_by_owner(&self, owner: &ActorId) -> Result<Vec<Commission>> {
        Ok(visible(self.commissions.list_by_owner(owner).await?))
    }

    pub async fn list_by_status(&self, status: CommissionStatus) -> Result<Vec<Commission>> {
        Ok(visible(self.commissions.list_by_status(status).await?))
    }

    // ---- internals ------------------------------------------------------

    /// Loads a record, treating soft-deleted ones as absent.
    async fn load_active(&self, id: &CommissionId) -> Result<Commission> {
        match self.commissions.get(id).await? {
            Some(commission) if !commission.is_deleted() => Ok(commission),
            _ => Err(CommissionError::NotFound {
                kind: "commission",
                id: id.to_string(),
            }),
        }
    }

    fn transition(
        &self,
        commission: &Commission,
        action: CommissionAction,
    ) -> Result<CommissionStatus> {
        commission
            .status
            .apply(action)
            .ok_or(CommissionError::InvalidTransition {
                action: action.name(),
                status: commission.status,
            })
    }

    async fn emit_audit(
        &self,
        actor: &ActorId,
        action: &'static str,
        target: String,
        summary: String,
        metadata: serde_json::Value,
    ) {
        let entry = AuditEntry {
            actor: actor.clone(),
            action,
            target,
            summary,
            metadata,
            at: Utc::now(),
        };
        if let Err(err) = self.audit.record(entry).await {
            tracing::warn!(%err, action, "audit sink rejected entry");
        }
    }
}
