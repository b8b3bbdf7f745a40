use crate::domain::actor::{Actor, ActorId, Permission};
use crate::domain::commission::{Commission, CommissionId, CommissionStatus};
use crate::domain::ports::{
    AccessPolicy, AuditEntry, AuditSink, CommissionStore, EntityKind, PublicIdSource, RuleStore,
};
use crate::domain::rule::{CommissionRule, RuleId};
use crate::error::{CommissionError, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

/// A thread-safe in-memory store for commission records.
///
/// Uses `Arc<RwLock<HashMap<..>>>` for shared concurrent access. Ideal for
/// testing or single-run batch processing where persistence is not required.
#[derive(Default, Clone)]
pub struct InMemoryCommissionStore {
    records: Arc<RwLock<HashMap<CommissionId, Commission>>>,
}

impl InMemoryCommissionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn ordered(mut records: Vec<Commission>) -> Vec<Commission> {
    records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.code.cmp(&b.code)));
    records
}

#[async_trait]
impl CommissionStore for InMemoryCommissionStore {
    async fn insert(&self, commission: Commission) -> Result<()> {
        let mut records = self.records.write().await;
        records.insert(commission.id.clone(), commission);
        Ok(())
    }

    async fn get(&self, id: &CommissionId) -> Result<Option<Commission>> {
        let records = self.records.read().await;
        Ok(records.get(id).cloned())
    }

    async fn update(&self, commission: Commission) -> Result<()> {
        let mut records = self.records.write().await;
        if !records.contains_key(&commission.id) {
            return Err(CommissionError::NotFound {
                kind: "commission",
                id: commission.id.to_string(),
            });
        }
        records.insert(commission.id.clone(), commission);
        Ok(())
    }

    async fn count_in_period(&self, year: i32) -> Result<u64> {
        let records = self.records.read().await;
        Ok(records.values().filter(|c| c.period() == year).count() as u64)
    }

    async fn list_by_period(&self, year: i32) -> Result<Vec<Commission>> {
        let records = self.records.read().await;
        Ok(ordered(
            records
                .values()
                .filter(|c| c.period() == year)
                .cloned()
                .collect(),
        ))
    }

    async fn list_by_owner(&self, owner: &ActorId) -> Result<Vec<Commission>> {
        let records = self.records.read().await;
        Ok(ordered(
            records
                .values()
                .filter(|c| &c.owner == owner)
                .cloned()
                .collect(),
        ))
    }

    async fn list_by_status(&self, status: CommissionStatus) -> Result<Vec<Commission>> {
        let records = self.records.read().await;
        Ok(ordered(
            records
                .values()
                .filter(|c| c.status == status)
                .cloned()
                .collect(),
        ))
    }
}

/// A thread-safe in-memory store for commission rules.
#[derive(Default, Clone)]
pub struct InMemoryRuleStore {
    rules: Arc<RwLock<HashMap<RuleId, CommissionRule>>>,
}

impl InMemoryRuleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RuleStore for InMemoryRuleStore {
    async fn insert(&self, rule: CommissionRule) -> Result<()> {
        let mut rules = self.rules.write().await;
        rules.insert(rule.id.clone(), rule);
        Ok(())
    }

    async fn get(&self, id: &RuleId) -> Result<Option<CommissionRule>> {
        let rules = self.rules.read().await;
        Ok(rules.get(id).cloned())
    }

    async fn update(&self, rule: CommissionRule) -> Result<()> {
        let mut rules = self.rules.write().await;
        if !rules.contains_key(&rule.id) {
            return Err(CommissionError::NotFound {
                kind: "commission rule",
                id: rule.id.to_string(),
            });
        }
        rules.insert(rule.id.clone(), rule);
        Ok(())
    }
}

/// Access policy backed by a fixed actor/permission table. Built once, then
/// read-only, so trait calls need no locking.
#[derive(Default, Clone)]
pub struct StaticAccessPolicy {
    actors: HashMap<ActorId, (bool, HashSet<Permission>)>,
}

impl StaticAccessPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an administrator; admins implicitly hold every permission.
    pub fn with_admin(mut self, id: impl Into<String>) -> Self {
        self.actors
            .insert(ActorId::new(id), (true, HashSet::new()));
        self
    }

    pub fn with_grants(
        mut self,
        id: impl Into<String>,
        permissions: impl IntoIterator<Item = Permission>,
    ) -> Self {
        self.actors
            .insert(ActorId::new(id), (false, permissions.into_iter().collect()));
        self
    }
}

#[async_trait]
impl AccessPolicy for StaticAccessPolicy {
    async fn require_actor(&self, actor: &ActorId) -> Result<Actor> {
        match self.actors.get(actor) {
            Some((admin, _)) => Ok(Actor {
                id: actor.clone(),
                admin: *admin,
            }),
            None => Err(CommissionError::Unauthorized {
                actor: actor.to_string(),
            }),
        }
    }

    async fn require_permission(&self, actor: &ActorId, permission: Permission) -> Result<Actor> {
        match self.actors.get(actor) {
            Some((true, _)) => Ok(Actor {
                id: actor.clone(),
                admin: true,
            }),
            Some((false, granted)) if granted.contains(&permission) => Ok(Actor {
                id: actor.clone(),
                admin: false,
            }),
            Some(_) => Err(CommissionError::Forbidden {
                actor: actor.to_string(),
                permission: permission.key(),
            }),
            None => Err(CommissionError::Unauthorized {
                actor: actor.to_string(),
            }),
        }
    }
}

/// Collects audit entries in memory. Tests clone the sink before boxing it
/// and read the entries back through the clone.
#[derive(Default, Clone)]
pub struct MemoryAuditSink {
    entries: Arc<RwLock<Vec<AuditEntry>>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn entries(&self) -> Vec<AuditEntry> {
        self.entries.read().await.clone()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn record(&self, entry: AuditEntry) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.push(entry);
        Ok(())
    }
}

/// Audit sink that forwards entries to the tracing subscriber. Used by the
/// CLI, where there is no audit database to write to.
#[derive(Default, Clone, Copy)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, entry: AuditEntry) -> Result<()> {
        tracing::info!(
            actor = %entry.actor,
            action = entry.action,
            target = %entry.target,
            "{}",
            entry.summary
        );
        Ok(())
    }
}

/// Random public ids: `<kind prefix>_<uuid>`.
#[derive(Default, Clone, Copy)]
pub struct UuidPublicIds;

impl PublicIdSource for UuidPublicIds {
    fn mint(&self, kind: EntityKind) -> String {
        format!("{}_{}", kind.prefix(), Uuid::new_v4().simple())
    }
}

/// Deterministic public ids for tests.
#[derive(Default)]
pub struct SequentialPublicIds {
    counter: AtomicU64,
}

impl SequentialPublicIds {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PublicIdSource for SequentialPublicIds {
    fn mint(&self, kind: EntityKind) -> String {
        let next = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{}_{next:06}", kind.prefix())
    }
}
