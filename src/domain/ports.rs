//! Collaborator contracts. The engine only ever talks to these traits;
//! `infrastructure` provides the adapters.

use crate::domain::actor::{Actor, ActorId, Permission};
use crate::domain::commission::{Commission, CommissionId, CommissionStatus};
use crate::domain::rule::{CommissionRule, RuleId};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Storage for commission records. Implementations must apply each call
/// atomically with respect to the single record it touches; the engine
/// handles check-then-act sequencing above this.
#[async_trait]
pub trait CommissionStore: Send + Sync {
    async fn insert(&self, commission: Commission) -> Result<()>;
    async fn get(&self, id: &CommissionId) -> Result<Option<Commission>>;
    async fn update(&self, commission: Commission) -> Result<()>;
    /// How many records exist in the given calendar year, soft-deleted ones
    /// included. Drives period-scoped sequence codes.
    async fn count_in_period(&self, year: i32) -> Result<u64>;
    async fn list_by_period(&self, year: i32) -> Result<Vec<Commission>>;
    async fn list_by_owner(&self, owner: &ActorId) -> Result<Vec<Commission>>;
    async fn list_by_status(&self, status: CommissionStatus) -> Result<Vec<Commission>>;
}

pub type CommissionStoreBox = Box<dyn CommissionStore>;

#[async_trait]
pub trait RuleStore: Send + Sync {
    async fn insert(&self, rule: CommissionRule) -> Result<()>;
    async fn get(&self, id: &RuleId) -> Result<Option<CommissionRule>>;
    async fn update(&self, rule: CommissionRule) -> Result<()>;
}

pub type RuleStoreBox = Box<dyn RuleStore>;

/// Identity and permission resolution.
#[async_trait]
pub trait AccessPolicy: Send + Sync {
    /// Resolves the actor or fails with `Forbidden` when unknown.
    async fn require_actor(&self, actor: &ActorId) -> Result<Actor>;
    /// Resolves the actor and checks the permission in one step.
    async fn require_permission(&self, actor: &ActorId, permission: Permission) -> Result<Actor>;
}

pub type AccessPolicyBox = Box<dyn AccessPolicy>;

/// One immutable entry per state-changing operation.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEntry {
    pub actor: ActorId,
    pub action: &'static str,
    pub target: String,
    pub summary: String,
    /// Field-level changes, as free-form JSON.
    pub metadata: serde_json::Value,
    pub at: DateTime<Utc>,
}

/// Audit trail sink. Fire-and-forget from the engine's perspective: a failing
/// sink never blocks or rolls back the operation it describes.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, entry: AuditEntry) -> Result<()>;
}

pub type AuditSinkBox = Box<dyn AuditSink>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Commission,
    Rule,
}

impl EntityKind {
    pub fn prefix(self) -> &'static str {
        match self {
            EntityKind::Commission => "comm",
            EntityKind::Rule => "rule",
        }
    }
}

/// Mints durable public-facing ids, unique per entity kind.
pub trait PublicIdSource: Send + Sync {
    fn mint(&self, kind: EntityKind) -> String;
}

pub type PublicIdSourceBox = Box<dyn PublicIdSource>;
