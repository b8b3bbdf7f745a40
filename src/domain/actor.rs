use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies the user performing an operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActorId(pub String);

impl ActorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifies the employee who earns a commission. Distinct from the actor
/// that creates or manages the record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EmployeeId(pub String);

impl EmployeeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for EmployeeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A resolved actor, as returned by the access policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: ActorId,
    pub admin: bool,
}

impl Actor {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: ActorId::new(id),
            admin: false,
        }
    }

    pub fn admin(id: impl Into<String>) -> Self {
        Self {
            id: ActorId::new(id),
            admin: true,
        }
    }
}

/// Permissions gating engine operations. The string keys are what the access
/// policy sees and what forbidden errors report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    CreateCommission,
    ApproveCommission,
    PayCommission,
    UpdateCommission,
    DeleteCommission,
    ManageRules,
}

impl Permission {
    pub fn key(self) -> &'static str {
        match self {
            Permission::CreateCommission => "commissions:create",
            Permission::ApproveCommission => "commissions:approve",
            Permission::PayCommission => "commissions:pay",
            Permission::UpdateCommission => "commissions:update",
            Permission::DeleteCommission => "commissions:delete",
            Permission::ManageRules => "commission_rules:manage",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}
