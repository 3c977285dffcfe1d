//! Role-based authorization for allocation and role-record operations
//!
//! The role × operation matrix is data, not branching code: a const table
//! maps each (role, action) pair to an access decision, and conditional
//! grants are evaluated against the target allocation. A staff member's
//! role is always resolved against the target activity's parent unit,
//! never taken from client input.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

use super::record::{Allocation, Approval};

/// The role an actor holds for the unit being acted on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Ta,
    Lecturer,
    Admin,
}

impl ActorRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActorRole::Ta => "ta",
            ActorRole::Lecturer => "lecturer",
            ActorRole::Admin => "admin",
        }
    }
}

impl std::str::FromStr for ActorRole {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "ta" => Ok(ActorRole::Ta),
            "lecturer" => Ok(ActorRole::Lecturer),
            "admin" => Ok(ActorRole::Admin),
            _ => Err(format!("Invalid actor role: {}", s)),
        }
    }
}

/// Operations gated by the authorization matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    CreateAllocation,
    UpdateAllocation,
    DeleteAllocation,
    SetLecturerApproval,
    SetTaAcceptance,
    SetWorkforceApproval,
    GetRolesByUnit,
    CreateRole,
    UpdateRole,
    DeleteRole,
    UpdateRule,
    CreateSwap,
    SetSwapLecturerApproval,
    SetSwapWorkforceApproval,
    SupplySwapCounterparty,
    ResolveSwap,
}

impl Action {
    /// Phrase used in authorization error messages
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::CreateAllocation => "create allocation",
            Action::UpdateAllocation => "update allocation",
            Action::DeleteAllocation => "delete allocation",
            Action::SetLecturerApproval => "set lecturer approval",
            Action::SetTaAcceptance => "set assignee acceptance",
            Action::SetWorkforceApproval => "set workforce approval",
            Action::GetRolesByUnit => "get roles by unit",
            Action::CreateRole => "create role",
            Action::UpdateRole => "update role",
            Action::DeleteRole => "delete role",
            Action::UpdateRule => "update rule",
            Action::CreateSwap => "create swap request",
            Action::SetSwapLecturerApproval => "set swap lecturer approval",
            Action::SetSwapWorkforceApproval => "set swap workforce approval",
            Action::SupplySwapCounterparty => "supply swap counter-party",
            Action::ResolveSwap => "resolve swap",
        }
    }
}

/// Conditions attached to conditional grants in the matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    /// Actor is the assignee of the target allocation
    AssigneeSelf,
    /// Actor is the assignee and the allocation is fully approved
    AssigneeSelfBinding,
    /// The assignee has not yet accepted the target allocation
    NotYetAccepted,
}

/// Outcome of a matrix lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Deny,
    Allow,
    If(Condition),
}

/// Target-record facts a conditional grant is evaluated against
#[derive(Debug, Clone, Copy)]
pub struct AuthzContext<'a> {
    pub actor_id: Uuid,
    pub allocation: Option<&'a Allocation>,
    pub now: DateTime<Utc>,
}

impl<'a> AuthzContext<'a> {
    pub fn new(actor_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            actor_id,
            allocation: None,
            now,
        }
    }

    pub fn with_allocation(mut self, allocation: &'a Allocation) -> Self {
        self.allocation = Some(allocation);
        self
    }
}

/// The role × operation authorization matrix.
///
/// Unit scoping is implicit: a `Lecturer` entry only ever applies to the
/// unit the role was resolved against.
const MATRIX: &[(ActorRole, Action, Access)] = &[
    // Allocation CRUD
    (ActorRole::Ta, Action::CreateAllocation, Access::Deny),
    (ActorRole::Lecturer, Action::CreateAllocation, Access::Allow),
    (ActorRole::Admin, Action::CreateAllocation, Access::Allow),
    (ActorRole::Ta, Action::UpdateAllocation, Access::Deny),
    (ActorRole::Lecturer, Action::UpdateAllocation, Access::Allow),
    (ActorRole::Admin, Action::UpdateAllocation, Access::Allow),
    (
        ActorRole::Ta,
        Action::DeleteAllocation,
        Access::If(Condition::AssigneeSelfBinding),
    ),
    (
        ActorRole::Lecturer,
        Action::DeleteAllocation,
        Access::If(Condition::NotYetAccepted),
    ),
    (ActorRole::Admin, Action::DeleteAllocation, Access::Allow),
    // Approval transitions
    (ActorRole::Ta, Action::SetLecturerApproval, Access::Deny),
    (ActorRole::Lecturer, Action::SetLecturerApproval, Access::Allow),
    (ActorRole::Admin, Action::SetLecturerApproval, Access::Allow),
    (
        ActorRole::Ta,
        Action::SetTaAcceptance,
        Access::If(Condition::AssigneeSelf),
    ),
    (ActorRole::Lecturer, Action::SetTaAcceptance, Access::Deny),
    (ActorRole::Admin, Action::SetTaAcceptance, Access::Allow),
    (ActorRole::Ta, Action::SetWorkforceApproval, Access::Deny),
    (ActorRole::Lecturer, Action::SetWorkforceApproval, Access::Deny),
    (ActorRole::Admin, Action::SetWorkforceApproval, Access::Allow),
    // Role records
    (ActorRole::Ta, Action::GetRolesByUnit, Access::Deny),
    (ActorRole::Lecturer, Action::GetRolesByUnit, Access::Allow),
    (ActorRole::Admin, Action::GetRolesByUnit, Access::Allow),
    (ActorRole::Ta, Action::CreateRole, Access::Deny),
    (ActorRole::Lecturer, Action::CreateRole, Access::Allow),
    (ActorRole::Admin, Action::CreateRole, Access::Allow),
    (ActorRole::Ta, Action::UpdateRole, Access::Deny),
    (ActorRole::Lecturer, Action::UpdateRole, Access::Allow),
    (ActorRole::Admin, Action::UpdateRole, Access::Allow),
    (ActorRole::Ta, Action::DeleteRole, Access::Deny),
    (ActorRole::Lecturer, Action::DeleteRole, Access::Allow),
    (ActorRole::Admin, Action::DeleteRole, Access::Allow),
    // Global rules
    (ActorRole::Ta, Action::UpdateRule, Access::Deny),
    (ActorRole::Lecturer, Action::UpdateRule, Access::Deny),
    (ActorRole::Admin, Action::UpdateRule, Access::Allow),
    // Swap workflow
    (
        ActorRole::Ta,
        Action::CreateSwap,
        Access::If(Condition::AssigneeSelf),
    ),
    (ActorRole::Lecturer, Action::CreateSwap, Access::Deny),
    (ActorRole::Admin, Action::CreateSwap, Access::Allow),
    (ActorRole::Ta, Action::SetSwapLecturerApproval, Access::Deny),
    (
        ActorRole::Lecturer,
        Action::SetSwapLecturerApproval,
        Access::Allow,
    ),
    (ActorRole::Admin, Action::SetSwapLecturerApproval, Access::Allow),
    (ActorRole::Ta, Action::SetSwapWorkforceApproval, Access::Deny),
    (
        ActorRole::Lecturer,
        Action::SetSwapWorkforceApproval,
        Access::Deny,
    ),
    (ActorRole::Admin, Action::SetSwapWorkforceApproval, Access::Allow),
    (ActorRole::Ta, Action::SupplySwapCounterparty, Access::Deny),
    (
        ActorRole::Lecturer,
        Action::SupplySwapCounterparty,
        Access::Allow,
    ),
    (ActorRole::Admin, Action::SupplySwapCounterparty, Access::Allow),
    (ActorRole::Ta, Action::ResolveSwap, Access::Deny),
    (ActorRole::Lecturer, Action::ResolveSwap, Access::Allow),
    (ActorRole::Admin, Action::ResolveSwap, Access::Allow),
];

/// Look up the matrix entry for a role/action pair. Pairs absent from the
/// table deny, so a missing entry can never silently grant access.
pub fn access_for(role: ActorRole, action: Action) -> Access {
    MATRIX
        .iter()
        .find(|(r, a, _)| *r == role && *a == action)
        .map(|(_, _, access)| *access)
        .unwrap_or(Access::Deny)
}

fn condition_holds(condition: Condition, ctx: &AuthzContext<'_>) -> bool {
    let Some(alloc) = ctx.allocation else {
        return false;
    };
    match condition {
        Condition::AssigneeSelf => alloc.staff_id == ctx.actor_id,
        Condition::AssigneeSelfBinding => alloc.staff_id == ctx.actor_id && alloc.is_binding(),
        Condition::NotYetAccepted => alloc.ta_acceptance != Approval::Approved,
    }
}

/// Authorize `action` for `role`, or fail naming the forbidden action.
/// Never a silent no-op: every deny is an explicit error.
pub fn authorize(role: ActorRole, action: Action, ctx: &AuthzContext<'_>) -> Result<()> {
    match access_for(role, action) {
        Access::Allow => Ok(()),
        Access::Deny => Err(Error::unauthorized(role.as_str(), action.as_str())),
        Access::If(condition) => {
            if condition_holds(condition, ctx) {
                Ok(())
            } else {
                Err(Error::unauthorized(role.as_str(), action.as_str()))
            }
        }
    }
}
