//! Allocation manager: role dispatch, transitions and notification fan-out
//!
//! Every mutating operation follows the same order: resolve the actor's
//! role against the target activity's parent unit, authorize against the
//! matrix, check record-level transition legality, gate on constraints
//! where the target assignment changes, commit via compare-and-swap, then
//! fire notifications without blocking or failing the committed change.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::models::{Activity, Role, RoleTitle, Rule, RuleName, Staff, Unit};
use crate::notify::Notifier;
use crate::store::Store;

use super::authz::{authorize, Action, ActorRole, AuthzContext};
use super::constraints::{self, ConstraintContext, ConstraintOutcome, Limits};
use super::record::{Allocation, AllocationView, Approval};
use super::swap::{Swap, SwapStatus, SwapView};

/// Full-replace payload for the administrative update operation.
///
/// This deliberately bypasses the per-flag transition legality checks and
/// is gated most strictly by the authorization matrix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationReplace {
    pub staff_id: Uuid,
    pub activity_id: Uuid,
    pub offer_expiry: DateTime<Utc>,
    pub lecturer_approval: Approval,
    pub ta_acceptance: Approval,
    pub workforce_approval: Approval,
}

/// Coordinates the allocation and swap workflows over the entity store
pub struct AllocationManager {
    store: Arc<Store>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
}

impl AllocationManager {
    pub fn new(store: Arc<Store>, notifier: Arc<dyn Notifier>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            notifier,
            clock,
        }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Resolve the actor's role for a unit. Admins hold their role
    /// app-wide; everyone else needs a Role record for the unit, and an
    /// absent record denies the action outright.
    async fn resolve_role(&self, actor: &Staff, unit_id: Uuid, action: Action) -> Result<ActorRole> {
        if actor.is_admin {
            return Ok(ActorRole::Admin);
        }
        match self.store.role_for(actor.id, unit_id).await {
            Some(role) => Ok(match role.title {
                RoleTitle::Ta => ActorRole::Ta,
                RoleTitle::Lecturer => ActorRole::Lecturer,
            }),
            None => Err(Error::unauthorized("unaffiliated staff", action.as_str())),
        }
    }

    /// Load an allocation together with its activity and unit
    async fn allocation_context(&self, allocation_id: Uuid) -> Result<(Allocation, Activity, Unit)> {
        let allocation = self.store.get_allocation(allocation_id).await?;
        let activity = self.store.get_activity(allocation.activity_id).await?;
        let unit = self.store.get_unit(activity.unit_id).await?;
        Ok((allocation, activity, unit))
    }

    /// Run the constraint checker for a prospective (staff, activity)
    /// pair, excluding the record being replaced, if any.
    async fn check_constraints(
        &self,
        staff_id: Uuid,
        activity: &Activity,
        exclude: Option<Uuid>,
    ) -> Result<()> {
        let unit = self.store.get_unit(activity.unit_id).await?;
        let availabilities = self.store.availabilities_for_staff(staff_id).await;
        let commitments = self.store.workload_for_staff(staff_id, exclude).await;
        let limits = Limits::from_rules(&self.store.list_rules().await);
        let ctx = ConstraintContext {
            candidate: activity,
            availabilities: &availabilities,
            commitments: &commitments,
            limits,
            year: unit.year,
        };
        match constraints::evaluate(&ctx) {
            ConstraintOutcome::Satisfied => Ok(()),
            ConstraintOutcome::Violated(reason) => Err(Error::ConstraintViolation(reason)),
        }
    }

    fn spawn_offer_notice(&self, assignee: Staff, unit_label: String, activity_code: String) {
        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            if let Err(err) = notifier
                .send_offer_to_assignee(&assignee, &unit_label, &activity_code)
                .await
            {
                tracing::warn!(error = %err, "offer notification dropped");
            }
        });
    }

    fn spawn_acceptance_notice(
        &self,
        lecturers: Vec<Staff>,
        assignee_name: String,
        unit_label: String,
        activity_code: String,
    ) {
        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            if let Err(err) = notifier
                .notify_lecturers(&lecturers, &assignee_name, &unit_label, &activity_code)
                .await
            {
                tracing::warn!(error = %err, "acceptance notification dropped");
            }
        });
    }

    // ----- allocation lifecycle -----

    /// Create an allocation offering `staff_id` the given activity.
    /// Emits no notification; the offer only goes out on lecturer approval.
    pub async fn create_allocation(
        &self,
        actor_id: Uuid,
        staff_id: Uuid,
        activity_id: Uuid,
    ) -> Result<AllocationView> {
        let actor = self.store.get_staff(actor_id).await?;
        let activity = self.store.get_activity(activity_id).await?;
        let now = self.clock.now();

        let role = self
            .resolve_role(&actor, activity.unit_id, Action::CreateAllocation)
            .await?;
        authorize(
            role,
            Action::CreateAllocation,
            &AuthzContext::new(actor_id, now),
        )?;

        self.store.get_staff(staff_id).await?;
        self.check_constraints(staff_id, &activity, None).await?;

        let allocation = self
            .store
            .insert_allocation(Allocation::new(activity.id, staff_id, now))
            .await;
        tracing::info!(
            allocation = %allocation.id,
            staff = %staff_id,
            activity = %activity.id,
            "allocation created"
        );
        Ok(AllocationView::derive(allocation, now))
    }

    /// Administrative full replace. Re-runs the constraint checker when
    /// the target staff or activity changes; for a lecturer the role must
    /// hold for the new unit as well as the current one.
    pub async fn update_allocation(
        &self,
        actor_id: Uuid,
        allocation_id: Uuid,
        replace: AllocationReplace,
    ) -> Result<AllocationView> {
        let actor = self.store.get_staff(actor_id).await?;
        let (existing, activity, unit) = self.allocation_context(allocation_id).await?;
        let now = self.clock.now();

        let role = self
            .resolve_role(&actor, unit.id, Action::UpdateAllocation)
            .await?;
        let ctx = AuthzContext::new(actor_id, now).with_allocation(&existing);
        authorize(role, Action::UpdateAllocation, &ctx)?;

        let retargeted =
            replace.staff_id != existing.staff_id || replace.activity_id != existing.activity_id;
        let new_activity = if replace.activity_id == existing.activity_id {
            activity
        } else {
            let new_activity = self.store.get_activity(replace.activity_id).await?;
            let role = self
                .resolve_role(&actor, new_activity.unit_id, Action::UpdateAllocation)
                .await?;
            authorize(role, Action::UpdateAllocation, &ctx)?;
            new_activity
        };
        if retargeted {
            self.store.get_staff(replace.staff_id).await?;
            self.check_constraints(replace.staff_id, &new_activity, Some(existing.id))
                .await?;
        }

        let updated = Allocation {
            id: existing.id,
            activity_id: replace.activity_id,
            staff_id: replace.staff_id,
            offer_expiry: replace.offer_expiry,
            lecturer_approval: replace.lecturer_approval,
            ta_acceptance: replace.ta_acceptance,
            workforce_approval: replace.workforce_approval,
            version: existing.version,
            created_at: existing.created_at,
            updated_at: now,
        };
        let committed = self.store.update_allocation(updated).await?;
        tracing::info!(allocation = %committed.id, "allocation replaced");
        Ok(AllocationView::derive(committed, now))
    }

    /// Delete an allocation; legality is gated solely by the
    /// authorization matrix, not by workflow state.
    pub async fn delete_allocation(&self, actor_id: Uuid, allocation_id: Uuid) -> Result<()> {
        let actor = self.store.get_staff(actor_id).await?;
        let (allocation, _, unit) = self.allocation_context(allocation_id).await?;
        let now = self.clock.now();

        let role = self
            .resolve_role(&actor, unit.id, Action::DeleteAllocation)
            .await?;
        let ctx = AuthzContext::new(actor_id, now).with_allocation(&allocation);
        authorize(role, Action::DeleteAllocation, &ctx)?;

        self.store.delete_allocation(allocation_id).await?;
        tracing::info!(allocation = %allocation_id, "allocation deleted");
        Ok(())
    }

    /// Record the lecturer's decision; approval sends the offer to the
    /// assignee after the transition has committed.
    pub async fn set_lecturer_approval(
        &self,
        actor_id: Uuid,
        allocation_id: Uuid,
        approve: bool,
    ) -> Result<AllocationView> {
        let actor = self.store.get_staff(actor_id).await?;
        let (mut allocation, activity, unit) = self.allocation_context(allocation_id).await?;
        let now = self.clock.now();

        let role = self
            .resolve_role(&actor, unit.id, Action::SetLecturerApproval)
            .await?;
        let ctx = AuthzContext::new(actor_id, now).with_allocation(&allocation);
        authorize(role, Action::SetLecturerApproval, &ctx)?;

        allocation
            .set_lecturer_approval(approve, now)
            .map_err(Error::IllegalTransition)?;
        let committed = self.store.update_allocation(allocation).await?;
        tracing::debug!(allocation = %committed.id, approve, "lecturer approval recorded");

        if approve {
            let assignee = self.store.get_staff(committed.staff_id).await?;
            self.spawn_offer_notice(assignee, unit.label(), activity.activity_code.clone());
        }
        Ok(AllocationView::derive(committed, now))
    }

    /// Record the assignee's response; acceptance notifies every lecturer
    /// of the unit after the transition has committed.
    pub async fn set_ta_acceptance(
        &self,
        actor_id: Uuid,
        allocation_id: Uuid,
        accept: bool,
    ) -> Result<AllocationView> {
        let actor = self.store.get_staff(actor_id).await?;
        let (mut allocation, activity, unit) = self.allocation_context(allocation_id).await?;
        let now = self.clock.now();

        let role = self
            .resolve_role(&actor, unit.id, Action::SetTaAcceptance)
            .await?;
        let ctx = AuthzContext::new(actor_id, now).with_allocation(&allocation);
        authorize(role, Action::SetTaAcceptance, &ctx)?;

        allocation
            .set_ta_acceptance(accept, now)
            .map_err(Error::IllegalTransition)?;
        let committed = self.store.update_allocation(allocation).await?;
        tracing::debug!(allocation = %committed.id, accept, "assignee response recorded");

        if accept {
            let assignee = self.store.get_staff(committed.staff_id).await?;
            let lecturers = self
                .store
                .staff_with_title(unit.id, RoleTitle::Lecturer)
                .await;
            self.spawn_acceptance_notice(
                lecturers,
                assignee.full_name(),
                unit.label(),
                activity.activity_code.clone(),
            );
        }
        Ok(AllocationView::derive(committed, now))
    }

    /// Record the workforce decision.
    pub async fn set_workforce_approval(
        &self,
        actor_id: Uuid,
        allocation_id: Uuid,
        approve: bool,
    ) -> Result<AllocationView> {
        let actor = self.store.get_staff(actor_id).await?;
        let (mut allocation, _, unit) = self.allocation_context(allocation_id).await?;
        let now = self.clock.now();

        let role = self
            .resolve_role(&actor, unit.id, Action::SetWorkforceApproval)
            .await?;
        let ctx = AuthzContext::new(actor_id, now).with_allocation(&allocation);
        authorize(role, Action::SetWorkforceApproval, &ctx)?;

        allocation
            .set_workforce_approval(approve, now)
            .map_err(Error::IllegalTransition)?;
        let committed = self.store.update_allocation(allocation).await?;
        tracing::debug!(allocation = %committed.id, approve, "workforce approval recorded");
        Ok(AllocationView::derive(committed, now))
    }

    /// Read an allocation with its derived expiry/binding flags.
    pub async fn get_allocation(&self, allocation_id: Uuid) -> Result<AllocationView> {
        let allocation = self.store.get_allocation(allocation_id).await?;
        Ok(AllocationView::derive(allocation, self.clock.now()))
    }

    pub async fn allocations_for_staff(&self, staff_id: Uuid) -> Vec<AllocationView> {
        let now = self.clock.now();
        self.store
            .allocations_for_staff(staff_id)
            .await
            .into_iter()
            .map(|a| AllocationView::derive(a, now))
            .collect()
    }

    // ----- role records -----

    pub async fn get_roles_by_unit(&self, actor_id: Uuid, unit_id: Uuid) -> Result<Vec<Role>> {
        let actor = self.store.get_staff(actor_id).await?;
        self.store.get_unit(unit_id).await?;
        let role = self
            .resolve_role(&actor, unit_id, Action::GetRolesByUnit)
            .await?;
        authorize(
            role,
            Action::GetRolesByUnit,
            &AuthzContext::new(actor_id, self.clock.now()),
        )?;
        Ok(self.store.roles_for_unit(unit_id).await)
    }

    pub async fn create_role(
        &self,
        actor_id: Uuid,
        staff_id: Uuid,
        unit_id: Uuid,
        title: RoleTitle,
    ) -> Result<Role> {
        let actor = self.store.get_staff(actor_id).await?;
        self.store.get_unit(unit_id).await?;
        self.store.get_staff(staff_id).await?;
        let role = self.resolve_role(&actor, unit_id, Action::CreateRole).await?;
        authorize(
            role,
            Action::CreateRole,
            &AuthzContext::new(actor_id, self.clock.now()),
        )?;
        Ok(self.store.insert_role(Role::new(staff_id, unit_id, title)).await)
    }

    pub async fn update_role(&self, actor_id: Uuid, changed: Role) -> Result<Role> {
        let actor = self.store.get_staff(actor_id).await?;
        let existing = self.store.get_role(changed.id).await?;
        let role = self
            .resolve_role(&actor, existing.unit_id, Action::UpdateRole)
            .await?;
        authorize(
            role,
            Action::UpdateRole,
            &AuthzContext::new(actor_id, self.clock.now()),
        )?;
        // Moving the record to another unit needs standing there too.
        if changed.unit_id != existing.unit_id {
            let role = self
                .resolve_role(&actor, changed.unit_id, Action::UpdateRole)
                .await?;
            authorize(
                role,
                Action::UpdateRole,
                &AuthzContext::new(actor_id, self.clock.now()),
            )?;
        }
        self.store.update_role(changed).await
    }

    pub async fn delete_role(&self, actor_id: Uuid, role_id: Uuid) -> Result<()> {
        let actor = self.store.get_staff(actor_id).await?;
        let existing = self.store.get_role(role_id).await?;
        let role = self
            .resolve_role(&actor, existing.unit_id, Action::DeleteRole)
            .await?;
        authorize(
            role,
            Action::DeleteRole,
            &AuthzContext::new(actor_id, self.clock.now()),
        )?;
        self.store.delete_role(role_id).await
    }

    // ----- rules -----

    pub async fn list_rules(&self) -> Vec<Rule> {
        self.store.list_rules().await
    }

    /// Update a global policy rule. Rules are admin-mutable only; there is
    /// no per-unit standing that grants this.
    pub async fn update_rule(&self, actor_id: Uuid, name: RuleName, value: u32) -> Result<Rule> {
        let actor = self.store.get_staff(actor_id).await?;
        if !actor.is_admin {
            return Err(Error::unauthorized("staff", Action::UpdateRule.as_str()));
        }
        authorize(
            ActorRole::Admin,
            Action::UpdateRule,
            &AuthzContext::new(actor_id, self.clock.now()),
        )?;
        let rule = Rule::new(name, value, self.clock.now());
        tracing::info!(rule = name.as_str(), value, "rule updated");
        Ok(self.store.set_rule(rule).await)
    }

    // ----- swaps -----

    /// Open a swap request trading the holder's allocation for a slot in
    /// the desired activity.
    pub async fn create_swap(
        &self,
        actor_id: Uuid,
        from_allocation_id: Uuid,
        desired_activity_id: Uuid,
    ) -> Result<SwapView> {
        let actor = self.store.get_staff(actor_id).await?;
        let (from, _, unit) = self.allocation_context(from_allocation_id).await?;
        self.store.get_activity(desired_activity_id).await?;
        let now = self.clock.now();

        let role = self.resolve_role(&actor, unit.id, Action::CreateSwap).await?;
        let ctx = AuthzContext::new(actor_id, now).with_allocation(&from);
        authorize(role, Action::CreateSwap, &ctx)?;

        if from.ta_acceptance != Approval::Approved {
            return Err(Error::IllegalTransition(
                "only an accepted allocation can be offered for swap".to_string(),
            ));
        }

        let swap = self
            .store
            .insert_swap(Swap::new(from.id, desired_activity_id, now))
            .await;
        tracing::info!(swap = %swap.id, from = %from.id, "swap requested");
        Ok(SwapView::derive(swap, now))
    }

    /// Record the lecturer's decision on a swap.
    pub async fn set_swap_lecturer_approval(
        &self,
        actor_id: Uuid,
        swap_id: Uuid,
        approve: bool,
    ) -> Result<SwapView> {
        self.swap_approval(actor_id, swap_id, approve, Action::SetSwapLecturerApproval)
            .await
    }

    /// Record the workforce decision on a swap.
    pub async fn set_swap_workforce_approval(
        &self,
        actor_id: Uuid,
        swap_id: Uuid,
        approve: bool,
    ) -> Result<SwapView> {
        self.swap_approval(actor_id, swap_id, approve, Action::SetSwapWorkforceApproval)
            .await
    }

    async fn swap_approval(
        &self,
        actor_id: Uuid,
        swap_id: Uuid,
        approve: bool,
        action: Action,
    ) -> Result<SwapView> {
        let actor = self.store.get_staff(actor_id).await?;
        let mut swap = self.store.get_swap(swap_id).await?;
        // Swap roles resolve against the desired activity's parent unit:
        // that is where a counter-party slot would open up.
        let desired = self.store.get_activity(swap.desired_activity_id).await?;
        let now = self.clock.now();

        let role = self.resolve_role(&actor, desired.unit_id, action).await?;
        authorize(role, action, &AuthzContext::new(actor_id, now))?;

        match action {
            Action::SetSwapLecturerApproval => swap
                .set_lecturer_approval(approve, now)
                .map_err(Error::IllegalTransition)?,
            Action::SetSwapWorkforceApproval => swap
                .set_workforce_approval(approve, now)
                .map_err(Error::IllegalTransition)?,
            _ => unreachable!("swap_approval called with a non-swap action"),
        }
        tracing::debug!(swap = %swap.id, action = action.as_str(), approve, "swap approval recorded");

        if swap.both_approved() {
            return self.try_resolve(swap, now).await;
        }
        let committed = self.store.update_swap(swap).await?;
        Ok(SwapView::derive(committed, now))
    }

    /// Attach the counter-party allocation accepted out-of-band; if both
    /// approvals are already in, resolution runs immediately.
    pub async fn supply_swap_counterparty(
        &self,
        actor_id: Uuid,
        swap_id: Uuid,
        into_allocation_id: Uuid,
    ) -> Result<SwapView> {
        let actor = self.store.get_staff(actor_id).await?;
        let mut swap = self.store.get_swap(swap_id).await?;
        let desired = self.store.get_activity(swap.desired_activity_id).await?;
        let now = self.clock.now();

        let role = self
            .resolve_role(&actor, desired.unit_id, Action::SupplySwapCounterparty)
            .await?;
        authorize(
            role,
            Action::SupplySwapCounterparty,
            &AuthzContext::new(actor_id, now),
        )?;

        let into = self.store.get_allocation(into_allocation_id).await?;
        if into.activity_id != swap.desired_activity_id {
            return Err(Error::IllegalTransition(
                "counter-party allocation is not for the desired activity".to_string(),
            ));
        }

        swap.supply_counterparty(into.id, now)
            .map_err(Error::IllegalTransition)?;

        if swap.both_approved() {
            return self.try_resolve(swap, now).await;
        }
        let committed = self.store.update_swap(swap).await?;
        Ok(SwapView::derive(committed, now))
    }

    /// Re-attempt resolution of a both-approved swap. This is the retry
    /// path after a resolution attempt lost an allocation version race;
    /// the approval flags are already recorded, so the approval
    /// operations cannot be replayed to get the exchange re-run.
    pub async fn resolve_swap(&self, actor_id: Uuid, swap_id: Uuid) -> Result<SwapView> {
        let actor = self.store.get_staff(actor_id).await?;
        let swap = self.store.get_swap(swap_id).await?;
        let desired = self.store.get_activity(swap.desired_activity_id).await?;
        let now = self.clock.now();

        let role = self
            .resolve_role(&actor, desired.unit_id, Action::ResolveSwap)
            .await?;
        authorize(role, Action::ResolveSwap, &AuthzContext::new(actor_id, now))?;

        swap.check_live(now).map_err(Error::IllegalTransition)?;
        if !swap.both_approved() {
            return Err(Error::IllegalTransition(
                "swap has not been approved by both parties".to_string(),
            ));
        }
        self.try_resolve(swap, now).await
    }

    /// Resolve a fully-approved swap. Both allocations are loaded through
    /// the swap's weak references; either having been deleted voids the
    /// swap as a normal outcome rather than an error.
    async fn try_resolve(&self, mut swap: Swap, now: DateTime<Utc>) -> Result<SwapView> {
        let Some(into_id) = swap.into_allocation_id else {
            swap.status = SwapStatus::AwaitingCounterparty;
            let committed = self.store.update_swap(swap).await?;
            tracing::debug!(swap = %committed.id, "swap approved, awaiting counter-party");
            return Ok(SwapView::derive(committed, now));
        };

        let from = match self.store.get_allocation(swap.from_allocation_id).await {
            Ok(alloc) => Some(alloc),
            Err(Error::NotFound(_)) => None,
            Err(err) => return Err(err),
        };
        let into = match self.store.get_allocation(into_id).await {
            Ok(alloc) => Some(alloc),
            Err(Error::NotFound(_)) => None,
            Err(err) => return Err(err),
        };
        let (Some(from), Some(into)) = (from, into) else {
            swap.status = SwapStatus::Void;
            let committed = self.store.update_swap(swap).await?;
            tracing::info!(swap = %committed.id, "swap voided, referenced allocation gone");
            return Ok(SwapView::derive(committed, now));
        };

        // Claim the swap record first so only one resolver performs the
        // exchange; losers conflict out on the swap's version.
        swap.status = SwapStatus::Resolved;
        let mut committed = self.store.update_swap(swap).await?;

        match self
            .store
            .exchange_staff(from.id, from.version, into.id, into.version, now)
            .await
        {
            Ok(_) => {
                tracing::info!(swap = %committed.id, "swap resolved, staff exchanged");
                Ok(SwapView::derive(committed, now))
            }
            Err(Error::NotFound(_)) => {
                committed.status = SwapStatus::Void;
                let committed = self.store.update_swap(committed).await?;
                Ok(SwapView::derive(committed, now))
            }
            Err(err @ Error::ConcurrencyConflict { .. }) => {
                // Undo the claim; `resolve_swap` retries the exchange
                // from a fresh read with the approvals already in place.
                committed.status = SwapStatus::Pending;
                self.store.update_swap(committed).await?;
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    pub async fn get_swap(&self, swap_id: Uuid) -> Result<SwapView> {
        let swap = self.store.get_swap(swap_id).await?;
        Ok(SwapView::derive(swap, self.clock.now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::models::{Activity, Availability, DayOfWeek, Staff, Unit};
    use crate::notify::LogNotifier;
    use chrono::{NaiveTime, TimeZone};

    fn time(h: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, 0, 0).unwrap()
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
    }

    struct Fixture {
        manager: AllocationManager,
        admin: Staff,
        lecturer: Staff,
        ta: Staff,
        unit: Unit,
        activity: Activity,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(Store::new());
        let clock = Arc::new(FixedClock::new(start()));
        let manager = AllocationManager::new(
            Arc::clone(&store),
            Arc::new(LogNotifier),
            clock,
        );

        let admin = store
            .insert_staff(Staff::new("Wanda", "Workforce", "admin@uni.edu").admin())
            .await;
        let lecturer = store
            .insert_staff(Staff::new("Lee", "Lecturer", "lee@uni.edu"))
            .await;
        let ta = store
            .insert_staff(Staff::new("Tess", "Assistant", "tess@uni.edu"))
            .await;

        let unit = store
            .insert_unit(Unit::new("FIT3077", "S1", 2026, "CL"))
            .await
            .unwrap();
        let activity = store
            .insert_activity(Activity::new(
                unit.id,
                "T01",
                DayOfWeek::Monday,
                time(9),
                time(11),
            ))
            .await
            .unwrap();

        store
            .insert_role(Role::new(lecturer.id, unit.id, RoleTitle::Lecturer))
            .await;
        store
            .insert_role(Role::new(ta.id, unit.id, RoleTitle::Ta))
            .await;
        store
            .insert_availability(Availability::new(
                ta.id,
                DayOfWeek::Monday,
                time(8),
                time(18),
                2026,
            ))
            .await;

        Fixture {
            manager,
            admin,
            lecturer,
            ta,
            unit,
            activity,
        }
    }

    #[tokio::test]
    async fn test_lecturer_creates_allocation_in_own_unit() {
        let f = fixture().await;
        let view = f
            .manager
            .create_allocation(f.lecturer.id, f.ta.id, f.activity.id)
            .await
            .unwrap();
        assert!(view.allocation.lecturer_approval.is_pending());
        assert!(!view.expired);
        assert!(!view.binding);
    }

    #[tokio::test]
    async fn test_ta_cannot_create_allocation() {
        let f = fixture().await;
        let err = f
            .manager
            .create_allocation(f.ta.id, f.ta.id, f.activity.id)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Unauthorized { .. }));
    }

    #[tokio::test]
    async fn test_unaffiliated_staff_denied() {
        let f = fixture().await;
        let outsider = f
            .manager
            .store()
            .insert_staff(Staff::new("Out", "Sider", "out@uni.edu"))
            .await;
        let err = f
            .manager
            .create_allocation(outsider.id, f.ta.id, f.activity.id)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Unauthorized { .. }));
    }

    #[tokio::test]
    async fn test_create_rejects_unavailable_staff() {
        let f = fixture().await;
        // The lecturer has no availability records at all.
        let err = f
            .manager
            .create_allocation(f.admin.id, f.lecturer.id, f.activity.id)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ConstraintViolation(_)));
    }

    #[tokio::test]
    async fn test_full_approval_chain_becomes_binding() {
        let f = fixture().await;
        let alloc = f
            .manager
            .create_allocation(f.lecturer.id, f.ta.id, f.activity.id)
            .await
            .unwrap()
            .allocation;

        f.manager
            .set_lecturer_approval(f.lecturer.id, alloc.id, true)
            .await
            .unwrap();
        f.manager
            .set_ta_acceptance(f.ta.id, alloc.id, true)
            .await
            .unwrap();
        let view = f
            .manager
            .set_workforce_approval(f.admin.id, alloc.id, true)
            .await
            .unwrap();
        assert!(view.binding);
    }

    #[tokio::test]
    async fn test_double_lecturer_approval_fails() {
        let f = fixture().await;
        let alloc = f
            .manager
            .create_allocation(f.lecturer.id, f.ta.id, f.activity.id)
            .await
            .unwrap()
            .allocation;

        f.manager
            .set_lecturer_approval(f.lecturer.id, alloc.id, true)
            .await
            .unwrap();
        let err = f
            .manager
            .set_lecturer_approval(f.lecturer.id, alloc.id, true)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::IllegalTransition(_)));
    }

    #[tokio::test]
    async fn test_ta_cannot_respond_for_someone_else() {
        let f = fixture().await;
        let other = f
            .manager
            .store()
            .insert_staff(Staff::new("Oscar", "Other", "oscar@uni.edu"))
            .await;
        f.manager
            .store()
            .insert_role(Role::new(other.id, f.unit.id, RoleTitle::Ta))
            .await;
        let alloc = f
            .manager
            .create_allocation(f.lecturer.id, f.ta.id, f.activity.id)
            .await
            .unwrap()
            .allocation;
        f.manager
            .set_lecturer_approval(f.lecturer.id, alloc.id, true)
            .await
            .unwrap();

        let err = f
            .manager
            .set_ta_acceptance(other.id, alloc.id, true)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Unauthorized { .. }));
    }

    #[tokio::test]
    async fn test_update_rule_admin_only() {
        let f = fixture().await;
        assert!(f
            .manager
            .update_rule(f.lecturer.id, RuleName::MaxHours, 10)
            .await
            .is_err());
        let rule = f
            .manager
            .update_rule(f.admin.id, RuleName::MaxHours, 10)
            .await
            .unwrap();
        assert_eq!(rule.value, 10);
        assert_eq!(f.manager.list_rules().await.len(), 1);
    }

    #[tokio::test]
    async fn test_role_management() {
        let f = fixture().await;
        let newcomer = f
            .manager
            .store()
            .insert_staff(Staff::new("New", "Comer", "new@uni.edu"))
            .await;

        // TA cannot even list roles.
        assert!(f.manager.get_roles_by_unit(f.ta.id, f.unit.id).await.is_err());

        let created = f
            .manager
            .create_role(f.lecturer.id, newcomer.id, f.unit.id, RoleTitle::Ta)
            .await
            .unwrap();
        let roles = f
            .manager
            .get_roles_by_unit(f.lecturer.id, f.unit.id)
            .await
            .unwrap();
        assert_eq!(roles.len(), 3);

        f.manager.delete_role(f.admin.id, created.id).await.unwrap();
        assert_eq!(
            f.manager
                .get_roles_by_unit(f.admin.id, f.unit.id)
                .await
                .unwrap()
                .len(),
            2
        );
    }

    #[tokio::test]
    async fn test_update_retarget_reruns_constraints() {
        let f = fixture().await;
        let alloc = f
            .manager
            .create_allocation(f.lecturer.id, f.ta.id, f.activity.id)
            .await
            .unwrap()
            .allocation;

        // Retarget to the lecturer, who declared no availability.
        let err = f
            .manager
            .update_allocation(
                f.admin.id,
                alloc.id,
                AllocationReplace {
                    staff_id: f.lecturer.id,
                    activity_id: alloc.activity_id,
                    offer_expiry: alloc.offer_expiry,
                    lecturer_approval: alloc.lecturer_approval,
                    ta_acceptance: alloc.ta_acceptance,
                    workforce_approval: alloc.workforce_approval,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ConstraintViolation(_)));
    }

    #[tokio::test]
    async fn test_update_without_retarget_skips_constraints() {
        let f = fixture().await;
        let alloc = f
            .manager
            .create_allocation(f.lecturer.id, f.ta.id, f.activity.id)
            .await
            .unwrap()
            .allocation;

        // Administrative correction of flags only; no constraint re-check.
        let view = f
            .manager
            .update_allocation(
                f.admin.id,
                alloc.id,
                AllocationReplace {
                    staff_id: alloc.staff_id,
                    activity_id: alloc.activity_id,
                    offer_expiry: alloc.offer_expiry,
                    lecturer_approval: Approval::Approved,
                    ta_acceptance: alloc.ta_acceptance,
                    workforce_approval: Approval::Approved,
                },
            )
            .await
            .unwrap();
        assert_eq!(view.allocation.lecturer_approval, Approval::Approved);
        assert_eq!(view.allocation.workforce_approval, Approval::Approved);
    }
}
