//! In-memory entity store with per-record optimistic locking
//!
//! Backing tables are `RwLock`-guarded maps. Reads hand out cloned
//! snapshots; allocation and swap writes go through compare-and-swap on a
//! version counter, so two concurrent transitions on the same record can
//! never both commit. Losing writers get a retryable conflict error.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::allocation::{Allocation, Swap};
use crate::error::{Error, Result};
use crate::models::{Activity, Availability, Role, RoleTitle, Rule, RuleName, Staff, Unit};

/// Entity tables
#[derive(Default)]
pub struct Store {
    staff: RwLock<HashMap<Uuid, Staff>>,
    units: RwLock<HashMap<Uuid, Unit>>,
    activities: RwLock<HashMap<Uuid, Activity>>,
    availabilities: RwLock<HashMap<Uuid, Availability>>,
    roles: RwLock<HashMap<Uuid, Role>>,
    rules: RwLock<HashMap<RuleName, Rule>>,
    allocations: RwLock<HashMap<Uuid, Allocation>>,
    swaps: RwLock<HashMap<Uuid, Swap>>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    // ----- staff -----

    pub async fn insert_staff(&self, staff: Staff) -> Staff {
        let mut table = self.staff.write().await;
        table.insert(staff.id, staff.clone());
        staff
    }

    pub async fn get_staff(&self, id: Uuid) -> Result<Staff> {
        let table = self.staff.read().await;
        table
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("staff {}", id)))
    }

    pub async fn list_staff(&self) -> Vec<Staff> {
        let table = self.staff.read().await;
        table.values().cloned().collect()
    }

    // ----- units -----

    /// Insert a unit; the (code, period, year, campus) tuple must be unique.
    pub async fn insert_unit(&self, unit: Unit) -> Result<Unit> {
        let mut table = self.units.write().await;
        if table
            .values()
            .any(|u| u.offering_key() == unit.offering_key())
        {
            return Err(Error::ConstraintViolation(format!(
                "unit offering {} already exists",
                unit.label()
            )));
        }
        table.insert(unit.id, unit.clone());
        Ok(unit)
    }

    pub async fn get_unit(&self, id: Uuid) -> Result<Unit> {
        let table = self.units.read().await;
        table
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("unit {}", id)))
    }

    /// Delete a unit and cascade to its activities and their allocations.
    /// The cascade never runs upward.
    pub async fn delete_unit(&self, id: Uuid) -> Result<()> {
        let mut units = self.units.write().await;
        if units.remove(&id).is_none() {
            return Err(Error::not_found(format!("unit {}", id)));
        }
        let mut activities = self.activities.write().await;
        let doomed: Vec<Uuid> = activities
            .values()
            .filter(|a| a.unit_id == id)
            .map(|a| a.id)
            .collect();
        for activity_id in &doomed {
            activities.remove(activity_id);
        }
        let mut allocations = self.allocations.write().await;
        allocations.retain(|_, alloc| !doomed.contains(&alloc.activity_id));
        Ok(())
    }

    // ----- activities -----

    pub async fn insert_activity(&self, activity: Activity) -> Result<Activity> {
        // Parent unit must exist; ownership is Unit -> Activity.
        self.get_unit(activity.unit_id).await?;
        let mut table = self.activities.write().await;
        table.insert(activity.id, activity.clone());
        Ok(activity)
    }

    pub async fn get_activity(&self, id: Uuid) -> Result<Activity> {
        let table = self.activities.read().await;
        table
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("activity {}", id)))
    }

    pub async fn activities_for_unit(&self, unit_id: Uuid) -> Vec<Activity> {
        let table = self.activities.read().await;
        table
            .values()
            .filter(|a| a.unit_id == unit_id)
            .cloned()
            .collect()
    }

    /// Delete an activity and cascade to its allocations.
    pub async fn delete_activity(&self, id: Uuid) -> Result<()> {
        let mut activities = self.activities.write().await;
        if activities.remove(&id).is_none() {
            return Err(Error::not_found(format!("activity {}", id)));
        }
        let mut allocations = self.allocations.write().await;
        allocations.retain(|_, alloc| alloc.activity_id != id);
        Ok(())
    }

    // ----- availability -----

    pub async fn insert_availability(&self, availability: Availability) -> Availability {
        let mut table = self.availabilities.write().await;
        table.insert(availability.id, availability.clone());
        availability
    }

    pub async fn availabilities_for_staff(&self, staff_id: Uuid) -> Vec<Availability> {
        let table = self.availabilities.read().await;
        table
            .values()
            .filter(|a| a.staff_id == staff_id)
            .cloned()
            .collect()
    }

    // ----- roles -----

    pub async fn insert_role(&self, role: Role) -> Role {
        let mut table = self.roles.write().await;
        table.insert(role.id, role.clone());
        role
    }

    pub async fn get_role(&self, id: Uuid) -> Result<Role> {
        let table = self.roles.read().await;
        table
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("role {}", id)))
    }

    pub async fn update_role(&self, role: Role) -> Result<Role> {
        let mut table = self.roles.write().await;
        if !table.contains_key(&role.id) {
            return Err(Error::not_found(format!("role {}", role.id)));
        }
        table.insert(role.id, role.clone());
        Ok(role)
    }

    pub async fn delete_role(&self, id: Uuid) -> Result<()> {
        let mut table = self.roles.write().await;
        table
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| Error::not_found(format!("role {}", id)))
    }

    /// The role a staff member holds for a specific unit, if any
    pub async fn role_for(&self, staff_id: Uuid, unit_id: Uuid) -> Option<Role> {
        let table = self.roles.read().await;
        table
            .values()
            .find(|r| r.staff_id == staff_id && r.unit_id == unit_id)
            .cloned()
    }

    pub async fn roles_for_unit(&self, unit_id: Uuid) -> Vec<Role> {
        let table = self.roles.read().await;
        table
            .values()
            .filter(|r| r.unit_id == unit_id)
            .cloned()
            .collect()
    }

    /// Staff holding a given title for a unit, in one consistent read
    pub async fn staff_with_title(&self, unit_id: Uuid, title: RoleTitle) -> Vec<Staff> {
        let roles = self.roles.read().await;
        let staff = self.staff.read().await;
        roles
            .values()
            .filter(|r| r.unit_id == unit_id && r.title == title)
            .filter_map(|r| staff.get(&r.staff_id).cloned())
            .collect()
    }

    // ----- rules -----

    pub async fn set_rule(&self, rule: Rule) -> Rule {
        let mut table = self.rules.write().await;
        table.insert(rule.name, rule.clone());
        rule
    }

    pub async fn get_rule(&self, name: RuleName) -> Option<Rule> {
        let table = self.rules.read().await;
        table.get(&name).cloned()
    }

    pub async fn list_rules(&self) -> Vec<Rule> {
        let table = self.rules.read().await;
        table.values().cloned().collect()
    }

    // ----- allocations -----

    pub async fn insert_allocation(&self, allocation: Allocation) -> Allocation {
        let mut table = self.allocations.write().await;
        table.insert(allocation.id, allocation.clone());
        allocation
    }

    pub async fn get_allocation(&self, id: Uuid) -> Result<Allocation> {
        let table = self.allocations.read().await;
        table
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("allocation {}", id)))
    }

    pub async fn allocations_for_staff(&self, staff_id: Uuid) -> Vec<Allocation> {
        let table = self.allocations.read().await;
        table
            .values()
            .filter(|a| a.staff_id == staff_id)
            .cloned()
            .collect()
    }

    pub async fn allocations_for_activity(&self, activity_id: Uuid) -> Vec<Allocation> {
        let table = self.allocations.read().await;
        table
            .values()
            .filter(|a| a.activity_id == activity_id)
            .cloned()
            .collect()
    }

    /// Staff workload snapshot for the constraint checker: the staff
    /// member's allocations joined with their activities, read under both
    /// table locks at once so a partially-committed set is never observed.
    pub async fn workload_for_staff(
        &self,
        staff_id: Uuid,
        exclude: Option<Uuid>,
    ) -> Vec<(Allocation, Activity)> {
        let allocations = self.allocations.read().await;
        let activities = self.activities.read().await;
        allocations
            .values()
            .filter(|a| a.staff_id == staff_id && Some(a.id) != exclude)
            .filter_map(|a| {
                activities
                    .get(&a.activity_id)
                    .map(|act| (a.clone(), act.clone()))
            })
            .collect()
    }

    /// Commit a modified allocation if nobody moved the record since the
    /// snapshot was taken. The stored version counter advances on success.
    pub async fn update_allocation(&self, updated: Allocation) -> Result<Allocation> {
        let mut table = self.allocations.write().await;
        let current = table
            .get(&updated.id)
            .ok_or_else(|| Error::not_found(format!("allocation {}", updated.id)))?;
        if current.version != updated.version {
            return Err(Error::ConcurrencyConflict {
                entity: "allocation",
                id: updated.id,
            });
        }
        let mut committed = updated;
        committed.version += 1;
        table.insert(committed.id, committed.clone());
        Ok(committed)
    }

    pub async fn delete_allocation(&self, id: Uuid) -> Result<()> {
        let mut table = self.allocations.write().await;
        table
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| Error::not_found(format!("allocation {}", id)))
    }

    /// Exchange the staff assignment between two allocations under a
    /// single table lock: both commit or neither does.
    pub async fn exchange_staff(
        &self,
        a_id: Uuid,
        a_version: u64,
        b_id: Uuid,
        b_version: u64,
        now: DateTime<Utc>,
    ) -> Result<(Allocation, Allocation)> {
        let mut table = self.allocations.write().await;
        let a = table
            .get(&a_id)
            .ok_or_else(|| Error::not_found(format!("allocation {}", a_id)))?;
        let b = table
            .get(&b_id)
            .ok_or_else(|| Error::not_found(format!("allocation {}", b_id)))?;
        if a.version != a_version {
            return Err(Error::ConcurrencyConflict {
                entity: "allocation",
                id: a_id,
            });
        }
        if b.version != b_version {
            return Err(Error::ConcurrencyConflict {
                entity: "allocation",
                id: b_id,
            });
        }

        let staff_a = a.staff_id;
        let staff_b = b.staff_id;
        // All preconditions hold; now both writes happen under the one lock.
        let a = table.get_mut(&a_id).expect("checked above");
        a.staff_id = staff_b;
        a.version += 1;
        a.updated_at = now;
        let a = a.clone();
        let b = table.get_mut(&b_id).expect("checked above");
        b.staff_id = staff_a;
        b.version += 1;
        b.updated_at = now;
        let b = b.clone();
        Ok((a, b))
    }

    // ----- swaps -----

    pub async fn insert_swap(&self, swap: Swap) -> Swap {
        let mut table = self.swaps.write().await;
        table.insert(swap.id, swap.clone());
        swap
    }

    pub async fn get_swap(&self, id: Uuid) -> Result<Swap> {
        let table = self.swaps.read().await;
        table
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("swap {}", id)))
    }

    pub async fn swaps_for_activity(&self, desired_activity_id: Uuid) -> Vec<Swap> {
        let table = self.swaps.read().await;
        table
            .values()
            .filter(|s| s.desired_activity_id == desired_activity_id)
            .cloned()
            .collect()
    }

    /// Compare-and-swap commit for a swap record.
    pub async fn update_swap(&self, updated: Swap) -> Result<Swap> {
        let mut table = self.swaps.write().await;
        let current = table
            .get(&updated.id)
            .ok_or_else(|| Error::not_found(format!("swap {}", updated.id)))?;
        if current.version != updated.version {
            return Err(Error::ConcurrencyConflict {
                entity: "swap",
                id: updated.id,
            });
        }
        let mut committed = updated;
        committed.version += 1;
        table.insert(committed.id, committed.clone());
        Ok(committed)
    }
}
