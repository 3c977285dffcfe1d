//! Allocation records and the three-party approval state machine
//!
//! An allocation assigns one staff member to one activity. It becomes
//! binding only once lecturer, assignee and workforce have all approved;
//! a single rejection, or expiry before the assignee responds, kills it.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Days an offer stays open before it expires, unless overridden
pub const OFFER_VALIDITY_DAYS: i64 = 7;

/// Response state of one approval party.
///
/// Modelled as a closed three-valued enum rather than a nullable boolean
/// so transition legality is a total function over the state set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Approval {
    /// No response recorded yet
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl Approval {
    pub fn as_str(&self) -> &'static str {
        match self {
            Approval::Pending => "pending",
            Approval::Approved => "approved",
            Approval::Rejected => "rejected",
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Approval::Pending)
    }

    /// Map a yes/no decision onto the recorded state
    pub fn from_decision(approve: bool) -> Self {
        if approve {
            Approval::Approved
        } else {
            Approval::Rejected
        }
    }
}

impl std::str::FromStr for Approval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Approval::Pending),
            "approved" => Ok(Approval::Approved),
            "rejected" => Ok(Approval::Rejected),
            _ => Err(format!("Invalid approval state: {}", s)),
        }
    }
}

/// Assignment of one staff member to one activity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Allocation {
    pub id: Uuid,
    pub activity_id: Uuid,
    pub staff_id: Uuid,
    /// The assignee must respond before this instant
    pub offer_expiry: DateTime<Utc>,
    pub lecturer_approval: Approval,
    pub ta_acceptance: Approval,
    pub workforce_approval: Approval,
    /// Optimistic-lock counter, bumped by the store on every commit
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Allocation {
    /// Create a fresh allocation with every approval pending.
    ///
    /// All three flags start [`Approval::Pending`]; "not yet responded"
    /// is a distinct state from a recorded rejection.
    pub fn new(activity_id: Uuid, staff_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            activity_id,
            staff_id,
            offer_expiry: now + Duration::days(OFFER_VALIDITY_DAYS),
            lecturer_approval: Approval::Pending,
            ta_acceptance: Approval::Pending,
            workforce_approval: Approval::Pending,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Derived, never persisted: the offer window has closed
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.offer_expiry
    }

    /// All three parties have approved
    pub fn is_binding(&self) -> bool {
        self.lecturer_approval == Approval::Approved
            && self.ta_acceptance == Approval::Approved
            && self.workforce_approval == Approval::Approved
    }

    /// No longer actionable: any party rejected, or the offer expired
    /// while the assignee had not yet responded. Expiry never undoes an
    /// already-recorded acceptance.
    pub fn is_dead(&self, now: DateTime<Utc>) -> bool {
        self.lecturer_approval == Approval::Rejected
            || self.ta_acceptance == Approval::Rejected
            || self.workforce_approval == Approval::Rejected
            || (self.is_expired(now) && self.ta_acceptance.is_pending())
    }

    /// Record the lecturer's decision. Legal only while the lecturer has
    /// not yet responded and the allocation is still live.
    pub fn set_lecturer_approval(
        &mut self,
        approve: bool,
        now: DateTime<Utc>,
    ) -> Result<(), String> {
        if self.is_dead(now) {
            return Err("allocation is no longer actionable".to_string());
        }
        if !self.lecturer_approval.is_pending() {
            return Err(format!(
                "lecturer approval already recorded as {}",
                self.lecturer_approval.as_str()
            ));
        }
        self.lecturer_approval = Approval::from_decision(approve);
        self.updated_at = now;
        Ok(())
    }

    /// Record the assignee's response. Legal only after lecturer approval,
    /// while the assignee has not responded and the offer has not expired.
    pub fn set_ta_acceptance(&mut self, accept: bool, now: DateTime<Utc>) -> Result<(), String> {
        if self.is_expired(now) && self.ta_acceptance.is_pending() {
            return Err("offer has expired".to_string());
        }
        if self.is_dead(now) {
            return Err("allocation is no longer actionable".to_string());
        }
        if self.lecturer_approval != Approval::Approved {
            return Err("offer has not been approved by the lecturer".to_string());
        }
        if !self.ta_acceptance.is_pending() {
            return Err(format!(
                "assignee response already recorded as {}",
                self.ta_acceptance.as_str()
            ));
        }
        self.ta_acceptance = Approval::from_decision(accept);
        self.updated_at = now;
        Ok(())
    }

    /// Record the workforce decision. Independent of the other two flags;
    /// legal at any point before the allocation is binding or dead.
    pub fn set_workforce_approval(
        &mut self,
        approve: bool,
        now: DateTime<Utc>,
    ) -> Result<(), String> {
        if self.is_dead(now) {
            return Err("allocation is no longer actionable".to_string());
        }
        if !self.workforce_approval.is_pending() {
            return Err(format!(
                "workforce approval already recorded as {}",
                self.workforce_approval.as_str()
            ));
        }
        self.workforce_approval = Approval::from_decision(approve);
        self.updated_at = now;
        Ok(())
    }
}

/// Read-boundary projection of an allocation with its derived flags.
///
/// `expired` is recomputed on every read and never written back, so it
/// can never go stale in storage.
#[derive(Debug, Clone, Serialize)]
pub struct AllocationView {
    pub allocation: Allocation,
    pub expired: bool,
    pub binding: bool,
    pub dead: bool,
}

impl AllocationView {
    pub fn derive(allocation: Allocation, now: DateTime<Utc>) -> Self {
        let expired = allocation.is_expired(now);
        let binding = allocation.is_binding();
        let dead = allocation.is_dead(now);
        Self {
            allocation,
            expired,
            binding,
            dead,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, day, 12, 0, 0).unwrap()
    }

    fn fresh() -> Allocation {
        Allocation::new(Uuid::new_v4(), Uuid::new_v4(), at(1))
    }

    #[test]
    fn test_approval_round_trip() {
        for state in [Approval::Pending, Approval::Approved, Approval::Rejected] {
            assert_eq!(state.as_str().parse::<Approval>().unwrap(), state);
        }
        assert!("maybe".parse::<Approval>().is_err());
    }

    #[test]
    fn test_new_allocation_all_pending() {
        let alloc = fresh();
        assert!(alloc.lecturer_approval.is_pending());
        assert!(alloc.ta_acceptance.is_pending());
        assert!(alloc.workforce_approval.is_pending());
        assert_eq!(alloc.offer_expiry, at(1) + Duration::days(7));
        assert_eq!(alloc.version, 0);
    }

    #[test]
    fn test_expiry_is_pure_function_of_now() {
        let alloc = fresh();
        assert!(!alloc.is_expired(at(1)));
        assert!(!alloc.is_expired(at(7)));
        assert!(alloc.is_expired(at(1) + Duration::days(7)));
        assert!(alloc.is_expired(at(20)));
    }

    #[test]
    fn test_lecturer_approval_idempotent_rejecting() {
        let mut alloc = fresh();
        assert!(alloc.set_lecturer_approval(true, at(1)).is_ok());
        assert_eq!(alloc.lecturer_approval, Approval::Approved);

        let err = alloc.set_lecturer_approval(true, at(1)).unwrap_err();
        assert!(err.contains("already recorded"));
    }

    #[test]
    fn test_lecturer_rejection_kills_allocation() {
        let mut alloc = fresh();
        alloc.set_lecturer_approval(false, at(1)).unwrap();
        assert!(alloc.is_dead(at(1)));
        assert!(alloc.set_workforce_approval(true, at(1)).is_err());
        assert!(alloc.set_ta_acceptance(true, at(1)).is_err());
    }

    #[test]
    fn test_ta_acceptance_requires_lecturer_approval() {
        let mut alloc = fresh();
        let err = alloc.set_ta_acceptance(true, at(1)).unwrap_err();
        assert!(err.contains("lecturer"));

        alloc.set_lecturer_approval(true, at(1)).unwrap();
        assert!(alloc.set_ta_acceptance(true, at(2)).is_ok());
        assert_eq!(alloc.ta_acceptance, Approval::Approved);
    }

    #[test]
    fn test_ta_acceptance_blocked_after_expiry() {
        let mut alloc = fresh();
        alloc.set_lecturer_approval(true, at(1)).unwrap();
        let err = alloc.set_ta_acceptance(true, at(20)).unwrap_err();
        assert!(err.contains("expired"));
    }

    #[test]
    fn test_expiry_does_not_undo_recorded_acceptance() {
        let mut alloc = fresh();
        alloc.set_lecturer_approval(true, at(1)).unwrap();
        alloc.set_ta_acceptance(true, at(2)).unwrap();

        // Well past the offer window: still not dead, acceptance stands.
        assert!(alloc.is_expired(at(20)));
        assert!(!alloc.is_dead(at(20)));
        assert!(alloc.set_workforce_approval(true, at(20)).is_ok());
        assert!(alloc.is_binding());
    }

    #[test]
    fn test_expired_unanswered_offer_is_dead() {
        let alloc = fresh();
        assert!(!alloc.is_dead(at(2)));
        assert!(alloc.is_dead(at(20)));
    }

    #[test]
    fn test_workforce_approval_independent_of_order() {
        let mut alloc = fresh();
        assert!(alloc.set_workforce_approval(true, at(1)).is_ok());
        assert!(alloc.set_lecturer_approval(true, at(1)).is_ok());
        assert!(alloc.set_ta_acceptance(true, at(2)).is_ok());
        assert!(alloc.is_binding());
    }

    #[test]
    fn test_workforce_rejection_kills_allocation() {
        let mut alloc = fresh();
        alloc.set_workforce_approval(false, at(1)).unwrap();
        assert!(alloc.is_dead(at(1)));
        assert!(alloc.set_lecturer_approval(true, at(1)).is_err());
    }

    #[test]
    fn test_binding_requires_all_three() {
        let mut alloc = fresh();
        alloc.set_lecturer_approval(true, at(1)).unwrap();
        alloc.set_ta_acceptance(true, at(2)).unwrap();
        assert!(!alloc.is_binding());
        alloc.set_workforce_approval(true, at(2)).unwrap();
        assert!(alloc.is_binding());
    }

    #[test]
    fn test_view_derives_flags_without_mutation() {
        let alloc = fresh();
        let stored = alloc.clone();

        let view = AllocationView::derive(alloc, at(20));
        assert!(view.expired);
        assert!(view.dead);
        assert!(!view.binding);
        // Derivation never touches stored state.
        assert_eq!(view.allocation.offer_expiry, stored.offer_expiry);
        assert!(view.allocation.ta_acceptance.is_pending());
    }
}
