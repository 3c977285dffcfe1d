//! Swap requests: trading an allocation for another activity
//!
//! A swap references its allocations weakly by id; it never owns their
//! lifecycle and must tolerate either having been deleted since.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::record::{Approval, OFFER_VALIDITY_DAYS};

/// Lifecycle of a swap request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapStatus {
    /// Awaiting lecturer and/or workforce approval
    Pending,
    /// Both parties approved but no counter-party allocation yet
    AwaitingCounterparty,
    /// Staff assignments exchanged
    Resolved,
    /// A party rejected; original allocations untouched
    Discarded,
    /// A referenced allocation disappeared before resolution
    Void,
}

impl SwapStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SwapStatus::Pending => "pending",
            SwapStatus::AwaitingCounterparty => "awaiting_counterparty",
            SwapStatus::Resolved => "resolved",
            SwapStatus::Discarded => "discarded",
            SwapStatus::Void => "void",
        }
    }

    /// Terminal states accept no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SwapStatus::Resolved | SwapStatus::Discarded | SwapStatus::Void
        )
    }
}

impl std::str::FromStr for SwapStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(SwapStatus::Pending),
            "awaiting_counterparty" => Ok(SwapStatus::AwaitingCounterparty),
            "resolved" => Ok(SwapStatus::Resolved),
            "discarded" => Ok(SwapStatus::Discarded),
            "void" => Ok(SwapStatus::Void),
            _ => Err(format!("Invalid swap status: {}", s)),
        }
    }
}

/// A proposed exchange of the initiator's allocation for another activity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Swap {
    pub id: Uuid,
    /// The initiating staff member's current allocation (weak reference)
    pub from_allocation_id: Uuid,
    /// The activity the initiator wants to move into
    pub desired_activity_id: Uuid,
    /// Counter-party allocation, populated once one accepts (weak reference)
    pub into_allocation_id: Option<Uuid>,
    pub lecturer_approval: Approval,
    pub workforce_approval: Approval,
    pub status: SwapStatus,
    pub requested_at: DateTime<Utc>,
    /// An approved-but-unmatched swap lapses at this instant rather than
    /// staying open forever
    pub expires_at: DateTime<Utc>,
    /// Optimistic-lock counter, bumped by the store on every commit
    pub version: u64,
}

impl Swap {
    pub fn new(from_allocation_id: Uuid, desired_activity_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            from_allocation_id,
            desired_activity_id,
            into_allocation_id: None,
            lecturer_approval: Approval::Pending,
            workforce_approval: Approval::Pending,
            status: SwapStatus::Pending,
            requested_at: now,
            expires_at: now + Duration::days(OFFER_VALIDITY_DAYS),
            version: 0,
        }
    }

    /// Derived, never persisted: still open but past its deadline
    pub fn is_lapsed(&self, now: DateTime<Utc>) -> bool {
        !self.status.is_terminal() && now >= self.expires_at
    }

    pub fn both_approved(&self) -> bool {
        self.lecturer_approval == Approval::Approved
            && self.workforce_approval == Approval::Approved
    }

    /// Guard shared by every transition: terminal and lapsed swaps accept
    /// no further operations.
    pub(crate) fn check_live(&self, now: DateTime<Utc>) -> Result<(), String> {
        if self.status.is_terminal() {
            return Err(format!("swap is already {}", self.status.as_str()));
        }
        if self.is_lapsed(now) {
            return Err("swap request has lapsed".to_string());
        }
        Ok(())
    }

    /// Record the lecturer's decision; rejection discards the swap.
    pub fn set_lecturer_approval(
        &mut self,
        approve: bool,
        now: DateTime<Utc>,
    ) -> Result<(), String> {
        self.check_live(now)?;
        if !self.lecturer_approval.is_pending() {
            return Err(format!(
                "lecturer approval already recorded as {}",
                self.lecturer_approval.as_str()
            ));
        }
        self.lecturer_approval = Approval::from_decision(approve);
        if !approve {
            self.status = SwapStatus::Discarded;
        }
        Ok(())
    }

    /// Record the workforce decision; rejection discards the swap.
    pub fn set_workforce_approval(
        &mut self,
        approve: bool,
        now: DateTime<Utc>,
    ) -> Result<(), String> {
        self.check_live(now)?;
        if !self.workforce_approval.is_pending() {
            return Err(format!(
                "workforce approval already recorded as {}",
                self.workforce_approval.as_str()
            ));
        }
        self.workforce_approval = Approval::from_decision(approve);
        if !approve {
            self.status = SwapStatus::Discarded;
        }
        Ok(())
    }

    /// Attach the counter-party allocation accepted out-of-band.
    pub fn supply_counterparty(&mut self, into: Uuid, now: DateTime<Utc>) -> Result<(), String> {
        self.check_live(now)?;
        if self.into_allocation_id.is_some() {
            return Err("counter-party allocation already supplied".to_string());
        }
        self.into_allocation_id = Some(into);
        if self.status == SwapStatus::AwaitingCounterparty {
            self.status = SwapStatus::Pending;
        }
        Ok(())
    }
}

/// Read-boundary projection of a swap with its derived lapse flag
#[derive(Debug, Clone, Serialize)]
pub struct SwapView {
    pub swap: Swap,
    pub lapsed: bool,
}

impl SwapView {
    pub fn derive(swap: Swap, now: DateTime<Utc>) -> Self {
        let lapsed = swap.is_lapsed(now);
        Self { swap, lapsed }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, day, 12, 0, 0).unwrap()
    }

    fn fresh() -> Swap {
        Swap::new(Uuid::new_v4(), Uuid::new_v4(), at(1))
    }

    #[test]
    fn test_swap_status_round_trip() {
        for status in [
            SwapStatus::Pending,
            SwapStatus::AwaitingCounterparty,
            SwapStatus::Resolved,
            SwapStatus::Discarded,
            SwapStatus::Void,
        ] {
            assert_eq!(status.as_str().parse::<SwapStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_new_swap_pending() {
        let swap = fresh();
        assert_eq!(swap.status, SwapStatus::Pending);
        assert!(swap.lecturer_approval.is_pending());
        assert!(swap.workforce_approval.is_pending());
        assert!(swap.into_allocation_id.is_none());
        assert!(!swap.both_approved());
    }

    #[test]
    fn test_rejection_discards_swap() {
        let mut swap = fresh();
        swap.set_lecturer_approval(false, at(1)).unwrap();
        assert_eq!(swap.status, SwapStatus::Discarded);

        // Nothing further is legal once discarded.
        assert!(swap.set_workforce_approval(true, at(1)).is_err());
        assert!(swap.supply_counterparty(Uuid::new_v4(), at(1)).is_err());
    }

    #[test]
    fn test_double_approval_rejected() {
        let mut swap = fresh();
        swap.set_workforce_approval(true, at(1)).unwrap();
        let err = swap.set_workforce_approval(true, at(1)).unwrap_err();
        assert!(err.contains("already recorded"));
    }

    #[test]
    fn test_both_approved_either_order() {
        let mut a = fresh();
        a.set_lecturer_approval(true, at(1)).unwrap();
        a.set_workforce_approval(true, at(1)).unwrap();
        assert!(a.both_approved());

        let mut b = fresh();
        b.set_workforce_approval(true, at(1)).unwrap();
        b.set_lecturer_approval(true, at(1)).unwrap();
        assert!(b.both_approved());
    }

    #[test]
    fn test_lapsed_swap_accepts_no_transitions() {
        let mut swap = fresh();
        assert!(swap.is_lapsed(at(20)));
        let err = swap.set_lecturer_approval(true, at(20)).unwrap_err();
        assert!(err.contains("lapsed"));
    }

    #[test]
    fn test_resolved_swap_never_lapses() {
        let mut swap = fresh();
        swap.status = SwapStatus::Resolved;
        assert!(!swap.is_lapsed(at(20)));
    }

    #[test]
    fn test_supply_counterparty_once() {
        let mut swap = fresh();
        let into = Uuid::new_v4();
        swap.supply_counterparty(into, at(1)).unwrap();
        assert_eq!(swap.into_allocation_id, Some(into));
        assert!(swap.supply_counterparty(Uuid::new_v4(), at(1)).is_err());
    }

    #[test]
    fn test_supply_counterparty_reopens_awaiting() {
        let mut swap = fresh();
        swap.set_lecturer_approval(true, at(1)).unwrap();
        swap.set_workforce_approval(true, at(1)).unwrap();
        swap.status = SwapStatus::AwaitingCounterparty;

        swap.supply_counterparty(Uuid::new_v4(), at(2)).unwrap();
        assert_eq!(swap.status, SwapStatus::Pending);
    }
}
