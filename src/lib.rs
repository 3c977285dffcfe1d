//! Teaching-staff allocation with a three-party approval lifecycle.
//!
//! The crate models units, activities and staff, and runs allocation
//! offers through lecturer approval, assignee acceptance and workforce
//! sign-off. Authorization is a role × operation matrix resolved per
//! unit, scheduling constraints gate every assignment, and all records
//! commit through per-record optimistic locking. A swap sub-protocol
//! lets an assignee trade an accepted allocation for another activity.
//!
//! [`allocation::AllocationManager`] is the entry point; it owns a
//! [`store::Store`], a [`notify::Notifier`] and a [`clock::Clock`].

pub mod allocation;
pub mod clock;
pub mod error;
pub mod models;
pub mod notify;
pub mod store;

pub use allocation::{AllocationManager, AllocationView, Approval, SwapStatus, SwapView};
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{Error, Result};
pub use store::Store;
