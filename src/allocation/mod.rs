//! The allocation workflow: offers, three-party approval and swaps
//!
//! An allocation offers a staff member a teaching activity and becomes
//! binding only once the lecturer, the assignee and the workforce have
//! all approved it. Expiry is derived at read time from the offer
//! deadline and is never written back. Swaps trade a held allocation for
//! a slot in another activity under a separate two-party approval.

pub mod authz;
pub mod constraints;
pub mod manager;
pub mod record;
pub mod swap;

pub use authz::{authorize, Access, Action, ActorRole, AuthzContext, Condition};
pub use constraints::{evaluate, ConstraintContext, ConstraintOutcome, Limits};
pub use manager::{AllocationManager, AllocationReplace};
pub use record::{Allocation, AllocationView, Approval, OFFER_VALIDITY_DAYS};
pub use swap::{Swap, SwapStatus, SwapView};
