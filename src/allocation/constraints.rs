//! Workload and availability gate for allocation create/retarget
//!
//! A pure decision function over a consistent snapshot of the staff
//! member's declared availability, their other allocations and the global
//! rules. Runs synchronously before any allocation create or retargeting
//! update commits, against the prospective final state.

use serde::Serialize;

use crate::models::{Activity, Availability, Rule, RuleName};

use super::record::{Allocation, Approval};

/// Fallback limits when no rule record exists
pub const DEFAULT_MAX_HOURS: u32 = 20;
pub const DEFAULT_MAX_NUMBER_ACTIVITIES: u32 = 6;

/// Global caps, tightened by any per-staff availability caps
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub max_hours: u32,
    pub max_number_activities: u32,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_hours: DEFAULT_MAX_HOURS,
            max_number_activities: DEFAULT_MAX_NUMBER_ACTIVITIES,
        }
    }
}

impl Limits {
    pub fn from_rules(rules: &[Rule]) -> Self {
        let mut limits = Self::default();
        for rule in rules {
            match rule.name {
                RuleName::MaxHours => limits.max_hours = rule.value,
                RuleName::MaxNumberActivities => limits.max_number_activities = rule.value,
            }
        }
        limits
    }

    /// Apply per-staff caps from availability records; the tightest wins.
    fn tightened_by(mut self, availabilities: &[&Availability]) -> Self {
        for avail in availabilities {
            self.max_hours = self.max_hours.min(avail.max_hours);
            self.max_number_activities =
                self.max_number_activities.min(avail.max_number_activities);
        }
        self
    }
}

/// Snapshot the checker decides over.
///
/// `commitments` holds the staff member's other allocations joined with
/// their activities, excluding any record the candidate is replacing.
#[derive(Debug)]
pub struct ConstraintContext<'a> {
    pub candidate: &'a Activity,
    pub availabilities: &'a [Availability],
    pub commitments: &'a [(Allocation, Activity)],
    pub limits: Limits,
    /// Offering year of the candidate's parent unit; availability windows
    /// declared for other years do not apply.
    pub year: i32,
}

/// Accept, or reject with a human-readable reason
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintOutcome {
    Satisfied,
    Violated(String),
}

impl ConstraintOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, ConstraintOutcome::Satisfied)
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            ConstraintOutcome::Satisfied => None,
            ConstraintOutcome::Violated(reason) => Some(reason),
        }
    }
}

/// Hours the staff member is already committed to: the summed duration of
/// activities whose allocation the assignee has accepted.
fn committed_hours(commitments: &[(Allocation, Activity)]) -> f64 {
    commitments
        .iter()
        .filter(|(alloc, _)| alloc.ta_acceptance == Approval::Approved)
        .map(|(_, activity)| activity.duration_hours())
        .sum()
}

/// Evaluate the candidate (staff, activity) pair against the snapshot.
pub fn evaluate(ctx: &ConstraintContext<'_>) -> ConstraintOutcome {
    let candidate = ctx.candidate;
    let windows: Vec<&Availability> = ctx
        .availabilities
        .iter()
        .filter(|avail| avail.year == ctx.year)
        .collect();
    let limits = ctx.limits.tightened_by(&windows);

    let covered = windows.iter().any(|avail| avail.covers(candidate));
    if !covered {
        return ConstraintOutcome::Violated(format!(
            "no availability covers {} {}-{}",
            candidate.day_of_week.as_str(),
            candidate.start_time.format("%H:%M"),
            candidate.end_time.format("%H:%M"),
        ));
    }

    let committed = committed_hours(ctx.commitments);
    let prospective = committed + candidate.duration_hours();
    if prospective > limits.max_hours as f64 {
        return ConstraintOutcome::Violated(format!(
            "weekly hours would reach {:.1}, over the cap of {}",
            prospective, limits.max_hours,
        ));
    }

    let prospective_count = ctx.commitments.len() + 1;
    if prospective_count > limits.max_number_activities as usize {
        return ConstraintOutcome::Violated(format!(
            "activity count would reach {}, over the cap of {}",
            prospective_count, limits.max_number_activities,
        ));
    }

    ConstraintOutcome::Satisfied
}
