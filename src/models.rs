//! Entity types for units, activities, staff and policy rules

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Day of week an activity or availability window falls on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl DayOfWeek {
    pub fn as_str(&self) -> &'static str {
        match self {
            DayOfWeek::Monday => "monday",
            DayOfWeek::Tuesday => "tuesday",
            DayOfWeek::Wednesday => "wednesday",
            DayOfWeek::Thursday => "thursday",
            DayOfWeek::Friday => "friday",
            DayOfWeek::Saturday => "saturday",
            DayOfWeek::Sunday => "sunday",
        }
    }
}

impl std::str::FromStr for DayOfWeek {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "monday" => Ok(DayOfWeek::Monday),
            "tuesday" => Ok(DayOfWeek::Tuesday),
            "wednesday" => Ok(DayOfWeek::Wednesday),
            "thursday" => Ok(DayOfWeek::Thursday),
            "friday" => Ok(DayOfWeek::Friday),
            "saturday" => Ok(DayOfWeek::Saturday),
            "sunday" => Ok(DayOfWeek::Sunday),
            _ => Err(format!("Invalid day of week: {}", s)),
        }
    }
}

/// A staff member who can be allocated to teaching activities
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Staff {
    pub id: Uuid,
    pub given_name: String,
    pub family_name: String,
    pub email: String,
    /// Attained AQF qualification level
    pub aqf: u8,
    /// AQF level currently being studied, 0 if none
    pub studying_aqf: u8,
    /// App-wide workforce/admin flag, independent of per-unit roles
    pub is_admin: bool,
}

impl Staff {
    pub fn new(
        given_name: impl Into<String>,
        family_name: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            given_name: given_name.into(),
            family_name: family_name.into(),
            email: email.into(),
            aqf: 0,
            studying_aqf: 0,
            is_admin: false,
        }
    }

    pub fn admin(mut self) -> Self {
        self.is_admin = true;
        self
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.given_name, self.family_name)
    }
}

/// A teaching offering, unique on (code, offering period, year, campus)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Unit {
    pub id: Uuid,
    pub unit_code: String,
    pub offering_period: String,
    pub year: i32,
    pub campus: String,
    /// Target AQF level for staff teaching into the unit
    pub aqf_target: u8,
}

impl Unit {
    pub fn new(
        unit_code: impl Into<String>,
        offering_period: impl Into<String>,
        year: i32,
        campus: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            unit_code: unit_code.into(),
            offering_period: offering_period.into(),
            year,
            campus: campus.into(),
            aqf_target: 0,
        }
    }

    /// Identity key for uniqueness checks
    pub fn offering_key(&self) -> (String, String, i32, String) {
        (
            self.unit_code.clone(),
            self.offering_period.clone(),
            self.year,
            self.campus.clone(),
        )
    }

    /// Human-readable label used in notifications
    pub fn label(&self) -> String {
        format!("{} {} {}", self.unit_code, self.offering_period, self.year)
    }
}

/// A schedulable teaching session within a unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    pub id: Uuid,
    pub unit_id: Uuid,
    pub activity_code: String,
    pub activity_group: String,
    pub day_of_week: DayOfWeek,
    pub location: String,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

impl Activity {
    pub fn new(
        unit_id: Uuid,
        activity_code: impl Into<String>,
        day_of_week: DayOfWeek,
        start_time: NaiveTime,
        end_time: NaiveTime,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            unit_id,
            activity_code: activity_code.into(),
            activity_group: String::new(),
            day_of_week,
            location: String::new(),
            start_time,
            end_time,
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.activity_group = group.into();
        self
    }

    /// Session length in fractional hours
    pub fn duration_hours(&self) -> f64 {
        let seconds = (self.end_time - self.start_time).num_seconds();
        seconds.max(0) as f64 / 3600.0
    }
}

/// A staff member's declared availability window, with per-staff caps
/// that tighten the global rules
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Availability {
    pub id: Uuid,
    pub staff_id: Uuid,
    pub day: DayOfWeek,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub year: i32,
    pub max_hours: u32,
    pub max_number_activities: u32,
}

impl Availability {
    pub fn new(
        staff_id: Uuid,
        day: DayOfWeek,
        start_time: NaiveTime,
        end_time: NaiveTime,
        year: i32,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            staff_id,
            day,
            start_time,
            end_time,
            year,
            max_hours: u32::MAX,
            max_number_activities: u32::MAX,
        }
    }

    pub fn with_caps(mut self, max_hours: u32, max_number_activities: u32) -> Self {
        self.max_hours = max_hours;
        self.max_number_activities = max_number_activities;
        self
    }

    /// Whether this window covers the activity's full day/time span
    pub fn covers(&self, activity: &Activity) -> bool {
        self.day == activity.day_of_week
            && self.start_time <= activity.start_time
            && activity.end_time <= self.end_time
    }
}

/// Per-unit title a staff member holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleTitle {
    Ta,
    Lecturer,
}

impl RoleTitle {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoleTitle::Ta => "ta",
            RoleTitle::Lecturer => "lecturer",
        }
    }
}

impl std::str::FromStr for RoleTitle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ta" => Ok(RoleTitle::Ta),
            "lecturer" => Ok(RoleTitle::Lecturer),
            _ => Err(format!("Invalid role title: {}", s)),
        }
    }
}

/// Association of a staff member with a unit and a title.
/// Used only to resolve authorization, never to gate data visibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    pub id: Uuid,
    pub staff_id: Uuid,
    pub unit_id: Uuid,
    pub title: RoleTitle,
}

impl Role {
    pub fn new(staff_id: Uuid, unit_id: Uuid, title: RoleTitle) -> Self {
        Self {
            id: Uuid::new_v4(),
            staff_id,
            unit_id,
            title,
        }
    }
}

/// Named global policy parameters consulted by the constraint checker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleName {
    MaxHours,
    MaxNumberActivities,
}

impl RuleName {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleName::MaxHours => "max_hours",
            RuleName::MaxNumberActivities => "max_number_activities",
        }
    }
}

impl std::str::FromStr for RuleName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "max_hours" => Ok(RuleName::MaxHours),
            "max_number_activities" => Ok(RuleName::MaxNumberActivities),
            _ => Err(format!("Invalid rule name: {}", s)),
        }
    }
}

/// A named numeric policy value, globally scoped, admin-mutable
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub name: RuleName,
    pub value: u32,
    pub updated_at: DateTime<Utc>,
}

impl Rule {
    pub fn new(name: RuleName, value: u32, now: DateTime<Utc>) -> Self {
        Self {
            name,
            value,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_day_of_week_round_trip() {
        for day in [
            DayOfWeek::Monday,
            DayOfWeek::Tuesday,
            DayOfWeek::Wednesday,
            DayOfWeek::Thursday,
            DayOfWeek::Friday,
            DayOfWeek::Saturday,
            DayOfWeek::Sunday,
        ] {
            assert_eq!(day.as_str().parse::<DayOfWeek>().unwrap(), day);
        }
        assert!("someday".parse::<DayOfWeek>().is_err());
    }

    #[test]
    fn test_staff_full_name() {
        let staff = Staff::new("Ada", "Lovelace", "ada@example.edu");
        assert_eq!(staff.full_name(), "Ada Lovelace");
        assert!(!staff.is_admin);
        assert!(Staff::new("X", "Y", "x@y.z").admin().is_admin);
    }

    #[test]
    fn test_unit_label() {
        let unit = Unit::new("FIT3077", "S1", 2026, "CL");
        assert_eq!(unit.label(), "FIT3077 S1 2026");
    }

    #[test]
    fn test_unit_offering_key_distinguishes_campus() {
        let a = Unit::new("FIT3077", "S1", 2026, "CL");
        let b = Unit::new("FIT3077", "S1", 2026, "MA");
        assert_ne!(a.offering_key(), b.offering_key());
    }

    #[test]
    fn test_activity_duration_hours() {
        let activity = Activity::new(
            Uuid::new_v4(),
            "T01",
            DayOfWeek::Monday,
            time(9, 0),
            time(10, 30),
        );
        assert!((activity.duration_hours() - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_availability_covers() {
        let staff_id = Uuid::new_v4();
        let avail =
            Availability::new(staff_id, DayOfWeek::Monday, time(8, 0), time(12, 0), 2026);

        let inside = Activity::new(
            Uuid::new_v4(),
            "T01",
            DayOfWeek::Monday,
            time(9, 0),
            time(11, 0),
        );
        assert!(avail.covers(&inside));

        let wrong_day = Activity::new(
            Uuid::new_v4(),
            "T02",
            DayOfWeek::Tuesday,
            time(9, 0),
            time(11, 0),
        );
        assert!(!avail.covers(&wrong_day));

        let overruns = Activity::new(
            Uuid::new_v4(),
            "T03",
            DayOfWeek::Monday,
            time(11, 0),
            time(13, 0),
        );
        assert!(!avail.covers(&overruns));
    }

    #[test]
    fn test_role_title_round_trip() {
        assert_eq!("ta".parse::<RoleTitle>().unwrap(), RoleTitle::Ta);
        assert_eq!("lecturer".parse::<RoleTitle>().unwrap(), RoleTitle::Lecturer);
        assert!("dean".parse::<RoleTitle>().is_err());
    }

    #[test]
    fn test_rule_name_round_trip() {
        assert_eq!("max_hours".parse::<RuleName>().unwrap(), RuleName::MaxHours);
        assert_eq!(
            "max_number_activities".parse::<RuleName>().unwrap(),
            RuleName::MaxNumberActivities
        );
        assert!("max_coffee".parse::<RuleName>().is_err());
    }

    #[test]
    fn test_serialization_snake_case() {
        let json = serde_json::to_string(&DayOfWeek::Wednesday).unwrap();
        assert_eq!(json, "\"wednesday\"");
        let json = serde_json::to_string(&RuleName::MaxHours).unwrap();
        assert_eq!(json, "\"max_hours\"");
    }
}
