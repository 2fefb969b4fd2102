//! Domain vocabulary shared by the registries, the generator and the HTTP layer.
//!
//! Database rows keep roles, room types and week types as plain text; these
//! enums are the only place where the allowed values are spelled out.

use crate::error::SchoolError;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

pub const MIN_DAY: i32 = 1;
pub const MAX_DAY: i32 = 7;
/// Generation only covers Monday..Friday even though the grid holds the full week.
pub const LAST_TEACHING_DAY: i32 = 5;
pub const MIN_SLOT: i32 = 1;
pub const MAX_SLOT: i32 = 4;

pub const ROOM_CAPACITY_RANGE: (i32, i32) = (1, 500);
pub const ROOM_NUMBER_MAX_LEN: usize = 20;
pub const ROOM_BUILDING_MAX_LEN: usize = 50;

pub const GROUP_NAME_MAX_LEN: usize = 20;
pub const GROUP_SPECIALTY_MAX_LEN: usize = 50;
pub const COURSE_YEAR_RANGE: (i32, i32) = (1, 5);
pub const GROUP_NUMBER_RANGE: (i32, i32) = (1, 10);
pub const MAX_STUDENTS_RANGE: (i32, i32) = (1, 50);
pub const DEFAULT_MAX_STUDENTS: i32 = 25;

pub const COURSE_NAME_MAX_LEN: usize = 100;
pub const COURSE_DESCRIPTION_MAX_LEN: usize = 256;
pub const SUBSTITUTION_REASON_MAX_LEN: usize = 200;
pub const ATTENDANCE_NOTES_MAX_LEN: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Teacher,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Teacher => "teacher",
            Role::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = SchoolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Role::Student),
            "teacher" => Ok(Role::Teacher),
            "admin" => Ok(Role::Admin),
            other => Err(SchoolError::Validation(format!("unknown role '{}'", other))),
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomType {
    Lecture,
    Lab,
    Computer,
    Seminar,
    Conference,
    Gym,
}

impl RoomType {
    pub const ALL: [RoomType; 6] = [
        RoomType::Lecture,
        RoomType::Lab,
        RoomType::Computer,
        RoomType::Seminar,
        RoomType::Conference,
        RoomType::Gym,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RoomType::Lecture => "lecture",
            RoomType::Lab => "lab",
            RoomType::Computer => "computer",
            RoomType::Seminar => "seminar",
            RoomType::Conference => "conference",
            RoomType::Gym => "gym",
        }
    }

    /// Label used by the admin forms of the original deployment.
    pub fn label(self) -> &'static str {
        match self {
            RoomType::Lecture => "лекционная",
            RoomType::Lab => "лабораторная",
            RoomType::Computer => "компьютерная",
            RoomType::Seminar => "семинарская",
            RoomType::Conference => "конференц-зал",
            RoomType::Gym => "спортзал",
        }
    }
}

impl FromStr for RoomType {
    type Err = SchoolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase();
        RoomType::ALL
            .into_iter()
            .find(|t| t.as_str() == needle || t.label() == needle)
            .ok_or_else(|| SchoolError::Validation(format!("unknown room type '{}'", s)))
    }
}

/// Parity of the academic week a schedule row applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeekType {
    All,
    Odd,
    Even,
}

impl WeekType {
    pub fn as_str(self) -> &'static str {
        match self {
            WeekType::All => "all",
            WeekType::Odd => "odd",
            WeekType::Even => "even",
        }
    }

    /// Parity of a concrete week, keyed by its ISO week number.
    pub fn for_iso_week(week: u32) -> WeekType {
        if week % 2 == 1 { WeekType::Odd } else { WeekType::Even }
    }
}

impl FromStr for WeekType {
    type Err = SchoolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(WeekType::All),
            "odd" => Ok(WeekType::Odd),
            "even" => Ok(WeekType::Even),
            other => Err(SchoolError::Validation(format!("unknown week type '{}'", other))),
        }
    }
}

/// Mark a student receives for one course on one day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    #[default]
    Present,
    Absent,
    Late,
    Excused,
}

impl AttendanceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Absent => "absent",
            AttendanceStatus::Late => "late",
            AttendanceStatus::Excused => "excused",
        }
    }
}

impl FromStr for AttendanceStatus {
    type Err = SchoolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "present" => Ok(AttendanceStatus::Present),
            "absent" => Ok(AttendanceStatus::Absent),
            "late" => Ok(AttendanceStatus::Late),
            "excused" => Ok(AttendanceStatus::Excused),
            other => Err(SchoolError::Validation(format!("unknown attendance status '{}'", other))),
        }
    }
}

/// The authenticated user a request acts on behalf of.
#[derive(Debug, Clone, Serialize)]
pub struct Viewer {
    pub id: i64,
    pub username: String,
    pub role: Role,
}

fn check_range(field: &str, value: i32, (min, max): (i32, i32)) -> Result<(), SchoolError> {
    if value < min || value > max {
        return Err(SchoolError::Validation(format!(
            "{} must be between {} and {} (got {})",
            field, min, max, value
        )));
    }
    Ok(())
}

fn check_len(field: &str, value: &str, max: usize) -> Result<(), SchoolError> {
    let len = value.trim().chars().count();
    if len == 0 {
        return Err(SchoolError::Validation(format!("{} is required", field)));
    }
    if len > max {
        return Err(SchoolError::Validation(format!(
            "{} must be at most {} characters",
            field, max
        )));
    }
    Ok(())
}

pub fn validate_room_fields(number: &str, capacity: i32, building: &str) -> Result<(), SchoolError> {
    check_len("number", number, ROOM_NUMBER_MAX_LEN)?;
    check_len("building", building, ROOM_BUILDING_MAX_LEN)?;
    check_range("capacity", capacity, ROOM_CAPACITY_RANGE)
}

/// Group names are uppercase letters (any script), digits and hyphens, e.g. `ПКС-21`.
pub fn is_valid_group_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_uppercase() || c.is_ascii_digit() || c == '-')
}

pub fn validate_group_fields(
    name: &str,
    specialty: &str,
    course_year: i32,
    group_number: i32,
    max_students: i32,
) -> Result<(), SchoolError> {
    check_len("name", name, GROUP_NAME_MAX_LEN)?;
    if !is_valid_group_name(name) {
        return Err(SchoolError::Validation(format!(
            "group name '{}' may only contain uppercase letters, digits and hyphens",
            name
        )));
    }
    check_len("specialty", specialty, GROUP_SPECIALTY_MAX_LEN)?;
    check_range("course_year", course_year, COURSE_YEAR_RANGE)?;
    check_range("group_number", group_number, GROUP_NUMBER_RANGE)?;
    check_range("max_students", max_students, MAX_STUDENTS_RANGE)
}

pub fn validate_course_fields(name: &str, description: Option<&str>) -> Result<(), SchoolError> {
    check_len("name", name, COURSE_NAME_MAX_LEN)?;
    if let Some(desc) = description
        && desc.chars().count() > COURSE_DESCRIPTION_MAX_LEN
    {
        return Err(SchoolError::Validation(format!(
            "description must be at most {} characters",
            COURSE_DESCRIPTION_MAX_LEN
        )));
    }
    Ok(())
}

pub fn validate_cell(day_of_week: i32, slot_number: i32) -> Result<(), SchoolError> {
    check_range("day_of_week", day_of_week, (MIN_DAY, MAX_DAY))?;
    check_range("slot_number", slot_number, (MIN_SLOT, MAX_SLOT))
}

pub fn validate_reason(reason: Option<&str>) -> Result<(), SchoolError> {
    match reason {
        Some(r) if r.chars().count() > SUBSTITUTION_REASON_MAX_LEN => Err(SchoolError::Validation(format!(
            "reason must be at most {} characters",
            SUBSTITUTION_REASON_MAX_LEN
        ))),
        _ => Ok(()),
    }
}

pub fn validate_notes(notes: Option<&str>) -> Result<(), SchoolError> {
    match notes {
        Some(n) if n.chars().count() > ATTENDANCE_NOTES_MAX_LEN => Err(SchoolError::Validation(format!(
            "notes must be at most {} characters",
            ATTENDANCE_NOTES_MAX_LEN
        ))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_parse_exhaustively() {
        for role in [Role::Student, Role::Teacher, Role::Admin] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("superuser".parse::<Role>().is_err());
    }

    #[test]
    fn room_type_accepts_codes_and_labels() {
        assert_eq!("lecture".parse::<RoomType>().unwrap(), RoomType::Lecture);
        assert_eq!("лекционная".parse::<RoomType>().unwrap(), RoomType::Lecture);
        assert_eq!("Компьютерная".parse::<RoomType>().unwrap(), RoomType::Computer);
        assert!("kitchen".parse::<RoomType>().is_err());
    }

    #[test]
    fn room_capacity_bounds() {
        assert!(validate_room_fields("101", 1, "Главный корпус").is_ok());
        assert!(validate_room_fields("101", 500, "Главный корпус").is_ok());
        assert!(matches!(
            validate_room_fields("101", 0, "Главный корпус"),
            Err(SchoolError::Validation(_))
        ));
        assert!(matches!(
            validate_room_fields("101", 501, "Главный корпус"),
            Err(SchoolError::Validation(_))
        ));
    }

    #[test]
    fn room_text_lengths() {
        assert!(validate_room_fields("", 30, "Главный корпус").is_err());
        assert!(validate_room_fields(&"1".repeat(21), 30, "Главный корпус").is_err());
        assert!(validate_room_fields("101", 30, &"к".repeat(51)).is_err());
        assert!(validate_room_fields("И-101", 30, &"к".repeat(50)).is_ok());
    }

    #[test]
    fn group_name_pattern() {
        assert!(is_valid_group_name("ПКС-21"));
        assert!(is_valid_group_name("IS-3"));
        assert!(!is_valid_group_name("пкс-21"));
        assert!(!is_valid_group_name("ПКС 21"));
        assert!(!is_valid_group_name(""));
    }

    #[test]
    fn group_field_ranges() {
        assert!(validate_group_fields("ПКС-21", "ПКС", 2, 1, 25).is_ok());
        assert!(validate_group_fields("ПКС-21", "ПКС", 0, 1, 25).is_err());
        assert!(validate_group_fields("ПКС-21", "ПКС", 6, 1, 25).is_err());
        assert!(validate_group_fields("ПКС-21", "ПКС", 2, 11, 25).is_err());
        assert!(validate_group_fields("ПКС-21", "ПКС", 2, 1, 51).is_err());
        assert!(validate_group_fields("ПКС-21", "ПКС", 2, 1, 0).is_err());
    }

    #[test]
    fn cell_bounds() {
        assert!(validate_cell(1, 1).is_ok());
        assert!(validate_cell(7, 4).is_ok());
        assert!(validate_cell(0, 1).is_err());
        assert!(validate_cell(1, 5).is_err());
    }

    #[test]
    fn attendance_status_defaults_to_present() {
        assert_eq!(AttendanceStatus::default(), AttendanceStatus::Present);
        assert_eq!("late".parse::<AttendanceStatus>().unwrap(), AttendanceStatus::Late);
        assert!(matches!("sick".parse::<AttendanceStatus>(), Err(SchoolError::Validation(_))));
        assert!(validate_notes(Some(&"н".repeat(256))).is_ok());
        assert!(validate_notes(Some(&"н".repeat(257))).is_err());
    }

    #[test]
    fn week_parity_follows_iso_week() {
        assert_eq!(WeekType::for_iso_week(1), WeekType::Odd);
        assert_eq!(WeekType::for_iso_week(52), WeekType::Even);
    }
}
