//! Diesel model structs for the scheduling tables.
//!
//! Enumerated columns (`role`, `room_type`, `week_type`) are stored as text;
//! the typed views live in `crate::models::school`.

use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::SchoolError;
use crate::models::school::Role;
use crate::schema;

#[derive(Debug, Clone, Queryable, Identifiable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = schema::user)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub full_name: Option<String>,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn role(&self) -> Result<Role, SchoolError> {
        self.role
            .parse()
            .map_err(|_| SchoolError::Internal(format!("user {} has unknown role '{}'", self.id, self.role)))
    }

    pub fn display_name(&self) -> &str {
        self.full_name.as_deref().unwrap_or(&self.username)
    }
}

#[derive(Debug, Clone, Insertable, Serialize, Deserialize)]
#[diesel(table_name = schema::user)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub full_name: Option<String>,
    pub role: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = schema::course)]
pub struct Course {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Insertable, Serialize, Deserialize)]
#[diesel(table_name = schema::course)]
pub struct NewCourse {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = schema::group)]
pub struct Group {
    pub id: i64,
    pub name: String,
    pub specialty: String,
    pub course_year: i32,
    pub group_number: i32,
    pub max_students: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable, Serialize, Deserialize)]
#[diesel(table_name = schema::group)]
pub struct NewGroup {
    pub name: String,
    pub specialty: String,
    pub course_year: i32,
    pub group_number: i32,
    pub max_students: i32,
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = schema::room)]
pub struct Room {
    pub id: i64,
    pub number: String,
    pub capacity: i32,
    pub building: String,
    pub room_type: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable, AsChangeset, Serialize, Deserialize)]
#[diesel(table_name = schema::room)]
pub struct NewRoom {
    pub number: String,
    pub capacity: i32,
    pub building: String,
    pub room_type: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations, Selectable, Serialize, Deserialize)]
#[diesel(table_name = schema::schedule)]
#[diesel(belongs_to(Group))]
#[diesel(belongs_to(Course))]
#[diesel(belongs_to(Room))]
pub struct Schedule {
    pub id: i64,
    pub group_id: i64,
    pub course_id: i64,
    pub teacher_id: i64,
    pub room_id: i64,
    pub day_of_week: i32,
    pub slot_number: i32,
    pub week_type: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Insertable, Serialize, Deserialize)]
#[diesel(table_name = schema::schedule)]
pub struct NewSchedule {
    pub group_id: i64,
    pub course_id: i64,
    pub teacher_id: i64,
    pub room_id: i64,
    pub day_of_week: i32,
    pub slot_number: i32,
    pub week_type: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = schema::teacher_substitution)]
pub struct TeacherSubstitution {
    pub id: i64,
    pub original_schedule_id: i64,
    pub substitute_teacher_id: i64,
    pub date: NaiveDate,
    pub reason: Option<String>,
    pub is_confirmed: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable, Serialize, Deserialize)]
#[diesel(table_name = schema::teacher_substitution)]
pub struct NewTeacherSubstitution {
    pub original_schedule_id: i64,
    pub substitute_teacher_id: i64,
    pub date: NaiveDate,
    pub reason: Option<String>,
    pub is_confirmed: bool,
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = schema::attendance_record)]
pub struct AttendanceRecord {
    pub id: i64,
    pub student_id: i64,
    pub course_id: i64,
    pub date: NaiveDate,
    pub status: String,
    pub notes: Option<String>,
    pub marked_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable, Serialize, Deserialize)]
#[diesel(table_name = schema::attendance_record)]
pub struct NewAttendanceRecord {
    pub student_id: i64,
    pub course_id: i64,
    pub date: NaiveDate,
    pub status: String,
    pub notes: Option<String>,
    pub marked_by: Option<i64>,
}

// Association rows (many-to-many)
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = schema::teacher_course_association)]
pub struct TeacherCourse {
    pub teacher_id: i64,
    pub course_id: i64,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = schema::student_course_association)]
pub struct StudentCourse {
    pub student_id: i64,
    pub course_id: i64,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = schema::student_group_association)]
pub struct StudentGroup {
    pub student_id: i64,
    pub group_id: i64,
}
