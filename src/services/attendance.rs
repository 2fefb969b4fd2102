//! Attendance journal: one mark per student, course and day.

use crate::db::models::{AttendanceRecord, NewAttendanceRecord, User};
use crate::error::SchoolError;
use crate::models::school::{AttendanceStatus, Role, Viewer, validate_notes};
use crate::schema;
use crate::services::courses;
use chrono::{NaiveDate, Utc};
use diesel::PgConnection;
use diesel::dsl::exists;
use diesel::prelude::*;
use log::info;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct AttendanceForm {
    pub student_id: i64,
    /// Defaults to the current day.
    #[serde(default)]
    pub date: Option<NaiveDate>,
    /// `present` when omitted.
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// A journal entry with the student's display name.
#[derive(Debug, Clone, Serialize)]
pub struct AttendanceRow {
    #[serde(flatten)]
    pub record: AttendanceRecord,
    pub student_name: String,
}

/// Admins keep every journal; a teacher only the journals of courses they teach.
pub fn authorize(conn: &mut PgConnection, viewer: &Viewer, course_id: i64) -> Result<(), SchoolError> {
    use schema::teacher_course_association::dsl as TC;

    match viewer.role {
        Role::Admin => Ok(()),
        Role::Teacher => {
            let teaches: bool = diesel::select(exists(
                TC::teacher_course_association
                    .filter(TC::teacher_id.eq(viewer.id))
                    .filter(TC::course_id.eq(course_id)),
            ))
            .get_result(conn)?;
            if teaches {
                Ok(())
            } else {
                Err(SchoolError::Unauthorized(format!(
                    "{} does not teach course {}",
                    viewer.username, course_id
                )))
            }
        }
        Role::Student => Err(SchoolError::Unauthorized("students cannot keep attendance".to_string())),
    }
}

/// Record a mark. Marking the same student, course and day again overwrites
/// the earlier status and notes.
pub fn mark(
    conn: &mut PgConnection,
    course_id: i64,
    form: AttendanceForm,
    marked_by: i64,
    today: NaiveDate,
) -> Result<AttendanceRecord, SchoolError> {
    use schema::attendance_record::dsl as AR;
    use schema::student_course_association::dsl as SC;
    use schema::user::dsl as U;

    let status = match form.status.as_deref() {
        Some(s) => s.parse::<AttendanceStatus>()?,
        None => AttendanceStatus::default(),
    };
    let notes = form.notes.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
    validate_notes(notes.as_deref())?;

    courses::ensure_course(conn, course_id)?;
    let student: User = U::user
        .find(form.student_id)
        .select(User::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| SchoolError::NotFound(format!("student {} not found", form.student_id)))?;
    let enrolled: bool = diesel::select(exists(
        SC::student_course_association
            .filter(SC::student_id.eq(student.id))
            .filter(SC::course_id.eq(course_id)),
    ))
    .get_result(conn)?;
    if !enrolled {
        return Err(SchoolError::Validation(format!(
            "{} is not enrolled in course {}",
            student.username, course_id
        )));
    }

    let new_row = NewAttendanceRecord {
        student_id: student.id,
        course_id,
        date: form.date.unwrap_or(today),
        status: status.as_str().to_string(),
        notes,
        marked_by: Some(marked_by),
    };
    let record = diesel::insert_into(AR::attendance_record)
        .values(&new_row)
        .on_conflict((AR::student_id, AR::course_id, AR::date))
        .do_update()
        .set((
            AR::status.eq(new_row.status.clone()),
            AR::notes.eq(new_row.notes.clone()),
            AR::marked_by.eq(new_row.marked_by),
            AR::updated_at.eq(Utc::now()),
        ))
        .returning(AttendanceRecord::as_returning())
        .get_result::<AttendanceRecord>(conn)?;
    info!(
        "Attendance: {} marked {} for course {} on {}",
        student.username, record.status, course_id, record.date
    );
    Ok(record)
}

/// Journal of a course, newest day first and students by username within a
/// day, optionally from `from` onwards.
pub fn list_for_course(
    conn: &mut PgConnection,
    course_id: i64,
    from: Option<NaiveDate>,
) -> Result<Vec<AttendanceRow>, SchoolError> {
    use schema::attendance_record::dsl as AR;
    use schema::user::dsl as U;

    courses::ensure_course(conn, course_id)?;
    let mut query = AR::attendance_record
        .inner_join(U::user.on(U::id.eq(AR::student_id)))
        .filter(AR::course_id.eq(course_id))
        .select((AttendanceRecord::as_select(), U::username, U::full_name))
        .order((AR::date.desc(), U::username.asc()))
        .into_boxed();
    if let Some(from) = from {
        query = query.filter(AR::date.ge(from));
    }

    let rows: Vec<(AttendanceRecord, String, Option<String>)> = query.load(conn)?;
    Ok(rows
        .into_iter()
        .map(|(record, username, full_name)| AttendanceRow {
            record,
            student_name: full_name.unwrap_or(username),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::NewUser;
    use crate::services::courses::{CourseForm, assign_teaching_course, create_course, enroll_student};
    use crate::test_support::test_connection;

    struct Fixture {
        course_id: i64,
        teacher: Viewer,
        outsider: Viewer,
        enrolled: i64,
        stranger: i64,
    }

    fn insert_user(conn: &mut PgConnection, name: &str, role: Role) -> i64 {
        use schema::user::dsl as U;
        diesel::insert_into(U::user)
            .values(&NewUser {
                username: name.to_string(),
                email: format!("{}@example.org", name),
                full_name: None,
                role: role.as_str().to_string(),
            })
            .returning(U::id)
            .get_result(conn)
            .unwrap()
    }

    fn viewer(id: i64, name: &str, role: Role) -> Viewer {
        Viewer {
            id,
            username: name.to_string(),
            role,
        }
    }

    fn fixture(conn: &mut PgConnection) -> Fixture {
        let course = create_course(
            conn,
            CourseForm {
                name: "Журнал посещаемости".into(),
                description: None,
            },
        )
        .unwrap();
        let teacher_id = insert_user(conn, "t_att", Role::Teacher);
        let outsider_id = insert_user(conn, "t_att_other", Role::Teacher);
        assign_teaching_course(conn, teacher_id, course.id).unwrap();
        let enrolled = insert_user(conn, "s_att_b", Role::Student);
        let second = insert_user(conn, "s_att_a", Role::Student);
        let stranger = insert_user(conn, "s_att_stranger", Role::Student);
        enroll_student(conn, enrolled, course.id).unwrap();
        enroll_student(conn, second, course.id).unwrap();
        Fixture {
            course_id: course.id,
            teacher: viewer(teacher_id, "t_att", Role::Teacher),
            outsider: viewer(outsider_id, "t_att_other", Role::Teacher),
            enrolled,
            stranger,
        }
    }

    fn form(student_id: i64, date: Option<NaiveDate>, status: Option<&str>) -> AttendanceForm {
        AttendanceForm {
            student_id,
            date,
            status: status.map(str::to_string),
            notes: None,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn only_course_teachers_and_admins_keep_the_journal() {
        let Some(mut conn) = test_connection() else { return };
        let f = fixture(&mut conn);
        assert!(authorize(&mut conn, &f.teacher, f.course_id).is_ok());
        assert!(authorize(&mut conn, &viewer(0, "root", Role::Admin), f.course_id).is_ok());
        assert!(matches!(
            authorize(&mut conn, &f.outsider, f.course_id),
            Err(SchoolError::Unauthorized(_))
        ));
        assert!(matches!(
            authorize(&mut conn, &viewer(f.enrolled, "s_att_b", Role::Student), f.course_id),
            Err(SchoolError::Unauthorized(_))
        ));
    }

    #[test]
    fn marks_default_to_present_today_and_overwrite() {
        let Some(mut conn) = test_connection() else { return };
        let f = fixture(&mut conn);
        let today = date(2025, 3, 5);

        let first = mark(&mut conn, f.course_id, form(f.enrolled, None, None), f.teacher.id, today).unwrap();
        assert_eq!(first.status, "present");
        assert_eq!(first.date, today);
        assert_eq!(first.marked_by, Some(f.teacher.id));

        let mut late = form(f.enrolled, Some(today), Some("late"));
        late.notes = Some("  опоздал на 10 минут ".into());
        let second = mark(&mut conn, f.course_id, late, f.teacher.id, today).unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(second.status, "late");
        assert_eq!(second.notes.as_deref(), Some("опоздал на 10 минут"));
    }

    #[test]
    fn rejects_unknown_status_long_notes_and_unenrolled_students() {
        let Some(mut conn) = test_connection() else { return };
        let f = fixture(&mut conn);
        let today = date(2025, 3, 5);

        assert!(matches!(
            mark(&mut conn, f.course_id, form(f.enrolled, None, Some("sick")), f.teacher.id, today),
            Err(SchoolError::Validation(_))
        ));
        let mut long = form(f.enrolled, None, None);
        long.notes = Some("x".repeat(257));
        assert!(matches!(
            mark(&mut conn, f.course_id, long, f.teacher.id, today),
            Err(SchoolError::Validation(_))
        ));
        assert!(matches!(
            mark(&mut conn, f.course_id, form(f.stranger, None, None), f.teacher.id, today),
            Err(SchoolError::Validation(_))
        ));
        assert!(matches!(
            mark(&mut conn, f.course_id, form(i64::MAX, None, None), f.teacher.id, today),
            Err(SchoolError::NotFound(_))
        ));
        assert!(matches!(
            mark(&mut conn, i64::MAX, form(f.enrolled, None, None), f.teacher.id, today),
            Err(SchoolError::NotFound(_))
        ));
    }

    #[test]
    fn journal_is_newest_first_and_filtered() {
        let Some(mut conn) = test_connection() else { return };
        let f = fixture(&mut conn);
        let roster = courses::list_enrolled_students(&mut conn, f.course_id).unwrap();
        for day in [3, 5] {
            for student in &roster {
                mark(
                    &mut conn,
                    f.course_id,
                    form(student.id, Some(date(2025, 3, day)), Some("absent")),
                    f.teacher.id,
                    date(2025, 3, day),
                )
                .unwrap();
            }
        }

        let all = list_for_course(&mut conn, f.course_id, None).unwrap();
        let keys: Vec<(NaiveDate, String)> = all.iter().map(|r| (r.record.date, r.student_name.clone())).collect();
        assert_eq!(
            keys,
            vec![
                (date(2025, 3, 5), "s_att_a".to_string()),
                (date(2025, 3, 5), "s_att_b".to_string()),
                (date(2025, 3, 3), "s_att_a".to_string()),
                (date(2025, 3, 3), "s_att_b".to_string()),
            ]
        );
        assert_eq!(list_for_course(&mut conn, f.course_id, Some(date(2025, 3, 4))).unwrap().len(), 2);
        assert!(matches!(
            list_for_course(&mut conn, i64::MAX, None),
            Err(SchoolError::NotFound(_))
        ));
    }
}
