use crate::db::models::{NewTeacherSubstitution, TeacherSubstitution, User};
use crate::error::SchoolError;
use crate::models::school::{Role, validate_reason};
use crate::schema;
use chrono::{Datelike, NaiveDate};
use diesel::PgConnection;
use diesel::prelude::*;
use log::info;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct SubstitutionForm {
    pub original_schedule_id: i64,
    pub substitute_teacher_id: i64,
    pub date: NaiveDate,
    #[serde(default)]
    pub reason: Option<String>,
}

/// A substitution with the names an admin list shows.
#[derive(Debug, Clone, Serialize)]
pub struct SubstitutionRow {
    #[serde(flatten)]
    pub substitution: TeacherSubstitution,
    pub substitute_name: String,
    pub course_name: String,
    pub group_name: String,
    pub day_of_week: i32,
    pub slot_number: i32,
}

/// Record a one-day substitution. The date must fall on the row's weekday.
/// The base schedule row is left untouched and the record starts unconfirmed.
/// No availability check is made.
pub fn create(conn: &mut PgConnection, form: SubstitutionForm) -> Result<TeacherSubstitution, SchoolError> {
    use schema::schedule::dsl as S;
    use schema::teacher_substitution::dsl as TS;
    use schema::user::dsl as U;

    let reason = form.reason.map(|r| r.trim().to_string()).filter(|r| !r.is_empty());
    validate_reason(reason.as_deref())?;

    let day_of_week: i32 = S::schedule
        .find(form.original_schedule_id)
        .select(S::day_of_week)
        .first(conn)
        .optional()?
        .ok_or_else(|| SchoolError::NotFound(format!("schedule {} not found", form.original_schedule_id)))?;
    // The weekly grid only shows a substitution on its row's own weekday.
    if form.date.weekday().number_from_monday() as i32 != day_of_week {
        return Err(SchoolError::Validation(format!(
            "{} is a {}, but schedule {} is held on day {}",
            form.date,
            form.date.weekday(),
            form.original_schedule_id,
            day_of_week
        )));
    }
    let substitute: User = U::user
        .find(form.substitute_teacher_id)
        .select(User::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| SchoolError::NotFound(format!("teacher {} not found", form.substitute_teacher_id)))?;
    match substitute.role()? {
        Role::Teacher => {}
        Role::Student | Role::Admin => {
            return Err(SchoolError::Validation(format!(
                "user {} is not a teacher",
                substitute.username
            )));
        }
    }

    let record = diesel::insert_into(TS::teacher_substitution)
        .values(&NewTeacherSubstitution {
            original_schedule_id: form.original_schedule_id,
            substitute_teacher_id: form.substitute_teacher_id,
            date: form.date,
            reason,
            is_confirmed: false,
        })
        .returning(TeacherSubstitution::as_returning())
        .get_result::<TeacherSubstitution>(conn)?;
    info!(
        "Substitutions: {} covers schedule {} on {}",
        substitute.username, record.original_schedule_id, record.date
    );
    Ok(record)
}

/// Substitutions newest date first, optionally from `from` onwards.
pub fn list(conn: &mut PgConnection, from: Option<NaiveDate>) -> Result<Vec<SubstitutionRow>, SchoolError> {
    use schema::course::dsl as C;
    use schema::group::dsl as G;
    use schema::schedule::dsl as S;
    use schema::teacher_substitution::dsl as TS;
    use schema::user::dsl as U;

    let mut query = TS::teacher_substitution
        .inner_join(U::user)
        .inner_join(S::schedule.inner_join(C::course).inner_join(G::group))
        .select((
            TeacherSubstitution::as_select(),
            U::username,
            U::full_name,
            C::name,
            G::name,
            S::day_of_week,
            S::slot_number,
        ))
        .order((TS::date.desc(), TS::created_at.desc()))
        .into_boxed();
    if let Some(from) = from {
        query = query.filter(TS::date.ge(from));
    }

    let rows: Vec<(TeacherSubstitution, String, Option<String>, String, String, i32, i32)> = query.load(conn)?;
    Ok(rows
        .into_iter()
        .map(
            |(substitution, username, full_name, course_name, group_name, day_of_week, slot_number)| SubstitutionRow {
                substitution,
                substitute_name: full_name.unwrap_or(username),
                course_name,
                group_name,
                day_of_week,
                slot_number,
            },
        )
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{NewCourse, NewGroup, NewRoom, NewSchedule, NewUser};
    use crate::services::schedule::{self, Scope};
    use crate::test_support::test_connection;

    struct Fixture {
        schedule_id: i64,
        group_id: i64,
        substitute_id: i64,
        student_id: i64,
    }

    fn insert_user(conn: &mut PgConnection, name: &str, role: Role) -> i64 {
        use schema::user::dsl as U;
        diesel::insert_into(U::user)
            .values(&NewUser {
                username: name.to_string(),
                email: format!("{}@example.org", name),
                full_name: Some(format!("{} full", name)),
                role: role.as_str().to_string(),
            })
            .returning(U::id)
            .get_result(conn)
            .unwrap()
    }

    fn fixture(conn: &mut PgConnection) -> Fixture {
        use schema::course::dsl as C;
        use schema::group::dsl as G;
        use schema::room::dsl as RM;
        use schema::schedule::dsl as S;

        let group_id = diesel::insert_into(G::group)
            .values(&NewGroup {
                name: "ЗМ-11".into(),
                specialty: "ИС".into(),
                course_year: 1,
                group_number: 1,
                max_students: 25,
            })
            .returning(G::id)
            .get_result(conn)
            .unwrap();
        let course_id = diesel::insert_into(C::course)
            .values(&NewCourse {
                name: "Курс замены".into(),
                description: None,
            })
            .returning(C::id)
            .get_result(conn)
            .unwrap();
        let room_id = diesel::insert_into(RM::room)
            .values(&NewRoom {
                number: "З-1".into(),
                capacity: 20,
                building: "Тест".into(),
                room_type: "seminar".into(),
                is_active: true,
            })
            .returning(RM::id)
            .get_result(conn)
            .unwrap();
        let teacher_id = insert_user(conn, "t_subs_main", Role::Teacher);
        let substitute_id = insert_user(conn, "t_subs_cover", Role::Teacher);
        let student_id = insert_user(conn, "s_subs", Role::Student);
        let schedule_id = diesel::insert_into(S::schedule)
            .values(&NewSchedule {
                group_id,
                course_id,
                teacher_id,
                room_id,
                day_of_week: 3,
                slot_number: 2,
                week_type: "all".into(),
            })
            .returning(S::id)
            .get_result(conn)
            .unwrap();
        Fixture {
            schedule_id,
            group_id,
            substitute_id,
            student_id,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn creates_unconfirmed_record_and_attaches_to_week() {
        let Some(mut conn) = test_connection() else { return };
        let f = fixture(&mut conn);
        // Wednesday of the week starting 2025-03-03
        let record = create(
            &mut conn,
            SubstitutionForm {
                original_schedule_id: f.schedule_id,
                substitute_teacher_id: f.substitute_id,
                date: date(2025, 3, 5),
                reason: Some("болезнь".into()),
            },
        )
        .unwrap();
        assert!(!record.is_confirmed);

        let grid = schedule::load_week_for_scope(&mut conn, Scope::Group(f.group_id), date(2025, 3, 3), 0).unwrap();
        let cell = grid.cell(3, 2);
        assert_eq!(cell.len(), 1);
        let note = cell[0].substitute.as_ref().unwrap();
        assert_eq!(note.teacher_name, "t_subs_cover full");

        let next = schedule::load_week_for_scope(&mut conn, Scope::Group(f.group_id), date(2025, 3, 3), 1).unwrap();
        assert!(next.cell(3, 2)[0].substitute.is_none());
    }

    #[test]
    fn rejects_non_teacher_long_reason_and_missing_schedule() {
        let Some(mut conn) = test_connection() else { return };
        let f = fixture(&mut conn);
        let base = SubstitutionForm {
            original_schedule_id: f.schedule_id,
            substitute_teacher_id: f.student_id,
            date: date(2025, 3, 5),
            reason: None,
        };
        assert!(matches!(create(&mut conn, base.clone()), Err(SchoolError::Validation(_))));

        let mut long = base.clone();
        long.substitute_teacher_id = f.substitute_id;
        long.reason = Some("x".repeat(201));
        assert!(matches!(create(&mut conn, long), Err(SchoolError::Validation(_))));

        let mut missing = base;
        missing.substitute_teacher_id = f.substitute_id;
        missing.original_schedule_id = i64::MAX;
        assert!(matches!(create(&mut conn, missing), Err(SchoolError::NotFound(_))));
    }

    #[test]
    fn date_must_fall_on_the_rows_weekday() {
        let Some(mut conn) = test_connection() else { return };
        let f = fixture(&mut conn);
        // Monday, while the row is held on Wednesday
        let result = create(
            &mut conn,
            SubstitutionForm {
                original_schedule_id: f.schedule_id,
                substitute_teacher_id: f.substitute_id,
                date: date(2025, 3, 3),
                reason: None,
            },
        );
        assert!(matches!(result, Err(SchoolError::Validation(_))));
        assert!(list(&mut conn, Some(date(2025, 3, 3))).unwrap().is_empty());

        let grid = schedule::load_week_for_scope(&mut conn, Scope::Group(f.group_id), date(2025, 3, 3), 0).unwrap();
        assert!(grid.cell(3, 2)[0].substitute.is_none());
    }

    #[test]
    fn list_is_newest_first_and_filtered() {
        let Some(mut conn) = test_connection() else { return };
        let f = fixture(&mut conn);
        for day in [5, 19, 12] {
            create(
                &mut conn,
                SubstitutionForm {
                    original_schedule_id: f.schedule_id,
                    substitute_teacher_id: f.substitute_id,
                    date: date(2031, 3, day),
                    reason: None,
                },
            )
            .unwrap();
        }
        let dates: Vec<NaiveDate> = list(&mut conn, Some(date(2031, 3, 12)))
            .unwrap()
            .into_iter()
            .map(|r| r.substitution.date)
            .collect();
        assert_eq!(dates, vec![date(2031, 3, 19), date(2031, 3, 12)]);
    }
}
