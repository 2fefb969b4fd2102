use crate::db::models::{NewSchedule, Schedule, TeacherSubstitution, User};
use crate::error::SchoolError;
use crate::models::school::{Role, Viewer, WeekType, validate_cell};
use crate::schema;
use crate::services::grid::{self, ScheduleEntry, SubstituteNote, WeekGrid};
use chrono::{Datelike, Days, NaiveDate, Utc};
use diesel::PgConnection;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use log::info;
use serde::Deserialize;

/// Rows a viewer is allowed to see in the weekly view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Group(i64),
    Teacher(i64),
    Everything,
    Nothing,
}

/// Resolve the viewer's scope. Students see their group (or nothing if they
/// have none), teachers see what they teach, admins see every row.
pub fn scope_for(conn: &mut PgConnection, viewer: &Viewer) -> Result<Scope, SchoolError> {
    use schema::student_group_association::dsl as SG;

    match viewer.role {
        Role::Student => {
            let group_id: Option<i64> = SG::student_group_association
                .filter(SG::student_id.eq(viewer.id))
                .select(SG::group_id)
                .order(SG::group_id.asc())
                .first(conn)
                .optional()?;
            Ok(group_id.map(Scope::Group).unwrap_or(Scope::Nothing))
        }
        Role::Teacher => Ok(Scope::Teacher(viewer.id)),
        Role::Admin => Ok(Scope::Everything),
    }
}

type EntryRow = (Schedule, String, String, String, String, Option<String>);

fn load_entries(conn: &mut PgConnection, scope: Scope, parity: WeekType) -> Result<Vec<ScheduleEntry>, SchoolError> {
    use schema::course::dsl as C;
    use schema::group::dsl as G;
    use schema::room::dsl as RM;
    use schema::schedule::dsl as S;
    use schema::user::dsl as U;

    let mut query = S::schedule
        .inner_join(G::group)
        .inner_join(C::course)
        .inner_join(RM::room)
        .inner_join(U::user)
        .filter(S::is_active.eq(true))
        .filter(S::week_type.eq_any(vec![
            WeekType::All.as_str().to_string(),
            parity.as_str().to_string(),
        ]))
        .select((Schedule::as_select(), G::name, C::name, RM::number, U::username, U::full_name))
        .order((S::day_of_week.asc(), S::slot_number.asc(), G::name.asc()))
        .into_boxed();

    query = match scope {
        Scope::Group(group_id) => query.filter(S::group_id.eq(group_id)),
        Scope::Teacher(teacher_id) => query.filter(S::teacher_id.eq(teacher_id)),
        Scope::Everything => query,
        Scope::Nothing => return Ok(Vec::new()),
    };

    let rows: Vec<EntryRow> = query.load(conn)?;
    Ok(rows
        .into_iter()
        .map(|(s, group_name, course_name, room_number, username, full_name)| ScheduleEntry {
            schedule_id: s.id,
            day_of_week: s.day_of_week,
            slot_number: s.slot_number,
            week_type: s.week_type,
            group_id: s.group_id,
            group_name,
            course_id: s.course_id,
            course_name,
            teacher_id: s.teacher_id,
            teacher_name: full_name.unwrap_or(username),
            room_id: s.room_id,
            room_number,
            substitute: None,
        })
        .collect())
}

fn attach_substitutions(
    conn: &mut PgConnection,
    entries: &mut [ScheduleEntry],
    week_start: NaiveDate,
) -> Result<(), SchoolError> {
    use schema::teacher_substitution::dsl as TS;
    use schema::user::dsl as U;

    if entries.is_empty() {
        return Ok(());
    }
    let week_end = week_start
        .checked_add_days(Days::new(6))
        .ok_or_else(|| SchoolError::Validation("week is out of range".to_string()))?;
    let ids: Vec<i64> = entries.iter().map(|e| e.schedule_id).collect();

    let subs: Vec<(TeacherSubstitution, String, Option<String>)> = TS::teacher_substitution
        .inner_join(U::user)
        .filter(TS::original_schedule_id.eq_any(ids))
        .filter(TS::date.between(week_start, week_end))
        .select((TeacherSubstitution::as_select(), U::username, U::full_name))
        .order(TS::created_at.asc())
        .load(conn)?;

    for (sub, username, full_name) in subs {
        let day = sub.date.weekday().number_from_monday() as i32;
        // Later records for the same cell and date win.
        if let Some(entry) = entries
            .iter_mut()
            .find(|e| e.schedule_id == sub.original_schedule_id && e.day_of_week == day)
        {
            entry.substitute = Some(SubstituteNote {
                substitution_id: sub.id,
                teacher_id: sub.substitute_teacher_id,
                teacher_name: full_name.unwrap_or(username),
                date: sub.date,
                reason: sub.reason,
                is_confirmed: sub.is_confirmed,
            });
        }
    }
    Ok(())
}

/// Build the weekly grid shown to `viewer` for the week `offset` weeks from `today`.
pub fn load_week(
    conn: &mut PgConnection,
    viewer: &Viewer,
    today: NaiveDate,
    offset: i64,
) -> Result<WeekGrid, SchoolError> {
    let scope = scope_for(conn, viewer)?;
    load_week_for_scope(conn, scope, today, offset)
}

pub fn load_week_for_scope(
    conn: &mut PgConnection,
    scope: Scope,
    today: NaiveDate,
    offset: i64,
) -> Result<WeekGrid, SchoolError> {
    let start = grid::week_start(today, offset)?;
    let mut entries = load_entries(conn, scope, grid::week_parity(start))?;
    attach_substitutions(conn, &mut entries, start)?;
    grid::assemble(entries, today, offset)
}

/// Admin grid editor request. `schedule_id = None` creates a new row.
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleEdit {
    pub schedule_id: Option<i64>,
    pub group_id: i64,
    pub course_id: i64,
    pub teacher_id: i64,
    pub room_id: i64,
    pub day_of_week: i32,
    pub slot_number: i32,
    #[serde(default)]
    pub week_type: Option<String>,
}

fn ensure_exists<T>(found: Option<T>, what: &str, id: i64) -> Result<T, SchoolError> {
    found.ok_or_else(|| SchoolError::NotFound(format!("{} {} not found", what, id)))
}

fn map_cell_conflict(err: DieselError) -> SchoolError {
    match err {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
            let what = match info.constraint_name() {
                Some("ux_schedule_room_cell") => "room",
                _ => "teacher",
            };
            SchoolError::Conflict(format!("the {} is already booked for this day and slot", what))
        }
        other => other.into(),
    }
}

/// Create or update a schedule row from the admin grid editor.
pub fn save(conn: &mut PgConnection, edit: &ScheduleEdit) -> Result<Schedule, SchoolError> {
    use schema::course::dsl as C;
    use schema::group::dsl as G;
    use schema::room::dsl as RM;
    use schema::schedule::dsl as S;
    use schema::user::dsl as U;

    validate_cell(edit.day_of_week, edit.slot_number)?;
    let week_type: WeekType = edit.week_type.as_deref().unwrap_or("all").parse()?;

    ensure_exists(
        G::group.find(edit.group_id).select(G::id).first::<i64>(conn).optional()?,
        "group",
        edit.group_id,
    )?;
    ensure_exists(
        C::course.find(edit.course_id).select(C::id).first::<i64>(conn).optional()?,
        "course",
        edit.course_id,
    )?;
    ensure_exists(
        RM::room.find(edit.room_id).select(RM::id).first::<i64>(conn).optional()?,
        "room",
        edit.room_id,
    )?;
    let teacher: User = ensure_exists(
        U::user.find(edit.teacher_id).select(User::as_select()).first(conn).optional()?,
        "teacher",
        edit.teacher_id,
    )?;
    if teacher.role()? != Role::Teacher {
        return Err(SchoolError::Validation(format!("user {} is not a teacher", teacher.username)));
    }

    let saved = match edit.schedule_id {
        Some(id) => {
            ensure_exists(
                S::schedule.find(id).select(S::id).first::<i64>(conn).optional()?,
                "schedule",
                id,
            )?;
            diesel::update(S::schedule.find(id))
                .set((
                    S::group_id.eq(edit.group_id),
                    S::course_id.eq(edit.course_id),
                    S::teacher_id.eq(edit.teacher_id),
                    S::room_id.eq(edit.room_id),
                    S::day_of_week.eq(edit.day_of_week),
                    S::slot_number.eq(edit.slot_number),
                    S::week_type.eq(week_type.as_str()),
                    S::is_active.eq(true),
                    S::updated_at.eq(Utc::now()),
                ))
                .returning(Schedule::as_returning())
                .get_result::<Schedule>(conn)
                .map_err(map_cell_conflict)?
        }
        None => {
            let row = NewSchedule {
                group_id: edit.group_id,
                course_id: edit.course_id,
                teacher_id: edit.teacher_id,
                room_id: edit.room_id,
                day_of_week: edit.day_of_week,
                slot_number: edit.slot_number,
                week_type: week_type.as_str().to_string(),
            };
            diesel::insert_into(S::schedule)
                .values(&row)
                .returning(Schedule::as_returning())
                .get_result::<Schedule>(conn)
                .map_err(map_cell_conflict)?
        }
    };
    info!(
        "Schedule: saved row {} (group={}, day={}, slot={})",
        saved.id, saved.group_id, saved.day_of_week, saved.slot_number
    );
    Ok(saved)
}

/// Soft-delete a schedule row.
pub fn deactivate(conn: &mut PgConnection, schedule_id: i64) -> Result<(), SchoolError> {
    use schema::schedule::dsl as S;

    let updated = diesel::update(S::schedule.find(schedule_id))
        .set((S::is_active.eq(false), S::updated_at.eq(Utc::now())))
        .execute(conn)?;
    if updated == 0 {
        return Err(SchoolError::NotFound(format!("schedule {} not found", schedule_id)));
    }
    Ok(())
}

/// Soft-delete every active row; returns the number of rows touched.
pub fn deactivate_all(conn: &mut PgConnection) -> Result<usize, SchoolError> {
    use schema::schedule::dsl as S;

    Ok(diesel::update(S::schedule.filter(S::is_active.eq(true)))
        .set((S::is_active.eq(false), S::updated_at.eq(Utc::now())))
        .execute(conn)?)
}

/// Hard-delete the given schedule rows together with their substitutions.
pub(crate) fn purge_rows(conn: &mut PgConnection, ids: &[i64]) -> Result<usize, SchoolError> {
    use schema::schedule::dsl as S;
    use schema::teacher_substitution::dsl as TS;

    if ids.is_empty() {
        return Ok(0);
    }
    diesel::delete(TS::teacher_substitution.filter(TS::original_schedule_id.eq_any(ids))).execute(conn)?;
    Ok(diesel::delete(S::schedule.filter(S::id.eq_any(ids))).execute(conn)?)
}
