use crate::db::models::{Group, NewGroup, StudentGroup, User};
use crate::error::SchoolError;
use crate::models::school::{MAX_STUDENTS_RANGE, Role, validate_group_fields};
use crate::schema;
use crate::services::schedule::purge_rows;
use diesel::PgConnection;
use diesel::dsl::count_star;
use diesel::prelude::*;
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Deserialize)]
pub struct GroupForm {
    pub name: String,
    pub specialty: String,
    pub course_year: i32,
    pub group_number: i32,
    #[serde(default)]
    pub max_students: Option<i32>,
}

/// A group together with its membership count.
#[derive(Debug, Clone, Serialize)]
pub struct GroupSummary {
    #[serde(flatten)]
    pub group: Group,
    pub current_students_count: i64,
    pub is_full: bool,
}

pub fn is_full(current_students_count: i64, max_students: i32) -> bool {
    current_students_count >= i64::from(max_students)
}

fn member_count(conn: &mut PgConnection, group_id: i64) -> Result<i64, SchoolError> {
    use schema::student_group_association::dsl as SG;

    Ok(SG::student_group_association
        .filter(SG::group_id.eq(group_id))
        .count()
        .get_result(conn)?)
}

fn find(conn: &mut PgConnection, group_id: i64) -> Result<Group, SchoolError> {
    use schema::group::dsl as G;

    G::group
        .find(group_id)
        .select(Group::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| SchoolError::NotFound(format!("group {} not found", group_id)))
}

pub fn list(conn: &mut PgConnection) -> Result<Vec<GroupSummary>, SchoolError> {
    use schema::group::dsl as G;
    use schema::student_group_association::dsl as SG;

    let groups: Vec<Group> = G::group
        .order((G::course_year.asc(), G::name.asc()))
        .select(Group::as_select())
        .load(conn)?;
    let counts: HashMap<i64, i64> = SG::student_group_association
        .group_by(SG::group_id)
        .select((SG::group_id, count_star()))
        .load::<(i64, i64)>(conn)?
        .into_iter()
        .collect();

    Ok(groups
        .into_iter()
        .map(|group| {
            let current = counts.get(&group.id).copied().unwrap_or(0);
            GroupSummary {
                is_full: is_full(current, group.max_students),
                current_students_count: current,
                group,
            }
        })
        .collect())
}

pub fn create(conn: &mut PgConnection, form: GroupForm, default_max_students: i32) -> Result<Group, SchoolError> {
    use schema::group::dsl as G;

    let name = form.name.trim().to_string();
    let specialty = form.specialty.trim().to_string();
    let max_students = form.max_students.unwrap_or(default_max_students);
    validate_group_fields(&name, &specialty, form.course_year, form.group_number, max_students)?;

    if G::group.filter(G::name.eq(&name)).select(G::id).first::<i64>(conn).optional()?.is_some() {
        return Err(SchoolError::DuplicateKey(format!("group {} already exists", name)));
    }
    let group = diesel::insert_into(G::group)
        .values(&NewGroup {
            name,
            specialty,
            course_year: form.course_year,
            group_number: form.group_number,
            max_students,
        })
        .returning(Group::as_returning())
        .get_result::<Group>(conn)?;
    info!("Groups: created {} (specialty={}, max={})", group.name, group.specialty, group.max_students);
    Ok(group)
}

/// Remove a group with its memberships, schedule rows and their substitutions.
pub fn delete(conn: &mut PgConnection, group_id: i64) -> Result<(), SchoolError> {
    use schema::group::dsl as G;
    use schema::schedule::dsl as S;
    use schema::student_group_association::dsl as SG;

    let group = find(conn, group_id)?;
    let members = diesel::delete(SG::student_group_association.filter(SG::group_id.eq(group_id))).execute(conn)?;
    let rows: Vec<i64> = S::schedule.filter(S::group_id.eq(group_id)).select(S::id).load(conn)?;
    let purged = purge_rows(conn, &rows)?;
    diesel::delete(G::group.find(group_id)).execute(conn)?;
    info!(
        "Groups: deleted {} ({} membership(s), {} schedule row(s))",
        group.name, members, purged
    );
    Ok(())
}

/// Put a student into a group, moving them out of any other group.
pub fn assign_student_to_group(conn: &mut PgConnection, group_id: i64, student_id: i64) -> Result<(), SchoolError> {
    use schema::student_group_association::dsl as SG;
    use schema::user::dsl as U;

    let group = find(conn, group_id)?;
    let student: User = U::user
        .find(student_id)
        .select(User::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| SchoolError::NotFound(format!("user {} not found", student_id)))?;
    match student.role()? {
        Role::Student => {}
        Role::Teacher | Role::Admin => {
            return Err(SchoolError::Validation(format!("user {} is not a student", student.username)));
        }
    }

    let already_member = SG::student_group_association
        .filter(SG::student_id.eq(student_id).and(SG::group_id.eq(group_id)))
        .count()
        .get_result::<i64>(conn)?
        > 0;
    if already_member {
        return Ok(());
    }
    if is_full(member_count(conn, group_id)?, group.max_students) {
        return Err(SchoolError::Conflict(format!(
            "group {} is full ({} students)",
            group.name, group.max_students
        )));
    }

    diesel::delete(SG::student_group_association.filter(SG::student_id.eq(student_id))).execute(conn)?;
    diesel::insert_into(SG::student_group_association)
        .values(&StudentGroup { student_id, group_id })
        .execute(conn)?;
    info!("Groups: {} joined {}", student.username, group.name);
    Ok(())
}

/// Set every group's limit to `max_students`; returns the number of groups updated.
pub fn reset_limits(conn: &mut PgConnection, max_students: i32) -> Result<usize, SchoolError> {
    use schema::group::dsl as G;

    let (min, max) = MAX_STUDENTS_RANGE;
    if !(min..=max).contains(&max_students) {
        return Err(SchoolError::Validation(format!(
            "max_students must be between {} and {} (got {})",
            min, max, max_students
        )));
    }
    Ok(diesel::update(G::group).set(G::max_students.eq(max_students)).execute(conn)?)
}
