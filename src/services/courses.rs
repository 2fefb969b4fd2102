use crate::db::models::{Course, NewCourse, StudentCourse, TeacherCourse, User};
use crate::error::SchoolError;
use crate::models::school::{Role, validate_course_fields};
use crate::schema;
use diesel::PgConnection;
use diesel::prelude::*;
use log::info;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct CourseForm {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Public view of an enrolled student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnrolledStudent {
    pub id: i64,
    pub username: String,
    pub full_name: Option<String>,
    pub email: String,
}

fn load_user(conn: &mut PgConnection, user_id: i64) -> Result<User, SchoolError> {
    use schema::user::dsl as U;

    U::user
        .find(user_id)
        .select(User::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| SchoolError::NotFound(format!("user {} not found", user_id)))
}

pub(crate) fn ensure_course(conn: &mut PgConnection, course_id: i64) -> Result<(), SchoolError> {
    use schema::course::dsl as C;

    match C::course.find(course_id).select(C::id).first::<i64>(conn).optional()? {
        Some(_) => Ok(()),
        None => Err(SchoolError::NotFound(format!("course {} not found", course_id))),
    }
}

pub fn create_course(conn: &mut PgConnection, form: CourseForm) -> Result<Course, SchoolError> {
    use schema::course::dsl as C;

    let name = form.name.trim().to_string();
    let description = form.description.map(|d| d.trim().to_string()).filter(|d| !d.is_empty());
    validate_course_fields(&name, description.as_deref())?;

    if C::course.filter(C::name.eq(&name)).select(C::id).first::<i64>(conn).optional()?.is_some() {
        return Err(SchoolError::DuplicateKey(format!("course {} already exists", name)));
    }
    let course = diesel::insert_into(C::course)
        .values(&NewCourse { name, description })
        .returning(Course::as_returning())
        .get_result::<Course>(conn)?;
    info!("Courses: created {}", course.name);
    Ok(course)
}

pub fn list_courses(conn: &mut PgConnection) -> Result<Vec<Course>, SchoolError> {
    use schema::course::dsl as C;

    Ok(C::course.order(C::name.asc()).select(Course::as_select()).load(conn)?)
}

/// Teachers with the ids of the courses they teach.
pub fn list_teachers(conn: &mut PgConnection) -> Result<Vec<(User, Vec<i64>)>, SchoolError> {
    use schema::teacher_course_association::dsl as TC;
    use schema::user::dsl as U;

    let teachers: Vec<User> = U::user
        .filter(U::role.eq(Role::Teacher.as_str()))
        .order(U::username.asc())
        .select(User::as_select())
        .load(conn)?;
    let pairs: Vec<(i64, i64)> = TC::teacher_course_association
        .select((TC::teacher_id, TC::course_id))
        .order(TC::course_id.asc())
        .load(conn)?;
    Ok(teachers
        .into_iter()
        .map(|t| {
            let teaching = pairs.iter().filter(|(id, _)| *id == t.id).map(|(_, c)| *c).collect();
            (t, teaching)
        })
        .collect())
}

pub fn assign_teaching_course(conn: &mut PgConnection, teacher_id: i64, course_id: i64) -> Result<(), SchoolError> {
    use schema::teacher_course_association::dsl as TC;

    let teacher = load_user(conn, teacher_id)?;
    match teacher.role()? {
        Role::Teacher => {}
        Role::Student | Role::Admin => {
            return Err(SchoolError::Validation(format!("user {} is not a teacher", teacher.username)));
        }
    }
    ensure_course(conn, course_id)?;
    diesel::insert_into(TC::teacher_course_association)
        .values(&TeacherCourse { teacher_id, course_id })
        .on_conflict_do_nothing()
        .execute(conn)?;
    Ok(())
}

pub fn enroll_student(conn: &mut PgConnection, student_id: i64, course_id: i64) -> Result<(), SchoolError> {
    use schema::student_course_association::dsl as SC;

    let student = load_user(conn, student_id)?;
    match student.role()? {
        Role::Student => {}
        Role::Teacher | Role::Admin => {
            return Err(SchoolError::Validation(format!("user {} is not a student", student.username)));
        }
    }
    ensure_course(conn, course_id)?;
    diesel::insert_into(SC::student_course_association)
        .values(&StudentCourse { student_id, course_id })
        .on_conflict_do_nothing()
        .execute(conn)?;
    Ok(())
}

/// Students enrolled in a course, loaded with one join.
pub fn list_enrolled_students(conn: &mut PgConnection, course_id: i64) -> Result<Vec<EnrolledStudent>, SchoolError> {
    use schema::student_course_association::dsl as SC;
    use schema::user::dsl as U;

    ensure_course(conn, course_id)?;
    let rows: Vec<(i64, String, Option<String>, String)> = SC::student_course_association
        .inner_join(U::user)
        .filter(SC::course_id.eq(course_id))
        .select((U::id, U::username, U::full_name, U::email))
        .order(U::username.asc())
        .load(conn)?;
    Ok(rows
        .into_iter()
        .map(|(id, username, full_name, email)| EnrolledStudent {
            id,
            username,
            full_name,
            email,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::NewUser;
    use crate::test_support::test_connection;

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

    fn course(name: &str) -> CourseForm {
        CourseForm {
            name: name.to_string(),
            description: Some("  ".to_string()),
        }
    }

    #[test]
    fn course_names_are_unique() {
        let Some(mut conn) = test_connection() else { return };
        let created = create_course(&mut conn, course("Теория графов")).unwrap();
        assert_eq!(created.description, None);
        assert!(matches!(
            create_course(&mut conn, course("Теория графов")),
            Err(SchoolError::DuplicateKey(_))
        ));
        assert!(matches!(create_course(&mut conn, course(" ")), Err(SchoolError::Validation(_))));
    }

    #[test]
    fn enrollment_is_idempotent_and_role_checked() {
        let Some(mut conn) = test_connection() else { return };
        let c = create_course(&mut conn, course("Компиляторы")).unwrap();
        let s1 = insert_user(&mut conn, "s_courses_b", Role::Student);
        let s2 = insert_user(&mut conn, "s_courses_a", Role::Student);
        let t = insert_user(&mut conn, "t_courses", Role::Teacher);

        enroll_student(&mut conn, s1, c.id).unwrap();
        enroll_student(&mut conn, s1, c.id).unwrap();
        enroll_student(&mut conn, s2, c.id).unwrap();
        assert!(matches!(enroll_student(&mut conn, t, c.id), Err(SchoolError::Validation(_))));

        let names: Vec<String> = list_enrolled_students(&mut conn, c.id)
            .unwrap()
            .into_iter()
            .map(|s| s.username)
            .collect();
        assert_eq!(names, vec!["s_courses_a", "s_courses_b"]);
    }

    #[test]
    fn only_teachers_get_teaching_courses() {
        let Some(mut conn) = test_connection() else { return };
        let c = create_course(&mut conn, course("Операционные системы")).unwrap();
        let t = insert_user(&mut conn, "t_courses_assign", Role::Teacher);
        let s = insert_user(&mut conn, "s_courses_assign", Role::Student);

        assign_teaching_course(&mut conn, t, c.id).unwrap();
        assign_teaching_course(&mut conn, t, c.id).unwrap();
        assert!(matches!(
            assign_teaching_course(&mut conn, s, c.id),
            Err(SchoolError::Validation(_))
        ));
        assert!(matches!(
            assign_teaching_course(&mut conn, t, i64::MAX),
            Err(SchoolError::NotFound(_))
        ));
    }
}
