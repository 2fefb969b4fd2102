use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use http::StatusCode;
use log::info;
use serde::Deserialize;
use serde_json::json;

use crate::error::SchoolError;
use crate::models::school::{Role, Viewer};
use crate::server::types::{AppState, done, parse_body, with_transaction};
use crate::services::courses::{self, CourseForm};

#[derive(Debug, Deserialize)]
struct TeacherRequest {
    teacher_id: i64,
}

#[derive(Debug, Deserialize)]
struct StudentRequest {
    student_id: i64,
}

/// GET /courses/:id/students
/// Teachers and admins only.
pub async fn get_enrolled_students(
    State(s): State<Arc<AppState>>,
    Extension(viewer): Extension<Viewer>,
    Path(id): Path<i64>,
) -> Result<Response, SchoolError> {
    info!("GET /courses/{}/students ({})", id, viewer.username);
    match viewer.role {
        Role::Teacher | Role::Admin => {}
        Role::Student => {
            return Err(SchoolError::Unauthorized("students cannot list course enrollment".to_string()));
        }
    }
    let students = with_transaction(&s, move |conn| courses::list_enrolled_students(conn, id)).await?;
    Ok((StatusCode::OK, Json(json!({ "course_id": id, "students": students }))).into_response())
}

/// GET /admin/courses
pub async fn get_courses(State(s): State<Arc<AppState>>) -> Result<Response, SchoolError> {
    info!("GET /admin/courses");
    let list = with_transaction(&s, courses::list_courses).await?;
    Ok((StatusCode::OK, Json(json!({ "courses": list }))).into_response())
}

/// POST /admin/courses
pub async fn post_create(State(s): State<Arc<AppState>>, body: Bytes) -> Result<Response, SchoolError> {
    info!("POST /admin/courses");
    let form: CourseForm = parse_body(&body)?;
    let course = with_transaction(&s, move |conn| courses::create_course(conn, form)).await?;
    Ok(done(
        StatusCode::CREATED,
        format!("course {} created", course.name),
        json!({ "course": course }),
    ))
}

/// POST /admin/courses/:id/teachers
pub async fn post_assign_teacher(
    State(s): State<Arc<AppState>>,
    Path(id): Path<i64>,
    body: Bytes,
) -> Result<Response, SchoolError> {
    let req: TeacherRequest = parse_body(&body)?;
    info!("POST /admin/courses/{}/teachers (teacher_id={})", id, req.teacher_id);
    with_transaction(&s, move |conn| courses::assign_teaching_course(conn, req.teacher_id, id)).await?;
    Ok(done(
        StatusCode::OK,
        "teaching assignment saved",
        json!({ "course_id": id, "teacher_id": req.teacher_id }),
    ))
}

/// POST /admin/courses/:id/students
pub async fn post_enroll_student(
    State(s): State<Arc<AppState>>,
    Path(id): Path<i64>,
    body: Bytes,
) -> Result<Response, SchoolError> {
    let req: StudentRequest = parse_body(&body)?;
    info!("POST /admin/courses/{}/students (student_id={})", id, req.student_id);
    with_transaction(&s, move |conn| courses::enroll_student(conn, req.student_id, id)).await?;
    Ok(done(
        StatusCode::OK,
        "student enrolled",
        json!({ "course_id": id, "student_id": req.student_id }),
    ))
}
