use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use chrono::{Local, NaiveDate};
use http::StatusCode;
use log::info;
use serde::Deserialize;
use serde_json::json;

use crate::error::SchoolError;
use crate::models::school::Viewer;
use crate::server::types::{AppState, done, parse_body, parse_query, with_transaction};
use crate::services::attendance::{self, AttendanceForm};

#[derive(Debug, Deserialize)]
pub struct JournalQuery {
    #[serde(default)]
    pub from: Option<NaiveDate>,
}

/// GET /courses/:id/attendance?from=YYYY-MM-DD
pub async fn get_attendance(
    State(s): State<Arc<AppState>>,
    Extension(viewer): Extension<Viewer>,
    Path(id): Path<i64>,
    query: Result<Query<JournalQuery>, QueryRejection>,
) -> Result<Response, SchoolError> {
    let q = parse_query(query)?;
    info!("GET /courses/{}/attendance ({})", id, viewer.username);
    let journal = with_transaction(&s, move |conn| {
        attendance::authorize(conn, &viewer, id)?;
        attendance::list_for_course(conn, id, q.from)
    })
    .await?;
    Ok((StatusCode::OK, Json(json!({ "course_id": id, "attendance": journal }))).into_response())
}

/// POST /courses/:id/attendance
pub async fn post_mark(
    State(s): State<Arc<AppState>>,
    Extension(viewer): Extension<Viewer>,
    Path(id): Path<i64>,
    body: Bytes,
) -> Result<Response, SchoolError> {
    let form: AttendanceForm = parse_body(&body)?;
    info!(
        "POST /courses/{}/attendance (student_id={}, {})",
        id, form.student_id, viewer.username
    );
    let today = Local::now().date_naive();
    let record = with_transaction(&s, move |conn| {
        attendance::authorize(conn, &viewer, id)?;
        attendance::mark(conn, id, form, viewer.id, today)
    })
    .await?;
    Ok(done(
        StatusCode::OK,
        format!("attendance marked as {} for {}", record.status, record.date),
        json!({ "attendance": record }),
    ))
}
