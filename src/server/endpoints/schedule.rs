use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use chrono::Local;
use http::StatusCode;
use log::info;
use serde::Deserialize;
use serde_json::json;

use crate::error::SchoolError;
use crate::models::school::Viewer;
use crate::server::types::{AppState, done, parse_body, parse_query, with_transaction};
use crate::services::schedule::{self, ScheduleEdit, Scope};
use crate::services::{courses, groups, rooms};

#[derive(Debug, Deserialize)]
pub struct WeekQuery {
    #[serde(default)]
    pub week: i64,
}

#[derive(Debug, Deserialize)]
struct DeleteRequest {
    schedule_id: i64,
}

/// GET /schedule?week=N
/// The viewer's weekly timetable.
pub async fn get_schedule(
    State(s): State<Arc<AppState>>,
    Extension(viewer): Extension<Viewer>,
    query: Result<Query<WeekQuery>, QueryRejection>,
) -> Result<Response, SchoolError> {
    let q = parse_query(query)?;
    info!("GET /schedule?week={} ({} {})", q.week, viewer.role, viewer.username);
    let today = Local::now().date_naive();
    let grid = with_transaction(&s, move |conn| schedule::load_week(conn, &viewer, today, q.week)).await?;
    Ok((StatusCode::OK, Json(grid)).into_response())
}

/// GET /admin/schedule?week=N
/// Full grid plus everything the editor needs for its selectors.
pub async fn get_admin_schedule(
    State(s): State<Arc<AppState>>,
    query: Result<Query<WeekQuery>, QueryRejection>,
) -> Result<Response, SchoolError> {
    let q = parse_query(query)?;
    info!("GET /admin/schedule?week={}", q.week);
    let today = Local::now().date_naive();
    let page = with_transaction(&s, move |conn| {
        let grid = schedule::load_week_for_scope(conn, Scope::Everything, today, q.week)?;
        let teachers: Vec<_> = courses::list_teachers(conn)?
            .into_iter()
            .map(|(t, teaching)| {
                json!({
                    "id": t.id,
                    "name": t.display_name(),
                    "teaching": teaching,
                })
            })
            .collect();
        Ok(json!({
            "grid": grid,
            "groups": groups::list(conn)?,
            "courses": courses::list_courses(conn)?,
            "rooms": rooms::list(conn)?,
            "teachers": teachers,
        }))
    })
    .await?;
    Ok((StatusCode::OK, Json(page)).into_response())
}

async fn save_edit(s: &Arc<AppState>, body: &[u8]) -> Result<Response, SchoolError> {
    let edit: ScheduleEdit = parse_body(body)?;
    let creating = edit.schedule_id.is_none();
    let row = with_transaction(s, move |conn| schedule::save(conn, &edit)).await?;
    let (status, message) = if creating {
        (StatusCode::CREATED, "schedule entry created")
    } else {
        (StatusCode::OK, "schedule entry updated")
    };
    Ok(done(status, message, json!({ "schedule": row })))
}

/// POST /admin/schedule
/// Form submission from the grid editor page.
pub async fn post_admin_schedule(State(s): State<Arc<AppState>>, body: Bytes) -> Result<Response, SchoolError> {
    info!("POST /admin/schedule");
    save_edit(&s, &body).await
}

/// POST /admin/schedule/edit
pub async fn post_edit(State(s): State<Arc<AppState>>, body: Bytes) -> Result<Response, SchoolError> {
    info!("POST /admin/schedule/edit");
    save_edit(&s, &body).await
}

/// POST /admin/schedule/delete
pub async fn post_delete(State(s): State<Arc<AppState>>, body: Bytes) -> Result<Response, SchoolError> {
    let req: DeleteRequest = parse_body(&body)?;
    info!("POST /admin/schedule/delete (schedule_id={})", req.schedule_id);
    with_transaction(&s, move |conn| schedule::deactivate(conn, req.schedule_id)).await?;
    Ok(done(StatusCode::OK, "schedule entry removed", json!({ "schedule_id": req.schedule_id })))
}
