use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use http::StatusCode;
use log::info;
use serde::Deserialize;
use serde_json::json;

use crate::error::SchoolError;
use crate::server::types::{AppState, done, parse_body, with_transaction};
use crate::services::groups::{self, GroupForm};

#[derive(Debug, Deserialize)]
struct MembershipRequest {
    student_id: i64,
}

/// GET /admin/create_groups
pub async fn get_groups(State(s): State<Arc<AppState>>) -> Result<Response, SchoolError> {
    info!("GET /admin/create_groups");
    let list = with_transaction(&s, groups::list).await?;
    Ok((StatusCode::OK, Json(json!({ "groups": list }))).into_response())
}

/// POST /admin/create_groups
pub async fn post_create(State(s): State<Arc<AppState>>, body: Bytes) -> Result<Response, SchoolError> {
    info!("POST /admin/create_groups");
    let form: GroupForm = parse_body(&body)?;
    let default_max = s.cfg.default_max_students;
    let group = with_transaction(&s, move |conn| groups::create(conn, form, default_max)).await?;
    Ok(done(
        StatusCode::CREATED,
        format!("group {} created", group.name),
        json!({ "group": group }),
    ))
}

/// POST /admin/groups/:id/students
pub async fn post_assign_student(
    State(s): State<Arc<AppState>>,
    Path(id): Path<i64>,
    body: Bytes,
) -> Result<Response, SchoolError> {
    let req: MembershipRequest = parse_body(&body)?;
    info!("POST /admin/groups/{}/students (student_id={})", id, req.student_id);
    with_transaction(&s, move |conn| groups::assign_student_to_group(conn, id, req.student_id)).await?;
    Ok(done(
        StatusCode::OK,
        "student assigned to group",
        json!({ "group_id": id, "student_id": req.student_id }),
    ))
}

/// POST /admin/groups/:id/delete
pub async fn post_delete(State(s): State<Arc<AppState>>, Path(id): Path<i64>) -> Result<Response, SchoolError> {
    info!("POST /admin/groups/{}/delete", id);
    with_transaction(&s, move |conn| groups::delete(conn, id)).await?;
    Ok(done(StatusCode::OK, "group deleted", json!({ "group_id": id })))
}
