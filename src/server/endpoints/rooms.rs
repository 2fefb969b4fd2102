use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use http::StatusCode;
use log::info;
use serde_json::json;

use crate::error::SchoolError;
use crate::models::school::RoomType;
use crate::server::types::{AppState, done, parse_body, with_transaction};
use crate::services::rooms::{self, RoomForm};

/// GET /admin/rooms
pub async fn get_rooms(State(s): State<Arc<AppState>>) -> Result<Response, SchoolError> {
    info!("GET /admin/rooms");
    let list = with_transaction(&s, rooms::list).await?;
    let room_types: Vec<_> = RoomType::ALL
        .iter()
        .map(|t| json!({ "code": t.as_str(), "label": t.label() }))
        .collect();
    Ok((StatusCode::OK, Json(json!({ "rooms": list, "room_types": room_types }))).into_response())
}

/// POST /admin/rooms and POST /admin/rooms/create
pub async fn post_create(State(s): State<Arc<AppState>>, body: Bytes) -> Result<Response, SchoolError> {
    info!("POST /admin/rooms/create");
    let form: RoomForm = parse_body(&body)?;
    let room = with_transaction(&s, move |conn| rooms::create(conn, form)).await?;
    Ok(done(
        StatusCode::CREATED,
        format!("room {} created", room.number),
        json!({ "room": room }),
    ))
}

/// POST /admin/rooms/:id/update
pub async fn post_update(
    State(s): State<Arc<AppState>>,
    Path(id): Path<i64>,
    body: Bytes,
) -> Result<Response, SchoolError> {
    info!("POST /admin/rooms/{}/update", id);
    let form: RoomForm = parse_body(&body)?;
    let room = with_transaction(&s, move |conn| rooms::update(conn, id, form)).await?;
    Ok(done(StatusCode::OK, format!("room {} updated", room.number), json!({ "room": room })))
}

/// POST /admin/rooms/:id/delete
pub async fn post_delete(State(s): State<Arc<AppState>>, Path(id): Path<i64>) -> Result<Response, SchoolError> {
    info!("POST /admin/rooms/{}/delete", id);
    with_transaction(&s, move |conn| rooms::delete(conn, id)).await?;
    Ok(done(StatusCode::OK, "room deleted", json!({ "room_id": id })))
}
