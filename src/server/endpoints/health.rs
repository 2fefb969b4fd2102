use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use diesel::RunQueryDsl;
use http::StatusCode;
use serde_json::json;

use crate::server::types::{AppState, with_transaction};

/// GET /health
pub async fn get_health(State(s): State<Arc<AppState>>) -> Response {
    let db = with_transaction(&s, |conn| Ok(diesel::sql_query("SELECT 1").execute(conn)?)).await;
    match db {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") })),
        )
            .into_response(),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "unavailable", "message": e.message() })),
        )
            .into_response(),
    }
}
