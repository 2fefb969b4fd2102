use std::sync::{Arc, Mutex};

use axum::Json;
use axum::extract::Query;
use axum::extract::rejection::QueryRejection;
use axum::response::{IntoResponse, Response};
use diesel::PgConnection;
use diesel::prelude::*;
use http::StatusCode;
use log::error;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::config::Config;
use crate::error::SchoolError;

/// Shared server state. One connection serves every request; handlers reach
/// it through `with_transaction`.
pub struct AppState {
    pub db: Mutex<PgConnection>,
    pub cfg: Config,
}

impl AppState {
    pub fn new(conn: PgConnection, cfg: Config) -> Self {
        AppState {
            db: Mutex::new(conn),
            cfg,
        }
    }
}

const INTERNAL_MESSAGE: &str = "internal server error";

pub fn status_for(err: &SchoolError) -> StatusCode {
    match err {
        SchoolError::Validation(_) | SchoolError::Conflict(_) => StatusCode::BAD_REQUEST,
        SchoolError::DuplicateKey(_) => StatusCode::CONFLICT,
        SchoolError::NotFound(_) => StatusCode::NOT_FOUND,
        SchoolError::Unauthorized(_) => StatusCode::FORBIDDEN,
        SchoolError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn error_body(err: &SchoolError) -> Value {
    let message = match err {
        SchoolError::Internal(_) => INTERNAL_MESSAGE,
        other => other.message(),
    };
    json!({ "success": false, "message": message })
}

impl IntoResponse for SchoolError {
    fn into_response(self) -> Response {
        if let SchoolError::Internal(detail) = &self {
            error!("Request failed: {}", detail);
        }
        (status_for(&self), Json(error_body(&self))).into_response()
    }
}

/// `{success: true, message, data}` response for a completed mutation.
pub fn done(status: StatusCode, message: impl Into<String>, data: Value) -> Response {
    let body = json!({ "success": true, "message": message.into(), "data": data });
    (status, Json(body)).into_response()
}

/// Decode a JSON body, naming the offending field on failure.
pub fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, SchoolError> {
    let de = &mut serde_json::Deserializer::from_slice(body);
    serde_path_to_error::deserialize(de).map_err(|e| {
        let path = e.path().to_string();
        let inner = e.into_inner();
        if path == "." {
            SchoolError::Validation(format!("invalid request body: {}", inner))
        } else {
            SchoolError::Validation(format!("invalid field '{}': {}", path, inner))
        }
    })
}

/// Unwrap a query-string extractor; a malformed query is a validation error
/// with the usual JSON body instead of axum's plain-text rejection.
pub fn parse_query<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, SchoolError> {
    match query {
        Ok(Query(q)) => Ok(q),
        Err(rejection) => Err(SchoolError::Validation(format!(
            "invalid query string: {}",
            rejection.body_text()
        ))),
    }
}

/// Run `f` inside one database transaction on the blocking pool. An `Err`
/// rolls the transaction back.
pub async fn with_transaction<T, F>(state: &Arc<AppState>, f: F) -> Result<T, SchoolError>
where
    T: Send + 'static,
    F: FnOnce(&mut PgConnection) -> Result<T, SchoolError> + Send + 'static,
{
    let state = Arc::clone(state);
    tokio::task::spawn_blocking(move || {
        let mut conn = state
            .db
            .lock()
            .map_err(|_| SchoolError::Internal("database connection lock poisoned".to_string()))?;
        conn.transaction(f)
    })
    .await
    .map_err(|e| SchoolError::Internal(format!("database task failed: {}", e)))?
}
