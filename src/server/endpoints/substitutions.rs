use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use chrono::NaiveDate;
use http::StatusCode;
use log::info;
use serde::Deserialize;
use serde_json::json;

use crate::error::SchoolError;
use crate::server::types::{AppState, done, parse_body, parse_query, with_transaction};
use crate::services::substitutions::{self, SubstitutionForm};

#[derive(Debug, Deserialize)]
pub struct FromQuery {
    #[serde(default)]
    pub from: Option<NaiveDate>,
}

/// GET /admin/substitutions?from=YYYY-MM-DD
pub async fn get_substitutions(
    State(s): State<Arc<AppState>>,
    query: Result<Query<FromQuery>, QueryRejection>,
) -> Result<Response, SchoolError> {
    let q = parse_query(query)?;
    info!(
        "GET /admin/substitutions (from={})",
        q.from.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string())
    );
    let list = with_transaction(&s, move |conn| substitutions::list(conn, q.from)).await?;
    Ok((StatusCode::OK, Json(json!({ "substitutions": list }))).into_response())
}

/// POST /admin/substitution/create
pub async fn post_create(State(s): State<Arc<AppState>>, body: Bytes) -> Result<Response, SchoolError> {
    info!("POST /admin/substitution/create");
    let form: SubstitutionForm = parse_body(&body)?;
    let record = with_transaction(&s, move |conn| substitutions::create(conn, form)).await?;
    Ok(done(
        StatusCode::CREATED,
        format!("substitution recorded for {}", record.date),
        json!({ "substitution": record }),
    ))
}
