//! Request guards. The viewer's identity comes from the `X-User-Id` header set
//! by the upstream auth proxy; the role is read from the user table.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use diesel::prelude::*;
use http::{HeaderMap, Method};
use log::warn;

use crate::db::models::User;
use crate::error::SchoolError;
use crate::models::school::{Role, Viewer};
use crate::schema;
use crate::server::types::{AppState, with_transaction};

pub const USER_HEADER: &str = "x-user-id";
pub const LOGIN_PATH: &str = "/login";

pub fn viewer_id(headers: &HeaderMap) -> Result<i64, SchoolError> {
    let raw = headers
        .get(USER_HEADER)
        .ok_or_else(|| SchoolError::Unauthorized("login required".to_string()))?;
    raw.to_str()
        .ok()
        .and_then(|s| s.trim().parse::<i64>().ok())
        .ok_or_else(|| SchoolError::Unauthorized("malformed user id header".to_string()))
}

async fn resolve_viewer(state: &Arc<AppState>, headers: &HeaderMap) -> Result<Viewer, SchoolError> {
    use schema::user::dsl as U;

    let id = viewer_id(headers)?;
    with_transaction(state, move |conn| {
        let user: User = U::user
            .find(id)
            .select(User::as_select())
            .first(conn)
            .optional()?
            .ok_or_else(|| SchoolError::Unauthorized(format!("unknown user {}", id)))?;
        Ok(Viewer {
            id: user.id,
            role: user.role()?,
            username: user.username,
        })
    })
    .await
}

/// Page routes send anonymous or under-privileged viewers to the login page;
/// API routes get a JSON 403.
pub fn deny(method: &Method, err: SchoolError) -> Response {
    match err {
        SchoolError::Unauthorized(reason) => {
            warn!("Access denied ({} request): {}", method, reason);
            if method == Method::GET {
                Redirect::to(LOGIN_PATH).into_response()
            } else {
                SchoolError::Unauthorized(reason).into_response()
            }
        }
        other => other.into_response(),
    }
}

pub async fn require_viewer(State(state): State<Arc<AppState>>, mut req: Request, next: Next) -> Response {
    match resolve_viewer(&state, req.headers()).await {
        Ok(viewer) => {
            req.extensions_mut().insert(viewer);
            next.run(req).await
        }
        Err(e) => deny(req.method(), e),
    }
}

pub async fn require_admin(State(state): State<Arc<AppState>>, mut req: Request, next: Next) -> Response {
    let viewer = match resolve_viewer(&state, req.headers()).await {
        Ok(viewer) => viewer,
        Err(e) => return deny(req.method(), e),
    };
    match viewer.role {
        Role::Admin => {
            req.extensions_mut().insert(viewer);
            next.run(req).await
        }
        Role::Student | Role::Teacher => deny(
            req.method(),
            SchoolError::Unauthorized(format!("{} is not an administrator", viewer.username)),
        ),
    }
}
