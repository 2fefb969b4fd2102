use std::sync::Arc;

use axum::routing::{get, post};
use axum::{Router, middleware as mw};
use log::info;

use crate::server::endpoints::{attendance, courses, groups, health, rooms, schedule, substitutions};
use crate::server::middleware::{require_admin, require_viewer};
pub use crate::server::types::AppState;

mod endpoints;
mod middleware;
mod types;

/// Creates the router served by `axum`.
///
/// Admin routes sit behind `require_admin`; the weekly view, course rosters
/// and attendance journals only need a known viewer and check the role
/// themselves.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let admin_router = Router::new()
        .route(
            "/admin/schedule",
            get(schedule::get_admin_schedule).post(schedule::post_admin_schedule),
        )
        .route("/admin/schedule/edit", post(schedule::post_edit))
        .route("/admin/schedule/delete", post(schedule::post_delete))
        .route("/admin/rooms", get(rooms::get_rooms).post(rooms::post_create))
        .route("/admin/rooms/create", post(rooms::post_create))
        .route("/admin/rooms/:id/update", post(rooms::post_update))
        .route("/admin/rooms/:id/delete", post(rooms::post_delete))
        .route("/admin/create_groups", get(groups::get_groups).post(groups::post_create))
        .route("/admin/groups/:id/students", post(groups::post_assign_student))
        .route("/admin/groups/:id/delete", post(groups::post_delete))
        .route("/admin/courses", get(courses::get_courses).post(courses::post_create))
        .route("/admin/courses/:id/teachers", post(courses::post_assign_teacher))
        .route("/admin/courses/:id/students", post(courses::post_enroll_student))
        .route("/admin/substitutions", get(substitutions::get_substitutions))
        .route("/admin/substitution/create", post(substitutions::post_create))
        .layer(mw::from_fn_with_state(app_state.clone(), require_admin));

    let viewer_router = Router::new()
        .route("/schedule", get(schedule::get_schedule))
        .route("/courses/:id/students", get(courses::get_enrolled_students))
        .route(
            "/courses/:id/attendance",
            get(attendance::get_attendance).post(attendance::post_mark),
        )
        .layer(mw::from_fn_with_state(app_state.clone(), require_viewer));

    Router::new()
        .route("/health", get(health::get_health))
        .merge(admin_router)
        .merge(viewer_router)
        .with_state(app_state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Unable to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}

/// Bind `bind_addr` and serve until Ctrl-C.
pub async fn serve(app_state: Arc<AppState>, bind_addr: &str) -> Result<(), String> {
    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .map_err(|e| format!("Binding {} failed: {}", bind_addr, e))?;
    info!("Listening on {}", bind_addr);
    axum::serve(listener, create_router(app_state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| format!("HTTP server failed: {}", e))
}
