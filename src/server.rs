use crate::api::{
    admin_handlers, gallery_handlers, handlers,
    middleware::{access_log_middleware, auth_middleware},
};
use crate::openapi::{AdminApiDoc, PublicApiDoc};
use crate::state::AppState;
use axum::{
    middleware,
    response::Json,
    routing::{delete, get, patch, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;

/// Create the Axum router with all routes (§6, §4.I, §4.J).
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Public: system + read-only gallery surface, no auth required.
    let public_routes = Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/openapi.json", get(openapi_public_handler))
        .route("/openapi_admin.json", get(openapi_admin_handler))
        .route("/v1/galleries", get(gallery_handlers::list_galleries_handler))
        .route("/v1/galleries/:gid", get(gallery_handlers::get_gallery_handler))
        .route("/v1/stats", get(gallery_handlers::stats_handler))
        .route("/v1/thumbs/:gid", get(gallery_handlers::get_thumb_handler));

    // Admin: task lifecycle + thumb queue stats + access logs, Bearer-gated.
    let admin_routes = Router::new()
        .route("/v1/admin/tasks", post(admin_handlers::create_task_handler))
        .route("/v1/admin/tasks", get(admin_handlers::list_tasks_handler))
        .route("/v1/admin/tasks/:id", get(admin_handlers::get_task_handler))
        .route("/v1/admin/tasks/:id", patch(admin_handlers::patch_task_handler))
        .route("/v1/admin/tasks/:id", delete(admin_handlers::delete_task_handler))
        .route("/v1/admin/tasks/:id/start", post(admin_handlers::start_task_handler))
        .route("/v1/admin/tasks/:id/stop", post(admin_handlers::stop_task_handler))
        .route("/v1/admin/thumb-queue/stats", get(admin_handlers::thumb_queue_stats_handler))
        .route("/access-logs", get(handlers::access_logs_handler))
        .route("/access-logs", delete(handlers::clear_access_logs_handler))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(admin_routes)
        .layer(middleware::from_fn_with_state(state.clone(), access_log_middleware))
        .layer(cors)
        .with_state(state)
}

/// Serve public OpenAPI spec as JSON.
///
/// Auto-discoverable at `/openapi.json`; covers only the read-only gallery
/// surface and system endpoints.
async fn openapi_public_handler() -> Json<utoipa::openapi::OpenApi> {
    Json(PublicApiDoc::openapi())
}

/// Serve admin OpenAPI spec as JSON.
///
/// Intentionally not linked from the public spec — only operators who know
/// this path can see the admin task-control surface.
async fn openapi_admin_handler() -> Json<utoipa::openapi::OpenApi> {
    Json(AdminApiDoc::openapi())
}
