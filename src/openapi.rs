use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::{Modify, OpenApi};

// ============================================================================
// PUBLIC API SPECIFICATION
// ============================================================================

/// Public OpenAPI specification for the gallery read surface.
///
/// Served at `/openapi.json`; covers system health and the unauthenticated
/// gallery listing/detail/stats/thumbnail endpoints (§4.J).
#[derive(OpenApi)]
#[openapi(
    info(
        title = "EH Stash Sync — Gallery API",
        version = "1.0.0",
        description = "Public read-only API over the mirrored gallery metadata"
    ),
    paths(
        crate::api::handlers::health_handler,
        crate::api::gallery_handlers::list_galleries_handler,
        crate::api::gallery_handlers::get_gallery_handler,
        crate::api::gallery_handlers::stats_handler,
    ),
    components(
        schemas(
            crate::api::handlers::HealthResponse,
            crate::api::handlers::ErrorResponse,
            crate::db::models::Gallery,
            crate::db::models::SyncTaskRow,
            crate::db::models::TaskType,
            crate::db::models::DesiredStatus,
            crate::db::models::TaskStatus,
            crate::api::gallery_handlers::GalleryListResponse,
            crate::api::gallery_handlers::StatsResponse,
        )
    ),
    tags(
        (name = "system", description = "System health endpoints"),
        (name = "galleries", description = "Read-only gallery listing and detail endpoints"),
        (name = "stats", description = "Aggregate mirror statistics"),
    )
)]
pub struct PublicApiDoc;

// ============================================================================
// ADMIN API SPECIFICATION
// ============================================================================

/// Admin OpenAPI specification for task lifecycle control (§4.I).
///
/// Served at `/openapi_admin.json`; intentionally not referenced from the
/// public spec, and every path requires the Bearer admin token.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "EH Stash Sync — Admin API",
        version = "1.0.0",
        description = "Internal task CRUD, lifecycle control, and diagnostics. Bearer-auth only."
    ),
    paths(
        crate::api::admin_handlers::create_task_handler,
        crate::api::admin_handlers::list_tasks_handler,
        crate::api::admin_handlers::get_task_handler,
        crate::api::admin_handlers::patch_task_handler,
        crate::api::admin_handlers::delete_task_handler,
        crate::api::admin_handlers::start_task_handler,
        crate::api::admin_handlers::stop_task_handler,
        crate::api::admin_handlers::thumb_queue_stats_handler,
        crate::api::handlers::access_logs_handler,
        crate::api::handlers::clear_access_logs_handler,
    ),
    components(
        schemas(
            crate::api::admin_handlers::CreateTaskRequest,
            crate::api::admin_handlers::UpdateTaskRequest,
            crate::api::admin_handlers::TaskStatusResponse,
            crate::api::admin_handlers::ThumbQueueStatsResponse,
            crate::api::handlers::AccessLogsResponse,
            crate::state::AccessLogEntry,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "admin", description = "Sync task CRUD and lifecycle control"),
        (name = "system", description = "System diagnostics"),
    )
)]
pub struct AdminApiDoc;

// ============================================================================
// SECURITY ADDON (shared)
// ============================================================================

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        openapi.openapi = utoipa::openapi::OpenApiVersion::Version31;

        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearerAuth",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }
    }
}
