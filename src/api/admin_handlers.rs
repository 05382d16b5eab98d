//! Admin HTTP surface (§4.I): task CRUD and lifecycle control, plus
//! thumb-queue stats. Grounded on `original_source/api/routers/admin.py`.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::handlers::ErrorResponse;
use crate::db::models::{DesiredStatus, SyncTaskRow, TaskStatus, TaskType};
use crate::db::tasks::{self, NewTask};
use crate::error::StoreError;
use crate::state::AppState;

fn err(status: StatusCode, msg: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
    (
        status,
        Json(ErrorResponse {
            error: msg.into(),
            code: status.as_u16(),
        }),
    )
}

fn store_err(e: StoreError) -> (StatusCode, Json<ErrorResponse>) {
    match e {
        StoreError::NotFound => err(StatusCode::NOT_FOUND, "task not found"),
        other => err(StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
    }
}

/// `full` config default: `inline_set` is always forced server-side (§6).
fn default_full_config() -> serde_json::Value {
    serde_json::json!({ "inline_set": "dm_e", "start_gid": null })
}

fn default_incremental_config() -> serde_json::Value {
    serde_json::json!({
        "inline_set": "dm_e",
        "categories": [],
        "scan_window": 10_000,
        "rating_diff_threshold": 0.5
    })
}

/// Merge `input` over `base`, forcing `inline_set` regardless of input, and
/// validating per-type invariants (§4.I, §6).
fn normalize_config(
    task_type: TaskType,
    category: &str,
    input: Option<serde_json::Value>,
) -> Result<serde_json::Value, String> {
    let mut merged = match task_type {
        TaskType::Full => default_full_config(),
        TaskType::Incremental => default_incremental_config(),
    };

    if let Some(serde_json::Value::Object(map)) = input {
        if let serde_json::Value::Object(base) = &mut merged {
            for (k, v) in map {
                if k != "inline_set" {
                    base.insert(k, v);
                }
            }
        }
    }
    merged["inline_set"] = serde_json::Value::String("dm_e".to_string());

    match task_type {
        TaskType::Full => {
            if !crate::db::models::is_known_category(category) {
                return Err(format!("category {:?} is not a recognized site label", category));
            }
        }
        TaskType::Incremental => {
            if category != "Mixed" {
                return Err("incremental tasks must have category \"Mixed\"".to_string());
            }
            let categories: Vec<String> = merged
                .get("categories")
                .and_then(|v| serde_json::from_value(v.clone()).ok())
                .unwrap_or_default();
            let mut dedup: Vec<String> = Vec::new();
            for c in categories {
                if !crate::db::models::is_known_category(&c) {
                    return Err(format!("category {:?} is not a recognized site label", c));
                }
                if !dedup.contains(&c) {
                    dedup.push(c);
                }
            }
            if dedup.is_empty() {
                return Err("incremental categories must be a non-empty subset of the site labels".to_string());
            }
            merged["categories"] = serde_json::to_value(dedup).unwrap();
        }
    }

    Ok(merged)
}

fn init_state(task_type: TaskType, config: &serde_json::Value) -> serde_json::Value {
    match task_type {
        TaskType::Full => serde_json::json!({
            "next_gid": config.get("start_gid").cloned().unwrap_or(serde_json::Value::Null),
            "round": 0,
            "done": false,
            "anchor_gid": null,
            "total_count": null
        }),
        TaskType::Incremental => serde_json::json!({
            "next_gid": null,
            "round": 0,
            "latest_gid": null,
            "scanned_count": 0
        }),
    }
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct CreateTaskRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub task_type: String,
    pub category: String,
    #[serde(default)]
    pub config: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct UpdateTaskRequest {
    pub name: Option<String>,
    pub config: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct TaskStatusResponse {
    pub id: i32,
    pub desired_status: DesiredStatus,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ThumbQueueStatsResponse {
    pub pending: i64,
    pub processing: i64,
    pub done: i64,
    pub waiting: i64,
}

/// `POST /v1/admin/tasks`
#[utoipa::path(
    post,
    path = "/v1/admin/tasks",
    request_body = CreateTaskRequest,
    responses(
        (status = 201, description = "Task created", body = SyncTaskRow),
        (status = 409, description = "Name collision or duplicate incremental task", body = ErrorResponse),
        (status = 422, description = "Invalid task config", body = ErrorResponse),
    ),
    security(("bearerAuth" = [])),
    tag = "admin"
)]
pub async fn create_task_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateTaskRequest>,
) -> Result<(StatusCode, Json<SyncTaskRow>), (StatusCode, Json<ErrorResponse>)> {
    let task_type = match body.task_type.as_str() {
        "full" => TaskType::Full,
        "incremental" => TaskType::Incremental,
        other => return Err(err(StatusCode::UNPROCESSABLE_ENTITY, format!("unknown task type {:?}", other))),
    };

    if task_type == TaskType::Incremental
        && tasks::incremental_task_exists(&state.pool).await.map_err(store_err)?
    {
        return Err(err(StatusCode::CONFLICT, "only one incremental task may exist at a time"));
    }

    let config = normalize_config(task_type, &body.category, body.config)
        .map_err(|msg| err(StatusCode::UNPROCESSABLE_ENTITY, msg))?;
    let state_json = init_state(task_type, &config);

    if tasks::name_in_use(&state.pool, &body.name, None).await.map_err(store_err)? {
        return Err(err(StatusCode::CONFLICT, "task name already exists"));
    }

    let row = tasks::insert_task(
        &state.pool,
        NewTask {
            name: body.name,
            task_type,
            category: body.category,
            config,
            state: state_json,
        },
    )
    .await
    .map_err(store_err)?;

    Ok((StatusCode::CREATED, Json(row)))
}

/// `GET /v1/admin/tasks`
#[utoipa::path(
    get,
    path = "/v1/admin/tasks",
    responses((status = 200, description = "All tasks", body = [SyncTaskRow])),
    security(("bearerAuth" = [])),
    tag = "admin"
)]
pub async fn list_tasks_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<SyncTaskRow>>, (StatusCode, Json<ErrorResponse>)> {
    let rows = tasks::list_sync_tasks(&state.pool).await.map_err(store_err)?;
    Ok(Json(rows))
}

/// `GET /v1/admin/tasks/:id`
#[utoipa::path(
    get,
    path = "/v1/admin/tasks/{id}",
    responses(
        (status = 200, description = "Task", body = SyncTaskRow),
        (status = 404, description = "Task not found", body = ErrorResponse),
    ),
    security(("bearerAuth" = [])),
    tag = "admin"
)]
pub async fn get_task_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<SyncTaskRow>, (StatusCode, Json<ErrorResponse>)> {
    let row = tasks::get_sync_task(&state.pool, id).await.map_err(store_err)?;
    Ok(Json(row))
}

/// `PATCH /v1/admin/tasks/:id`
#[utoipa::path(
    patch,
    path = "/v1/admin/tasks/{id}",
    request_body = UpdateTaskRequest,
    responses(
        (status = 200, description = "Updated task", body = SyncTaskRow),
        (status = 404, description = "Task not found", body = ErrorResponse),
        (status = 409, description = "Name collision", body = ErrorResponse),
        (status = 422, description = "Invalid task config", body = ErrorResponse),
    ),
    security(("bearerAuth" = [])),
    tag = "admin"
)]
pub async fn patch_task_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Json(body): Json<UpdateTaskRequest>,
) -> Result<Json<SyncTaskRow>, (StatusCode, Json<ErrorResponse>)> {
    let current = tasks::get_sync_task(&state.pool, id).await.map_err(store_err)?;

    let config = if body.config.is_some() {
        let mut merged = current.config.clone();
        if let (serde_json::Value::Object(base), Some(serde_json::Value::Object(patch))) =
            (&mut merged, body.config.clone())
        {
            for (k, v) in patch {
                base.insert(k, v);
            }
        }
        Some(
            normalize_config(current.task_type, &current.category, Some(merged))
                .map_err(|msg| err(StatusCode::UNPROCESSABLE_ENTITY, msg))?,
        )
    } else {
        None
    };

    if let Some(name) = &body.name {
        if tasks::name_in_use(&state.pool, name, Some(id)).await.map_err(store_err)? {
            return Err(err(StatusCode::CONFLICT, "task name already exists"));
        }
    }

    let row = tasks::update_task_config(&state.pool, id, body.name, config)
        .await
        .map_err(store_err)?;
    Ok(Json(row))
}

/// `POST /v1/admin/tasks/:id/start`
#[utoipa::path(
    post,
    path = "/v1/admin/tasks/{id}/start",
    responses(
        (status = 200, description = "Task marked running", body = TaskStatusResponse),
        (status = 404, description = "Task not found", body = ErrorResponse),
        (status = 409, description = "Task already completed", body = ErrorResponse),
    ),
    security(("bearerAuth" = [])),
    tag = "admin"
)]
pub async fn start_task_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<TaskStatusResponse>, (StatusCode, Json<ErrorResponse>)> {
    let row = tasks::get_sync_task(&state.pool, id).await.map_err(store_err)?;
    if row.status == TaskStatus::Completed {
        return Err(err(StatusCode::CONFLICT, "cannot start a completed task"));
    }
    tasks::set_task_desired_status(&state.pool, id, DesiredStatus::Running)
        .await
        .map_err(store_err)?;
    Ok(Json(TaskStatusResponse { id, desired_status: DesiredStatus::Running }))
}

/// `POST /v1/admin/tasks/:id/stop`
#[utoipa::path(
    post,
    path = "/v1/admin/tasks/{id}/stop",
    responses(
        (status = 200, description = "Task marked stopped", body = TaskStatusResponse),
        (status = 404, description = "Task not found", body = ErrorResponse),
    ),
    security(("bearerAuth" = [])),
    tag = "admin"
)]
pub async fn stop_task_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<TaskStatusResponse>, (StatusCode, Json<ErrorResponse>)> {
    tasks::set_task_desired_status(&state.pool, id, DesiredStatus::Stopped)
        .await
        .map_err(store_err)?;
    Ok(Json(TaskStatusResponse { id, desired_status: DesiredStatus::Stopped }))
}

/// `DELETE /v1/admin/tasks/:id`
#[utoipa::path(
    delete,
    path = "/v1/admin/tasks/{id}",
    responses(
        (status = 204, description = "Task deleted"),
        (status = 404, description = "Task not found", body = ErrorResponse),
        (status = 409, description = "Task is running", body = ErrorResponse),
    ),
    security(("bearerAuth" = [])),
    tag = "admin"
)]
pub async fn delete_task_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<StatusCode, (StatusCode, Json<ErrorResponse>)> {
    let row = tasks::get_sync_task(&state.pool, id).await.map_err(store_err)?;
    if row.status == TaskStatus::Running {
        return Err(err(StatusCode::CONFLICT, "cannot delete a running task; stop it first"));
    }
    tasks::delete_task(&state.pool, id).await.map_err(store_err)?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /v1/admin/thumb-queue/stats`
#[utoipa::path(
    get,
    path = "/v1/admin/thumb-queue/stats",
    responses((status = 200, description = "Thumb queue counts by status", body = ThumbQueueStatsResponse)),
    security(("bearerAuth" = [])),
    tag = "admin"
)]
pub async fn thumb_queue_stats_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ThumbQueueStatsResponse>, (StatusCode, Json<ErrorResponse>)> {
    let row: (i64, i64, i64, i64) = sqlx::query_as(
        "SELECT \
           COALESCE(SUM(CASE WHEN status = 'pending' AND (next_retry_at IS NULL OR next_retry_at <= now()) THEN 1 ELSE 0 END), 0), \
           COALESCE(SUM(CASE WHEN status = 'processing' THEN 1 ELSE 0 END), 0), \
           COALESCE(SUM(CASE WHEN status = 'done' THEN 1 ELSE 0 END), 0), \
           COALESCE(SUM(CASE WHEN status = 'pending' AND next_retry_at > now() THEN 1 ELSE 0 END), 0) \
         FROM thumb_queue",
    )
    .fetch_one(&state.pool)
    .await
    .map_err(|e| err(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok(Json(ThumbQueueStatsResponse {
        pending: row.0,
        processing: row.1,
        done: row.2,
        waiting: row.3,
    }))
}
