//! Store Gateway operations over `sync_tasks` (§4.A).

use super::models::{DesiredStatus, SyncTaskRow, TaskRuntime, TaskStatus};
use crate::error::StoreError;
use sqlx::PgPool;

/// `list_sync_tasks()` — ordered by id.
pub async fn list_sync_tasks(pool: &PgPool) -> Result<Vec<SyncTaskRow>, StoreError> {
    let rows = sqlx::query_as::<_, SyncTaskRow>(
        "SELECT id, name, type, category, config, state, status, desired_status, \
         progress_pct, error_message, created_at, updated_at, last_run_at \
         FROM sync_tasks ORDER BY id",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn get_sync_task(pool: &PgPool, id: i32) -> Result<SyncTaskRow, StoreError> {
    sqlx::query_as::<_, SyncTaskRow>(
        "SELECT id, name, type, category, config, state, status, desired_status, \
         progress_pct, error_message, created_at, updated_at, last_run_at \
         FROM sync_tasks WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(StoreError::NotFound)
}

/// `get_task_runtime(id)` — the subset needed for execution (§4.A).
pub async fn get_task_runtime(pool: &PgPool, id: i32) -> Result<TaskRuntime, StoreError> {
    get_sync_task(pool, id).await.map(TaskRuntime::from)
}

/// A partial update; unspecified fields are left untouched. Always bumps
/// `updated_at`; bumps `last_run_at` only when `touch_run_time` is true
/// (the ban policy in §7 requires *not* touching it on a `Banned` tick).
#[derive(Debug, Default)]
pub struct TaskRuntimeUpdate {
    pub state: Option<serde_json::Value>,
    pub progress_pct: Option<f32>,
    pub status: Option<TaskStatus>,
    pub error_message: Option<Option<String>>,
    pub touch_run_time: bool,
}

pub async fn update_task_runtime(
    pool: &PgPool,
    id: i32,
    update: TaskRuntimeUpdate,
) -> Result<(), StoreError> {
    let result = sqlx::query(
        "UPDATE sync_tasks SET \
         state = COALESCE($2, state), \
         progress_pct = COALESCE($3, progress_pct), \
         status = COALESCE($4, status), \
         error_message = CASE WHEN $5 THEN $6 ELSE error_message END, \
         last_run_at = CASE WHEN $7 THEN now() ELSE last_run_at END, \
         updated_at = now() \
         WHERE id = $1",
    )
    .bind(id)
    .bind(update.state)
    .bind(update.progress_pct)
    .bind(update.status)
    .bind(update.error_message.is_some())
    .bind(update.error_message.flatten())
    .bind(update.touch_run_time)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound);
    }
    Ok(())
}

/// `set_sync_task_desired_status(id, value)`.
pub async fn set_task_desired_status(
    pool: &PgPool,
    id: i32,
    value: DesiredStatus,
) -> Result<(), StoreError> {
    let result = sqlx::query(
        "UPDATE sync_tasks SET desired_status = $2, updated_at = now() WHERE id = $1",
    )
    .bind(id)
    .bind(value)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound);
    }
    Ok(())
}

/// Whether an incremental task already exists (at-most-one invariant, §3).
pub async fn incremental_task_exists(pool: &PgPool) -> Result<bool, StoreError> {
    let row: (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM sync_tasks WHERE type = 'incremental'")
            .fetch_one(pool)
            .await?;
    Ok(row.0 > 0)
}

pub async fn name_in_use(pool: &PgPool, name: &str, exclude_id: Option<i32>) -> Result<bool, StoreError> {
    let row: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM sync_tasks WHERE name = $1 AND ($2::int IS NULL OR id != $2)",
    )
    .bind(name)
    .bind(exclude_id)
    .fetch_one(pool)
    .await?;
    Ok(row.0 > 0)
}

pub struct NewTask {
    pub name: String,
    pub task_type: super::models::TaskType,
    pub category: String,
    pub config: serde_json::Value,
    pub state: serde_json::Value,
}

pub async fn insert_task(pool: &PgPool, new_task: NewTask) -> Result<SyncTaskRow, StoreError> {
    let row = sqlx::query_as::<_, SyncTaskRow>(
        "INSERT INTO sync_tasks \
         (name, type, category, config, state, status, desired_status, progress_pct) \
         VALUES ($1, $2, $3, $4, $5, 'stopped', 'stopped', 0) \
         RETURNING id, name, type, category, config, state, status, desired_status, \
         progress_pct, error_message, created_at, updated_at, last_run_at",
    )
    .bind(new_task.name)
    .bind(new_task.task_type)
    .bind(new_task.category)
    .bind(new_task.config)
    .bind(new_task.state)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

pub async fn update_task_config(
    pool: &PgPool,
    id: i32,
    name: Option<String>,
    config: Option<serde_json::Value>,
) -> Result<SyncTaskRow, StoreError> {
    let row = sqlx::query_as::<_, SyncTaskRow>(
        "UPDATE sync_tasks SET \
         name = COALESCE($2, name), \
         config = COALESCE($3, config), \
         updated_at = now() \
         WHERE id = $1 \
         RETURNING id, name, type, category, config, state, status, desired_status, \
         progress_pct, error_message, created_at, updated_at, last_run_at",
    )
    .bind(id)
    .bind(name)
    .bind(config)
    .fetch_optional(pool)
    .await?
    .ok_or(StoreError::NotFound)?;
    Ok(row)
}

pub async fn delete_task(pool: &PgPool, id: i32) -> Result<(), StoreError> {
    let result = sqlx::query("DELETE FROM sync_tasks WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound);
    }
    Ok(())
}
