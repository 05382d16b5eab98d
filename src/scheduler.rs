//! Scheduler/Reconciler (§4.G): a fixed-cadence loop that reaps finished
//! runners, reconciles the in-memory runner map against `sync_tasks` rows,
//! and spawns/cancels `run_task` coroutines to match `desired_status`.

use crate::db::models::{is_known_category, DesiredStatus, TaskRuntime, TaskStatus, TaskType};
use crate::db::tasks;
use crate::error::TaskConfigError;
use crate::runners::{full, incremental};
use crate::site::fetcher::Fetcher;
use log::{error, info, warn};
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::sleep;

struct RunnerHandle {
    join: JoinHandle<()>,
    cancel: Arc<AtomicBool>,
}

/// Validate a task's config against its declared type (§4.G step (b), §7
/// "Invalid task config" row).
fn validate_task_config(task: &TaskRuntime) -> Result<(), TaskConfigError> {
    match task.task_type {
        TaskType::Full => {
            if !is_known_category(&task.category) {
                return Err(TaskConfigError::UnknownCategory(task.category.clone()));
            }
        }
        TaskType::Incremental => {
            if task.category != "Mixed" {
                return Err(TaskConfigError::IncrementalCategoryMismatch(task.category.clone()));
            }
            let categories: Vec<String> = task
                .config
                .get("categories")
                .and_then(|v| serde_json::from_value(v.clone()).ok())
                .unwrap_or_default();
            if categories.is_empty() || !categories.iter().all(|c| is_known_category(c)) {
                return Err(TaskConfigError::EmptyIncrementalCategories);
            }
        }
    }
    Ok(())
}

/// One task's lifetime coroutine: re-reads the runtime row every tick,
/// validates config, delegates to the matching one-tick runner, and exits
/// on completion, on noticing `desired_status != running`, or on
/// cancellation (§4.G `run_task`).
async fn run_task(pool: PgPool, fetcher: Arc<Fetcher>, task_id: i32, cancel: Arc<AtomicBool>) {
    loop {
        if cancel.load(Ordering::Relaxed) {
            best_effort_stop(&pool, task_id).await;
            return;
        }

        let task = match tasks::get_task_runtime(&pool, task_id).await {
            Ok(t) => t,
            Err(e) => {
                warn!("task {} disappeared mid-run: {}", task_id, e);
                return;
            }
        };

        if task.desired_status != DesiredStatus::Running {
            best_effort_stop(&pool, task_id).await;
            return;
        }

        if let Err(e) = validate_task_config(&task) {
            error!("task {} invalid config: {}", task_id, e);
            let _ = tasks::update_task_runtime(
                &pool,
                task_id,
                tasks::TaskRuntimeUpdate {
                    state: None,
                    progress_pct: None,
                    status: Some(TaskStatus::Error),
                    error_message: Some(Some(e.to_string())),
                    touch_run_time: false,
                },
            )
            .await;
            let _ = tasks::set_task_desired_status(&pool, task_id, DesiredStatus::Stopped).await;
            return;
        }

        let outcome = match task.task_type {
            TaskType::Full => full::tick(&pool, &fetcher, &task).await.map(|o| o == full::TickOutcome::Finished),
            TaskType::Incremental => incremental::tick(&pool, &fetcher, &task)
                .await
                .map(|_| false),
        };

        match outcome {
            Ok(true) => {
                info!("task {} finished", task_id);
                return;
            }
            Ok(false) => continue,
            Err(e) => {
                error!("task {} crashed: {}", task_id, e);
                let _ = tasks::update_task_runtime(
                    &pool,
                    task_id,
                    tasks::TaskRuntimeUpdate {
                        state: None,
                        progress_pct: None,
                        status: Some(TaskStatus::Error),
                        error_message: Some(Some(e.to_string())),
                        touch_run_time: false,
                    },
                )
                .await;
                let _ = tasks::set_task_desired_status(&pool, task_id, DesiredStatus::Stopped).await;
                return;
            }
        }
    }
}

/// Best-effort `status=stopped`, skipped if the task already reached a
/// terminal status (§4.G step (e)).
async fn best_effort_stop(pool: &PgPool, task_id: i32) {
    if let Ok(task) = tasks::get_task_runtime(pool, task_id).await {
        if task.status == TaskStatus::Completed || task.status == TaskStatus::Error {
            return;
        }
    }
    let _ = tasks::update_task_runtime(
        pool,
        task_id,
        tasks::TaskRuntimeUpdate {
            state: None,
            progress_pct: None,
            status: Some(TaskStatus::Stopped),
            error_message: None,
            touch_run_time: false,
        },
    )
    .await;
}

/// Runs forever: the reconciliation loop described in §4.G. Intended to be
/// spawned as its own Tokio task from `main`.
pub async fn run(pool: PgPool, fetcher: Arc<Fetcher>, poll_interval: std::time::Duration) {
    let mut runners: HashMap<i32, RunnerHandle> = HashMap::new();

    loop {
        // 1. Reap finished runners.
        runners.retain(|id, handle| {
            if handle.join.is_finished() {
                info!("reaping finished runner for task {}", id);
                false
            } else {
                true
            }
        });

        // 2. Enumerate.
        let rows = match tasks::list_sync_tasks(&pool).await {
            Ok(rows) => rows,
            Err(e) => {
                error!("scheduler: failed to list tasks: {}", e);
                sleep(poll_interval).await;
                continue;
            }
        };
        let live_ids: std::collections::HashSet<i32> = rows.iter().map(|r| r.id).collect();

        // 3. Cancel orphans (row deleted out from under a running task).
        for (id, handle) in runners.iter() {
            if !live_ids.contains(id) {
                info!("cancelling orphaned runner for deleted task {}", id);
                handle.cancel.store(true, Ordering::Relaxed);
            }
        }

        // 4. Converge.
        for row in &rows {
            let has_runner = runners.contains_key(&row.id);
            match (row.desired_status, has_runner) {
                (DesiredStatus::Running, false) => {
                    info!("spawning runner for task {}", row.id);
                    let cancel = Arc::new(AtomicBool::new(false));
                    let join = tokio::spawn(run_task(pool.clone(), fetcher.clone(), row.id, cancel.clone()));
                    runners.insert(row.id, RunnerHandle { join, cancel });
                }
                (DesiredStatus::Stopped, true) => {
                    info!("cancelling runner for task {}", row.id);
                    if let Some(handle) = runners.get(&row.id) {
                        handle.cancel.store(true, Ordering::Relaxed);
                    }
                }
                _ => {}
            }
        }

        sleep(poll_interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::DesiredStatus;

    fn runtime(task_type: TaskType, category: &str, config: serde_json::Value) -> TaskRuntime {
        TaskRuntime {
            id: 1,
            name: "t".to_string(),
            task_type,
            category: category.to_string(),
            desired_status: DesiredStatus::Running,
            status: TaskStatus::Running,
            config,
            state: serde_json::json!({}),
            progress_pct: 0.0,
        }
    }

    #[test]
    fn full_task_rejects_unknown_category() {
        let task = runtime(TaskType::Full, "Not A Category", serde_json::json!({}));
        assert!(matches!(
            validate_task_config(&task),
            Err(TaskConfigError::UnknownCategory(_))
        ));
    }

    #[test]
    fn full_task_accepts_known_category() {
        let task = runtime(TaskType::Full, "Manga", serde_json::json!({}));
        assert!(validate_task_config(&task).is_ok());
    }

    #[test]
    fn incremental_task_requires_mixed_category() {
        let task = runtime(
            TaskType::Incremental,
            "Manga",
            serde_json::json!({ "categories": ["Manga"] }),
        );
        assert!(matches!(
            validate_task_config(&task),
            Err(TaskConfigError::IncrementalCategoryMismatch(_))
        ));
    }

    #[test]
    fn incremental_task_rejects_empty_categories() {
        let task = runtime(TaskType::Incremental, "Mixed", serde_json::json!({ "categories": [] }));
        assert!(matches!(
            validate_task_config(&task),
            Err(TaskConfigError::EmptyIncrementalCategories)
        ));
    }

    #[test]
    fn incremental_task_accepts_valid_subset() {
        let task = runtime(
            TaskType::Incremental,
            "Mixed",
            serde_json::json!({ "categories": ["Manga", "Doujinshi"] }),
        );
        assert!(validate_task_config(&task).is_ok());
    }
}
