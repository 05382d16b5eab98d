//! Full-backfill Runner (§4.E): walks every cursor page of one category,
//! fetching all details and tracking progress via DB count / reported
//! total.

use crate::db::galleries;
use crate::db::models::{FullConfig, FullState, GalleryDetail, TaskRuntime, TaskStatus};
use crate::db::tasks::{self, TaskRuntimeUpdate};
use crate::error::FetchError;
use crate::site::fetcher::{Classified, Fetcher};
use log::{info, warn};
use sqlx::PgPool;

/// Outcome of a single tick, per §4.E steps 3/4/7/8.
#[derive(Debug, PartialEq)]
pub enum TickOutcome {
    NotFinished,
    Finished,
}

pub async fn tick(
    pool: &PgPool,
    fetcher: &Fetcher,
    task: &TaskRuntime,
) -> Result<TickOutcome, anyhow::Error> {
    let config: FullConfig = serde_json::from_value(task.config.clone()).unwrap_or_default();
    let mut state: FullState = serde_json::from_value(task.state.clone()).unwrap_or_default();

    // Step 1: operator re-armed a previously completed task — reset state
    // (§9 Open Question: "yes, reset state on re-arm").
    if state.done && task.status == TaskStatus::Completed {
        info!("task {} re-armed, resetting full-backfill state", task.id);
        state = FullState {
            next_gid: config.start_gid,
            ..FullState::default()
        };
    }

    let category = vec![task.category.clone()];
    let page = match fetcher
        .fetch_list(&category, &config.inline_set, state.next_gid)
        .await
    {
        Ok(Classified::Ok(page)) => page,
        Ok(Classified::Banned(duration)) => {
            fetcher.raise_ban(duration);
            persist(pool, task.id, &state, None, "temporary ban".to_string(), false).await?;
            return Ok(TickOutcome::NotFinished);
        }
        Ok(Classified::AccessDenied) | Ok(Classified::LoginRequired) => {
            warn!("task {} access denied/login required", task.id);
            persist(
                pool,
                task.id,
                &state,
                None,
                "access denied, check cookies".to_string(),
                false,
            )
            .await?;
            return Ok(TickOutcome::NotFinished);
        }
        Err(FetchError::Transport(e)) => {
            warn!("task {} list fetch transport error: {}", task.id, e);
            persist(pool, task.id, &state, None, e.to_string(), false).await?;
            return Ok(TickOutcome::NotFinished);
        }
        Err(e) => {
            warn!("task {} list fetch error: {}", task.id, e);
            persist(pool, task.id, &state, None, e.to_string(), false).await?;
            return Ok(TickOutcome::NotFinished);
        }
    };

    if state.anchor_gid.is_none() {
        state.anchor_gid = page.items.iter().map(|i| i.gid).max();
    }
    if let Some(reported) = page.total_count {
        state.total_count = Some(state.total_count.map_or(reported, |prev| prev.max(reported)));
    }

    // §4.E step 6: fetch details and upsert this page before evaluating the
    // terminal condition in step 7 — the last page of a category still has
    // rows that need to land before the task is marked done.
    let mut collected = Vec::with_capacity(page.items.len());
    for item in &page.items {
        match fetcher.fetch_detail(item.gid, &item.token).await {
            Ok(Classified::Ok(detail)) => {
                collected.push(GalleryDetail {
                    gid: item.gid,
                    token: item.token.clone(),
                    category: detail.category,
                    title: detail.title,
                    title_jpn: detail.title_jpn,
                    uploader: detail.uploader,
                    posted_at: None,
                    language: None,
                    pages: None,
                    rating: detail.rating,
                    fav_count: detail.fav_count,
                    comment_count: detail.comment_count,
                    thumb: detail.thumb,
                    tags: detail.tags,
                });
            }
            Ok(Classified::Banned(duration)) => {
                fetcher.raise_ban(duration);
                if !collected.is_empty() {
                    galleries::upsert_galleries_bulk(pool, &collected).await?;
                }
                persist(pool, task.id, &state, None, "temporary ban during detail".to_string(), false)
                    .await?;
                return Ok(TickOutcome::NotFinished);
            }
            Ok(Classified::AccessDenied) | Ok(Classified::LoginRequired) => {
                if !collected.is_empty() {
                    galleries::upsert_galleries_bulk(pool, &collected).await?;
                }
                persist(pool, task.id, &state, None, "access denied during detail".to_string(), false)
                    .await?;
                return Ok(TickOutcome::NotFinished);
            }
            Err(e) => {
                warn!("task {} detail fetch error for gid {}: {}", task.id, item.gid, e);
                if !collected.is_empty() {
                    galleries::upsert_galleries_bulk(pool, &collected).await?;
                }
                persist(pool, task.id, &state, None, e.to_string(), false).await?;
                return Ok(TickOutcome::NotFinished);
            }
        }
    }

    galleries::upsert_galleries_bulk(pool, &collected).await?;

    // Terminal condition: empty page or no next cursor (§4.E step 7),
    // evaluated only after this page's rows are safely upserted.
    if page.items.is_empty() || page.next_cursor.is_none() {
        tasks::update_task_runtime(
            pool,
            task.id,
            TaskRuntimeUpdate {
                state: Some(serde_json::to_value(FullState {
                    done: true,
                    round: state.round + 1,
                    ..state
                })?),
                progress_pct: Some(100.0),
                status: Some(TaskStatus::Completed),
                error_message: Some(None),
                touch_run_time: true,
            },
        )
        .await?;
        tasks::set_task_desired_status(pool, task.id, crate::db::models::DesiredStatus::Stopped)
            .await?;
        info!("task {} full backfill completed", task.id);
        return Ok(TickOutcome::Finished);
    }

    state.next_gid = page.next_cursor;
    let progress = match state.total_count {
        Some(total) if total > 0 => {
            let count = galleries::count_galleries_by_category(pool, &task.category).await?;
            ((count as f64 / total as f64) * 100.0).clamp(0.0, 100.0) as f32
        }
        _ => 0.0,
    };

    persist(pool, task.id, &state, Some(progress), String::new(), true).await?;
    Ok(TickOutcome::NotFinished)
}

async fn persist(
    pool: &PgPool,
    task_id: i32,
    state: &FullState,
    progress: Option<f32>,
    error_message: String,
    touch_run_time: bool,
) -> Result<(), anyhow::Error> {
    tasks::update_task_runtime(
        pool,
        task_id,
        TaskRuntimeUpdate {
            state: Some(serde_json::to_value(state)?),
            progress_pct: progress,
            status: Some(TaskStatus::Running),
            error_message: Some(if error_message.is_empty() {
                None
            } else {
                Some(error_message)
            }),
            touch_run_time,
        },
    )
    .await?;
    Ok(())
}
