//! Incremental Runner (§4.F): walks the newest `scan_window` records across
//! a configured category set, fetching detail only when the Change
//! Detector disagrees with the cheap list signal.

use crate::db::galleries;
use crate::db::models::{
    GalleryDetail, IncrementalConfig, IncrementalState, TaskRuntime, TaskStatus,
};
use crate::db::tasks::{self, TaskRuntimeUpdate};
use crate::site::change_detector::{self, ExistingSignal, ListSignal};
use crate::site::fetcher::{Classified, Fetcher};
use log::{info, warn};
use sqlx::PgPool;
use std::collections::BTreeSet;

#[derive(Debug, PartialEq)]
pub enum TickOutcome {
    /// The page was processed; more pages remain in this cycle.
    Continue,
    /// `END` or `WINDOW`: cycle finished, state was reset for the next one.
    CycleEnded,
    /// `BANNED` or `ERROR`: state preserved for resumption next tick.
    Paused,
}

pub async fn tick(
    pool: &PgPool,
    fetcher: &Fetcher,
    task: &TaskRuntime,
) -> Result<TickOutcome, anyhow::Error> {
    let config: IncrementalConfig = serde_json::from_value(task.config.clone()).unwrap_or_default();
    let mut state: IncrementalState =
        serde_json::from_value(task.state.clone()).unwrap_or_default();

    let page = match fetcher
        .fetch_list(&config.categories, &config.inline_set, state.next_gid)
        .await
    {
        Ok(Classified::Ok(page)) => page,
        Ok(Classified::Banned(duration)) => {
            fetcher.raise_ban(duration);
            persist_paused(pool, task.id, &state, "temporary ban".to_string()).await?;
            return Ok(TickOutcome::Paused);
        }
        Ok(Classified::AccessDenied) | Ok(Classified::LoginRequired) => {
            warn!("task {} access denied/login required", task.id);
            persist_paused(pool, task.id, &state, "access denied, check cookies".to_string())
                .await?;
            return Ok(TickOutcome::Paused);
        }
        Err(e) => {
            warn!("task {} list fetch error: {}", task.id, e);
            persist_paused(pool, task.id, &state, e.to_string()).await?;
            return Ok(TickOutcome::Paused);
        }
    };

    // First page of a cycle: pin latest_gid, reset the scan counter.
    if state.next_gid.is_none() {
        state.latest_gid = page.items.iter().map(|i| i.gid).max();
        state.scanned_count = 0;
    }

    for item in &page.items {
        state.scanned_count += 1;
        let existing = galleries::get_gallery_signal(pool, item.gid).await?;

        let should_refresh = match &existing {
            None => true,
            Some(gallery) => {
                let tags_map = gallery.tags_map();
                let detail_tags: BTreeSet<String> =
                    tags_map.values().flatten().map(|s| s.to_lowercase()).collect();
                let existing_signal = ExistingSignal {
                    rating: gallery.rating,
                    detail_tags: &detail_tags,
                };
                let list_signal = ListSignal {
                    rating_est: item.rating_est,
                    visible_tags: &item.visible_tags,
                };
                let decision =
                    change_detector::decide(&existing_signal, &list_signal, config.rating_diff_threshold);
                decision.refresh
            }
        };

        if !should_refresh {
            continue;
        }

        match fetcher.fetch_detail(item.gid, &item.token).await {
            Ok(Classified::Ok(detail)) => {
                let row = GalleryDetail {
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
                };
                galleries::upsert_galleries_bulk(pool, std::slice::from_ref(&row)).await?;
            }
            Ok(Classified::Banned(duration)) => {
                fetcher.raise_ban(duration);
                persist_paused(pool, task.id, &state, "temporary ban during detail".to_string())
                    .await?;
                return Ok(TickOutcome::Paused);
            }
            Ok(Classified::AccessDenied) | Ok(Classified::LoginRequired) => {
                persist_paused(pool, task.id, &state, "access denied during detail".to_string())
                    .await?;
                return Ok(TickOutcome::Paused);
            }
            Err(e) => {
                warn!("task {} detail fetch error for gid {}: {}", task.id, item.gid, e);
                persist_paused(pool, task.id, &state, e.to_string()).await?;
                return Ok(TickOutcome::Paused);
            }
        }
    }

    // §4.E step 7: terminal/END check runs only after this page's items
    // have been scanned and any refreshed rows upserted above.
    if page.items.is_empty() || page.next_cursor.is_none() {
        reset_cycle(pool, task.id, &mut state).await?;
        info!("task {} incremental cycle ended: END", task.id);
        return Ok(TickOutcome::CycleEnded);
    }

    state.next_gid = page.next_cursor;

    if state.scanned_count >= config.scan_window {
        reset_cycle(pool, task.id, &mut state).await?;
        info!("task {} incremental cycle ended: WINDOW", task.id);
        return Ok(TickOutcome::CycleEnded);
    }

    let progress = ((state.scanned_count as f64 / config.scan_window.max(1) as f64) * 100.0)
        .clamp(0.0, 100.0) as f32;
    tasks::update_task_runtime(
        pool,
        task.id,
        TaskRuntimeUpdate {
            state: Some(serde_json::to_value(state)?),
            progress_pct: Some(progress),
            status: Some(TaskStatus::Running),
            error_message: Some(None),
            touch_run_time: true,
        },
    )
    .await?;

    Ok(TickOutcome::Continue)
}

async fn reset_cycle(
    pool: &PgPool,
    task_id: i32,
    state: &mut IncrementalState,
) -> Result<(), anyhow::Error> {
    let next_state = IncrementalState {
        next_gid: None,
        round: state.round + 1,
        latest_gid: None,
        scanned_count: 0,
    };
    tasks::update_task_runtime(
        pool,
        task_id,
        TaskRuntimeUpdate {
            state: Some(serde_json::to_value(next_state)?),
            progress_pct: Some(0.0),
            status: Some(TaskStatus::Running),
            error_message: Some(None),
            touch_run_time: true,
        },
    )
    .await?;
    *state = next_state;
    Ok(())
}

async fn persist_paused(
    pool: &PgPool,
    task_id: i32,
    state: &IncrementalState,
    error_message: String,
) -> Result<(), anyhow::Error> {
    tasks::update_task_runtime(
        pool,
        task_id,
        TaskRuntimeUpdate {
            state: Some(serde_json::to_value(state)?),
            progress_pct: None,
            status: Some(TaskStatus::Running),
            error_message: Some(Some(error_message)),
            touch_run_time: false,
        },
    )
    .await?;
    Ok(())
}
