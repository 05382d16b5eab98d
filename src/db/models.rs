use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The site's fixed category taxonomy, in the order their exclusion bits
/// are assigned (§4.B). Full tasks scope to exactly one; incremental tasks
/// scope to any non-empty subset.
pub const CATEGORY_LABELS: [&str; 10] = [
    "Misc",
    "Doujinshi",
    "Manga",
    "Artist CG",
    "Game CG",
    "Image Set",
    "Cosplay",
    "Asian Porn",
    "Non-H",
    "Western",
];

/// Exclusion bit for a single category label (§4.B: `mask = (2^10-1) - Σbit(c)`).
pub fn category_bit(label: &str) -> Option<u32> {
    CATEGORY_LABELS
        .iter()
        .position(|l| *l == label)
        .map(|idx| 1u32 << idx)
}

pub fn is_known_category(label: &str) -> bool {
    CATEGORY_LABELS.contains(&label)
}

/// Computes the exclusion bitmask that *includes* exactly the categories in
/// `include`. All 10 bits set (1023) excludes everything; clearing a
/// category's bit includes it.
pub fn inclusion_mask(include: &[String]) -> u32 {
    let mut mask: u32 = (1 << CATEGORY_LABELS.len()) - 1;
    for label in include {
        if let Some(bit) = category_bit(label) {
            mask &= !bit;
        }
    }
    mask
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, utoipa::ToSchema)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    Full,
    Incremental,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, utoipa::ToSchema)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DesiredStatus {
    Running,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, utoipa::ToSchema)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Stopped,
    Running,
    Completed,
    Error,
}

/// A `sync_tasks` row (§3, §6). `config` and `state` are stored as jsonb and
/// decoded into the typed variants (`FullConfig`/`IncrementalConfig`,
/// `FullState`/`IncrementalState`) by the runners, per-type, never merged as
/// opaque maps (§9).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, utoipa::ToSchema)]
pub struct SyncTaskRow {
    pub id: i32,
    pub name: String,
    #[sqlx(rename = "type")]
    pub task_type: TaskType,
    pub category: String,
    pub config: serde_json::Value,
    pub state: serde_json::Value,
    pub status: TaskStatus,
    pub desired_status: DesiredStatus,
    pub progress_pct: f32,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_run_at: Option<DateTime<Utc>>,
}

/// Subset of a task row needed to execute a tick (§4.A `get_task_runtime`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRuntime {
    pub id: i32,
    pub name: String,
    pub task_type: TaskType,
    pub category: String,
    pub desired_status: DesiredStatus,
    pub status: TaskStatus,
    pub config: serde_json::Value,
    pub state: serde_json::Value,
    pub progress_pct: f32,
}

impl From<SyncTaskRow> for TaskRuntime {
    fn from(row: SyncTaskRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            task_type: row.task_type,
            category: row.category,
            desired_status: row.desired_status,
            status: row.status,
            config: row.config,
            state: row.state,
            progress_pct: row.progress_pct,
        }
    }
}

/// `full` task config (§6: `{inline_set, start_gid}`). `inline_set` is
/// always forced server-side to `"dm_e"` and never honored from input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FullConfig {
    pub inline_set: String,
    pub start_gid: Option<i64>,
}

impl Default for FullConfig {
    fn default() -> Self {
        Self {
            inline_set: "dm_e".to_string(),
            start_gid: None,
        }
    }
}

/// `incremental` task config (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncrementalConfig {
    pub inline_set: String,
    pub categories: Vec<String>,
    pub scan_window: i64,
    pub rating_diff_threshold: f64,
}

impl Default for IncrementalConfig {
    fn default() -> Self {
        Self {
            inline_set: "dm_e".to_string(),
            categories: Vec::new(),
            scan_window: 10_000,
            rating_diff_threshold: 0.5,
        }
    }
}

/// Full-task state (§3).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct FullState {
    pub next_gid: Option<i64>,
    pub round: i32,
    pub done: bool,
    pub anchor_gid: Option<i64>,
    pub total_count: Option<i64>,
}

impl Default for FullState {
    fn default() -> Self {
        Self {
            next_gid: None,
            round: 0,
            done: false,
            anchor_gid: None,
            total_count: None,
        }
    }
}

/// Incremental-task state (§3).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct IncrementalState {
    pub next_gid: Option<i64>,
    pub round: i32,
    pub latest_gid: Option<i64>,
    pub scanned_count: i64,
}

impl Default for IncrementalState {
    fn default() -> Self {
        Self {
            next_gid: None,
            round: 0,
            latest_gid: None,
            scanned_count: 0,
        }
    }
}

/// The mirrored gallery record (§3).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, utoipa::ToSchema)]
pub struct Gallery {
    pub gid: i64,
    pub token: String,
    pub category: String,
    pub title: String,
    pub title_jpn: Option<String>,
    pub uploader: Option<String>,
    pub posted_at: Option<DateTime<Utc>>,
    pub language: Option<String>,
    pub pages: Option<i32>,
    pub rating: Option<f64>,
    pub fav_count: Option<i32>,
    pub comment_count: Option<i32>,
    pub thumb: Option<String>,
    pub tags: serde_json::Value,
    pub last_synced_at: DateTime<Utc>,
    pub is_active: bool,
}

impl Gallery {
    /// Decode `tags` into the namespace -> ordered, unique tag list mapping
    /// the change detector and detail upsert operate on.
    pub fn tags_map(&self) -> BTreeMap<String, Vec<String>> {
        serde_json::from_value(self.tags.clone()).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ThumbStatus {
    Pending,
    Processing,
    Done,
    Failed,
}

/// A `thumb_queue` row (§3).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ThumbQueueItem {
    pub id: i32,
    pub gid: i64,
    pub thumb_url: String,
    pub status: ThumbStatus,
    pub retry_count: i32,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

/// A fully parsed detail record ready to be bulk-upserted (§4.A, §4.B).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GalleryDetail {
    pub gid: i64,
    pub token: String,
    pub category: String,
    pub title: String,
    pub title_jpn: Option<String>,
    pub uploader: Option<String>,
    pub posted_at: Option<DateTime<Utc>>,
    pub language: Option<String>,
    pub pages: Option<i32>,
    pub rating: Option<f64>,
    pub fav_count: Option<i32>,
    pub comment_count: Option<i32>,
    pub thumb: Option<String>,
    pub tags: BTreeMap<String, Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inclusion_mask_single_category_matches_spec_example() {
        // Full task over "Manga": exclude everything except Manga's bit (4).
        let mask = inclusion_mask(&["Manga".to_string()]);
        assert_eq!(mask, 1023 - 4);
    }

    #[test]
    fn inclusion_mask_empty_excludes_everything() {
        assert_eq!(inclusion_mask(&[]), 1023);
    }

    #[test]
    fn inclusion_mask_full_set_excludes_nothing() {
        let all: Vec<String> = CATEGORY_LABELS.iter().map(|s| s.to_string()).collect();
        assert_eq!(inclusion_mask(&all), 0);
    }

    #[test]
    fn category_bit_unknown_label_is_none() {
        assert_eq!(category_bit("Not A Category"), None);
    }
}
