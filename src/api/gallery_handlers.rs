//! Gallery Read API (§4.J): the unauthenticated, public-facing surface.
//! Grounded on `original_source/api/routers/{galleries,stats}.py`.

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::api::handlers::ErrorResponse;
use crate::db::models::{Gallery, SyncTaskRow};
use crate::state::AppState;

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct GalleryListQuery {
    pub category: Option<String>,
    pub language: Option<String>,
    pub min_rating: Option<f64>,
    pub min_fav: Option<i32>,
    /// `namespace:value`, matched via the gallery's tags map.
    pub tag: Option<String>,
    #[serde(default = "default_sort")]
    pub sort: String,
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
}

fn default_sort() -> String {
    "gid_desc".to_string()
}
fn default_page() -> i64 {
    1
}
fn default_page_size() -> i64 {
    24
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct GalleryListResponse {
    pub items: Vec<Gallery>,
    pub total: i64,
    pub page: i64,
    pub size: i64,
    pub pages: i64,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct StatsResponse {
    pub total_galleries: i64,
    pub by_category: BTreeMap<String, i64>,
    pub last_synced_at: Option<chrono::DateTime<chrono::Utc>>,
    pub sync_tasks: Vec<SyncTaskRow>,
}

fn order_by(sort: &str) -> &'static str {
    match sort {
        "rating" => "ORDER BY rating DESC NULLS LAST",
        "posted_at" => "ORDER BY posted_at DESC NULLS LAST",
        "fav_count" => "ORDER BY fav_count DESC NULLS LAST",
        "gid_asc" => "ORDER BY gid ASC",
        _ => "ORDER BY gid DESC",
    }
}

/// `GET /v1/galleries`
#[utoipa::path(
    get,
    path = "/v1/galleries",
    params(GalleryListQuery),
    responses((status = 200, description = "Paginated gallery listing", body = GalleryListResponse)),
    tag = "galleries"
)]
pub async fn list_galleries_handler(
    State(state): State<Arc<AppState>>,
    Query(q): Query<GalleryListQuery>,
) -> Result<Json<GalleryListResponse>, (StatusCode, Json<ErrorResponse>)> {
    let page = q.page.max(1);
    let page_size = q.page_size.clamp(1, 200);
    let offset = (page - 1) * page_size;

    let tag_filter = q.tag.as_deref().and_then(|raw| {
        let normalized = raw.replace('\u{ff1a}', ":").trim().to_string();
        normalized.split_once(':').map(|(ns, val)| {
            serde_json::json!({ ns.trim().to_lowercase(): [val.trim()] })
        })
    });

    let mut where_clauses = vec!["is_active = true".to_string()];
    if q.category.is_some() {
        where_clauses.push("category ILIKE $1".to_string());
    }
    // Simpler, fixed-shape query: bind every optional filter positionally
    // regardless of whether it's present, using `$n::type IS NULL OR ...`.
    let sql = format!(
        "SELECT gid, token, category, title, title_jpn, uploader, posted_at, language, \
         pages, rating, fav_count, comment_count, thumb, tags, last_synced_at, is_active \
         FROM eh_galleries WHERE is_active = true \
         AND ($1::text IS NULL OR category ILIKE $1) \
         AND ($2::text IS NULL OR language ILIKE $2) \
         AND ($3::float8 IS NULL OR rating >= $3) \
         AND ($4::int IS NULL OR fav_count >= $4) \
         AND ($5::jsonb IS NULL OR tags @> $5) \
         {} LIMIT $6 OFFSET $7",
        order_by(&q.sort)
    );
    let count_sql = "SELECT COUNT(*) FROM eh_galleries WHERE is_active = true \
         AND ($1::text IS NULL OR category ILIKE $1) \
         AND ($2::text IS NULL OR language ILIKE $2) \
         AND ($3::float8 IS NULL OR rating >= $3) \
         AND ($4::int IS NULL OR fav_count >= $4) \
         AND ($5::jsonb IS NULL OR tags @> $5)";

    let total: (i64,) = sqlx::query_as(count_sql)
        .bind(&q.category)
        .bind(&q.language)
        .bind(q.min_rating)
        .bind(q.min_fav)
        .bind(tag_filter.clone())
        .fetch_one(&state.pool)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorResponse { error: e.to_string(), code: 500 })))?;

    let items = sqlx::query_as::<_, Gallery>(&sql)
        .bind(&q.category)
        .bind(&q.language)
        .bind(q.min_rating)
        .bind(q.min_fav)
        .bind(tag_filter)
        .bind(page_size)
        .bind(offset)
        .fetch_all(&state.pool)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorResponse { error: e.to_string(), code: 500 })))?;

    let pages = if total.0 > 0 { (total.0 + page_size - 1) / page_size } else { 0 };
    let _ = where_clauses; // retained for readability of intent above, not used directly

    Ok(Json(GalleryListResponse {
        items,
        total: total.0,
        page,
        size: page_size,
        pages,
    }))
}

/// `GET /v1/galleries/:gid`
#[utoipa::path(
    get,
    path = "/v1/galleries/{gid}",
    responses(
        (status = 200, description = "Gallery", body = Gallery),
        (status = 404, description = "Gallery not found", body = ErrorResponse),
    ),
    tag = "galleries"
)]
pub async fn get_gallery_handler(
    State(state): State<Arc<AppState>>,
    Path(gid): Path<i64>,
) -> Result<Json<Gallery>, (StatusCode, Json<ErrorResponse>)> {
    let row = crate::db::galleries::get_gallery_signal(&state.pool, gid)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorResponse { error: e.to_string(), code: 500 })))?
        .ok_or_else(|| (StatusCode::NOT_FOUND, Json(ErrorResponse { error: "gallery not found".to_string(), code: 404 })))?;
    Ok(Json(row))
}

/// `GET /v1/stats`
#[utoipa::path(
    get,
    path = "/v1/stats",
    responses((status = 200, description = "Aggregate stats", body = StatsResponse)),
    tag = "stats"
)]
pub async fn stats_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StatsResponse>, (StatusCode, Json<ErrorResponse>)> {
    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM eh_galleries")
        .fetch_one(&state.pool)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorResponse { error: e.to_string(), code: 500 })))?;

    let by_category_rows: Vec<(String, i64)> =
        sqlx::query_as("SELECT category, COUNT(*) FROM eh_galleries GROUP BY category")
            .fetch_all(&state.pool)
            .await
            .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorResponse { error: e.to_string(), code: 500 })))?;
    let by_category: BTreeMap<String, i64> = by_category_rows.into_iter().collect();

    let last_synced: (Option<chrono::DateTime<chrono::Utc>>,) =
        sqlx::query_as("SELECT MAX(last_synced_at) FROM eh_galleries")
            .fetch_one(&state.pool)
            .await
            .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorResponse { error: e.to_string(), code: 500 })))?;

    let sync_tasks = crate::db::tasks::list_sync_tasks(&state.pool)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorResponse { error: e.to_string(), code: 500 })))?;

    Ok(Json(StatsResponse {
        total_galleries: total.0,
        by_category,
        last_synced_at: last_synced.0,
        sync_tasks,
    }))
}

/// `GET /v1/thumbs/:gid` — serves `THUMB_DIR/<gid>` with a long-lived cache
/// header (§6). 404 if the thumbnail hasn't been downloaded yet.
pub async fn get_thumb_handler(
    State(state): State<Arc<AppState>>,
    Path(gid): Path<i64>,
) -> Response {
    let path = state.config.thumb_dir.join(gid.to_string());
    match tokio::fs::read(&path).await {
        Ok(bytes) => (
            StatusCode::OK,
            [(header::CACHE_CONTROL, "public, max-age=604800")],
            Body::from(bytes),
        )
            .into_response(),
        Err(_) => (StatusCode::NOT_FOUND, "thumb not cached yet").into_response(),
    }
}
