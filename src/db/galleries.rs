//! Store Gateway operations over `eh_galleries` and the thumb-enqueue rule
//! that rides along with every bulk upsert (§4.A).

use super::models::GalleryDetail;
use crate::error::StoreError;
use sqlx::PgPool;

/// In one transaction: upsert every row by `gid` (refreshing
/// `last_synced_at`, forcing `is_active = true`), then for each row with a
/// non-empty `thumb`, insert/reset a thumb-queue entry — but only when the
/// `thumb_url` changed or the previous queue row was `failed`. This protects
/// in-flight (`processing`) and already-`done` downloads from being
/// re-queued on every re-sync (§4.A, §9 thumb re-queue decision).
pub async fn upsert_galleries_bulk(
    pool: &PgPool,
    rows: &[GalleryDetail],
) -> Result<(), StoreError> {
    if rows.is_empty() {
        return Ok(());
    }

    let mut tx = pool.begin().await?;

    for row in rows {
        let tags = serde_json::to_value(&row.tags).unwrap_or(serde_json::json!({}));
        sqlx::query(
            "INSERT INTO eh_galleries \
             (gid, token, category, title, title_jpn, uploader, posted_at, language, \
              pages, rating, fav_count, comment_count, thumb, tags, last_synced_at, is_active) \
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14, now(), true) \
             ON CONFLICT (gid) DO UPDATE SET \
               token = EXCLUDED.token, \
               category = EXCLUDED.category, \
               title = EXCLUDED.title, \
               title_jpn = EXCLUDED.title_jpn, \
               uploader = EXCLUDED.uploader, \
               posted_at = EXCLUDED.posted_at, \
               language = EXCLUDED.language, \
               pages = EXCLUDED.pages, \
               rating = EXCLUDED.rating, \
               fav_count = EXCLUDED.fav_count, \
               comment_count = EXCLUDED.comment_count, \
               thumb = EXCLUDED.thumb, \
               tags = EXCLUDED.tags, \
               last_synced_at = now(), \
               is_active = true",
        )
        .bind(row.gid)
        .bind(&row.token)
        .bind(&row.category)
        .bind(&row.title)
        .bind(&row.title_jpn)
        .bind(&row.uploader)
        .bind(row.posted_at)
        .bind(&row.language)
        .bind(row.pages)
        .bind(row.rating)
        .bind(row.fav_count)
        .bind(row.comment_count)
        .bind(&row.thumb)
        .bind(tags)
        .execute(&mut *tx)
        .await?;

        if let Some(thumb_url) = row.thumb.as_ref().filter(|t| !t.is_empty()) {
            sqlx::query(
                "INSERT INTO thumb_queue (gid, thumb_url, status, retry_count, next_retry_at) \
                 VALUES ($1, $2, 'pending', 0, NULL) \
                 ON CONFLICT (gid) DO UPDATE SET \
                   thumb_url = EXCLUDED.thumb_url, \
                   status = 'pending', \
                   retry_count = 0, \
                   next_retry_at = NULL, \
                   processed_at = NULL \
                 WHERE thumb_queue.thumb_url != EXCLUDED.thumb_url \
                    OR thumb_queue.status = 'failed'",
            )
            .bind(row.gid)
            .bind(thumb_url)
            .execute(&mut *tx)
            .await?;
        }
    }

    tx.commit().await?;
    Ok(())
}

/// `count_galleries_by_category(category)` — case-insensitive match, used
/// for full-task progress (§4.A, §4.E).
pub async fn count_galleries_by_category(pool: &PgPool, category: &str) -> Result<i64, StoreError> {
    let row: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM eh_galleries WHERE lower(category) = lower($1)",
    )
    .bind(category)
    .fetch_one(pool)
    .await?;
    Ok(row.0)
}

/// Fetch the stored record the Change Detector compares a list item against
/// (§4.D). `None` means "unknown existing record" — treated as an
/// unconditional refresh-as-new by the caller.
pub async fn get_gallery_signal(
    pool: &PgPool,
    gid: i64,
) -> Result<Option<super::models::Gallery>, StoreError> {
    let row = sqlx::query_as::<_, super::models::Gallery>(
        "SELECT gid, token, category, title, title_jpn, uploader, posted_at, language, \
         pages, rating, fav_count, comment_count, thumb, tags, last_synced_at, is_active \
         FROM eh_galleries WHERE gid = $1",
    )
    .bind(gid)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}
