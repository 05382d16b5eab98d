//! Store Gateway operations over `thumb_queue` (§4.A, §4.H).

use super::models::ThumbQueueItem;
use crate::error::StoreError;
use sqlx::PgPool;

/// `claim_next_thumb_queue_item()` — atomically select one pending, due row
/// under `FOR UPDATE SKIP LOCKED`, mark it `processing`, and return it.
/// Ordered by `created_at` ascending so the oldest backlog drains first.
pub async fn claim_next_thumb_queue_item(
    pool: &PgPool,
) -> Result<Option<ThumbQueueItem>, StoreError> {
    let mut tx = pool.begin().await?;

    let claimed = sqlx::query_as::<_, ThumbQueueItem>(
        "SELECT id, gid, thumb_url, status, retry_count, next_retry_at, created_at, processed_at \
         FROM thumb_queue \
         WHERE status = 'pending' AND (next_retry_at IS NULL OR next_retry_at <= now()) \
         ORDER BY created_at ASC \
         LIMIT 1 \
         FOR UPDATE SKIP LOCKED",
    )
    .fetch_optional(&mut *tx)
    .await?;

    let Some(item) = claimed else {
        tx.rollback().await?;
        return Ok(None);
    };

    sqlx::query("UPDATE thumb_queue SET status = 'processing' WHERE id = $1")
        .bind(item.id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(Some(ThumbQueueItem {
        status: super::models::ThumbStatus::Processing,
        ..item
    }))
}

pub async fn mark_thumb_queue_done(pool: &PgPool, id: i32) -> Result<(), StoreError> {
    sqlx::query("UPDATE thumb_queue SET status = 'done', processed_at = now() WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Backoff minutes for a given (1-indexed) retry attempt, capped at 8
/// minutes: `{2, 4, 8, 8, ...}` (§4.A, §8 testable property).
pub fn backoff_minutes(retry_count: i32) -> i64 {
    let minutes = 2i64.saturating_pow(retry_count.max(1) as u32);
    minutes.min(8)
}

/// The failure path increments `retry_count`, resets to `pending`, and
/// schedules `next_retry_at` using the capped exponential backoff.
pub async fn mark_thumb_queue_failed(pool: &PgPool, id: i32) -> Result<(), StoreError> {
    let row: (i32,) = sqlx::query_as(
        "UPDATE thumb_queue SET status = 'pending', retry_count = retry_count + 1 \
         WHERE id = $1 RETURNING retry_count",
    )
    .bind(id)
    .fetch_one(pool)
    .await?;

    let minutes = backoff_minutes(row.0);
    sqlx::query(
        "UPDATE thumb_queue SET next_retry_at = now() + make_interval(mins => $2) WHERE id = $1",
    )
    .bind(id)
    .bind(minutes as i32)
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_sequence_matches_spec_scenario() {
        // §8 scenario 6: +2m, +4m, +8m, then capped at +8m.
        assert_eq!(backoff_minutes(1), 2);
        assert_eq!(backoff_minutes(2), 4);
        assert_eq!(backoff_minutes(3), 8);
        assert_eq!(backoff_minutes(4), 8);
        assert_eq!(backoff_minutes(10), 8);
    }
}
