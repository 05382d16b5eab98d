//! Store Gateway (§4.A): typed Postgres access for task rows, gallery
//! upserts, and the thumbnail queue. All operations run under a pooled
//! connection with auto-commit on success, rollback on failure; no retry is
//! attempted at this layer — callers decide whether to retry next tick.

pub mod galleries;
pub mod models;
pub mod tasks;
pub mod thumb_queue;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Build the connection pool used by every Store Gateway operation.
pub async fn connect(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
}
