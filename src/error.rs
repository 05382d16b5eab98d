use thiserror::Error;

/// Errors surfaced by the Store Gateway (§4.A).
///
/// Callers match on variants where the distinction matters (e.g. the admin
/// handlers turn `NotFound` into a 404); everything else collapses to a
/// crash that the reconciler reaps into `status=error`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("row not found")]
    NotFound,
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("database error: {0}")]
    Backend(#[from] sqlx::Error),
}

/// Errors from the List/Detail Fetcher's response classification (§4.B).
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("access denied")]
    AccessDenied,
    #[error("login required")]
    LoginRequired,
    #[error("temporary ban, {0:?} remaining")]
    Banned(std::time::Duration),
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("unexpected HTTP status {0}")]
    HttpStatus(reqwest::StatusCode),
}

/// Invalid task configuration (§7 "Invalid task config" row).
#[derive(Debug, Error)]
pub enum TaskConfigError {
    #[error("category {0:?} is not a recognized site label")]
    UnknownCategory(String),
    #[error("incremental tasks must have category \"Mixed\", got {0:?}")]
    IncrementalCategoryMismatch(String),
    #[error("incremental categories must be a non-empty subset of the site labels")]
    EmptyIncrementalCategories,
    #[error("only one incremental task may exist at a time")]
    DuplicateIncremental,
    #[error("task type must be \"full\" or \"incremental\", got {0:?}")]
    UnknownType(String),
}
