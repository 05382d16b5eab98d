use crate::config::EngineConfig;
use crate::site::fetcher::Fetcher;
use crate::site::rate_limiter::RateLimiter;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Instant;

/// Single access log entry for HTTP requests
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccessLogEntry {
    pub id: u64,
    pub timestamp: String,
    pub method: String,
    pub path: String,
    pub status_code: u16,
    pub duration_ms: u64,
    pub client_ip: String,
}

/// Shared application state threaded into every route and task (§2, §5).
/// Holds exactly the process-scoped objects the spec calls out as the only
/// legitimate shared mutable state: the DB pool, the two rate limiters
/// (wrapped inside the two `Fetcher`s), and the admin auth token.
pub struct AppState {
    pub auth_token: String,
    pub start_time: Instant,
    pub pool: PgPool,
    pub site_fetcher: Arc<Fetcher>,
    pub thumb_limiter: Arc<RateLimiter>,
    pub config: EngineConfig,

    access_log: RwLock<Vec<AccessLogEntry>>,
    log_counter: RwLock<u64>,
}

impl AppState {
    pub fn new(
        auth_token: String,
        pool: PgPool,
        site_fetcher: Arc<Fetcher>,
        thumb_limiter: Arc<RateLimiter>,
        config: EngineConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            auth_token,
            start_time: Instant::now(),
            pool,
            site_fetcher,
            thumb_limiter,
            config,
            access_log: RwLock::new(Vec::new()),
            log_counter: RwLock::new(0),
        })
    }

    /// Verify Bearer token
    pub fn verify_token(&self, token: &str) -> bool {
        self.auth_token == token
    }

    /// Get server uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Add an access log entry
    pub fn add_access_log(
        &self,
        method: String,
        path: String,
        status_code: u16,
        duration_ms: u64,
        client_ip: String,
    ) {
        let mut counter = self.log_counter.write();
        *counter += 1;
        let id = *counter;

        let entry = AccessLogEntry {
            id,
            timestamp: chrono::Local::now().to_rfc3339(),
            method,
            path,
            status_code,
            duration_ms,
            client_ip,
        };

        let mut log = self.access_log.write();
        log.push(entry);

        // Keep only the last 1000 entries to prevent memory bloat
        let len = log.len();
        if len > 1000 {
            log.drain(0..len - 1000);
        }
    }

    /// Get all access log entries
    pub fn get_access_logs(&self) -> Vec<AccessLogEntry> {
        self.access_log.read().clone()
    }

    /// Clear access log
    pub fn clear_access_logs(&self) {
        self.access_log.write().clear();
    }
}
