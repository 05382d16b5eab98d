mod api;
mod config;
mod db;
mod error;
mod logging;
mod openapi;
mod runners;
mod scheduler;
mod server;
mod site;
mod state;
mod thumb_worker;

use config::EngineConfig;
use log::{error, info, warn};
use site::fetcher::{Classified, Fetcher};
use site::rate_limiter::RateLimiter;
use state::AppState;
use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hasher};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

/// Mint a process-scoped admin auth token. The teacher's desktop build pulls
/// in `rand`/`hex` for this single call site; this binary has no other use
/// for either crate, so it derives a token from two independently-seeded
/// `RandomState` hashers (SipHash keyed from OS randomness at process start)
/// instead of adding the dependency back.
fn generate_auth_token() -> String {
    let mut token = String::with_capacity(32);
    for _ in 0..2 {
        let mut hasher = RandomState::new().build_hasher();
        hasher.write_u128(std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos());
        token.push_str(&format!("{:016x}", hasher.finish()));
    }
    token
}

/// Startup access-validation check (§4.B classification, SPEC_FULL §2 step
/// 4): fetch one list page with no category filter and make sure the site
/// actually lets us in before committing to the warmup delay.
async fn validate_access(fetcher: &Fetcher) -> Result<(), anyhow::Error> {
    match fetcher.fetch_list(&[], "dm_e", None).await? {
        Classified::Ok(_) => Ok(()),
        Classified::AccessDenied => Err(anyhow::anyhow!("access denied at startup; check EX_COOKIES")),
        Classified::LoginRequired => Err(anyhow::anyhow!("login required at startup; check EX_COOKIES")),
        Classified::Banned(d) => Err(anyhow::anyhow!("banned at startup, retry in {:?}", d)),
    }
}

fn load_dotenv() {
    let candidates = [
        std::path::PathBuf::from(".env"),
        std::path::PathBuf::from("../.env"),
    ];
    for path in candidates {
        if path.exists() {
            match dotenvy::from_path(&path) {
                Ok(_) => {
                    info!("loaded .env file from {:?}", path);
                    return;
                }
                Err(e) => warn!("failed to load .env from {:?}: {}", path, e),
            }
        }
    }
    info!("no .env file found, relying on process environment");
}

#[tokio::main]
async fn main() -> ExitCode {
    logging::init_logging();
    info!("eh-stash-sync starting up");
    load_dotenv();

    let engine_config = match EngineConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let pool = match db::connect(&engine_config.database_url).await {
        Ok(p) => p,
        Err(e) => {
            error!("failed to connect to database: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let site_limiter = Arc::new(RateLimiter::new(engine_config.rate_interval));
    let site_fetcher = match Fetcher::new(
        engine_config.base_url.clone(),
        engine_config.cookie_header(),
        engine_config.proxy_url.clone(),
        site_limiter,
    ) {
        Ok(f) => Arc::new(f),
        Err(e) => {
            error!("failed to build site fetcher: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = validate_access(&site_fetcher).await {
        error!("startup access validation failed: {}", e);
        return ExitCode::FAILURE;
    }
    info!(
        "startup access validation passed, warming up for {:?}",
        engine_config.warmup_delay
    );
    tokio::time::sleep(engine_config.warmup_delay).await;

    let thumb_limiter = Arc::new(RateLimiter::new(engine_config.thumb_rate_interval));
    let auth_token = generate_auth_token();
    info!("generated admin API auth token");

    let app_state = AppState::new(
        auth_token,
        pool.clone(),
        site_fetcher.clone(),
        thumb_limiter.clone(),
        engine_config.clone(),
    );

    let thumb_client = match thumb_worker::build_client() {
        Ok(c) => c,
        Err(e) => {
            error!("failed to build thumb HTTP client: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let scheduler_pool = pool.clone();
    let scheduler_fetcher = site_fetcher.clone();
    let scheduler_handle = tokio::spawn(async move {
        scheduler::run(scheduler_pool, scheduler_fetcher, engine_config.scheduler_poll_interval).await;
    });

    let thumb_pool = pool.clone();
    let thumb_dir = engine_config.thumb_dir.clone();
    let thumb_idle_interval = engine_config.thumb_idle_interval;
    let thumb_handle = tokio::spawn(async move {
        thumb_worker::run(thumb_pool, thumb_client, thumb_limiter, thumb_dir, thumb_idle_interval).await;
    });

    let bind_addr = format!(
        "{}:{}",
        app_state.config.admin_bind_host, app_state.config.admin_bind_port
    );
    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("failed to bind admin HTTP server to {}: {}", bind_addr, e);
            scheduler_handle.abort();
            thumb_handle.abort();
            return ExitCode::FAILURE;
        }
    };
    info!("admin/read HTTP surface listening on {}", bind_addr);
    let router = server::create_router(app_state);

    let server_future = axum::serve(
        listener,
        router.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    );

    tokio::select! {
        result = server_future => {
            if let Err(e) = result {
                error!("HTTP server error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    scheduler_handle.abort();
    thumb_handle.abort();
    info!("eh-stash-sync shutting down");
    ExitCode::SUCCESS
}
