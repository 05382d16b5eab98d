//! Thumbnail Worker (§4.H): single consumer draining `thumb_queue` against
//! its own rate budget, independent of the main-site limiter.

use crate::db::thumb_queue;
use crate::site::rate_limiter::RateLimiter;
use log::{debug, info, warn};
use reqwest::Client;
use sqlx::PgPool;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tokio::time::sleep;

const THUMB_REFERER: &str = "https://e-hentai.org/";
const THUMB_TIMEOUT: Duration = Duration::from_secs(15);

pub async fn run(
    pool: PgPool,
    client: Client,
    limiter: Arc<RateLimiter>,
    thumb_dir: PathBuf,
    idle_interval: Duration,
) {
    if let Err(e) = fs::create_dir_all(&thumb_dir).await {
        warn!("thumb worker: failed to create thumb dir {:?}: {}", thumb_dir, e);
    }

    loop {
        let item = match thumb_queue::claim_next_thumb_queue_item(&pool).await {
            Ok(Some(item)) => item,
            Ok(None) => {
                sleep(idle_interval).await;
                continue;
            }
            Err(e) => {
                warn!("thumb worker: failed to claim queue item: {}", e);
                sleep(idle_interval).await;
                continue;
            }
        };

        limiter.acquire().await;

        let result = fetch_and_store(&client, &thumb_dir, item.gid, &item.thumb_url).await;
        match result {
            Ok(()) => {
                if let Err(e) = thumb_queue::mark_thumb_queue_done(&pool, item.id).await {
                    warn!("thumb worker: failed to mark {} done: {}", item.gid, e);
                }
                debug!("thumb {} downloaded", item.gid);
            }
            Err(e) => {
                warn!("thumb worker: gid {} failed: {}", item.gid, e);
                if let Err(e) = thumb_queue::mark_thumb_queue_failed(&pool, item.id).await {
                    warn!("thumb worker: failed to mark {} failed: {}", item.gid, e);
                }
            }
        }
    }
}

async fn fetch_and_store(
    client: &Client,
    thumb_dir: &PathBuf,
    gid: i64,
    url: &str,
) -> Result<(), anyhow::Error> {
    let response = client
        .get(url)
        .header("Referer", THUMB_REFERER)
        .timeout(THUMB_TIMEOUT)
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(anyhow::anyhow!("thumb CDN returned {}", response.status()));
    }

    let bytes = response.bytes().await?;

    let final_path = thumb_dir.join(gid.to_string());
    let tmp_path = thumb_dir.join(format!("{}.tmp", gid));
    fs::write(&tmp_path, &bytes).await?;
    fs::rename(&tmp_path, &final_path).await?;

    Ok(())
}

pub fn build_client() -> Result<Client, reqwest::Error> {
    Client::builder().timeout(THUMB_TIMEOUT).build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn referer_header_is_well_formed() {
        assert!(THUMB_REFERER.starts_with("https://"));
    }

    #[tokio::test]
    async fn build_client_succeeds() {
        assert!(build_client().is_ok());
    }
}
