//! List/Detail Fetcher (§4.B): builds category-filtered, cursor-paginated
//! URLs, issues HTTP through the shared rate limiter, and classifies the
//! response body before handing it to the parser.

use super::parser::{self, DetailRecord, ListPage};
use super::rate_limiter::RateLimiter;
use crate::db::models::inclusion_mask;
use crate::error::FetchError;
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

static BAN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"ban expires in(?: (\d+) hours?)?(?:, (\d+) minutes?)?(?:, (\d+) seconds?)?",
    )
    .unwrap()
});
static ACCESS_DENIED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)you (?:do not|don't) have permission").unwrap());
static LOGIN_REQUIRED_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)you must be logged in").unwrap());

/// Classification of a site response, mirroring §4.B's response taxonomy.
pub enum Classified<T> {
    Ok(T),
    AccessDenied,
    LoginRequired,
    Banned(Duration),
}

/// Parse a `"ban expires in [H hours][, M minutes][, S seconds]"` string
/// into a total duration. Defaults to 300s if nothing matches (§4.B).
pub fn parse_ban_duration(body: &str) -> Duration {
    match BAN_RE.captures(body) {
        Some(cap) => {
            let hours: u64 = cap.get(1).and_then(|m| m.as_str().parse().ok()).unwrap_or(0);
            let minutes: u64 = cap.get(2).and_then(|m| m.as_str().parse().ok()).unwrap_or(0);
            let seconds: u64 = cap.get(3).and_then(|m| m.as_str().parse().ok()).unwrap_or(0);
            Duration::from_secs(hours * 3600 + minutes * 60 + seconds)
        }
        None => Duration::from_secs(300),
    }
}

fn classify_body<T>(body: &str, on_ok: impl FnOnce() -> T) -> Classified<T> {
    if ACCESS_DENIED_RE.is_match(body) {
        return Classified::AccessDenied;
    }
    if LOGIN_REQUIRED_RE.is_match(body) {
        return Classified::LoginRequired;
    }
    if BAN_RE.is_match(body) {
        return Classified::Banned(parse_ban_duration(body));
    }
    Classified::Ok(on_ok())
}

pub struct Fetcher {
    client: Client,
    base_url: String,
    cookie_header: String,
    limiter: Arc<RateLimiter>,
}

impl Fetcher {
    pub fn new(
        base_url: String,
        cookie_header: String,
        proxy_url: Option<String>,
        limiter: Arc<RateLimiter>,
    ) -> Result<Self, FetchError> {
        let mut builder = Client::builder().timeout(Duration::from_secs(30));
        if let Some(proxy) = proxy_url {
            builder = builder.proxy(reqwest::Proxy::all(proxy)?);
        }
        let client = builder.build()?;
        Ok(Self {
            client,
            base_url,
            cookie_header,
            limiter,
        })
    }

    /// §4.B URL construction: exclusion bitmask over the 10 labels, the
    /// fixed `inline_set` display mode, and `next=<gid>` on every page but
    /// the first.
    fn list_url(&self, include_categories: &[String], inline_set: &str, next_gid: Option<i64>) -> String {
        let mask = inclusion_mask(include_categories);
        let mut url = format!("{}/?f_cats={}&inline_set={}", self.base_url, mask, inline_set);
        if let Some(gid) = next_gid {
            url.push_str(&format!("&next={}", gid));
        }
        url
    }

    async fn get(&self, url: &str) -> Result<(reqwest::StatusCode, String), FetchError> {
        self.limiter.acquire().await;
        debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .header("Cookie", &self.cookie_header)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        Ok((status, body))
    }

    /// Fetch and classify one list page.
    pub async fn fetch_list(
        &self,
        include_categories: &[String],
        inline_set: &str,
        next_gid: Option<i64>,
    ) -> Result<Classified<ListPage>, FetchError> {
        let url = self.list_url(include_categories, inline_set, next_gid);
        let (status, body) = self.get(&url).await?;
        if !status.is_success() {
            warn!("list page returned {}", status);
            return Err(FetchError::HttpStatus(status));
        }
        Ok(classify_body(&body, || parser::parse_gallery_list(&body)))
    }

    /// Fetch and classify one detail page.
    pub async fn fetch_detail(
        &self,
        gid: i64,
        token: &str,
    ) -> Result<Classified<DetailRecord>, FetchError> {
        let url = format!("{}/g/{}/{}/", self.base_url, gid, token);
        let (status, body) = self.get(&url).await?;
        if !status.is_success() {
            warn!("detail page for {} returned {}", gid, status);
            return Err(FetchError::HttpStatus(status));
        }
        Ok(classify_body(&body, || parser::parse_detail(&body)))
    }

    /// Raise the shared ban barrier this fetcher's rate limiter enforces.
    pub fn raise_ban(&self, duration: Duration) {
        info!("ban detected, barrier raised for {:?}", duration);
        self.limiter.raise_ban(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_ban_duration_string() {
        let body = "ban expires in 1 hours, 2 minutes, 3 seconds";
        assert_eq!(parse_ban_duration(body), Duration::from_secs(3723));
    }

    #[test]
    fn parses_partial_ban_duration_string() {
        let body = "ban expires in 5 minutes";
        assert_eq!(parse_ban_duration(body), Duration::from_secs(300));
    }

    #[test]
    fn unparseable_ban_string_defaults_to_300s() {
        assert_eq!(parse_ban_duration("nonsense"), Duration::from_secs(300));
    }

    #[test]
    fn classify_detects_access_denied() {
        let body = "You do not have permission to access this gallery.";
        let result: Classified<()> = classify_body(body, || ());
        assert!(matches!(result, Classified::AccessDenied));
    }
}
