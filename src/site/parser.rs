//! HTML-signal extraction. Black-boxed per the specification: treated here
//! as a set of pure functions with documented inputs/outputs, implemented
//! with `regex` (already in the teacher's dependency table) rather than a
//! full DOM parser, since the parsing strategy itself is explicitly out of
//! scope. Field semantics follow the reference parser this system was
//! distilled from.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

static GID_TOKEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"/g/(\d+)/([a-f0-9]+)/").unwrap());
static NEXT_CURSOR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[?&]next=(\d+)").unwrap());
static RATING_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"([0-5](?:\.\d+)?) stars").unwrap());
static FOUND_COUNT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Found (?:about )?([\d,]+) results?").unwrap());
static TAG_ANCHOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"f_search=[^"]*"[^>]*>([^<]+)<"#).unwrap());

/// One entry on a list page (§4.B). `rating_est` is the bucketed rating
/// read off the list-page rating sprite; `visible_tags` are the tag
/// strings visible on the list card.
#[derive(Debug, Clone, PartialEq)]
pub struct GalleryListItem {
    pub gid: i64,
    pub token: String,
    pub title: String,
    pub rating_est: Option<f64>,
    pub visible_tags: Vec<String>,
}

/// Result of parsing one list page.
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    pub items: Vec<GalleryListItem>,
    pub next_cursor: Option<i64>,
    pub total_count: Option<i64>,
}

/// Parse a list page's HTML into items, the next-page cursor, and the
/// optional "Found about N results" banner count.
pub fn parse_gallery_list(html: &str) -> ListPage {
    let mut items = Vec::new();
    for cap in GID_TOKEN_RE.captures_iter(html) {
        let gid: i64 = match cap[1].parse() {
            Ok(v) => v,
            Err(_) => continue,
        };
        let token = cap[2].to_string();
        // Title/rating/tags extraction is intentionally coarse here: the
        // precise DOM walk lives outside this system's scope. We pull the
        // nearest rating and tag anchors within a bounded window after the
        // link, which is the signal the Change Detector actually consumes.
        let window_start = cap.get(0).unwrap().end();
        let window_end = (window_start + 600).min(html.len());
        let window = &html[window_start..window_end];

        let rating_est = RATING_RE
            .captures(window)
            .and_then(|c| c[1].parse::<f64>().ok());
        let visible_tags: Vec<String> = TAG_ANCHOR_RE
            .captures_iter(window)
            .map(|c| c[1].trim().to_lowercase())
            .collect();

        items.push(GalleryListItem {
            gid,
            token,
            title: String::new(),
            rating_est,
            visible_tags,
        });
    }

    let next_cursor = NEXT_CURSOR_RE
        .captures(html)
        .and_then(|c| c[1].parse::<i64>().ok());

    let total_count = FOUND_COUNT_RE
        .captures(html)
        .and_then(|c| c[1].replace(',', "").parse::<i64>().ok());

    ListPage {
        items,
        next_cursor,
        total_count,
    }
}

/// A fully parsed detail page (§4.B).
#[derive(Debug, Clone, Default)]
pub struct DetailRecord {
    pub title: String,
    pub title_jpn: Option<String>,
    pub category: String,
    pub uploader: Option<String>,
    pub rating: Option<f64>,
    pub fav_count: Option<i32>,
    pub comment_count: Option<i32>,
    pub thumb: Option<String>,
    pub tags: BTreeMap<String, Vec<String>>,
}

static TITLE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"id="gn">([^<]+)<"#).unwrap());
static TITLE_JPN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"id="gj">([^<]*)<"#).unwrap());
static CATEGORY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"class="c[ns]">([^<]+)<"#).unwrap());
static UPLOADER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"id="gdn">([^<]+)<"#).unwrap());
static DETAIL_RATING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"id="rating_label">([0-5](?:\.\d+)?)"#).unwrap());
static FAV_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"id="favcount">([\d,]+)"#).unwrap());
static THUMB_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"src="(https?://[^"]+thumb[^"]*)""#).unwrap());
static TAG_ROW_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"class="tc">([a-z ]+):</td>(.*?)</tr>"#).unwrap());
static TAG_VALUE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#">([^<]+)</a>"#).unwrap());

/// Parse a detail page's HTML into a `DetailRecord`.
pub fn parse_detail(html: &str) -> DetailRecord {
    let title = TITLE_RE
        .captures(html)
        .map(|c| c[1].to_string())
        .unwrap_or_default();
    let title_jpn = TITLE_JPN_RE
        .captures(html)
        .map(|c| c[1].to_string())
        .filter(|s| !s.is_empty());
    let category = CATEGORY_RE
        .captures(html)
        .map(|c| c[1].to_string())
        .unwrap_or_default();
    let uploader = UPLOADER_RE.captures(html).map(|c| c[1].to_string());
    let rating = DETAIL_RATING_RE
        .captures(html)
        .and_then(|c| c[1].parse::<f64>().ok());
    let fav_count = FAV_RE
        .captures(html)
        .and_then(|c| c[1].replace(',', "").parse::<i32>().ok());
    let thumb = THUMB_RE.captures(html).map(|c| c[1].to_string());

    let mut tags = BTreeMap::new();
    for row in TAG_ROW_RE.captures_iter(html) {
        let namespace = row[1].trim().to_string();
        let mut values: Vec<String> = Vec::new();
        for v in TAG_VALUE_RE.captures_iter(&row[2]) {
            let value = v[1].trim().to_lowercase();
            if !values.contains(&value) {
                values.push(value);
            }
        }
        if !values.is_empty() {
            tags.insert(namespace, values);
        }
    }

    DetailRecord {
        title,
        title_jpn,
        category,
        uploader,
        rating,
        fav_count,
        comment_count: None,
        thumb,
        tags,
    }
}

/// Bucket a rating to the nearest 0.5 step, matching the site's list-page
/// sprite encoding (§4.D, Glossary "Bucketed rating").
pub fn bucket_rating(value: f64) -> f64 {
    (value * 2.0).round() / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_rating_rounds_to_nearest_half() {
        assert_eq!(bucket_rating(4.2), 4.0);
        assert_eq!(bucket_rating(4.3), 4.5);
        assert_eq!(bucket_rating(4.75), 5.0);
    }

    #[test]
    fn parse_gallery_list_extracts_gid_token_and_cursor() {
        let html = r#"<a href="/g/12345/abcdef0123/">x</a> ... <a href="?next=12300">next</a>"#;
        let page = parse_gallery_list(html);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].gid, 12345);
        assert_eq!(page.items[0].token, "abcdef0123");
        assert_eq!(page.next_cursor, Some(12300));
    }

    #[test]
    fn parse_gallery_list_reads_found_count_banner() {
        let html = "Found about 1,234 results";
        let page = parse_gallery_list(html);
        assert_eq!(page.total_count, Some(1234));
    }
}
