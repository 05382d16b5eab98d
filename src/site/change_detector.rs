//! Change Detector (§4.D): a pure, deterministic comparison between a
//! list-page signal and a stored detail record, deciding whether the
//! detail page is worth re-fetching.

use super::parser::bucket_rating;
use std::collections::BTreeSet;

/// The subset of a stored gallery the detector needs.
pub struct ExistingSignal<'a> {
    pub rating: Option<f64>,
    pub detail_tags: &'a BTreeSet<String>,
}

/// The subset of a list-page item the detector needs.
pub struct ListSignal<'a> {
    pub rating_est: Option<f64>,
    pub visible_tags: &'a [String],
}

/// Outcome: whether to refresh, plus a human-readable reason for logs/tests
/// (§4.D: e.g. `tag=subset(7/9) missing=[a,b,c,...] rating=4.0!=4.5`).
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub refresh: bool,
    pub reason: String,
}

/// An unknown existing record (no stored row) is an unconditional
/// "refresh as new" — callers should check for that case before calling
/// this and skip straight to a refresh.
pub fn decide(existing: &ExistingSignal, item: &ListSignal, rating_threshold: f64) -> Decision {
    let missing: Vec<&str> = item
        .visible_tags
        .iter()
        .filter(|t| !existing.detail_tags.contains(t.as_str()))
        .map(|s| s.as_str())
        .collect();

    if !missing.is_empty() {
        return Decision {
            refresh: true,
            reason: format!(
                "tags_missing={}/{} missing=[{}]",
                missing.len(),
                item.visible_tags.len(),
                missing.join(",")
            ),
        };
    }

    let list_bucket = item.rating_est.map(bucket_rating);
    let detail_bucket = existing.rating.map(bucket_rating);

    let rating_disagrees = match (detail_bucket, list_bucket) {
        (None, Some(_)) => true,
        (Some(d), Some(l)) => (d - l).abs() >= rating_threshold,
        _ => false,
    };

    if rating_disagrees {
        return Decision {
            refresh: true,
            reason: format!(
                "rating={}!={}",
                detail_bucket
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| "none".to_string()),
                list_bucket
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| "none".to_string()),
            ),
        };
    }

    Decision {
        refresh: false,
        reason: format!(
            "tags=subset({}/{}) rating={}=={}",
            item.visible_tags.len(),
            item.visible_tags.len(),
            detail_bucket
                .map(|v| v.to_string())
                .unwrap_or_else(|| "none".to_string()),
            list_bucket
                .map(|v| v.to_string())
                .unwrap_or_else(|| "none".to_string()),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn refreshes_when_a_visible_tag_is_missing_from_stored_detail() {
        let existing = ExistingSignal {
            rating: Some(4.0),
            detail_tags: &tags(&["language:chinese"]),
        };
        let visible = vec!["language:chinese".to_string(), "female:big breasts".to_string()];
        let item = ListSignal {
            rating_est: Some(4.0),
            visible_tags: &visible,
        };
        let decision = decide(&existing, &item, 0.5);
        assert!(decision.refresh);
        assert!(decision.reason.contains("tags_missing=1"));
    }

    #[test]
    fn refreshes_when_rating_buckets_disagree_beyond_threshold() {
        let existing = ExistingSignal {
            rating: Some(4.0),
            detail_tags: &tags(&["a"]),
        };
        let visible = vec!["a".to_string()];
        let item = ListSignal {
            rating_est: Some(4.5),
            visible_tags: &visible,
        };
        let decision = decide(&existing, &item, 0.5);
        assert!(decision.refresh);
    }

    #[test]
    fn no_refresh_when_tags_subset_and_rating_within_threshold() {
        let existing = ExistingSignal {
            rating: Some(4.0),
            detail_tags: &tags(&["a", "b"]),
        };
        let visible = vec!["a".to_string()];
        let item = ListSignal {
            rating_est: Some(4.2),
            visible_tags: &visible,
        };
        let decision = decide(&existing, &item, 0.5);
        assert!(!decision.refresh);
    }

    #[test]
    fn detector_is_deterministic() {
        let existing = ExistingSignal {
            rating: Some(3.5),
            detail_tags: &tags(&["a"]),
        };
        let visible = vec!["a".to_string()];
        let item = ListSignal {
            rating_est: Some(4.0),
            visible_tags: &visible,
        };
        let first = decide(&existing, &item, 0.5);
        let second = decide(&existing, &item, 0.5);
        assert_eq!(first, second);
    }
}
