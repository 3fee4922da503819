//! Per-task append-only evidence collection with deduplication and
//! insertion-time quality scoring (§4.2).

use crate::model::{Evidence, EvidenceSource};
use chrono::{DateTime, Utc};
use regex::Regex;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::sync::LazyLock;

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("static regex is valid"));

/// Bounded lookup of well-known hosts to an authority score in `[0, 1]`.
/// Hosts not present default to `0.5`, per §4.2 ("a sub-score that cannot
/// be computed defaults to 0.5; never to 0 or 1").
const AUTHORITY_TABLE: &[(&str, f64)] = &[
    ("wikipedia.org", 0.75),
    ("nature.com", 0.95),
    ("science.org", 0.95),
    ("nytimes.com", 0.85),
    ("reuters.com", 0.9),
    ("apnews.com", 0.9),
    ("bbc.com", 0.85),
    ("arxiv.org", 0.85),
    ("gov", 0.9),
    ("edu", 0.85),
];

/// Half-life, in days, for the recency decay applied to publication age.
const RECENCY_HALF_LIFE_DAYS: f64 = 365.0;

/// Normalize an excerpt for hashing: lowercase, collapse whitespace. URL
/// query-fragment stripping is the caller's responsibility (applied to the
/// source URL before it is combined into the excerpt for hashing, since the
/// excerpt text itself carries no URL).
#[must_use]
pub fn normalize_excerpt(excerpt: &str) -> String {
    WHITESPACE.replace_all(&excerpt.to_lowercase(), " ").trim().to_string()
}

/// Strip query-string and fragment from a URL, keeping scheme/host/path.
/// Used before hashing so that tracking parameters do not defeat
/// deduplication of otherwise-identical content.
#[must_use]
pub fn strip_url_noise(url: &str) -> String {
    let without_fragment = url.split('#').next().unwrap_or(url);
    without_fragment.split('?').next().unwrap_or(without_fragment).to_string()
}

/// Compute the stable content hash used for deduplication: a SHA-256 digest
/// of the normalized excerpt combined with the noise-stripped URL.
#[must_use]
pub fn content_hash(excerpt: &str, url: &str) -> String {
    let normalized_excerpt = normalize_excerpt(excerpt);
    let normalized_url = strip_url_noise(url);
    let mut hasher = Sha256::new();
    hasher.update(normalized_url.as_bytes());
    hasher.update(b"\0");
    hasher.update(normalized_excerpt.as_bytes());
    let digest = hasher.finalize();
    hex_encode(&digest)
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

/// Authority sub-score derived from the URL host.
#[must_use]
pub fn authority_score(url: &str) -> f64 {
    let host = url
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .split('/')
        .next()
        .unwrap_or("");
    for (suffix, score) in AUTHORITY_TABLE {
        if host == *suffix || host.ends_with(&format!(".{suffix}")) {
            return *score;
        }
    }
    0.5
}

/// Lexical-fallback relevance: fraction of the query's significant words
/// (length > 2) that literally appear in the excerpt, case-insensitive.
/// Used when no embedding model is available (§4.2: "text-embedding or
/// lexical fallback").
#[must_use]
pub fn relevance_score(query: &str, excerpt: &str) -> f64 {
    let excerpt_lower = excerpt.to_lowercase();
    let words: Vec<&str> = query
        .split_whitespace()
        .filter(|w| w.len() > 2)
        .collect();
    if words.is_empty() {
        return 0.5;
    }
    let hits = words
        .iter()
        .filter(|w| excerpt_lower.contains(&w.to_lowercase()))
        .count();
    hits as f64 / words.len() as f64
}

/// Exponential recency decay over days since publication, half-life one
/// year. Returns `0.5` when no publish date is known.
#[must_use]
pub fn recency_score(published_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
    match published_at {
        None => 0.5,
        Some(published) => {
            let age_days = (now - published).num_seconds().max(0) as f64 / 86_400.0;
            0.5f64.powf(age_days / RECENCY_HALF_LIFE_DAYS)
        }
    }
}

/// Compute the fixed-weight quality score: `0.6*authority + 0.3*relevance
/// + 0.1*recency`.
#[must_use]
pub fn quality_score(query: &str, source: &EvidenceSource, excerpt: &str, now: DateTime<Utc>) -> f64 {
    let authority = authority_score(&source.url);
    let relevance = relevance_score(query, excerpt);
    let recency = recency_score(source.published_at, now);
    (0.6 * authority + 0.3 * relevance + 0.1 * recency).clamp(0.0, 1.0)
}

/// Per-task append-only collection of [`Evidence`] with content-hash
/// deduplication. Created empty per task; grows monotonically across
/// iterations; destroyed with task scope.
#[derive(Debug, Default)]
pub struct EvidenceStore {
    items: Vec<Evidence>,
    seen_hashes: HashSet<String>,
}

impl EvidenceStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an item if its content hash has not been seen before.
    /// Returns `true` if it was added, `false` if it was a duplicate and
    /// dropped.
    pub fn add(&mut self, item: Evidence) -> bool {
        if self.seen_hashes.contains(&item.content_hash) {
            return false;
        }
        self.seen_hashes.insert(item.content_hash.clone());
        self.items.push(item);
        true
    }

    /// Ordered snapshot of every retained item, in insertion order.
    #[must_use]
    pub fn snapshot(&self) -> &[Evidence] {
        &self.items
    }

    /// Number of retained items.
    #[must_use]
    pub fn count(&self) -> usize {
        self.items.len()
    }

    /// Human-readable summary of distinct sources, e.g. `"4 sources across
    /// reuters.com, nature.com, wikipedia.org"`.
    #[must_use]
    pub fn sources_summary(&self) -> String {
        let mut hosts: Vec<String> = self
            .items
            .iter()
            .map(|e| {
                e.source
                    .url
                    .trim_start_matches("https://")
                    .trim_start_matches("http://")
                    .split('/')
                    .next()
                    .unwrap_or("")
                    .to_string()
            })
            .collect();
        hosts.sort();
        hosts.dedup();
        if hosts.is_empty() {
            "0 sources".to_string()
        } else {
            format!(
                "{} sources across {}",
                self.items.len(),
                hosts.join(", ")
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn make_evidence(url: &str, excerpt: &str) -> Evidence {
        let now = Utc::now();
        let source = EvidenceSource {
            url: url.to_string(),
            title: "Title".into(),
            fetched_at: now,
            published_at: None,
        };
        let hash = content_hash(excerpt, url);
        Evidence {
            id: Uuid::new_v4(),
            source,
            excerpt: excerpt.to_string(),
            content_hash: hash,
            tool_call_id: None,
            quality_score: 0.5,
            tags: vec![],
            citation_key: "S1".into(),
        }
    }

    #[test]
    fn duplicate_content_hash_is_dropped() {
        let mut store = EvidenceStore::new();
        let e1 = make_evidence("https://example.com/a?utm_source=x", "Some shared text");
        let e2 = make_evidence("https://example.com/a?utm_source=y", "  Some   shared text ");
        assert!(store.add(e1));
        assert!(!store.add(e2));
        assert_eq!(store.count(), 1);
    }

    #[test]
    fn distinct_content_is_retained() {
        let mut store = EvidenceStore::new();
        assert!(store.add(make_evidence("https://a.com", "alpha")));
        assert!(store.add(make_evidence("https://b.com", "beta")));
        assert_eq!(store.count(), 2);
    }

    #[test]
    fn strip_url_noise_drops_query_and_fragment() {
        assert_eq!(
            strip_url_noise("https://example.com/page?x=1&y=2#frag"),
            "https://example.com/page"
        );
    }

    #[test]
    fn authority_score_known_vs_unknown_host() {
        assert!((authority_score("https://nature.com/articles/1") - 0.95).abs() < 1e-9);
        assert!((authority_score("https://random-blog.example") - 0.5).abs() < 1e-9);
    }

    #[test]
    fn authority_score_tld_suffix_match() {
        assert!((authority_score("https://nih.gov/study") - 0.9).abs() < 1e-9);
        assert!((authority_score("https://mit.edu/paper") - 0.85).abs() < 1e-9);
    }

    #[test]
    fn relevance_score_counts_word_overlap() {
        let score = relevance_score("rust async best practices", "this covers async patterns in rust");
        assert!(score > 0.0 && score <= 1.0);
    }

    #[test]
    fn relevance_score_defaults_for_empty_query() {
        assert!((relevance_score("", "anything") - 0.5).abs() < 1e-9);
    }

    #[test]
    fn recency_score_defaults_without_publish_date() {
        assert!((recency_score(None, Utc::now()) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn recency_score_decays_with_age() {
        let now = Utc::now();
        let one_year_ago = now - chrono::Duration::days(365);
        let score = recency_score(Some(one_year_ago), now);
        assert!((score - 0.5).abs() < 1e-6);
        let fresh = recency_score(Some(now), now);
        assert!((fresh - 1.0).abs() < 1e-6);
    }

    #[test]
    fn quality_score_never_zero_or_one_for_midrange_inputs() {
        let now = Utc::now();
        let source = EvidenceSource {
            url: "https://unknown.example".into(),
            title: "T".into(),
            fetched_at: now,
            published_at: None,
        };
        let score = quality_score("test query", &source, "unrelated text", now);
        assert!(score > 0.0 && score < 1.0);
    }

    #[test]
    fn sources_summary_dedupes_hosts() {
        let mut store = EvidenceStore::new();
        store.add(make_evidence("https://a.com/1", "one"));
        store.add(make_evidence("https://a.com/2", "two"));
        store.add(make_evidence("https://b.com/1", "three"));
        let summary = store.sources_summary();
        assert!(summary.contains("3 sources"));
        assert!(summary.contains("a.com"));
        assert!(summary.contains("b.com"));
    }
}
