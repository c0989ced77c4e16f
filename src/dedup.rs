//! Cleaner / deduplicator.
//!
//! Order of operations over one batch:
//! 1. drop garbage bodies (too short, or error-page phrases in title/body);
//! 2. drop records whose article URL hits a blocked pattern;
//! 3. fingerprint every survivor, count fingerprints over the whole batch,
//!    then annotate `repeat_count` (two passes: the table must be complete first);
//! 4. collapse exact `(canonical url, body)` duplicates, first occurrence wins.

use metrics::counter;
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use tracing::debug;
use url::Url;

use crate::normalize::NormalizedRecord;

fn default_min_body_chars() -> usize {
    40
}

fn default_error_phrases() -> Vec<String> {
    [
        "bridge returned error",
        "404 page not found",
        "page not found",
        "access denied",
        "forbidden",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_error_titles() -> Vec<String> {
    ["navigation"].iter().map(|s| s.to_string()).collect()
}

fn default_blocked_link_patterns() -> Vec<String> {
    ["localhost:", "127.0.0.1", "rss-bridge"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_tracking_prefixes() -> Vec<String> {
    ["utm_", "fbclid", "yclid", "gclid", "ref"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanerConfig {
    /// Minimum length of the fingerprint-normalized body.
    #[serde(default = "default_min_body_chars")]
    pub min_body_chars: usize,
    /// Lower-case substrings that mark an error page.
    #[serde(default = "default_error_phrases")]
    pub error_phrases: Vec<String>,
    /// Whole titles (trimmed, lower-case) of scraped chrome rather than articles.
    #[serde(default = "default_error_titles")]
    pub error_titles: Vec<String>,
    /// Lower-case substrings of article URLs that are never real articles.
    #[serde(default = "default_blocked_link_patterns")]
    pub blocked_link_patterns: Vec<String>,
    /// Query keys starting with any of these are dropped from canonical URLs.
    #[serde(default = "default_tracking_prefixes")]
    pub tracking_prefixes: Vec<String>,
}

impl Default for CleanerConfig {
    fn default() -> Self {
        Self {
            min_body_chars: default_min_body_chars(),
            error_phrases: default_error_phrases(),
            error_titles: default_error_titles(),
            blocked_link_patterns: default_blocked_link_patterns(),
            tracking_prefixes: default_tracking_prefixes(),
        }
    }
}

/// Drop counts of one cleaning pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanReport {
    pub garbage: usize,
    pub blocked_links: usize,
    pub duplicates: usize,
}

/// Lower-case, non-word characters → space, collapse whitespace.
pub fn normalize_for_fingerprint(s: &str) -> String {
    static RE_NONWORD: OnceCell<Regex> = OnceCell::new();
    let re = RE_NONWORD.get_or_init(|| Regex::new(r"\W+").unwrap());
    let lowered = s.to_lowercase();
    re.replace_all(&lowered, " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Hex SHA-256 of the normalized text.
pub fn fingerprint(s: &str) -> String {
    let digest = Sha256::digest(normalize_for_fingerprint(s).as_bytes());
    let mut out = String::with_capacity(64);
    for b in digest.iter() {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

impl CleanerConfig {
    pub fn is_garbage(&self, body: &str, title: &str) -> bool {
        let joined = format!("{title} {body}").to_lowercase();
        if self
            .error_phrases
            .iter()
            .any(|p| joined.contains(p.as_str()))
        {
            return true;
        }
        let title = title.trim().to_lowercase();
        if self.error_titles.iter().any(|t| *t == title) {
            return true;
        }
        normalize_for_fingerprint(body).chars().count() < self.min_body_chars
    }

    pub fn is_blocked_link(&self, link: Option<&str>) -> bool {
        let Some(link) = link else {
            return false;
        };
        let l = link.to_lowercase();
        self.blocked_link_patterns
            .iter()
            .any(|p| l.contains(p.as_str()))
    }

    /// Comparison key only; never stored on the record.
    ///
    /// - http/https → https
    /// - host lower-cased
    /// - trailing `/` stripped from the path (root stays `/`)
    /// - tracking query keys removed, fragment dropped
    pub fn canonical_url(&self, raw: &str) -> String {
        let Ok(mut url) = Url::parse(raw.trim()) else {
            return raw.trim().to_string();
        };
        if url.scheme() == "http" {
            // Infallible for http → https.
            let _ = url.set_scheme("https");
        }
        if let Some(host) = url.host_str().map(str::to_lowercase) {
            let _ = url.set_host(Some(&host));
        }

        let path = url.path().trim_end_matches('/').to_string();
        url.set_path(if path.is_empty() { "/" } else { &path });

        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(k, _)| {
                let k = k.to_lowercase();
                !self
                    .tracking_prefixes
                    .iter()
                    .any(|p| k.starts_with(p.as_str()))
            })
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        if kept.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(kept);
        }
        url.set_fragment(None);
        url.to_string()
    }

    pub fn clean_and_dedup(
        &self,
        records: Vec<NormalizedRecord>,
    ) -> (Vec<NormalizedRecord>, CleanReport) {
        let mut report = CleanReport::default();

        // Steps 1–2: filters.
        let mut kept = Vec::with_capacity(records.len());
        for rec in records {
            if self.is_garbage(&rec.body_text, &rec.title) {
                report.garbage += 1;
                continue;
            }
            if self.is_blocked_link(rec.article_url.as_deref()) {
                report.blocked_links += 1;
                continue;
            }
            kept.push(rec);
        }

        // Step 3a: frequency table over the full batch.
        let fps: Vec<String> = kept
            .iter()
            .map(|r| {
                if r.body_text.is_empty() {
                    fingerprint(&r.title)
                } else {
                    fingerprint(&r.body_text)
                }
            })
            .collect();
        let mut freq: HashMap<&str, u32> = HashMap::new();
        for fp in &fps {
            *freq.entry(fp.as_str()).or_insert(0) += 1;
        }

        // Step 3b + 4: annotate, then collapse exact duplicates in input order.
        let mut seen: HashSet<(String, String)> = HashSet::new();
        let mut out = Vec::with_capacity(kept.len());
        for (mut rec, fp) in kept.into_iter().zip(fps.iter()) {
            rec.repeat_count = freq.get(fp.as_str()).copied().unwrap_or(1);
            let url_key = rec
                .article_url
                .as_deref()
                .map(|u| self.canonical_url(u))
                .unwrap_or_default();
            if !seen.insert((url_key, rec.body_text.clone())) {
                report.duplicates += 1;
                continue;
            }
            out.push(rec);
        }

        counter!("radar_items_dropped_total", "stage" => "garbage").increment(report.garbage as u64);
        counter!("radar_items_dropped_total", "stage" => "blocked_link")
            .increment(report.blocked_links as u64);
        counter!("radar_items_dropped_total", "stage" => "duplicate")
            .increment(report.duplicates as u64);
        debug!(
            target: "dedup",
            kept = out.len(),
            garbage = report.garbage,
            blocked = report.blocked_links,
            duplicates = report.duplicates,
            "batch cleaned"
        );

        (out, report)
    }
}

/// Clean with the built-in phrase/pattern tables.
pub fn clean_and_dedup(records: Vec<NormalizedRecord>) -> Vec<NormalizedRecord> {
    CleanerConfig::default().clean_and_dedup(records).0
}
