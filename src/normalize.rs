//! Normalizer: maps every parser's [`RawEntry`] onto one canonical record shape.
//!
//! Body text: HTML-unescape → strip tags → collapse whitespace → drop noise phrases.
//! Inner links: every anchor `href` in the body, first occurrence wins.
//! Timestamps go through [`crate::timestamp::parse_timestamp`]; unparseable
//! values leave `published_at` empty.

use chrono::{DateTime, Utc};
use once_cell::sync::{Lazy, OnceCell};
use regex::Regex;
use scraper::{Html, Selector};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::ingest::types::RawEntry;
use crate::ordered_set::OrderedSet;
use crate::timestamp::parse_timestamp;

/// Platform chrome and promotional tails stripped from every body.
pub const DEFAULT_NOISE_PATTERNS: &[&str] = &[
    r"Please open Telegram to view this post",
    r"VIEW IN TELEGRAM",
    r"Подписывайтесь.*$",
    r"Оставляйте.*$",
    r"Картина дня.*$",
    r"^Реклама\..*$",
    r"^erid:\s*\S+",
    r"Subscribe to our (?:newsletter|channel).*$",
    r"Sign up for our newsletter.*$",
    r"^Advertisement\b\.?",
];

/// Bodies shorter than this fall back to the title when the title is longer.
const SHORT_BODY_CHARS: usize = 25;

/// Canonical unit flowing through dedup, windowing and scoring.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedRecord {
    /// Short anonymized id (hash of source, url and body).
    pub id: String,
    pub source: String,
    pub title: String,
    pub published_at: Option<DateTime<Utc>>,
    pub body_text: String,
    pub inner_links: Vec<String>,
    pub article_url: Option<String>,
    /// Batch-relative; 1 until the deduplicator has fingerprinted the whole batch.
    pub repeat_count: u32,
}

#[derive(Debug, Clone)]
pub struct Normalizer {
    noise: Option<Regex>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::with_noise_patterns(DEFAULT_NOISE_PATTERNS).expect("built-in noise patterns")
    }
}

impl Normalizer {
    /// Combine all noise phrases into one case-insensitive, multi-line alternation.
    pub fn with_noise_patterns<S: AsRef<str>>(patterns: &[S]) -> Result<Self, regex::Error> {
        let joined = patterns
            .iter()
            .map(|p| format!("(?:{})", p.as_ref()))
            .collect::<Vec<_>>()
            .join("|");
        let noise = if joined.is_empty() {
            None
        } else {
            Some(Regex::new(&format!("(?im){joined}"))?)
        };
        Ok(Self { noise })
    }

    pub fn normalize(&self, raw: &RawEntry) -> NormalizedRecord {
        let title_raw = raw.title.as_deref().unwrap_or_default();
        let summary_raw = raw.summary.as_deref().unwrap_or_default();

        let combined = format!("{title_raw}. {summary_raw}");
        let combined = combined.trim_matches(|c| c == '.' || c == ' ');
        let (mut body, inner_links) = self.extract_text_and_links(combined);

        let (title, _) = self.extract_text_and_links(title_raw);
        if body.chars().count() < SHORT_BODY_CHARS && title.chars().count() > body.chars().count()
        {
            body = title.clone();
        }

        let article_url = raw
            .link
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string);

        let published_at = raw.published.as_deref().and_then(parse_timestamp);

        NormalizedRecord {
            id: record_id(&raw.source_name, article_url.as_deref(), &body),
            source: raw.source_name.clone(),
            title,
            published_at,
            body_text: body,
            inner_links,
            article_url,
            repeat_count: 1,
        }
    }

    /// Plain text plus order-preserving unique `href`s of an HTML (or plain) fragment.
    pub fn extract_text_and_links(&self, html_or_text: &str) -> (String, Vec<String>) {
        if html_or_text.trim().is_empty() {
            return (String::new(), Vec::new());
        }

        // 1) HTML entity decode
        let unescaped = html_escape::decode_html_entities(html_or_text).to_string();

        // 2) Anchors
        let links = extract_links(&unescaped);

        // 3) Strip scripts/styles, then all tags
        static RE_BLOCKS: OnceCell<Regex> = OnceCell::new();
        let re_blocks = RE_BLOCKS.get_or_init(|| {
            Regex::new(r"(?is)<script\b.*?</script>|<style\b.*?</style>").unwrap()
        });
        static RE_TAGS: OnceCell<Regex> = OnceCell::new();
        let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").unwrap());
        let no_blocks = re_blocks.replace_all(&unescaped, " ");
        let mut text = re_tags.replace_all(&no_blocks, " ").to_string();

        // 4) Typographic quotes to ASCII
        text = text
            .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
            .replace(['\u{2018}', '\u{2019}'], "'");

        // 5) Collapse whitespace, remove noise, collapse again
        let text = collapse_ws(&text);
        match &self.noise {
            Some(noise) => (collapse_ws(&noise.replace_all(&text, " ")), links),
            None => (text, links),
        }
    }
}

/// Normalize with the built-in noise table.
pub fn normalize(raw: &RawEntry) -> NormalizedRecord {
    static DEFAULT: Lazy<Normalizer> = Lazy::new(Normalizer::default);
    DEFAULT.normalize(raw)
}

fn extract_links(html: &str) -> Vec<String> {
    static SEL_A: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").expect("anchor selector"));
    let fragment = Html::parse_fragment(html);
    let mut links = OrderedSet::new();
    for a in fragment.select(&SEL_A) {
        if let Some(href) = a.value().attr("href") {
            let href = href.trim();
            if !href.is_empty() {
                links.insert(href.to_string());
            }
        }
    }
    links.into_vec()
}

pub(crate) fn collapse_ws(s: &str) -> String {
    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").unwrap());
    re_ws.replace_all(s, " ").trim().to_string()
}

/// First 6 bytes of SHA-256, hex. Used as a record id and in logs instead of raw text.
pub(crate) fn short_hash(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for p in parts {
        hasher.update(p.as_bytes());
        hasher.update([0x1f]);
    }
    let digest = hasher.finalize();
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

fn record_id(source: &str, url: Option<&str>, body: &str) -> String {
    short_hash(&[source, url.unwrap_or_default(), body])
}
