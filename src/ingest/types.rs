// src/ingest/types.rs
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// How a source is fetched and parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Feed,
    HtmlArticle,
    HtmlListing,
}

impl SourceKind {
    /// Parse the `type` column of a source row. `bridge` endpoints serve RSS/Atom.
    pub fn from_type_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rss" | "atom" | "feed" | "bridge" => Some(SourceKind::Feed),
            "html" | "html_article" => Some(SourceKind::HtmlArticle),
            "html_listing" => Some(SourceKind::HtmlListing),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Feed => "feed",
            SourceKind::HtmlArticle => "html_article",
            SourceKind::HtmlListing => "html_listing",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One configured feed/page. Immutable input to the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub name: String,
    pub kind: SourceKind,
    pub url: String,
    pub fallback_url: Option<String>,
    pub limit: Option<usize>,
    pub verify_tls: bool,
}

impl SourceDescriptor {
    pub fn new(name: impl Into<String>, kind: SourceKind, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            url: url.into(),
            fallback_url: None,
            limit: None,
            verify_tls: true,
        }
    }

    pub fn with_fallback(mut self, url: impl Into<String>) -> Self {
        self.fallback_url = Some(url.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Parser output before normalization. `published` is kept verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEntry {
    pub source_name: String,
    pub title: Option<String>,
    pub link: Option<String>,
    pub published: Option<String>,
    pub summary: Option<String>,
}

/// A single listing article that could not be fetched or parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedItem {
    pub url: String,
    pub error: String,
}

/// What one source produced: entries plus the per-article failures it absorbed.
#[derive(Debug, Clone, Default)]
pub struct Harvest {
    pub entries: Vec<RawEntry>,
    pub skipped: Vec<SkippedItem>,
}

/// A failed source, as reported to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceFailure {
    pub source: String,
    pub kind: SourceKind,
    pub url: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceStats {
    pub kind: SourceKind,
    pub url: String,
    pub ok: usize,
    pub skipped: usize,
    pub errors: Vec<String>,
}

/// Aggregated result of one concurrent fetch round.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    pub items: Vec<RawEntry>,
    pub errors: Vec<SourceFailure>,
    pub per_source: BTreeMap<String, SourceStats>,
    /// Item counts per source after the per-source cap.
    pub by_source: BTreeMap<String, usize>,
    pub total_items_raw: usize,
}
