//! Caller-visible event view: headline, why-now explanation, sources, timeline.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::features::FeatureVector;
use super::scoring::ScoredEvent;
use crate::entities::Entities;

const HEADLINE_MAX_CHARS: usize = 160;
const MAX_SOURCES: usize = 5;
const MAX_WHY_NOW_REASONS: usize = 2;
pub const WHY_NOW_FALLBACK: &str = "Accumulating repeats and rising mentions.";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineEntry {
    pub time: Option<DateTime<Utc>>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopEvent {
    pub id: String,
    pub headline: String,
    /// Rounded for display; ranking happened on the unrounded value.
    pub hotness: f64,
    pub why_now: String,
    pub entities: Entities,
    pub sources: Vec<String>,
    pub timeline: Vec<TimelineEntry>,
    pub dedup_group: String,
    pub features: FeatureVector,
    pub source: String,
    pub repeat_count: u32,
}

impl From<&ScoredEvent> for TopEvent {
    fn from(ev: &ScoredEvent) -> Self {
        let rec = &ev.record;
        let sources = if rec.inner_links.is_empty() {
            rec.article_url.iter().cloned().collect()
        } else {
            rec.inner_links.iter().take(MAX_SOURCES).cloned().collect()
        };
        Self {
            id: rec.id.clone(),
            headline: headline(&rec.body_text),
            hotness: round4(ev.hotness),
            why_now: why_now(&ev.features),
            entities: ev.entities.clone(),
            sources,
            timeline: vec![TimelineEntry {
                time: rec.published_at,
                url: rec.article_url.clone(),
            }],
            dedup_group: dedup_group(rec.article_url.as_deref(), &rec.id),
            features: ev.features,
            source: rec.source.clone(),
            repeat_count: rec.repeat_count,
        }
    }
}

/// Up to two feature reasons in fixed priority order, else the fallback phrase.
pub fn why_now(f: &FeatureVector) -> String {
    let checks = [
        (f.recency > 0.6, "fresh publication"),
        (f.velocity > 0.6, "rapid repeat velocity"),
        (f.confirmations > 0.5, "multiple corroborating links"),
        (f.source_rep > 0.85, "high-reputation source"),
        (f.entity_breadth > 0.6, "broad asset coverage"),
    ];
    let reasons: Vec<&str> = checks
        .iter()
        .filter(|(hit, _)| *hit)
        .map(|(_, label)| *label)
        .take(MAX_WHY_NOW_REASONS)
        .collect();
    if reasons.is_empty() {
        return WHY_NOW_FALLBACK.to_string();
    }
    let joined = reasons.join(", ");
    let mut chars = joined.chars();
    match chars.next() {
        Some(first) => format!("{}{}.", first.to_uppercase(), chars.as_str()),
        None => WHY_NOW_FALLBACK.to_string(),
    }
}

/// First sentence of the body, capped at 160 chars.
pub fn headline(body: &str) -> String {
    let body = body.trim();
    let end = body
        .char_indices()
        .find(|&(i, c)| {
            c == '\n'
                || (matches!(c, '.' | '!' | '?')
                    && body[i + c.len_utf8()..].starts_with(char::is_whitespace)
                    && !(c == '.' && is_abbreviation(&body[..i])))
        })
        .map(|(i, c)| if c == '\n' { i } else { i + c.len_utf8() })
        .unwrap_or(body.len());
    let first = body[..end].trim();

    if first.chars().count() <= HEADLINE_MAX_CHARS {
        return first.to_string();
    }
    let cut: String = first.chars().take(HEADLINE_MAX_CHARS - 1).collect();
    format!("{}…", cut.trim_end())
}

const ABBREVIATIONS: &[&str] = &[
    "Mr", "Mrs", "Ms", "Dr", "St", "Jr", "Sr", "Co", "Corp", "Inc", "Ltd", "vs",
];

/// True when the word right before a period is an abbreviation (`U.S`, `e.g`, `J`, `Inc`).
fn is_abbreviation(before: &str) -> bool {
    let word = before
        .rsplit(char::is_whitespace)
        .next()
        .unwrap_or_default()
        .trim_start_matches(|c: char| !c.is_alphanumeric());
    if word.is_empty() {
        return false;
    }
    if ABBREVIATIONS.contains(&word) {
        return true;
    }
    word.split('.')
        .all(|seg| seg.chars().count() == 1 && seg.chars().all(char::is_alphabetic))
}

pub fn dedup_group(article_url: Option<&str>, record_id: &str) -> String {
    format!("article:{}", article_url.unwrap_or(record_id))
}

fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}
