//! Per-record feature extraction.
//!
//! Every feature lands in `[0, 1]`:
//! - `recency`        : `2^(-age_h / half_life_h)`, 0 without a timestamp
//! - `velocity`       : `tanh((repeat / max(age_h, 1)) / scale)` when repeat > 1 and age > 0
//! - `confirmations`  : `min(1, inner_links / norm)`
//! - `source_rep`     : reputation table + path adjustment
//! - `relevance`      : see [`crate::relevance`]
//! - `entity_breadth` : `min(1, distinct_entities / norm)`

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::entities::Entities;
use crate::normalize::NormalizedRecord;
use crate::relevance::{Relevance, RelevanceEngine};
use crate::source_weights::SourceReputation;

fn default_half_life_hours() -> f64 {
    6.0
}
fn default_velocity_scale() -> f64 {
    3.0
}
fn default_max_confirmations_norm() -> f64 {
    3.0
}
fn default_entity_norm() -> f64 {
    3.0
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureParams {
    #[serde(default = "default_half_life_hours")]
    pub half_life_hours: f64,
    #[serde(default = "default_velocity_scale")]
    pub velocity_scale: f64,
    #[serde(default = "default_max_confirmations_norm")]
    pub max_confirmations_norm: f64,
    #[serde(default = "default_entity_norm")]
    pub entity_norm: f64,
}

impl Default for FeatureParams {
    fn default() -> Self {
        Self {
            half_life_hours: default_half_life_hours(),
            velocity_scale: default_velocity_scale(),
            max_confirmations_norm: default_max_confirmations_norm(),
            entity_norm: default_entity_norm(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct FeatureVector {
    pub relevance: f64,
    pub recency: f64,
    pub velocity: f64,
    pub confirmations: f64,
    pub source_rep: f64,
    pub entity_breadth: f64,
}

/// Hours since publication; future timestamps count as age 0.
pub fn age_hours(published_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Option<f64> {
    published_at.map(|ts| ((now - ts).num_milliseconds() as f64 / 3_600_000.0).max(0.0))
}

pub fn recency(age_hours: Option<f64>, half_life_hours: f64) -> f64 {
    match age_hours {
        Some(age) if half_life_hours > 0.0 => 2f64.powf(-age / half_life_hours).clamp(0.0, 1.0),
        _ => 0.0,
    }
}

pub fn velocity(age_hours: Option<f64>, repeat_count: u32, scale: f64) -> f64 {
    match age_hours {
        Some(age) if repeat_count > 1 && age > 0.0 && scale > 0.0 => {
            ((repeat_count as f64 / age.max(1.0)) / scale)
                .tanh()
                .clamp(0.0, 1.0)
        }
        _ => 0.0,
    }
}

pub fn ratio_capped(count: usize, norm: f64) -> f64 {
    if norm <= 0.0 {
        return 0.0;
    }
    (count as f64 / norm).min(1.0)
}

/// Host (for reputation) and lower-cased path (for section heuristics) of a record.
pub fn domain_and_path(rec: &NormalizedRecord) -> (String, String) {
    match rec.article_url.as_deref().and_then(|u| Url::parse(u).ok()) {
        Some(url) => (
            url.host_str().unwrap_or(&rec.source).to_lowercase(),
            url.path().to_lowercase(),
        ),
        None => (rec.source.to_lowercase(), String::new()),
    }
}

/// Everything scoring needs from one record.
#[derive(Debug, Clone)]
pub struct Extracted {
    pub features: FeatureVector,
    pub relevance: Relevance,
    pub entities: Entities,
}

#[derive(Debug, Clone, Default)]
pub struct FeatureExtractor {
    pub relevance: RelevanceEngine,
    pub reputation: SourceReputation,
    pub params: FeatureParams,
}

impl FeatureExtractor {
    pub fn new(
        relevance: RelevanceEngine,
        reputation: SourceReputation,
        params: FeatureParams,
    ) -> Self {
        Self {
            relevance,
            reputation,
            params,
        }
    }

    pub fn extract(&self, rec: &NormalizedRecord, now: DateTime<Utc>) -> Extracted {
        let (domain, path) = domain_and_path(rec);
        let entities = self.relevance.extract_entities(&rec.body_text);
        let relevance = self.relevance.score(&path, &rec.body_text, &entities);
        let age = age_hours(rec.published_at, now);
        let p = &self.params;

        let features = FeatureVector {
            relevance: relevance.score,
            recency: recency(age, p.half_life_hours),
            velocity: velocity(age, rec.repeat_count, p.velocity_scale),
            confirmations: ratio_capped(rec.inner_links.len(), p.max_confirmations_norm),
            source_rep: self
                .reputation
                .score_for(&domain, &path, &self.relevance.cfg.sections),
            entity_breadth: ratio_capped(entities.distinct_count(), p.entity_norm),
        };

        Extracted {
            features,
            relevance,
            entities,
        }
    }
}
