//! Hotness scoring with the relevance gate.
//!
//! hotness = Σ weight_i · feature_i, clamped to [0,1]. Records failing the
//! relevance gate (or the strict gate, when enabled) never reach scoring.

use chrono::{DateTime, Utc};
use metrics::counter;
use serde::Serialize;

use super::features::{FeatureExtractor, FeatureVector};
use super::weights::HotnessWeights;
use crate::entities::Entities;
use crate::normalize::NormalizedRecord;

/// Pure function of the feature vector and the weight table.
pub fn hotness(f: &FeatureVector, w: &HotnessWeights) -> f64 {
    let raw = w.relevance * f.relevance
        + w.recency * f.recency
        + w.velocity * f.velocity
        + w.confirmations * f.confirmations
        + w.source_rep * f.source_rep
        + w.entity_breadth * f.entity_breadth;
    if raw.is_nan() {
        0.0
    } else {
        raw.clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoredEvent {
    pub record: NormalizedRecord,
    pub features: FeatureVector,
    pub entities: Entities,
    pub hotness: f64,
}

/// Aggregate exclusion counts; gate failures are never reported per item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GateCounts {
    pub relevance_gated: usize,
    pub strict_gated: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Scorer {
    pub extractor: FeatureExtractor,
    pub weights: HotnessWeights,
}

impl Scorer {
    pub fn new(extractor: FeatureExtractor, weights: HotnessWeights) -> Self {
        Self { extractor, weights }
    }

    /// Gate, then score. `None` means the record was excluded.
    pub fn score_one(
        &self,
        rec: NormalizedRecord,
        now: DateTime<Utc>,
        counts: &mut GateCounts,
    ) -> Option<ScoredEvent> {
        let ex = self.extractor.extract(&rec, now);
        let engine = &self.extractor.relevance;

        if !engine.passes_base_gate(&ex.relevance) {
            counts.relevance_gated += 1;
            engine.log_decision("gated", &rec.body_text, &ex.relevance);
            return None;
        }
        if !engine.passes_strict_gate(&ex.relevance, &rec.body_text) {
            counts.strict_gated += 1;
            engine.log_decision("strict_gated", &rec.body_text, &ex.relevance);
            return None;
        }

        let hotness = hotness(&ex.features, &self.weights);
        Some(ScoredEvent {
            record: rec,
            features: ex.features,
            entities: ex.entities,
            hotness,
        })
    }

    /// Score a whole batch, preserving input order of the survivors.
    pub fn score_batch(
        &self,
        records: Vec<NormalizedRecord>,
        now: DateTime<Utc>,
    ) -> (Vec<ScoredEvent>, GateCounts) {
        let mut counts = GateCounts::default();
        let scored: Vec<ScoredEvent> = records
            .into_iter()
            .filter_map(|r| self.score_one(r, now, &mut counts))
            .collect();
        counter!("radar_relevance_gated_total")
            .increment((counts.relevance_gated + counts.strict_gated) as u64);
        (scored, counts)
    }
}
