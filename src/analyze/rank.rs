//! Top-K ranking.

use std::cmp::Ordering;

use super::scoring::ScoredEvent;
use crate::error::PipelineError;
use crate::normalize::NormalizedRecord;

/// Stable sort by hotness descending, truncated to `k`. Ties keep input order.
pub fn rank(mut events: Vec<ScoredEvent>, k: usize) -> Result<Vec<ScoredEvent>, PipelineError> {
    if k == 0 {
        return Err(PipelineError::InvalidTopK);
    }
    events.sort_by(|a, b| b.hotness.partial_cmp(&a.hotness).unwrap_or(Ordering::Equal));
    events.truncate(k);
    Ok(events)
}

/// Deterministic pre-scoring order: source name, then article URL (absent first).
pub fn sort_for_tiebreak(records: &mut [NormalizedRecord]) {
    records.sort_by(|a, b| {
        a.source
            .cmp(&b.source)
            .then_with(|| a.article_url.cmp(&b.article_url))
    });
}
