//! Summarizer collaborator: turns the ranked top-K into an impact digest.
//!
//! The pipeline never depends on a remote summarizer being present. When the
//! provider is disabled or returns nothing, [`local_digest`] buckets the mean
//! hotness into an impact level with a templated sentence.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::explain::TopEvent;
use crate::ordered_set::OrderedSet;

const WATCHLIST_MAX: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImpactLevel {
    None,
    Low,
    Medium,
    High,
}

impl ImpactLevel {
    /// [0,.2) none, [.2,.4) low, [.4,.7) medium, [.7,1] high.
    pub fn from_mean_hotness(mean: f64) -> Self {
        if mean >= 0.7 {
            ImpactLevel::High
        } else if mean >= 0.4 {
            ImpactLevel::Medium
        } else if mean >= 0.2 {
            ImpactLevel::Low
        } else {
            ImpactLevel::None
        }
    }

    fn template(self) -> &'static str {
        match self {
            ImpactLevel::None => "No market-moving news in the window.",
            ImpactLevel::Low => "A few minor market items; no strong signal yet.",
            ImpactLevel::Medium => "Several notable market stories are developing.",
            ImpactLevel::High => "Major market-moving news is breaking.",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Digest {
    pub impact_level: ImpactLevel,
    pub summary: String,
    pub watchlist: Vec<String>,
    pub rationale: String,
}

/// Trait object used by the pipeline.
pub trait Summarizer: Send + Sync {
    /// Summarize the top-K; `None` means "no opinion, use the local rule".
    fn summarize<'a>(
        &'a self,
        events: &'a [TopEvent],
    ) -> Pin<Box<dyn Future<Output = Option<Digest>> + Send + 'a>>;
    /// Provider name for diagnostics.
    fn provider_name(&self) -> &'static str;
}

pub type DynSummarizer = Arc<dyn Summarizer>;

/// Returns `None` always; the default collaborator.
pub struct DisabledSummarizer;

impl Summarizer for DisabledSummarizer {
    fn summarize<'a>(
        &'a self,
        _events: &'a [TopEvent],
    ) -> Pin<Box<dyn Future<Output = Option<Digest>> + Send + 'a>> {
        Box::pin(async { None })
    }
    fn provider_name(&self) -> &'static str {
        "disabled"
    }
}

/// Fixed digest for tests/local runs.
#[derive(Clone)]
pub struct MockSummarizer {
    pub fixed: Digest,
}

impl Summarizer for MockSummarizer {
    fn summarize<'a>(
        &'a self,
        _events: &'a [TopEvent],
    ) -> Pin<Box<dyn Future<Output = Option<Digest>> + Send + 'a>> {
        let out = self.fixed.clone();
        Box::pin(async move { Some(out) })
    }
    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

pub fn mean_hotness(events: &[TopEvent]) -> f64 {
    if events.is_empty() {
        return 0.0;
    }
    events.iter().map(|e| e.hotness).sum::<f64>() / events.len() as f64
}

/// Deterministic fallback digest.
pub fn local_digest(events: &[TopEvent]) -> Digest {
    let mean = mean_hotness(events);
    let level = ImpactLevel::from_mean_hotness(mean);

    let mut watch = OrderedSet::new();
    for t in events.iter().flat_map(|e| e.entities.tickers.iter()) {
        if watch.len() >= WATCHLIST_MAX {
            break;
        }
        watch.insert(t.clone());
    }

    Digest {
        impact_level: level,
        summary: level.template().to_string(),
        watchlist: watch.into_vec(),
        rationale: format!(
            "mean hotness {:.3} across {} top events",
            mean,
            events.len()
        ),
    }
}

/// Ask the collaborator; fall back to [`local_digest`] on `None`.
pub async fn digest_with(summarizer: &dyn Summarizer, events: &[TopEvent]) -> Digest {
    match summarizer.summarize(events).await {
        Some(d) => d,
        None => {
            debug!(target: "pipeline", provider = summarizer.provider_name(), "summarizer returned nothing, using local digest");
            local_digest(events)
        }
    }
}
