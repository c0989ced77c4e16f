// src/pipeline.rs
//! End-to-end radar pass: fetch → normalize → clean/dedup → window → score → rank.
//!
//! Only the fetch stage is concurrent. Everything after it runs over the
//! complete batch, since repeat counts need every fingerprint first.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::gauge;
use serde::Serialize;
use tracing::info;

use crate::analyze::explain::TopEvent;
use crate::analyze::features::{FeatureExtractor, FeatureParams};
use crate::analyze::rank::{rank, sort_for_tiebreak};
use crate::analyze::scoring::{GateCounts, ScoredEvent, Scorer};
use crate::analyze::summarizer::{digest_with, Digest, DisabledSummarizer, DynSummarizer};
use crate::analyze::weights::{load_or_default, DEFAULT_WEIGHTS_PATH};
use crate::config::RadarSettings;
use crate::dedup::{CleanReport, CleanerConfig};
use crate::error::PipelineError;
use crate::ingest::dispatch::Dispatcher;
use crate::ingest::fetch::{Fetch, HostThrottle, HttpFetcher};
use crate::ingest::parsers::ParserRegistry;
use crate::ingest::types::{RawEntry, SourceDescriptor, SourceFailure, SourceStats};
use crate::ingest::{self, OrchestratorConfig};
use crate::normalize::Normalizer;
use crate::relevance::RelevanceEngine;
use crate::source_weights::{SourceReputation, DEFAULT_SOURCE_REPUTATION_PATH};
use crate::window::filter_window;

/// Counts for one run; returned alongside every report.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Diagnostics {
    pub source_count: usize,
    pub items_raw: usize,
    pub items_after_cap: usize,
    pub garbage: usize,
    pub blocked_links: usize,
    pub duplicates: usize,
    pub outside_window: usize,
    pub relevance_gated: usize,
    pub strict_gated: usize,
    pub scored: usize,
    pub errors: Vec<SourceFailure>,
    pub per_source: BTreeMap<String, SourceStats>,
    pub by_source: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RadarReport {
    pub generated_at: DateTime<Utc>,
    pub window_hours: f64,
    pub k: usize,
    pub events: Vec<TopEvent>,
    pub digest: Digest,
    pub diagnostics: Diagnostics,
}

/// Result of the single-threaded stages over one collected batch.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub top: Vec<ScoredEvent>,
    pub clean: CleanReport,
    pub outside_window: usize,
    pub gates: GateCounts,
    pub scored: usize,
}

/// Rejects configuration-level problems before any network work.
pub fn validate_sources(sources: &[SourceDescriptor]) -> Result<(), PipelineError> {
    if sources.is_empty() {
        return Err(PipelineError::NoSources);
    }
    let mut names = HashSet::new();
    for s in sources {
        if s.name.trim().is_empty() {
            return Err(PipelineError::InvalidSource {
                name: s.url.clone(),
                reason: "missing name".into(),
            });
        }
        if s.url.trim().is_empty() {
            return Err(PipelineError::InvalidSource {
                name: s.name.clone(),
                reason: "missing url".into(),
            });
        }
        if !names.insert(s.name.as_str()) {
            return Err(PipelineError::DuplicateSource(s.name.clone()));
        }
    }
    Ok(())
}

pub struct Radar {
    dispatcher: Dispatcher,
    orchestrator: OrchestratorConfig,
    normalizer: Normalizer,
    cleaner: CleanerConfig,
    scorer: Scorer,
    summarizer: DynSummarizer,
    stable_tiebreak: bool,
}

impl Radar {
    /// Built-in tables everywhere; summarizer disabled.
    pub fn new(fetcher: Arc<dyn Fetch>) -> Self {
        Self {
            dispatcher: Dispatcher::new(fetcher, Arc::new(ParserRegistry::default())),
            orchestrator: OrchestratorConfig::default(),
            normalizer: Normalizer::default(),
            cleaner: CleanerConfig::default(),
            scorer: Scorer::default(),
            summarizer: Arc::new(DisabledSummarizer),
            stable_tiebreak: true,
        }
    }

    /// HTTP fetcher plus on-disk relevance, reputation and weight tables.
    pub fn from_settings(settings: &RadarSettings) -> anyhow::Result<Self> {
        let throttle = HostThrottle::new(settings.min_host_gap());
        let fetcher = HttpFetcher::new(&settings.user_agent, settings.fetch_timeout(), throttle)?;
        let relevance = RelevanceEngine::from_toml()?;
        let reputation = SourceReputation::load_from_file(DEFAULT_SOURCE_REPUTATION_PATH);
        let weights = load_or_default(Path::new(DEFAULT_WEIGHTS_PATH));
        let scorer = Scorer::new(
            FeatureExtractor::new(relevance, reputation, FeatureParams::default()),
            weights,
        );

        let mut radar = Self::new(Arc::new(fetcher)).with_scorer(scorer);
        radar.dispatcher = radar.dispatcher.with_listing_limit(settings.listing_limit);
        radar.orchestrator = settings.orchestrator();
        radar.stable_tiebreak = settings.stable_tiebreak;
        Ok(radar)
    }

    pub fn with_scorer(mut self, scorer: Scorer) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn with_orchestrator(mut self, cfg: OrchestratorConfig) -> Self {
        self.orchestrator = cfg;
        self
    }

    pub fn with_summarizer(mut self, summarizer: DynSummarizer) -> Self {
        self.summarizer = summarizer;
        self
    }

    pub fn with_cleaner(mut self, cleaner: CleanerConfig) -> Self {
        self.cleaner = cleaner;
        self
    }

    pub fn with_normalizer(mut self, normalizer: Normalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn with_stable_tiebreak(mut self, on: bool) -> Self {
        self.stable_tiebreak = on;
        self
    }

    /// Stages 5–9 over an already collected batch.
    pub fn process_batch(
        &self,
        raw: Vec<RawEntry>,
        now: DateTime<Utc>,
        window_hours: f64,
        k: usize,
    ) -> Result<BatchOutcome, PipelineError> {
        if k == 0 {
            return Err(PipelineError::InvalidTopK);
        }
        let records = raw.iter().map(|e| self.normalizer.normalize(e)).collect();
        let (records, clean) = self.cleaner.clean_and_dedup(records);
        let (mut records, outside_window) = filter_window(records, now, window_hours);
        if self.stable_tiebreak {
            sort_for_tiebreak(&mut records);
        }
        let (scored, gates) = self.scorer.score_batch(records, now);
        let scored_count = scored.len();
        let top = rank(scored, k)?;

        Ok(BatchOutcome {
            top,
            clean,
            outside_window,
            gates,
            scored: scored_count,
        })
    }

    pub async fn run(
        &self,
        sources: &[SourceDescriptor],
        window_hours: f64,
        k: usize,
    ) -> Result<RadarReport, PipelineError> {
        self.run_at(sources, window_hours, k, Utc::now()).await
    }

    /// Like [`Radar::run`] with an explicit clock.
    pub async fn run_at(
        &self,
        sources: &[SourceDescriptor],
        window_hours: f64,
        k: usize,
        now: DateTime<Utc>,
    ) -> Result<RadarReport, PipelineError> {
        validate_sources(sources)?;
        if k == 0 {
            return Err(PipelineError::InvalidTopK);
        }

        let ingest = ingest::run_once(&self.dispatcher, sources, &self.orchestrator).await;
        let items_after_cap = ingest.items.len();
        let outcome = self.process_batch(ingest.items, now, window_hours, k)?;

        let events: Vec<TopEvent> = outcome.top.iter().map(TopEvent::from).collect();
        let digest = digest_with(self.summarizer.as_ref(), &events).await;

        let diagnostics = Diagnostics {
            source_count: sources.len(),
            items_raw: ingest.total_items_raw,
            items_after_cap,
            garbage: outcome.clean.garbage,
            blocked_links: outcome.clean.blocked_links,
            duplicates: outcome.clean.duplicates,
            outside_window: outcome.outside_window,
            relevance_gated: outcome.gates.relevance_gated,
            strict_gated: outcome.gates.strict_gated,
            scored: outcome.scored,
            errors: ingest.errors,
            per_source: ingest.per_source,
            by_source: ingest.by_source,
        };

        gauge!("radar_pipeline_last_run_ts").set(now.timestamp() as f64);
        info!(
            target: "pipeline",
            sources = diagnostics.source_count,
            raw = diagnostics.items_raw,
            scored = diagnostics.scored,
            returned = events.len(),
            impact = ?digest.impact_level,
            "radar pass finished"
        );

        Ok(RadarReport {
            generated_at: now,
            window_hours,
            k,
            events,
            digest,
            diagnostics,
        })
    }
}
