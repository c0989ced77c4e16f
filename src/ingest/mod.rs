// src/ingest/mod.rs
//! Concurrent fetch orchestrator.
//!
//! One task per source on a bounded worker pool; every task is spawned so a
//! panicking parser is contained, and wrapped in a per-task time budget. A
//! failed source becomes a [`SourceFailure`] and never fails the round.

pub mod config;
pub mod dispatch;
pub mod fetch;
pub mod parsers;
pub mod types;

use std::time::Duration;

use futures::stream::{self, StreamExt};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, histogram};
use once_cell::sync::OnceCell;
use tracing::{info, warn};

use crate::error::SourceError;
use crate::ingest::dispatch::Dispatcher;
use crate::ingest::types::{Harvest, IngestReport, SourceDescriptor, SourceFailure, SourceStats};

pub const DEFAULT_WORKERS: usize = 8;
pub const DEFAULT_PER_SOURCE_CAP: usize = 50;
pub const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(120);

/// One-time metrics registration.
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("radar_source_errors_total", "Sources that failed in a round.");
        describe_counter!("radar_items_raw_total", "Raw entries produced by all sources.");
        describe_counter!(
            "radar_items_dropped_total",
            "Records dropped, labelled by pipeline stage."
        );
        describe_counter!(
            "radar_relevance_gated_total",
            "Records excluded by the relevance gates."
        );
        describe_histogram!(
            "radar_items_per_source",
            "Items retained per source after the per-source cap."
        );
        describe_histogram!("radar_source_fetch_ms", "HTTP fetch time in milliseconds.");
        describe_histogram!("radar_feed_parse_ms", "Feed parse time in milliseconds.");
        describe_gauge!(
            "radar_pipeline_last_run_ts",
            "Unix ts when the pipeline last ran."
        );
    });
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrchestratorConfig {
    pub workers: usize,
    pub per_source_cap: usize,
    pub task_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            per_source_cap: DEFAULT_PER_SOURCE_CAP,
            task_timeout: DEFAULT_TASK_TIMEOUT,
        }
    }
}

async fn run_source(d: Dispatcher, src: SourceDescriptor, budget: Duration) -> Result<Harvest, SourceError> {
    let handle = tokio::spawn(async move { tokio::time::timeout(budget, d.handle(&src)).await });
    match handle.await {
        Ok(Ok(res)) => res,
        Ok(Err(_elapsed)) => Err(SourceError::Timeout { budget }),
        Err(join) => Err(SourceError::Panicked(join.to_string())),
    }
}

/// Fetch + parse all sources concurrently. Items keep per-source order;
/// sources interleave in completion order.
pub async fn run_once(
    dispatcher: &Dispatcher,
    sources: &[SourceDescriptor],
    cfg: &OrchestratorConfig,
) -> IngestReport {
    ensure_metrics_described();
    let budget = cfg.task_timeout;

    let results: Vec<(SourceDescriptor, Result<Harvest, SourceError>)> =
        stream::iter(sources.iter().cloned())
            .map(|src| {
                let d = dispatcher.clone();
                async move {
                    let res = run_source(d, src.clone(), budget).await;
                    (src, res)
                }
            })
            .buffer_unordered(cfg.workers.max(1))
            .collect()
            .await;

    let mut report = IngestReport::default();
    let mut capped_out = 0usize;

    for (src, res) in results {
        let stats = report
            .per_source
            .entry(src.name.clone())
            .or_insert_with(|| SourceStats {
                kind: src.kind,
                url: src.url.clone(),
                ok: 0,
                skipped: 0,
                errors: Vec::new(),
            });

        match res {
            Ok(harvest) => {
                let produced = harvest.entries.len();
                report.total_items_raw += produced;

                let kept: Vec<_> = harvest.entries.into_iter().take(cfg.per_source_cap).collect();
                capped_out += produced - kept.len();

                stats.ok = kept.len();
                stats.skipped = harvest.skipped.len();
                stats
                    .errors
                    .extend(harvest.skipped.iter().map(|s| format!("{}: {}", s.url, s.error)));

                histogram!("radar_items_per_source", "source" => src.name.clone())
                    .record(kept.len() as f64);
                report.by_source.insert(src.name.clone(), kept.len());
                report.items.extend(kept);
            }
            Err(e) => {
                warn!(target: "ingest", source = %src.name, kind = %src.kind, url = %src.url, error = %e, "source failed");
                counter!("radar_source_errors_total").increment(1);
                stats.errors.push(e.to_string());
                report.by_source.insert(src.name.clone(), 0);
                report.errors.push(SourceFailure {
                    source: src.name.clone(),
                    kind: src.kind,
                    url: src.url.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    counter!("radar_items_raw_total").increment(report.total_items_raw as u64);
    counter!("radar_items_dropped_total", "stage" => "source_cap").increment(capped_out as u64);
    info!(
        target: "ingest",
        sources = sources.len(),
        failed = report.errors.len(),
        raw = report.total_items_raw,
        kept = report.items.len(),
        "ingest round finished"
    );

    report
}
