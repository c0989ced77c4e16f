//! Time-window filter: the last word on staleness.
//!
//! A record survives iff it carries a timestamp and `now - published_at <= window`.
//! Records without a timestamp are always dropped here.

use chrono::{DateTime, Utc};
use metrics::counter;

use crate::normalize::NormalizedRecord;

/// Returns `(kept, dropped_count)`. Comparison is done in milliseconds.
pub fn filter_window(
    records: Vec<NormalizedRecord>,
    now: DateTime<Utc>,
    window_hours: f64,
) -> (Vec<NormalizedRecord>, usize) {
    let window_ms = window_hours * 3_600_000.0;
    let before = records.len();
    let kept: Vec<NormalizedRecord> = records
        .into_iter()
        .filter(|r| match r.published_at {
            Some(ts) => (now - ts).num_milliseconds() as f64 <= window_ms,
            None => false,
        })
        .collect();
    let dropped = before - kept.len();
    counter!("radar_items_dropped_total", "stage" => "window").increment(dropped as u64);
    (kept, dropped)
}
