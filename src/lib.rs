// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod config;
pub mod dedup;
pub mod entities;
pub mod error;
pub mod ingest;
pub mod normalize;
pub mod ordered_set;
pub mod pipeline;
pub mod relevance;
pub mod source_weights;
pub mod timestamp;
pub mod window;

// Feature extraction, hotness scoring, ranking, explanations, digest
pub mod analyze;

// ---- Re-exports for stable public API ----
pub use crate::analyze::explain::TopEvent;
pub use crate::analyze::scoring::{hotness, ScoredEvent};
pub use crate::config::RadarSettings;
pub use crate::error::{FetchError, ParseError, PipelineError, SourceError};
pub use crate::ingest::types::{RawEntry, SourceDescriptor, SourceKind};
pub use crate::normalize::{normalize, NormalizedRecord};
pub use crate::pipeline::{Radar, RadarReport};
