// src/analyze/mod.rs
//! Scoring side of the pipeline: features → hotness → top-K → caller view → digest.

pub mod explain;
pub mod features;
pub mod rank;
pub mod scoring;
pub mod summarizer;
pub mod weights;

// Re-export convenient types.
pub use crate::analyze::features::{FeatureExtractor, FeatureParams, FeatureVector};
pub use crate::analyze::scoring::{GateCounts, ScoredEvent, Scorer};
pub use crate::analyze::summarizer::{Digest, ImpactLevel, Summarizer};
pub use crate::analyze::weights::HotnessWeights;
