//! Hotness weight table, optionally loaded from config/weights.json.
//!
//! JSON shape:
//! {
//!   "relevance": 0.45,
//!   "recency": 0.20,
//!   "velocity": 0.15,
//!   "confirmations": 0.08,
//!   "source_rep": 0.07,
//!   "entity_breadth": 0.05
//! }
//!
//! A table with negative weights, or whose weights do not sum to 1.0, is rejected.

use serde::{Deserialize, Serialize};
use std::{fs, io, path::Path};
use tracing::warn;

pub const DEFAULT_WEIGHTS_PATH: &str = "config/weights.json";
const SUM_TOLERANCE: f64 = 1e-6;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HotnessWeights {
    pub relevance: f64,
    pub recency: f64,
    pub velocity: f64,
    pub confirmations: f64,
    pub source_rep: f64,
    pub entity_breadth: f64,
}

impl Default for HotnessWeights {
    fn default() -> Self {
        Self {
            relevance: 0.45,
            recency: 0.20,
            velocity: 0.15,
            confirmations: 0.08,
            source_rep: 0.07,
            entity_breadth: 0.05,
        }
    }
}

impl HotnessWeights {
    fn as_array(&self) -> [f64; 6] {
        [
            self.relevance,
            self.recency,
            self.velocity,
            self.confirmations,
            self.source_rep,
            self.entity_breadth,
        ]
    }

    pub fn sum(&self) -> f64 {
        self.as_array().iter().sum()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.as_array().iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err("weights must be finite and non-negative".into());
        }
        let sum = self.sum();
        if (sum - 1.0).abs() > SUM_TOLERANCE {
            return Err(format!("weights must sum to 1.0, got {sum}"));
        }
        Ok(())
    }
}

/// Load and validate weights (no caching). Public for tests/tools.
pub fn load_weights_file(path: &Path) -> io::Result<HotnessWeights> {
    let bytes = fs::read(path)?;
    let w: HotnessWeights = serde_json::from_slice(&bytes)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    w.validate()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    Ok(w)
}

/// Weights from `path` if present and valid; built-in defaults otherwise.
pub fn load_or_default(path: &Path) -> HotnessWeights {
    match load_weights_file(path) {
        Ok(w) => w,
        Err(e) if e.kind() == io::ErrorKind::NotFound => HotnessWeights::default(),
        Err(e) => {
            warn!(target: "scoring", path = %path.display(), error = %e, "rejected weights file, using defaults");
            HotnessWeights::default()
        }
    }
}
