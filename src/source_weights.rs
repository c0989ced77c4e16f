//! # Source Reputation
//!
//! Maps publisher domains (e.g. "reuters.com", "tass.ru") to a prior
//! reputation in `[0.0, 1.0]`.
//!
//! - Loads from JSON config (domains + aliases + match policy).
//! - Fallback order: aliases → exact match → policy match → default.
//! - Government domains (`.gov`, `.gov.xx`) are floored at 0.9.
//! - Path adjustment: finance sections get a bonus, blocked sections a penalty.
//!
//! The default `substring` policy matches `ft.com` inside `microsoft.com`;
//! `domain_suffix` only matches on label boundaries.

use serde::Deserialize;
use std::{collections::BTreeMap, fs, path::Path};
use tracing::warn;

use crate::relevance::SectionsCfg;

pub const DEFAULT_SOURCE_REPUTATION_PATH: &str = "config/source_reputation.json";

const GOV_FLOOR: f64 = 0.9;
const ALLOWED_SECTION_BONUS: f64 = 0.10;
const BLOCKED_SECTION_FACTOR: f64 = 0.5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPolicy {
    #[default]
    Substring,
    DomainSuffix,
}

/// Reputation table, loaded from JSON or defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceReputation {
    /// Default reputation if no match is found.
    #[serde(default = "default_default_weight")]
    pub default_weight: f64,
    #[serde(default)]
    pub policy: MatchPolicy,
    /// Domain → reputation.
    #[serde(default)]
    pub domains: BTreeMap<String, f64>,
    /// Source names / alternative hosts → canonical domain.
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
}

fn default_default_weight() -> f64 {
    0.40
}

impl Default for SourceReputation {
    fn default() -> Self {
        Self::default_seed()
    }
}

impl SourceReputation {
    /// Load configuration from a JSON file.
    /// Falls back to `default_seed()` on error.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(s) => serde_json::from_str(&s).unwrap_or_else(|e| {
                warn!(target: "scoring", path = %path.display(), error = %e, "bad reputation table, using built-in");
                Self::default_seed()
            }),
            Err(_) => Self::default_seed(),
        }
    }

    /// Prior reputation of a domain (or bare source name).
    pub fn base_for(&self, domain: &str) -> f64 {
        let d = normalize_domain(domain);
        if d.is_empty() {
            return clamp01(self.default_weight);
        }

        // 1) Alias resolution.
        if let Some(canon) = self.aliases.get(&d) {
            if let Some(&w) = self.domains.get(&normalize_domain(canon)) {
                return self.with_gov_floor(&d, w);
            }
        }

        // 2) Exact match.
        if let Some(&w) = self.domains.get(&d) {
            return self.with_gov_floor(&d, w);
        }

        // 3) Policy match; longest key wins so results do not depend on table order.
        let hit = self
            .domains
            .iter()
            .filter(|(k, _)| match self.policy {
                MatchPolicy::Substring => d.contains(k.as_str()),
                MatchPolicy::DomainSuffix => d.ends_with(&format!(".{k}")),
            })
            .max_by_key(|(k, _)| k.len());
        if let Some((_, &w)) = hit {
            return self.with_gov_floor(&d, w);
        }

        // 4) Default.
        self.with_gov_floor(&d, self.default_weight)
    }

    /// Reputation with section adjustment from the URL path.
    pub fn score_for(&self, domain: &str, url_path: &str, sections: &SectionsCfg) -> f64 {
        let mut rep = self.base_for(domain);
        let path = url_path.to_lowercase();
        let has = |list: &[String]| list.iter().any(|k| !k.is_empty() && path.contains(k.as_str()));
        let allowed = has(&sections.allowed);
        if allowed {
            rep = (rep + ALLOWED_SECTION_BONUS).min(1.0);
        } else if has(&sections.blocked) {
            rep *= BLOCKED_SECTION_FACTOR;
        }
        clamp01(rep)
    }

    fn with_gov_floor(&self, domain: &str, w: f64) -> f64 {
        let w = clamp01(w);
        if is_gov(domain) {
            w.max(GOV_FLOOR)
        } else {
            w
        }
    }

    /// Built-in seed with common wire services and regional publishers.
    pub(crate) fn default_seed() -> Self {
        let mut domains = BTreeMap::new();
        let mut aliases = BTreeMap::new();

        for (k, v) in [
            ("reuters.com", 0.96),
            ("bloomberg.com", 0.95),
            ("ft.com", 0.93),
            ("wsj.com", 0.92),
            ("apnews.com", 0.90),
            ("cnbc.com", 0.85),
            ("marketwatch.com", 0.80),
            ("federalreserve.gov", 0.97),
            ("ecb.europa.eu", 0.95),
            ("cbr.ru", 0.92),
            ("interfax.ru", 0.75),
            ("kommersant.ru", 0.72),
            ("vedomosti.ru", 0.72),
            ("rbc.ru", 0.70),
            ("tass.ru", 0.60),
            ("ria.ru", 0.55),
        ] {
            domains.insert(k.to_string(), v);
        }

        for (a, c) in [
            ("reuters", "reuters.com"),
            ("bloomberg", "bloomberg.com"),
            ("financial times", "ft.com"),
            ("wall street journal", "wsj.com"),
            ("associated press", "apnews.com"),
            ("bank of russia", "cbr.ru"),
            ("tass", "tass.ru"),
            ("ria novosti", "ria.ru"),
            ("rbc", "rbc.ru"),
            ("kommersant", "kommersant.ru"),
            ("vedomosti", "vedomosti.ru"),
            ("interfax", "interfax.ru"),
        ] {
            aliases.insert(a.to_string(), c.to_string());
        }

        Self {
            default_weight: default_default_weight(),
            policy: MatchPolicy::Substring,
            domains,
            aliases,
        }
    }
}

fn is_gov(domain: &str) -> bool {
    domain.ends_with(".gov") || domain.contains(".gov.")
}

/// Lowercase, strip scheme/`www.`/port/path if a URL slipped in, trim dots.
fn normalize_domain(s: &str) -> String {
    let mut out = s.trim().to_lowercase();
    if let Some(idx) = out.find("://") {
        out = out[idx + 3..].to_string();
    }
    if let Some(idx) = out.find('/') {
        out.truncate(idx);
    }
    if let Some(idx) = out.find(':') {
        out.truncate(idx);
    }
    let out = out.trim_matches('.');
    out.strip_prefix("www.").unwrap_or(out).to_string()
}

/// Clamp to [0.0, 1.0].
fn clamp01(x: f64) -> f64 {
    if x.is_nan() {
        0.0
    } else {
        x.clamp(0.0, 1.0)
    }
}
