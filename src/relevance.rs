// src/relevance.rs
//! Financial relevance gate: section keywords in the URL path, topical keywords
//! and ticker-like tokens in the body, and a penalty for blocked sections.
//!
//! The resulting score is both a hard gate (records below `threshold` are
//! excluded before scoring) and the `relevance` feature of the hotness score.
//! An optional strict gate additionally demands a ticker or a narrow keyword.

use regex::Regex;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

use crate::entities::{Entities, EntityExtractor, DEFAULT_TICKER_PATTERNS};
use crate::normalize::short_hash;

// --- env defaults & names ---
pub const DEFAULT_RELEVANCE_CONFIG_PATH: &str = "config/relevance.toml";
pub const DEFAULT_RELEVANCE_THRESHOLD: f64 = 0.30;

pub const ENV_RELEVANCE_CONFIG_PATH: &str = "RELEVANCE_CONFIG_PATH";
pub const ENV_RELEVANCE_THRESHOLD: &str = "RELEVANCE_THRESHOLD";

// parse optional float env and clamp to <0.0..=1.0>
fn parse_threshold_env(raw: Option<String>) -> Option<f64> {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .map(|v| v.clamp(0.0, 1.0))
}

/// Result of relevance evaluation
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Relevance {
    pub score: f64,
    pub matched: Vec<String>,
    pub reasons: Vec<String>,
    pub keyword_hit: bool,
    pub ticker_hit: bool,
}

/* ----------------------------
Config schema (from TOML)
---------------------------- */

fn strings(v: &[&str]) -> Vec<String> {
    v.iter().map(|s| s.to_string()).collect()
}

fn default_threshold() -> f64 {
    DEFAULT_RELEVANCE_THRESHOLD
}
fn default_allowed_sections() -> Vec<String> {
    strings(&[
        "business",
        "market",
        "finance",
        "economy",
        "economics",
        "money",
        "investing",
        "companies",
        "banks",
        "energy",
        "commodities",
        "stocks",
    ])
}
fn default_blocked_sections() -> Vec<String> {
    strings(&[
        "sport",
        "politics",
        "lifestyle",
        "culture",
        "entertainment",
        "travel",
        "style",
        "society",
        "incidents",
    ])
}
fn default_topical_keywords() -> Vec<String> {
    strings(&[
        "brent", "wti", "oil", "gas", "lng", "gold", "opec", "stocks", "shares", "equities",
        "bonds", "yield", "yields", "inflation", "interest rate", "rate hike", "rate cut",
        "central bank", "fed", "ecb", "earnings", "revenue", "profit", "dividend", "ipo",
        "gdp", "recession", "dollar", "euro", "ruble", "rouble", "yuan", "bitcoin",
        "s&p 500", "nasdaq", "dow jones", "index", "futures", "sanctions", "нефть", "нефти",
        "рубль", "рубля", "ставка", "ставку", "ставки", "акции", "облигации", "инфляция",
        "инфляции", "биржа", "дивиденды",
    ])
}
fn default_narrow_keywords() -> Vec<String> {
    strings(&[
        "brent", "wti", "opec", "ipo", "dividend", "earnings", "central bank", "key rate",
        "rate hike", "rate cut", "ключевая ставка", "ключевую ставку", "дивиденды",
    ])
}
fn default_ticker_patterns() -> Vec<String> {
    strings(DEFAULT_TICKER_PATTERNS)
}
fn default_section_score() -> f64 {
    0.40
}
fn default_keyword_score() -> f64 {
    0.35
}
fn default_ticker_score() -> f64 {
    0.35
}
fn default_blocked_penalty() -> f64 {
    0.25
}

#[derive(Debug, Clone, Deserialize)]
pub struct RelevanceSection {
    /// Base gate: records scoring below are excluded entirely.
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    /// Second gate requiring a ticker or a narrow keyword in the body.
    #[serde(default)]
    pub strict_gate: bool,
}

impl Default for RelevanceSection {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            strict_gate: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SectionsCfg {
    #[serde(default = "default_allowed_sections")]
    pub allowed: Vec<String>,
    #[serde(default = "default_blocked_sections")]
    pub blocked: Vec<String>,
}

impl Default for SectionsCfg {
    fn default() -> Self {
        Self {
            allowed: default_allowed_sections(),
            blocked: default_blocked_sections(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct KeywordsCfg {
    #[serde(default = "default_topical_keywords")]
    pub topical: Vec<String>,
    #[serde(default = "default_narrow_keywords")]
    pub narrow: Vec<String>,
}

impl Default for KeywordsCfg {
    fn default() -> Self {
        Self {
            topical: default_topical_keywords(),
            narrow: default_narrow_keywords(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EntitiesCfg {
    #[serde(default = "default_ticker_patterns")]
    pub ticker_patterns: Vec<String>,
}

impl Default for EntitiesCfg {
    fn default() -> Self {
        Self {
            ticker_patterns: default_ticker_patterns(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScoresCfg {
    #[serde(default = "default_section_score")]
    pub section: f64,
    #[serde(default = "default_keyword_score")]
    pub keyword: f64,
    #[serde(default = "default_ticker_score")]
    pub ticker: f64,
    /// Multiplier for blocked sections without any keyword/ticker evidence.
    #[serde(default = "default_blocked_penalty")]
    pub blocked_penalty: f64,
}

impl Default for ScoresCfg {
    fn default() -> Self {
        Self {
            section: default_section_score(),
            keyword: default_keyword_score(),
            ticker: default_ticker_score(),
            blocked_penalty: default_blocked_penalty(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RelevanceRoot {
    #[serde(default)]
    pub relevance: RelevanceSection,
    #[serde(default)]
    pub sections: SectionsCfg,
    #[serde(default)]
    pub keywords: KeywordsCfg,
    #[serde(default)]
    pub entities: EntitiesCfg,
    #[serde(default)]
    pub scores: ScoresCfg,
}

/* ----------------------------
Compiled engine
---------------------------- */

#[derive(Debug, Clone)]
pub struct RelevanceEngine {
    pub cfg: RelevanceRoot,
    topical: Option<Regex>,
    narrow: Option<Regex>,
    extractor: EntityExtractor,
}

impl Default for RelevanceEngine {
    fn default() -> Self {
        Self::from_root(RelevanceRoot::default()).expect("built-in relevance config")
    }
}

/// `(?i)\b(?:kw1|kw2)\b`, keywords taken literally.
fn keyword_regex(words: &[String]) -> anyhow::Result<Option<Regex>> {
    let alts: Vec<String> = words
        .iter()
        .map(|w| w.trim())
        .filter(|w| !w.is_empty())
        .map(regex::escape)
        .collect();
    if alts.is_empty() {
        return Ok(None);
    }
    let re = Regex::new(&format!(r"(?i)(?:^|\b|\W)(?:{})(?:\b|\W|$)", alts.join("|")))?;
    Ok(Some(re))
}

impl RelevanceEngine {
    /// Load from a TOML file. Uses RELEVANCE_CONFIG_PATH or defaults to "config/relevance.toml".
    /// A missing file yields the built-in configuration; a malformed one is an error.
    pub fn from_toml() -> anyhow::Result<Self> {
        let path = std::env::var(ENV_RELEVANCE_CONFIG_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_RELEVANCE_CONFIG_PATH));

        let mut eng = if path.exists() {
            let content = fs::read_to_string(&path).map_err(|e| {
                anyhow::anyhow!(
                    "Failed to read relevance config at {}: {}",
                    path.display(),
                    e
                )
            })?;
            Self::from_toml_str(&content)?
        } else {
            Self::default()
        };

        // optional: override threshold from env
        if let Some(t) = parse_threshold_env(std::env::var(ENV_RELEVANCE_THRESHOLD).ok()) {
            eng.cfg.relevance.threshold = t;
        } else if !eng.cfg.relevance.threshold.is_finite() {
            eng.cfg.relevance.threshold = DEFAULT_RELEVANCE_THRESHOLD;
        }

        Ok(eng)
    }

    /// Load from a TOML string
    pub fn from_toml_str(toml_str: &str) -> anyhow::Result<Self> {
        let cfg: RelevanceRoot = toml::from_str(toml_str)?;
        Self::from_root(cfg)
    }

    pub fn from_root(cfg: RelevanceRoot) -> anyhow::Result<Self> {
        let topical = keyword_regex(&cfg.keywords.topical)
            .map_err(|e| anyhow::anyhow!("topical keywords: {e}"))?;
        let narrow = keyword_regex(&cfg.keywords.narrow)
            .map_err(|e| anyhow::anyhow!("narrow keywords: {e}"))?;
        let extractor = EntityExtractor::new(&cfg.entities.ticker_patterns)?;
        Ok(Self {
            cfg,
            topical,
            narrow,
            extractor,
        })
    }

    pub fn threshold(&self) -> f64 {
        self.cfg.relevance.threshold
    }

    pub fn extract_entities(&self, body: &str) -> Entities {
        self.extractor.extract(body)
    }

    /// Score a record given its lower-cased URL path, body text and extracted entities.
    pub fn score(&self, url_path: &str, body: &str, entities: &Entities) -> Relevance {
        let mut rel = Relevance::default();
        let path = url_path.to_lowercase();
        let s = &self.cfg.scores;

        let allowed = self
            .cfg
            .sections
            .allowed
            .iter()
            .find(|k| !k.is_empty() && path.contains(k.as_str()));
        let blocked = self
            .cfg
            .sections
            .blocked
            .iter()
            .find(|k| !k.is_empty() && path.contains(k.as_str()));

        let mut acc = 0.0;
        if let Some(k) = allowed {
            acc += s.section;
            rel.matched.push(format!("section:{k}"));
        }

        if let Some(m) = self.topical.as_ref().and_then(|re| re.find(body)) {
            acc += s.keyword;
            rel.keyword_hit = true;
            rel.matched.push(format!(
                "keyword:{}",
                m.as_str()
                    .trim_matches(|c: char| !c.is_alphanumeric())
                    .to_lowercase()
            ));
        }

        if !entities.tickers.is_empty() || self.extractor.has_ticker(body) {
            acc += s.ticker;
            rel.ticker_hit = true;
            rel.matched.push("ticker".into());
        }

        if let Some(k) = blocked {
            if !rel.keyword_hit && !rel.ticker_hit {
                acc *= s.blocked_penalty;
                rel.reasons.push(format!("blocked_section:{k}"));
            }
        }

        rel.score = acc.clamp(0.0, 1.0);
        rel
    }

    /// Base gate: pass iff `score >= threshold`.
    pub fn passes_base_gate(&self, rel: &Relevance) -> bool {
        rel.score >= self.cfg.relevance.threshold
    }

    /// Strict gate (only when enabled): ticker hit or a narrow keyword in the body.
    pub fn passes_strict_gate(&self, rel: &Relevance, body: &str) -> bool {
        if !self.cfg.relevance.strict_gate {
            return true;
        }
        rel.ticker_hit || self.narrow.as_ref().is_some_and(|re| re.is_match(body))
    }

    /// Minimal, anonymized diagnostics for gate decisions. Never logs raw text.
    pub(crate) fn log_decision(&self, event: &str, body: &str, rel: &Relevance) {
        let id = short_hash(&[body]);
        debug!(
            target: "relevance",
            %id,
            score = rel.score,
            threshold = self.cfg.relevance.threshold,
            event,
            matched = ?rel.matched,
            reasons = ?rel.reasons
        );
    }
}

/* ----------------------------
Tests
---------------------------- */

#[cfg(test)]
mod tests {
    use super::*;

    fn eng() -> RelevanceEngine {
        RelevanceEngine::default()
    }

    fn score(path: &str, body: &str) -> Relevance {
        let e = eng();
        let ents = e.extract_entities(body);
        e.score(path, body, &ents)
    }

    #[test]
    fn section_keyword_and_ticker_accumulate_and_cap() {
        let r = score("/markets/oil/", "Brent rallies as Exxon (XOM) lifts output");
        assert!((r.score - 1.0).abs() < 1e-12);
        assert!(r.keyword_hit && r.ticker_hit);
        assert!(r.matched.iter().any(|m| m == "section:market"));
        assert!(r.matched.iter().any(|m| m == "keyword:brent"));
    }

    #[test]
    fn keyword_only_passes_base_gate() {
        let e = eng();
        let r = score("/world/", "Inflation slowed more than expected in March");
        assert!((r.score - 0.35).abs() < 1e-12);
        assert!(e.passes_base_gate(&r));
    }

    #[test]
    fn allowed_section_alone_passes() {
        let r = score("/business/", "A new store opened downtown this week");
        assert!((r.score - 0.40).abs() < 1e-12);
    }

    #[test]
    fn blocked_section_without_evidence_is_penalized() {
        let e = eng();
        let r = score("/sport/business-of-football/", "The club signed a new striker");
        // 0.40 (business) * 0.25
        assert!((r.score - 0.10).abs() < 1e-12);
        assert!(!e.passes_base_gate(&r));
        assert!(r.reasons.iter().any(|x| x.starts_with("blocked_section")));
    }

    #[test]
    fn blocked_section_with_keyword_is_not_penalized() {
        let r = score("/politics/", "Sanctions hit oil exports");
        assert!((r.score - 0.35).abs() < 1e-12);
    }

    #[test]
    fn keywords_respect_word_boundaries() {
        let r = score("/", "A fedora and an ipod were sold");
        assert!(!r.keyword_hit);
        assert_eq!(r.score, 0.0);
    }

    #[test]
    fn cyrillic_keywords_match() {
        let r = score("/", "Цены на нефть выросли после заседания");
        assert!(r.keyword_hit);
    }

    #[test]
    fn strict_gate_requires_ticker_or_narrow_keyword() {
        let toml = r#"
[relevance]
threshold = 0.30
strict_gate = true
"#;
        let e = RelevanceEngine::from_toml_str(toml).unwrap();
        let body = "Inflation slowed more than expected";
        let r = e.score("/", body, &e.extract_entities(body));
        assert!(e.passes_base_gate(&r));
        assert!(!e.passes_strict_gate(&r, body));

        let body2 = "OPEC agreed to cut output";
        let r2 = e.score("/", body2, &e.extract_entities(body2));
        assert!(e.passes_strict_gate(&r2, body2));
    }

    #[test]
    fn threshold_env_is_clamped() {
        assert_eq!(parse_threshold_env(Some("1.7".into())), Some(1.0));
        assert_eq!(parse_threshold_env(Some(" 0.4 ".into())), Some(0.4));
        assert_eq!(parse_threshold_env(Some("abc".into())), None);
        assert_eq!(parse_threshold_env(None), None);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let e = RelevanceEngine::from_toml_str("[relevance]\nthreshold = 0.5\n").unwrap();
        assert!((e.threshold() - 0.5).abs() < 1e-12);
        assert!(!e.cfg.keywords.topical.is_empty());
    }
}
