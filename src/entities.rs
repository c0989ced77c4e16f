//! Ticker-like entity extraction.
//!
//! Each pattern must expose the symbol as capture group 1. Symbols are
//! upper-cased and returned in first-seen order.

use regex::Regex;
use serde::Serialize;

use crate::ordered_set::OrderedSet;

/// `$XOM`, `NYSE: XOM`, `(XOM)` / `(SBER.ME)`.
pub const DEFAULT_TICKER_PATTERNS: &[&str] = &[
    r"\$([A-Za-z]{1,5})\b",
    r"\b(?:NYSE|NASDAQ|Nasdaq|AMEX|LSE|MOEX|TSX|HKEX)\s*:\s*([A-Z][A-Z0-9]{0,5}(?:\.[A-Z]{1,2})?)\b",
    r"\(([A-Z]{2,5}(?:\.[A-Z]{1,2})?)\)",
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Entities {
    pub tickers: Vec<String>,
}

impl Entities {
    pub fn distinct_count(&self) -> usize {
        self.tickers.len()
    }
}

#[derive(Debug, Clone)]
pub struct EntityExtractor {
    patterns: Vec<Regex>,
}

impl Default for EntityExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_TICKER_PATTERNS).expect("built-in ticker patterns")
    }
}

impl EntityExtractor {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> anyhow::Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| {
                let re = Regex::new(p.as_ref())
                    .map_err(|e| anyhow::anyhow!("ticker pattern `{}`: {}", p.as_ref(), e))?;
                if re.captures_len() < 2 {
                    anyhow::bail!("ticker pattern `{}` has no capture group", p.as_ref());
                }
                Ok(re)
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    pub fn extract(&self, text: &str) -> Entities {
        let mut tickers = OrderedSet::new();
        for re in &self.patterns {
            for caps in re.captures_iter(text) {
                if let Some(m) = caps.get(1) {
                    tickers.insert(m.as_str().to_ascii_uppercase());
                }
            }
        }
        Entities {
            tickers: tickers.into_vec(),
        }
    }

    pub fn has_ticker(&self, text: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(text))
    }
}
