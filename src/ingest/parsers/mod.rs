// src/ingest/parsers/mod.rs
//! Format parsers and the per-domain strategy registry.
//!
//! Adding a site is a registry entry: article rules (body containers,
//! paragraph selector, extra publish-time selectors) and/or listing anchor
//! selectors. Hosts resolve by exact match, then by domain suffix; anything
//! unmatched uses the generic strategy.

pub mod article;
pub mod feed;
pub mod listing;

use std::collections::BTreeMap;

use scraper::Selector;

use crate::error::ParseError;

pub const GENERIC_LISTING_SELECTORS: &[&str] =
    &["article a[href]", "h2 a[href]", ".news a[href]", ".item a[href]"];

pub(crate) fn compile(selectors: &[&str]) -> Result<Vec<Selector>, ParseError> {
    selectors
        .iter()
        .map(|s| Selector::parse(s).map_err(|_| ParseError::Selector(s.to_string())))
        .collect()
}

#[derive(Debug, Clone)]
pub struct SiteRules {
    /// Body containers, first non-empty match wins.
    pub body: Vec<Selector>,
    /// Paragraphs concatenated when no container matches.
    pub paragraphs: Selector,
    /// Probed after the standard publish-time metas.
    pub extra_published: Vec<Selector>,
}

impl SiteRules {
    pub fn new(body: &[&str], paragraphs: &str, extra_published: &[&str]) -> Result<Self, ParseError> {
        Ok(Self {
            body: compile(body)?,
            paragraphs: Selector::parse(paragraphs)
                .map_err(|_| ParseError::Selector(paragraphs.to_string()))?,
            extra_published: compile(extra_published)?,
        })
    }
}

/// How to extract one article page.
#[derive(Debug, Clone, Copy)]
pub enum ArticleStrategy<'a> {
    Rules(&'a SiteRules),
    Generic,
}

#[derive(Debug, Clone)]
pub struct ParserRegistry {
    articles: BTreeMap<String, SiteRules>,
    listings: BTreeMap<String, Vec<Selector>>,
    generic_listing: Vec<Selector>,
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::with_builtins().expect("built-in parser rules")
    }
}

impl ParserRegistry {
    /// Generic strategies only.
    pub fn empty() -> Result<Self, ParseError> {
        Ok(Self {
            articles: BTreeMap::new(),
            listings: BTreeMap::new(),
            generic_listing: compile(GENERIC_LISTING_SELECTORS)?,
        })
    }

    pub fn with_builtins() -> Result<Self, ParseError> {
        let mut r = Self::empty()?;

        r.register_article(
            "tass.ru",
            SiteRules::new(
                &[r#"div[itemprop="articleBody"]"#, "article .text-content", "article"],
                "article p, .text-content p",
                &[],
            )?,
        );
        r.register_article(
            "vedomosti.ru",
            SiteRules::new(
                &[".article__content", ".article-content", "article"],
                "article p, .article__content p, .article-content p",
                &[r#"meta[itemprop="datePublished"]"#],
            )?,
        );

        r.register_listing("rbc.ru", &["a.news-feed__item", "a.js-news-feed-item"])?;
        r.register_listing(
            "kommersant.ru",
            &[
                "article a[href*='/doc/']",
                "h2 a[href*='/doc/']",
                ".news-item a[href*='/doc/']",
            ],
        )?;
        r.register_listing("tass.ru", &["article a[href*='/news/']", "a.card__link"])?;
        r.register_listing(
            "vedomosti.ru",
            &["article a[href*='/news/']", "h2 a[href*='/news/']"],
        )?;
        Ok(r)
    }

    pub fn register_article(&mut self, domain: &str, rules: SiteRules) {
        self.articles.insert(domain.to_ascii_lowercase(), rules);
    }

    pub fn register_listing(&mut self, domain: &str, selectors: &[&str]) -> Result<(), ParseError> {
        self.listings
            .insert(domain.to_ascii_lowercase(), compile(selectors)?);
        Ok(())
    }

    pub fn article_strategy(&self, host: &str) -> ArticleStrategy<'_> {
        match lookup(&self.articles, host) {
            Some(rules) => ArticleStrategy::Rules(rules),
            None => ArticleStrategy::Generic,
        }
    }

    /// Site selectors, if the host has any registered.
    pub fn listing_selectors(&self, host: &str) -> Option<&[Selector]> {
        lookup(&self.listings, host).map(Vec::as_slice)
    }

    pub fn generic_listing_selectors(&self) -> &[Selector] {
        &self.generic_listing
    }
}

/// Exact host, then the longest registered domain the host ends with on a label boundary.
fn lookup<'a, T>(map: &'a BTreeMap<String, T>, host: &str) -> Option<&'a T> {
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    if let Some(v) = map.get(&host) {
        return Some(v);
    }
    map.iter()
        .filter(|(k, _)| host.ends_with(&format!(".{k}")))
        .max_by_key(|(k, _)| k.len())
        .map(|(_, v)| v)
}
