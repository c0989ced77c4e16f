// src/ingest/dispatch.rs
//! Source dispatcher: picks the fetch + parse strategy for one descriptor.

use std::sync::Arc;

use tracing::{debug, warn};
use url::Url;

use crate::error::{FetchError, SourceError};
use crate::ingest::fetch::{ContentClass, Fetch};
use crate::ingest::parsers::{article::parse_article, feed::parse_feed, listing, ParserRegistry};
use crate::ingest::types::{Harvest, RawEntry, SkippedItem, SourceDescriptor, SourceKind};

pub const DEFAULT_LISTING_LIMIT: usize = 20;

#[derive(Clone)]
pub struct Dispatcher {
    fetcher: Arc<dyn Fetch>,
    registry: Arc<ParserRegistry>,
    listing_limit: usize,
}

fn host_of(url: &str) -> Result<(Url, String), FetchError> {
    let invalid = || FetchError::InvalidUrl {
        url: url.to_string(),
    };
    let parsed = Url::parse(url).map_err(|_| invalid())?;
    let host = parsed.host_str().ok_or_else(invalid)?.to_ascii_lowercase();
    Ok((parsed, host))
}

impl Dispatcher {
    pub fn new(fetcher: Arc<dyn Fetch>, registry: Arc<ParserRegistry>) -> Self {
        Self {
            fetcher,
            registry,
            listing_limit: DEFAULT_LISTING_LIMIT,
        }
    }

    /// Default link budget for listing sources without their own `limit`.
    pub fn with_listing_limit(mut self, limit: usize) -> Self {
        self.listing_limit = limit;
        self
    }

    pub async fn handle(&self, src: &SourceDescriptor) -> Result<Harvest, SourceError> {
        match src.kind {
            SourceKind::Feed => Ok(Harvest {
                entries: self.handle_feed(src).await?,
                skipped: Vec::new(),
            }),
            SourceKind::HtmlArticle => Ok(Harvest {
                entries: vec![self.fetch_article(&src.name, &src.url, src.verify_tls).await?],
                skipped: Vec::new(),
            }),
            SourceKind::HtmlListing => self.handle_listing(src).await,
        }
    }

    /// One retry against `fallback_url` for 401/403/404/429.
    async fn handle_feed(&self, src: &SourceDescriptor) -> Result<Vec<RawEntry>, SourceError> {
        let body = match self
            .fetcher
            .fetch(&src.url, ContentClass::Feed, src.verify_tls)
            .await
        {
            Ok(b) => b,
            Err(e) if e.is_retryable_for_fallback() && src.fallback_url.is_some() => {
                let fallback = src.fallback_url.as_deref().unwrap_or_default();
                warn!(target: "ingest", source = %src.name, error = %e, %fallback, "feed failed, retrying fallback");
                self.fetcher
                    .fetch(fallback, ContentClass::Feed, src.verify_tls)
                    .await?
            }
            Err(e) => return Err(e.into()),
        };
        Ok(parse_feed(&src.name, &body)?)
    }

    async fn fetch_article(
        &self,
        source_name: &str,
        url: &str,
        verify_tls: bool,
    ) -> Result<RawEntry, SourceError> {
        let (_, host) = host_of(url)?;
        let html = self.fetcher.fetch(url, ContentClass::Html, verify_tls).await?;
        let entry = parse_article(
            source_name,
            url,
            &html,
            self.registry.article_strategy(&host),
        )?;
        Ok(entry)
    }

    /// Listing page failures fail the source; per-article failures are recorded and skipped.
    async fn handle_listing(&self, src: &SourceDescriptor) -> Result<Harvest, SourceError> {
        let (base, _) = host_of(&src.url)?;
        let html = self
            .fetcher
            .fetch(&src.url, ContentClass::Html, src.verify_tls)
            .await?;
        let limit = src.limit.unwrap_or(self.listing_limit);
        let links = listing::extract_listing_links(&self.registry, &base, &html, limit);
        debug!(target: "ingest", source = %src.name, links = links.len(), "listing links collected");

        let mut harvest = Harvest::default();
        for link in links {
            match self.fetch_article(&src.name, &link, src.verify_tls).await {
                Ok(entry) => harvest.entries.push(entry),
                Err(e) => {
                    debug!(target: "ingest", source = %src.name, url = %link, error = %e, "listing article skipped");
                    harvest.skipped.push(SkippedItem {
                        url: link,
                        error: e.to_string(),
                    });
                }
            }
        }
        Ok(harvest)
    }
}
