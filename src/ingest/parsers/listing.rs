// src/ingest/parsers/listing.rs
//! Listing page → bounded, de-duplicated list of absolute article URLs.

use scraper::{Html, Selector};
use url::Url;

use super::ParserRegistry;
use crate::ordered_set::OrderedSet;

const SKIPPED_SCHEMES: &[&str] = &["mailto:", "tel:", "javascript:"];

/// Anchors matched by `selectors`, resolved against `base`, in document order
/// per selector; stops at `limit` unique links.
pub fn collect_links(doc: &Html, base: &Url, selectors: &[Selector], limit: usize) -> Vec<String> {
    let mut links = OrderedSet::new();
    'outer: for s in selectors {
        for a in doc.select(s) {
            if links.len() >= limit {
                break 'outer;
            }
            let Some(href) = a.value().attr("href").map(str::trim) else {
                continue;
            };
            let lower = href.to_ascii_lowercase();
            if href.is_empty()
                || href.starts_with('#')
                || SKIPPED_SCHEMES.iter().any(|p| lower.starts_with(p))
            {
                continue;
            }
            let Ok(abs) = base.join(href) else {
                continue;
            };
            if matches!(abs.scheme(), "http" | "https") {
                links.insert(abs.to_string());
            }
        }
    }
    links.into_vec()
}

/// Site selectors first; the generic list when the site has none or they match nothing.
pub fn extract_listing_links(
    registry: &ParserRegistry,
    base: &Url,
    html: &str,
    limit: usize,
) -> Vec<String> {
    if limit == 0 {
        return Vec::new();
    }
    let doc = Html::parse_document(html);
    let host = base.host_str().unwrap_or_default();
    if let Some(site) = registry.listing_selectors(host) {
        let links = collect_links(&doc, base, site, limit);
        if !links.is_empty() {
            return links;
        }
    }
    collect_links(&doc, base, registry.generic_listing_selectors(), limit)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r##"<html><body>
<article><a href="/news/1">one</a></article>
<article><a href="https://tass.ru/news/2">two</a></article>
<article><a href="/news/1">dup</a></article>
<h2><a href="mailto:desk@tass.ru">mail</a></h2>
<h2><a href="tel:+7000">call</a></h2>
<h2><a href="#top">top</a></h2>
<div class="item"><a href="other/3">three</a></div>
<a class="card__link" href="/economy/4">four</a>
</body></html>"##;

    #[test]
    fn site_selectors_resolve_relative_urls() {
        let reg = ParserRegistry::default();
        let base = Url::parse("https://tass.ru/economy/").unwrap();
        let links = extract_listing_links(&reg, &base, PAGE, 20);
        assert_eq!(
            links,
            vec![
                "https://tass.ru/news/1",
                "https://tass.ru/news/2",
                "https://tass.ru/economy/4",
            ]
        );
    }

    #[test]
    fn generic_selectors_skip_non_http_and_respect_limit() {
        let reg = ParserRegistry::default();
        let base = Url::parse("https://example.test/section/").unwrap();
        let all = extract_listing_links(&reg, &base, PAGE, 20);
        assert_eq!(
            all,
            vec![
                "https://example.test/news/1",
                "https://tass.ru/news/2",
                "https://example.test/section/other/3",
            ]
        );
        assert_eq!(extract_listing_links(&reg, &base, PAGE, 2).len(), 2);
        assert!(extract_listing_links(&reg, &base, PAGE, 0).is_empty());
    }
}
