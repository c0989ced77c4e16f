// src/ingest/parsers/article.rs
//! Single article page → one [`RawEntry`].
//!
//! Title: `<h1>`, then `<title>`, then `og:title`.
//! Published: `article:published_time` meta, `time[datetime]`, `pubdate` meta,
//! then any site-specific selectors.
//! Body: site container (outer HTML, so inner links survive), else up to 80
//! paragraphs joined by newlines.

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};

use super::ArticleStrategy;
use crate::error::ParseError;
use crate::ingest::types::RawEntry;
use crate::normalize::collapse_ws;

const MAX_PARAGRAPHS: usize = 80;

fn sel(s: &str) -> Selector {
    Selector::parse(s).expect("static selector")
}

static SEL_H1: Lazy<Selector> = Lazy::new(|| sel("h1"));
static SEL_TITLE: Lazy<Selector> = Lazy::new(|| sel("title"));
static SEL_OG_TITLE: Lazy<Selector> = Lazy::new(|| sel(r#"meta[property="og:title"]"#));
static SEL_PUB_META: Lazy<Selector> =
    Lazy::new(|| sel(r#"meta[property="article:published_time"]"#));
static SEL_TIME: Lazy<Selector> = Lazy::new(|| sel("time[datetime]"));
static SEL_PUBDATE: Lazy<Selector> = Lazy::new(|| sel(r#"meta[name="pubdate"]"#));
static SEL_GENERIC_BODY: Lazy<Vec<Selector>> = Lazy::new(|| vec![sel("article"), sel("main")]);
static SEL_P: Lazy<Selector> = Lazy::new(|| sel("p"));

fn text_of(el: ElementRef<'_>) -> String {
    collapse_ws(&el.text().collect::<String>())
}

fn first_text(doc: &Html, s: &Selector) -> Option<String> {
    doc.select(s).map(text_of).find(|t| !t.is_empty())
}

fn first_attr(doc: &Html, s: &Selector, attr: &str) -> Option<String> {
    doc.select(s)
        .filter_map(|e| e.value().attr(attr))
        .map(str::trim)
        .find(|v| !v.is_empty())
        .map(str::to_string)
}

/// Value of a date-carrying element: `content`, `datetime`, or its text.
fn date_value(doc: &Html, s: &Selector) -> Option<String> {
    doc.select(s).find_map(|e| {
        let v = e.value();
        v.attr("content")
            .or_else(|| v.attr("datetime"))
            .map(|a| a.trim().to_string())
            .or_else(|| Some(text_of(e)))
            .filter(|t| !t.is_empty())
    })
}

fn title(doc: &Html) -> Option<String> {
    first_text(doc, &SEL_H1)
        .or_else(|| first_text(doc, &SEL_TITLE))
        .or_else(|| first_attr(doc, &SEL_OG_TITLE, "content").map(|t| collapse_ws(&t)))
}

fn published(doc: &Html, extra: &[Selector]) -> Option<String> {
    first_attr(doc, &SEL_PUB_META, "content")
        .or_else(|| first_attr(doc, &SEL_TIME, "datetime"))
        .or_else(|| first_attr(doc, &SEL_PUBDATE, "content"))
        .or_else(|| extra.iter().find_map(|s| date_value(doc, s)))
}

/// Outer HTML of the first container with visible text.
fn container_html(doc: &Html, selectors: &[Selector]) -> Option<String> {
    selectors.iter().find_map(|s| {
        doc.select(s)
            .find(|e| !text_of(*e).is_empty())
            .map(|e| e.html())
    })
}

fn paragraphs_html(doc: &Html, s: &Selector) -> Option<String> {
    let parts: Vec<String> = doc
        .select(s)
        .filter(|e| !text_of(*e).is_empty())
        .take(MAX_PARAGRAPHS)
        .map(|e| e.html())
        .collect();
    (!parts.is_empty()).then(|| parts.join("\n"))
}

pub fn parse_article(
    source_name: &str,
    url: &str,
    html: &str,
    strategy: ArticleStrategy<'_>,
) -> Result<RawEntry, ParseError> {
    let doc = Html::parse_document(html);

    let (published, body) = match strategy {
        ArticleStrategy::Rules(rules) => (
            published(&doc, &rules.extra_published),
            container_html(&doc, &rules.body).or_else(|| paragraphs_html(&doc, &rules.paragraphs)),
        ),
        ArticleStrategy::Generic => (
            published(&doc, &[]),
            container_html(&doc, &SEL_GENERIC_BODY).or_else(|| paragraphs_html(&doc, &SEL_P)),
        ),
    };
    let title = title(&doc);

    if title.is_none() && body.is_none() {
        return Err(ParseError::EmptyDocument(url.to_string()));
    }

    Ok(RawEntry {
        source_name: source_name.to_string(),
        title,
        link: Some(url.to_string()),
        published,
        summary: body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::parsers::ParserRegistry;

    const TASS: &str = r#"<html><head>
<title>TASS page</title>
<meta property="article:published_time" content="2024-06-03T09:30:00+03:00">
</head><body>
<h1> Central bank keeps key rate </h1>
<time datetime="2024-06-03T08:00:00Z">today</time>
<div itemprop="articleBody"><p>The Bank of Russia kept the rate at 16%.</p>
<p>See <a href="https://cbr.ru/press">statement</a>.</p></div>
</body></html>"#;

    #[test]
    fn site_rules_extract_container_and_meta_time() {
        let reg = ParserRegistry::default();
        let e = parse_article("TASS", "https://tass.ru/ekonomika/1", TASS, reg.article_strategy("tass.ru"))
            .unwrap();
        assert_eq!(e.title.as_deref(), Some("Central bank keeps key rate"));
        assert_eq!(e.published.as_deref(), Some("2024-06-03T09:30:00+03:00"));
        let body = e.summary.unwrap();
        assert!(body.contains("kept the rate"));
        assert!(body.contains(r#"href="https://cbr.ru/press""#));
        assert_eq!(e.link.as_deref(), Some("https://tass.ru/ekonomika/1"));
    }

    #[test]
    fn site_specific_publish_selector_is_probed_last() {
        let html = r#"<html><body><h1>Ruble firms</h1>
<meta itemprop="datePublished" content="2024-06-02T10:00:00Z">
<div class="article__content"><p>The ruble strengthened.</p></div></body></html>"#;
        let reg = ParserRegistry::default();
        let e = parse_article("V", "https://www.vedomosti.ru/news/1", html, reg.article_strategy("www.vedomosti.ru"))
            .unwrap();
        assert_eq!(e.published.as_deref(), Some("2024-06-02T10:00:00Z"));
        assert!(e.summary.unwrap().contains("ruble strengthened"));
    }

    #[test]
    fn generic_falls_back_to_paragraphs_and_og_title() {
        let html = r#"<html><head><meta property="og:title" content="OG headline"></head>
<body><div><p>First paragraph.</p><p>   </p><p>Second paragraph.</p></div>
<time datetime="2024-06-01T12:00:00Z">June 1</time></body></html>"#;
        let e = parse_article("G", "https://example.test/a", html, ArticleStrategy::Generic).unwrap();
        assert_eq!(e.title.as_deref(), Some("OG headline"));
        assert_eq!(e.published.as_deref(), Some("2024-06-01T12:00:00Z"));
        assert_eq!(
            e.summary.as_deref(),
            Some("<p>First paragraph.</p>\n<p>Second paragraph.</p>")
        );
    }

    #[test]
    fn paragraph_fallback_is_capped() {
        let mut html = String::from("<html><body><h1>T</h1>");
        for i in 0..100 {
            html.push_str(&format!("<p>para {i}</p>"));
        }
        html.push_str("</body></html>");
        let e = parse_article("G", "https://example.test/b", &html, ArticleStrategy::Generic).unwrap();
        assert_eq!(e.summary.unwrap().matches("<p>").count(), MAX_PARAGRAPHS);
    }

    #[test]
    fn empty_page_is_an_error() {
        let err = parse_article("G", "https://example.test/c", "<html><body></body></html>", ArticleStrategy::Generic)
            .unwrap_err();
        assert!(matches!(err, ParseError::EmptyDocument(_)));
    }
}
