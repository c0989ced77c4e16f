// tests/ingest_e2e.rs
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use news_radar::error::FetchError;
use news_radar::ingest::dispatch::Dispatcher;
use news_radar::ingest::fetch::{ContentClass, Fetch, MemoryFetcher};
use news_radar::ingest::parsers::ParserRegistry;
use news_radar::ingest::{run_once, OrchestratorConfig};
use news_radar::{SourceDescriptor, SourceKind};

const REUTERS: &str = include_str!("fixtures/reuters_markets.xml");
const INTERFAX: &str = include_str!("fixtures/interfax_business.atom");
const RDF: &str = include_str!("fixtures/wire_rdf.xml");
const LISTING: &str = include_str!("fixtures/economy_listing.html");
const ARTICLE_RATES: &str = include_str!("fixtures/article_rates.html");
const ARTICLE_BONDS: &str = include_str!("fixtures/article_bonds.html");

fn dispatcher(fetcher: Arc<dyn Fetch>) -> Dispatcher {
    Dispatcher::new(fetcher, Arc::new(ParserRegistry::default()))
}

fn feed(name: &str, url: &str) -> SourceDescriptor {
    SourceDescriptor::new(name, SourceKind::Feed, url)
}

#[tokio::test]
async fn one_failing_source_does_not_fail_the_batch() {
    let f = MemoryFetcher::new()
        .with_page("https://feeds.test/reuters.xml", REUTERS)
        .with_page("https://feeds.test/wire.rdf", RDF)
        .with_error(
            "https://down.test/rss",
            FetchError::Transport {
                url: "https://down.test/rss".into(),
                message: "connection reset".into(),
            },
        );
    let d = dispatcher(Arc::new(f));
    let sources = vec![
        feed("Reuters", "https://feeds.test/reuters.xml"),
        feed("Down", "https://down.test/rss"),
        feed("Wire", "https://feeds.test/wire.rdf"),
    ];

    let report = run_once(&d, &sources, &OrchestratorConfig::default()).await;

    assert_eq!(report.items.len(), 4);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].source, "Down");
    assert_eq!(report.errors[0].kind, SourceKind::Feed);
    assert!(report.errors[0].error.contains("connection reset"));
    assert_eq!(report.per_source["Reuters"].ok, 3);
    assert_eq!(report.per_source["Wire"].ok, 1);
    assert_eq!(report.per_source["Down"].errors.len(), 1);

    // per-source order survives the merge
    let reuters: Vec<_> = report
        .items
        .iter()
        .filter(|e| e.source_name == "Reuters")
        .filter_map(|e| e.title.clone())
        .collect();
    assert_eq!(
        reuters,
        vec![
            "Brent climbs as OPEC trims supply",
            "Oil prices steady ahead of producer meeting",
            "Local club wins the cup final",
        ]
    );
}

#[tokio::test]
async fn not_found_without_fallback_yields_one_error_and_no_items() {
    let f = Arc::new(MemoryFetcher::new().with_page("https://feeds.test/interfax.atom", INTERFAX));
    let d = dispatcher(f.clone());
    let sources = vec![
        feed("Gone", "https://gone.test/rss"),
        feed("Interfax", "https://feeds.test/interfax.atom"),
    ];

    let report = run_once(&d, &sources, &OrchestratorConfig::default()).await;

    assert_eq!(report.by_source["Gone"], 0);
    assert_eq!(report.by_source["Interfax"], 1);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].error.contains("HTTP 404"));
    assert_eq!(
        f.calls().iter().filter(|u| u.contains("gone.test")).count(),
        1
    );
}

#[tokio::test]
async fn forbidden_feed_retries_its_fallback_once() {
    let f = Arc::new(
        MemoryFetcher::new()
            .with_status("https://primary.test/rss", 403)
            .with_page("https://mirror.test/rss", REUTERS),
    );
    let d = dispatcher(f.clone());
    let src = feed("Reuters", "https://primary.test/rss").with_fallback("https://mirror.test/rss");

    let report = run_once(&d, &[src], &OrchestratorConfig::default()).await;

    assert!(report.errors.is_empty());
    assert_eq!(report.items.len(), 3);
    assert_eq!(
        f.calls(),
        vec!["https://primary.test/rss", "https://mirror.test/rss"]
    );
}

#[tokio::test]
async fn server_error_is_not_retried_against_fallback() {
    let f = Arc::new(
        MemoryFetcher::new()
            .with_status("https://primary.test/rss", 503)
            .with_page("https://mirror.test/rss", REUTERS),
    );
    let d = dispatcher(f.clone());
    let src = feed("Reuters", "https://primary.test/rss").with_fallback("https://mirror.test/rss");

    let report = run_once(&d, &[src], &OrchestratorConfig::default()).await;

    assert_eq!(report.errors.len(), 1);
    assert!(report.items.is_empty());
    assert_eq!(f.calls(), vec!["https://primary.test/rss"]);
}

#[tokio::test]
async fn listing_follows_links_and_records_skipped_articles() {
    let f = Arc::new(
        MemoryFetcher::new()
            .with_page("https://news.test/economy/", LISTING)
            .with_page("https://news.test/economy/rates-decision", ARTICLE_RATES)
            .with_page("https://news.test/economy/ruble-bonds", ARTICLE_BONDS),
    );
    let d = dispatcher(f.clone());
    let src = SourceDescriptor::new("News", SourceKind::HtmlListing, "https://news.test/economy/");

    let report = run_once(&d, &[src], &OrchestratorConfig::default()).await;

    assert!(report.errors.is_empty());
    assert_eq!(report.items.len(), 2);
    let rates = &report.items[0];
    assert_eq!(rates.title.as_deref(), Some("Bank of Russia holds key rate at 16%"));
    assert_eq!(rates.published.as_deref(), Some("2024-06-03T10:00:00+03:00"));
    assert_eq!(
        rates.link.as_deref(),
        Some("https://news.test/economy/rates-decision")
    );
    assert!(rates
        .summary
        .as_deref()
        .unwrap_or_default()
        .contains("https://cbr.ru/press/keypr/"));
    assert_eq!(report.items[1].published.as_deref(), Some("2024-06-03T08:30:00Z"));

    let stats = &report.per_source["News"];
    assert_eq!(stats.ok, 2);
    assert_eq!(stats.skipped, 1);
    assert!(stats.errors[0].contains("https://news.test/economy/gone"));
}

#[tokio::test]
async fn listing_limit_bounds_article_fetches() {
    let f = Arc::new(
        MemoryFetcher::new()
            .with_page("https://news.test/economy/", LISTING)
            .with_page("https://news.test/economy/rates-decision", ARTICLE_RATES)
            .with_page("https://news.test/economy/ruble-bonds", ARTICLE_BONDS),
    );
    let d = dispatcher(f.clone());
    let src = SourceDescriptor::new("News", SourceKind::HtmlListing, "https://news.test/economy/")
        .with_limit(1);

    let report = run_once(&d, &[src], &OrchestratorConfig::default()).await;

    assert_eq!(report.items.len(), 1);
    assert_eq!(f.calls().len(), 2);
}

#[tokio::test]
async fn per_source_cap_truncates_in_arrival_order() {
    let f = MemoryFetcher::new().with_page("https://feeds.test/reuters.xml", REUTERS);
    let d = dispatcher(Arc::new(f));
    let cfg = OrchestratorConfig {
        per_source_cap: 2,
        ..OrchestratorConfig::default()
    };

    let report = run_once(&d, &[feed("Reuters", "https://feeds.test/reuters.xml")], &cfg).await;

    assert_eq!(report.total_items_raw, 3);
    assert_eq!(report.items.len(), 2);
    assert_eq!(
        report.items[1].title.as_deref(),
        Some("Oil prices steady ahead of producer meeting")
    );
}

#[tokio::test]
async fn malformed_feed_fails_only_its_source() {
    let f = MemoryFetcher::new()
        .with_page("https://feeds.test/html", "<html><body>not a feed</body></html>")
        .with_page("https://feeds.test/wire.rdf", RDF);
    let d = dispatcher(Arc::new(f));
    let sources = vec![
        feed("Html", "https://feeds.test/html"),
        feed("Wire", "https://feeds.test/wire.rdf"),
    ];

    let report = run_once(&d, &sources, &OrchestratorConfig::default()).await;

    assert_eq!(report.items.len(), 1);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].source, "Html");
}

/// Never answers for one host.
struct HangingFetcher {
    inner: MemoryFetcher,
}

#[async_trait]
impl Fetch for HangingFetcher {
    async fn fetch(
        &self,
        url: &str,
        class: ContentClass,
        verify_tls: bool,
    ) -> Result<String, FetchError> {
        if url.contains("slow.test") {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        self.inner.fetch(url, class, verify_tls).await
    }
}

#[tokio::test(start_paused = true)]
async fn source_over_budget_is_recorded_as_timeout() {
    let f = HangingFetcher {
        inner: MemoryFetcher::new().with_page("https://feeds.test/wire.rdf", RDF),
    };
    let d = dispatcher(Arc::new(f));
    let cfg = OrchestratorConfig {
        task_timeout: Duration::from_secs(5),
        ..OrchestratorConfig::default()
    };
    let sources = vec![
        feed("Slow", "https://slow.test/rss"),
        feed("Wire", "https://feeds.test/wire.rdf"),
    ];

    let report = run_once(&d, &sources, &cfg).await;

    assert_eq!(report.items.len(), 1);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].source, "Slow");
    assert!(report.errors[0].error.contains("budget"));
}

const MARKUP_RSS: &str = include_str!("fixtures/markup_rss.xml");
const XHTML_ATOM: &str = include_str!("fixtures/xhtml_entry.atom");

#[tokio::test]
async fn inline_markup_item_does_not_drop_the_feed() {
    let f = MemoryFetcher::new().with_page("https://feeds.test/desk.xml", MARKUP_RSS);
    let d = dispatcher(Arc::new(f));

    let report = run_once(&d, &[feed("Desk", "https://feeds.test/desk.xml")], &OrchestratorConfig::default()).await;

    assert!(report.errors.is_empty());
    assert_eq!(report.items.len(), 2);
    let oil = news_radar::normalize(&report.items[1]);
    assert!(oil.body_text.contains("Oil rose 2%"), "{}", oil.body_text);
    assert_eq!(oil.inner_links, vec!["https://desk.test/opec"]);
}

#[tokio::test]
async fn atom_xhtml_content_reaches_the_normalizer() {
    let f = MemoryFetcher::new().with_page("https://feeds.test/desk.atom", XHTML_ATOM);
    let d = dispatcher(Arc::new(f));

    let report = run_once(&d, &[feed("Desk", "https://feeds.test/desk.atom")], &OrchestratorConfig::default()).await;

    assert_eq!(report.items.len(), 1);
    let rec = news_radar::normalize(&report.items[0]);
    assert!(rec
        .body_text
        .contains("Government bonds gained as yields fell across the curve."));
    assert_eq!(rec.inner_links, vec!["https://desk.test/curve"]);
}
