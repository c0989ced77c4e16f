//! Rate-limited HTTP fetcher.
//!
//! The per-host throttle is an explicit, lock-guarded map owned by the caller
//! and injected into the fetcher. Overlapping calls to one host may both sleep
//! and then both proceed: it spaces requests out, it does not serialize them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use metrics::histogram;
use reqwest::header::ACCEPT;
use tokio::time::Instant;
use tracing::debug;
use url::Url;

use crate::error::FetchError;

pub const DEFAULT_USER_AGENT: &str = "RadarParser/1.1 (+https://example.org)";
pub const DEFAULT_MIN_HOST_GAP: Duration = Duration::from_millis(700);
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(25);

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const ACCEPT_FEED: &str =
    "application/rss+xml, application/atom+xml, application/xml;q=0.9, */*;q=0.8";

/// Content class of a request; picks the Accept header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentClass {
    Feed,
    Html,
}

impl ContentClass {
    pub fn accept(self) -> &'static str {
        match self {
            ContentClass::Feed => ACCEPT_FEED,
            ContentClass::Html => ACCEPT_HTML,
        }
    }
}

#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(
        &self,
        url: &str,
        class: ContentClass,
        verify_tls: bool,
    ) -> Result<String, FetchError>;
}

/// Per-host last-access map. Cloning shares the map.
#[derive(Debug, Clone)]
pub struct HostThrottle {
    gap: Duration,
    last: Arc<Mutex<HashMap<String, Instant>>>,
}

impl Default for HostThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_HOST_GAP)
    }
}

impl HostThrottle {
    pub fn new(gap: Duration) -> Self {
        Self {
            gap,
            last: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Sleep until `gap` has passed since the last request to `host`, then
    /// stamp it. Returns how long this call slept.
    pub async fn wait(&self, host: &str) -> Duration {
        let wait = {
            let map = self.last.lock().unwrap_or_else(|p| p.into_inner());
            map.get(host)
                .map(|t| self.gap.saturating_sub(t.elapsed()))
                .unwrap_or(Duration::ZERO)
        };
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
        self.last
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(host.to_string(), Instant::now());
        wait
    }
}

pub struct HttpFetcher {
    secure: reqwest::Client,
    insecure: reqwest::Client,
    throttle: HostThrottle,
}

impl HttpFetcher {
    pub fn new(user_agent: &str, timeout: Duration, throttle: HostThrottle) -> anyhow::Result<Self> {
        let build = |verify: bool| {
            reqwest::Client::builder()
                .user_agent(user_agent)
                .timeout(timeout)
                .redirect(reqwest::redirect::Policy::limited(10))
                .danger_accept_invalid_certs(!verify)
                .build()
        };
        Ok(Self {
            secure: build(true)?,
            insecure: build(false)?,
            throttle,
        })
    }
}

fn transport_error(url: &str, e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        }
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(
        &self,
        url: &str,
        class: ContentClass,
        verify_tls: bool,
    ) -> Result<String, FetchError> {
        let invalid = || FetchError::InvalidUrl {
            url: url.to_string(),
        };
        let parsed = Url::parse(url).map_err(|_| invalid())?;
        let host = parsed.host_str().ok_or_else(invalid)?.to_lowercase();

        self.throttle.wait(&host).await;

        let client = if verify_tls {
            &self.secure
        } else {
            &self.insecure
        };
        let t0 = std::time::Instant::now();
        let resp = client
            .get(parsed)
            .header(ACCEPT, class.accept())
            .send()
            .await
            .map_err(|e| transport_error(url, e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        let text = resp.text().await.map_err(|e| transport_error(url, e))?;

        histogram!("radar_source_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        debug!(target: "fetch", %url, status = status.as_u16(), bytes = text.len(), "fetched");
        Ok(text)
    }
}

/// Scripted in-memory fetcher: fixed bodies or errors per URL, 404 for anything else.
#[derive(Debug, Default)]
pub struct MemoryFetcher {
    responses: HashMap<String, Result<String, FetchError>>,
    calls: Mutex<Vec<String>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, body: impl Into<String>) -> Self {
        self.responses.insert(url.to_string(), Ok(body.into()));
        self
    }

    pub fn with_status(mut self, url: &str, status: u16) -> Self {
        self.responses.insert(
            url.to_string(),
            Err(FetchError::Status {
                status,
                url: url.to_string(),
            }),
        );
        self
    }

    pub fn with_error(mut self, url: &str, err: FetchError) -> Self {
        self.responses.insert(url.to_string(), Err(err));
        self
    }

    /// URLs requested so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }
}

#[async_trait]
impl Fetch for MemoryFetcher {
    async fn fetch(
        &self,
        url: &str,
        _class: ContentClass,
        _verify_tls: bool,
    ) -> Result<String, FetchError> {
        self.calls
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(url.to_string());
        self.responses.get(url).cloned().unwrap_or_else(|| {
            Err(FetchError::Status {
                status: 404,
                url: url.to_string(),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn same_host_is_delayed_other_hosts_are_not() {
        let t = HostThrottle::new(Duration::from_millis(700));
        assert_eq!(t.wait("a.test").await, Duration::ZERO);
        assert_eq!(t.wait("b.test").await, Duration::ZERO);

        let start = Instant::now();
        assert_eq!(t.wait("a.test").await, Duration::from_millis(700));
        assert!(start.elapsed() >= Duration::from_millis(700));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(t.wait("a.test").await, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn clones_share_state() {
        let t = HostThrottle::new(Duration::from_millis(500));
        let t2 = t.clone();
        t.wait("h").await;
        assert_eq!(t2.wait("h").await, Duration::from_millis(500));
    }

    #[tokio::test]
    async fn memory_fetcher_scripts_responses() {
        let f = MemoryFetcher::new()
            .with_page("https://a.test/feed", "<rss/>")
            .with_status("https://a.test/gone", 410);
        assert_eq!(
            f.fetch("https://a.test/feed", ContentClass::Feed, true).await,
            Ok("<rss/>".to_string())
        );
        assert_eq!(
            f.fetch("https://a.test/gone", ContentClass::Html, true)
                .await
                .unwrap_err()
                .status(),
            Some(410)
        );
        assert_eq!(
            f.fetch("https://a.test/other", ContentClass::Html, true)
                .await
                .unwrap_err()
                .status(),
            Some(404)
        );
        assert_eq!(f.calls().len(), 3);
    }

    #[tokio::test]
    async fn http_fetcher_rejects_bad_urls_before_network() {
        let f = HttpFetcher::new(DEFAULT_USER_AGENT, DEFAULT_FETCH_TIMEOUT, HostThrottle::default())
            .unwrap();
        let err = f.fetch("not a url", ContentClass::Html, true).await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl { .. }));
    }
}
