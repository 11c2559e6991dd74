//! Rendered-page client over a headless Chromium session
//!
//! The remote registry renders its content client-side, so a plain GET never
//! sees the document body. [`BrowserClient`] owns one Chromium session (via
//! chromiumoxide / CDP) and gates every fetch on a readiness marker: a CSS
//! selector whose presence in the rendered DOM signals the page is safe to
//! read. A session permits one in-flight fetch at a time and is exclusively
//! owned by the run (or by one pool worker) for its entire lifetime.
//!
//! The [`PageFetcher`] trait is the seam that lets the enumerator, extractor
//! and collector run against simulated sources in tests.

use crate::config::FetchConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use scraper::{Html, Selector};
use std::time::{Duration, Instant};

/// A snapshot of a fully rendered page.
///
/// Holds the serialized DOM; selector queries parse on demand so the
/// snapshot stays `Send` and can cross task boundaries in the worker pool.
#[derive(Clone, Debug)]
pub struct RenderedPage {
    url: String,
    html: String,
}

impl RenderedPage {
    /// Wrap a rendered HTML snapshot
    pub fn new(url: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            html: html.into(),
        }
    }

    /// URL this snapshot was rendered from
    pub fn url(&self) -> &str {
        &self.url
    }

    /// True when at least one element matches the selector
    pub fn has_match(&self, selector: &str) -> Result<bool> {
        let sel = parse_selector(selector)?;
        let doc = Html::parse_document(&self.html);
        Ok(doc.select(&sel).next().is_some())
    }

    /// Text of the first element matching the selector
    pub fn first_text(&self, selector: &str) -> Result<Option<String>> {
        let sel = parse_selector(selector)?;
        let doc = Html::parse_document(&self.html);
        Ok(doc
            .select(&sel)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string()))
    }

    /// Texts of all matching elements, in document order
    pub fn texts(&self, selector: &str) -> Result<Vec<String>> {
        let sel = parse_selector(selector)?;
        let doc = Html::parse_document(&self.html);
        Ok(doc
            .select(&sel)
            .map(|el| el.text().collect::<String>().trim().to_string())
            .collect())
    }

    /// Attribute values of all matching elements, in document order.
    /// Elements without the attribute are skipped.
    pub fn attr_values(&self, selector: &str, attr: &str) -> Result<Vec<String>> {
        let sel = parse_selector(selector)?;
        let doc = Html::parse_document(&self.html);
        Ok(doc
            .select(&sel)
            .filter_map(|el| el.value().attr(attr))
            .map(str::to_string)
            .collect())
    }
}

pub(crate) fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| Error::Selector {
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}

/// One stateful page-fetching session.
///
/// Implementations own exactly one rendering session; callers must not share
/// a fetcher between concurrent logical operations. `fetch` blocks until the
/// readiness marker appears or the timeout elapses.
///
/// `Sync` is part of the contract: extraction workers hold `&dyn
/// PageFetcher` across await points inside spawned tasks.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Navigate to `url` and wait for `readiness_marker` to be present in
    /// the rendered DOM, up to `timeout`.
    ///
    /// Takes `&self` so retry wrappers can re-issue the call, but only one
    /// fetch may be in flight per session at a time.
    async fn fetch(
        &self,
        url: &str,
        readiness_marker: &str,
        timeout: Duration,
    ) -> Result<RenderedPage>;

    /// Release the underlying session. Called on every run exit path;
    /// must be safe to call more than once.
    async fn close(&mut self);
}

/// Produces fresh sessions for the extraction worker pool.
///
/// Each created fetcher is an independent session; workers never share one.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    /// Create a new, exclusively owned session
    async fn create(&self) -> Result<Box<dyn PageFetcher>>;
}

/// Chromium-backed [`PageFetcher`]
///
/// Launches a headless browser process and drives a single page. The CDP
/// event handler runs on a background task for the life of the session.
pub struct BrowserClient {
    browser: Browser,
    page: Page,
    handler_task: tokio::task::JoinHandle<()>,
    poll_interval: Duration,
    closed: bool,
}

impl BrowserClient {
    /// Launch a headless browser and open its single page.
    ///
    /// A failure here is a [`Error::Session`]: the setup error that aborts
    /// a run before any enumeration starts.
    pub async fn launch(fetch: &FetchConfig) -> Result<Self> {
        let config = BrowserConfig::builder()
            .window_size(1920, 1080)
            .build()
            .map_err(Error::Session)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| Error::Session(format!("failed to launch browser: {e}")))?;

        // Drive CDP messages until the browser goes away
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| Error::Session(format!("failed to open page: {e}")))?;

        tracing::debug!("Browser session launched");

        Ok(Self {
            browser,
            page,
            handler_task,
            poll_interval: fetch.poll_interval,
            closed: false,
        })
    }
}

#[async_trait]
impl PageFetcher for BrowserClient {
    async fn fetch(
        &self,
        url: &str,
        readiness_marker: &str,
        timeout: Duration,
    ) -> Result<RenderedPage> {
        self.page.goto(url).await.map_err(|e| Error::Navigation {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let started = Instant::now();
        loop {
            let html = self
                .page
                .content()
                .await
                .map_err(|e| Error::Navigation {
                    url: url.to_string(),
                    reason: e.to_string(),
                })?;

            let snapshot = RenderedPage::new(url, html);
            if snapshot.has_match(readiness_marker)? {
                return Ok(snapshot);
            }

            if started.elapsed() >= timeout {
                return Err(Error::FetchTimeout {
                    url: url.to_string(),
                    marker: readiness_marker.to_string(),
                    waited: timeout,
                });
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if let Err(e) = self.browser.close().await {
            tracing::warn!(error = %e, "Failed to close browser session");
        }
        self.handler_task.abort();
        tracing::debug!("Browser session closed");
    }
}

impl Drop for BrowserClient {
    fn drop(&mut self) {
        // Fallback for early-exit paths; explicit close() is the normal path
        self.handler_task.abort();
    }
}

/// [`SessionFactory`] that launches one headless Chromium per session
#[derive(Clone)]
pub struct BrowserSessionFactory {
    fetch: FetchConfig,
}

impl BrowserSessionFactory {
    /// Build a factory from the run's fetch settings
    pub fn new(fetch: FetchConfig) -> Self {
        Self { fetch }
    }
}

#[async_trait]
impl SessionFactory for BrowserSessionFactory {
    async fn create(&self) -> Result<Box<dyn PageFetcher>> {
        Ok(Box::new(BrowserClient::launch(&self.fetch).await?))
    }
}
