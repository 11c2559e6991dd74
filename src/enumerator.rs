//! Search-result page enumeration
//!
//! Walks the registry's paginated search results in strict increasing offset
//! order (0, 15, 30, …) and collects document links until a page yields
//! zero links — the only termination signal the source provides; there is no
//! "total pages" field to consult. A page that fails even after bounded
//! retries also halts the walk, but is surfaced as an anomaly in the outcome
//! so the run report can distinguish "no more data" from "data access
//! failed".

use crate::client::PageFetcher;
use crate::config::Config;
use crate::error::Error;
use crate::rate_limiter::RequestLimiter;
use crate::retry::fetch_with_retry;
use crate::types::Event;
use std::sync::Arc;
use url::Url;

/// Result of one enumeration walk
#[derive(Debug)]
pub struct EnumerationOutcome {
    /// Document URLs in the exact order the source listed them
    pub urls: Vec<String>,
    /// Result pages fetched and scanned (including the terminal empty page)
    pub pages_fetched: u64,
    /// Set when the walk stopped because a page failed rather than because
    /// the result set was exhausted
    pub anomaly: Option<String>,
    /// Snapshot of the first result page, kept for attachment scanning
    pub first_page: Option<crate::client::RenderedPage>,
}

/// Drives a fetcher across successive search result pages.
///
/// Not restartable mid-sequence: resuming means replaying from offset 0.
#[derive(Clone)]
pub struct PageEnumerator {
    config: Arc<Config>,
    limiter: RequestLimiter,
}

impl PageEnumerator {
    /// Build an enumerator over the run's configuration
    pub fn new(config: Arc<Config>, limiter: RequestLimiter) -> Self {
        Self { config, limiter }
    }

    /// Search URL for the result page starting at `offset`
    pub fn page_url(&self, offset: u64) -> Result<String, Error> {
        let search = &self.config.search;
        let mut url = Url::parse(&search.base_url)?;
        url.query_pairs_mut()
            .append_pair(&search.start_date_param, &search.start_date)
            .append_pair(&search.end_date_param, &search.end_date)
            .append_pair(&search.document_type_param, &search.document_type)
            .append_pair(&search.offset_param, &offset.to_string());
        Ok(url.to_string())
    }

    /// Walk result pages until a page yields zero links.
    ///
    /// Per-page failures are contained here: a page that still fails after
    /// the retry budget terminates the walk with `anomaly` set. The links
    /// gathered so far are always returned.
    pub async fn enumerate(
        &self,
        fetcher: &dyn PageFetcher,
        event_tx: &tokio::sync::broadcast::Sender<Event>,
    ) -> EnumerationOutcome {
        let search = &self.config.search;
        let fetch_cfg = &self.config.fetch;

        let mut urls = Vec::new();
        let mut pages_fetched = 0u64;
        let mut anomaly = None;
        let mut first_page = None;
        let mut offset = 0u64;

        loop {
            let page_url = match self.page_url(offset) {
                Ok(u) => u,
                Err(e) => {
                    anomaly = Some(format!("could not build search URL: {e}"));
                    break;
                }
            };

            let page_url = page_url.as_str();
            let result = fetch_with_retry(&self.config.retry, || async move {
                self.limiter.acquire().await;
                fetcher
                    .fetch(page_url, &search.result_marker, fetch_cfg.readiness_timeout)
                    .await
            })
            .await;

            let page = match result {
                Ok(page) => page,
                Err(e) => {
                    // Treated as a zero-link page for termination, but the
                    // failure must not masquerade as natural exhaustion.
                    tracing::warn!(offset, error = %e, "Search page failed, halting enumeration");
                    anomaly = Some(format!("search page at offset {offset} failed: {e}"));
                    break;
                }
            };
            pages_fetched += 1;

            let links = match self.page_links(&page) {
                Ok(links) => links,
                Err(e) => {
                    anomaly = Some(format!("link extraction at offset {offset} failed: {e}"));
                    break;
                }
            };

            if offset == 0 {
                first_page = Some(page);
            }

            event_tx
                .send(Event::PageEnumerated {
                    offset,
                    links: links.len(),
                })
                .ok();

            if links.is_empty() {
                tracing::info!(offset, "Empty result page, enumeration complete");
                break;
            }

            tracing::info!(offset, links = links.len(), "Collected links from result page");
            urls.extend(links);
            offset += search.page_size;
        }

        EnumerationOutcome {
            urls,
            pages_fetched,
            anomaly,
            first_page,
        }
    }

    /// Document links on one result page, resolved to absolute URLs
    fn page_links(&self, page: &crate::client::RenderedPage) -> Result<Vec<String>, Error> {
        let base = Url::parse(&self.config.search.base_url)?;
        let hrefs = page.attr_values(&self.config.search.link_selector, "href")?;

        let mut links = Vec::with_capacity(hrefs.len());
        for href in hrefs {
            match base.join(&href) {
                Ok(abs) => links.push(abs.to_string()),
                Err(e) => {
                    tracing::warn!(href = %href, error = %e, "Skipping unresolvable link");
                }
            }
        }
        Ok(links)
    }
}
