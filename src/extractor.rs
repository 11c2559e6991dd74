//! Single-document extraction
//!
//! Turns one rendered document page into a [`Resolution`] record: title from
//! the title element, body text from the ordered content elements joined
//! with newlines, publication date derived from the title, and a collection
//! timestamp taken at extraction time.

use crate::client::PageFetcher;
use crate::config::Config;
use crate::error::{Error, ExtractionError, Result};
use crate::rate_limiter::RequestLimiter;
use crate::retry::fetch_with_retry;
use crate::types::Resolution;
use chrono::{NaiveDate, Utc};
use std::sync::Arc;

/// Sentinel stored when no valid publication date can be derived.
///
/// A recognizable placeholder keeps the record usable instead of silently
/// carrying trailing title text that merely looks like a date.
pub const UNKNOWN_DATE: &str = "unknown";

/// Derives a publication date from a document's visible metadata.
///
/// The registry exposes no structured date field, so the strategy is a
/// replaceable seam; the default reads it off the title.
pub trait DateStrategy: Send + Sync {
    /// A validated date string, or `None` when the source text does not
    /// carry one
    fn publication_date(&self, title: &str) -> Option<String>;
}

/// Default [`DateStrategy`]: the last ten characters of the title, accepted
/// only when they parse as a `DD/MM/YYYY` calendar date.
#[derive(Debug, Clone)]
pub struct TitleSuffixDate {
    suffix_len: usize,
}

impl Default for TitleSuffixDate {
    fn default() -> Self {
        Self { suffix_len: 10 }
    }
}

impl DateStrategy for TitleSuffixDate {
    fn publication_date(&self, title: &str) -> Option<String> {
        let chars: Vec<char> = title.chars().collect();
        if chars.len() < self.suffix_len {
            return None;
        }
        let suffix: String = chars[chars.len() - self.suffix_len..].iter().collect();
        NaiveDate::parse_from_str(&suffix, "%d/%m/%Y")
            .ok()
            .map(|_| suffix)
    }
}

/// Extracts one [`Resolution`] per document URL.
///
/// Cheap to clone; extraction workers each hold their own copy.
#[derive(Clone)]
pub struct DocumentExtractor {
    config: Arc<Config>,
    limiter: RequestLimiter,
    date_strategy: Arc<dyn DateStrategy>,
}

impl DocumentExtractor {
    /// Build an extractor with the default title-suffix date strategy
    pub fn new(config: Arc<Config>, limiter: RequestLimiter) -> Self {
        Self::with_date_strategy(config, limiter, Arc::new(TitleSuffixDate::default()))
    }

    /// Build an extractor with a caller-supplied date strategy
    pub fn with_date_strategy(
        config: Arc<Config>,
        limiter: RequestLimiter,
        date_strategy: Arc<dyn DateStrategy>,
    ) -> Self {
        Self {
            config,
            limiter,
            date_strategy,
        }
    }

    /// Fetch and extract one document.
    ///
    /// Transient fetch failures are retried within the configured budget
    /// before the error propagates; structural failures (expected markup
    /// absent on a rendered page) are never retried.
    pub async fn extract(&self, fetcher: &dyn PageFetcher, url: &str) -> Result<Resolution> {
        let document = &self.config.document;
        let timeout = self.config.fetch.readiness_timeout;

        let page = fetch_with_retry(&self.config.retry, || async move {
            self.limiter.acquire().await;
            fetcher
                .fetch(url, &document.readiness_marker, timeout)
                .await
        })
        .await?;

        let title = page
            .first_text(&document.title_selector)?
            .ok_or_else(|| ExtractionError::MissingTitle {
                url: url.to_string(),
            })?;

        let body_parts = page.texts(&document.content_selector)?;
        if body_parts.is_empty() {
            return Err(Error::Extraction(ExtractionError::MissingBody {
                url: url.to_string(),
            }));
        }
        // Parts are kept even when individually empty so line structure
        // survives the join.
        let content = body_parts.join("\n");

        let publication_date = self
            .date_strategy
            .publication_date(&title)
            .unwrap_or_else(|| UNKNOWN_DATE.to_string());

        tracing::debug!(url, title = %title, "Extracted document");

        Ok(Resolution {
            title,
            content,
            url: url.to_string(),
            publication_date,
            collection_date: Utc::now().to_rfc3339(),
        })
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{
        document_page_html, document_page_without_body, ScriptedFetcher, ScriptedResponse,
    };

    fn extractor() -> DocumentExtractor {
        let config = Arc::new(Config {
            retry: crate::config::RetryConfig {
                max_attempts: 1,
                initial_delay: std::time::Duration::from_millis(1),
                jitter: false,
                ..Default::default()
            },
            ..Default::default()
        });
        DocumentExtractor::new(config, RequestLimiter::new(None))
    }

    #[tokio::test]
    async fn extracts_title_body_and_date_from_a_document_page() {
        let fetcher = ScriptedFetcher::new();
        fetcher.stub(
            "exibenormativo",
            ScriptedResponse::html(document_page_html(
                "Resolução BCB n° 1 de 01/01/2024",
                &["Art. 1º Something.", "Art. 2º Something else."],
            )),
        );

        let resolution = extractor()
            .extract(&fetcher, "https://registry.example/exibenormativo?n=1")
            .await
            .unwrap();

        assert_eq!(resolution.title, "Resolução BCB n° 1 de 01/01/2024");
        assert_eq!(
            resolution.content,
            "Art. 1º Something.\nArt. 2º Something else."
        );
        assert_eq!(resolution.publication_date, "01/01/2024");
        assert_eq!(resolution.url, "https://registry.example/exibenormativo?n=1");
        assert!(!resolution.collection_date.is_empty());
    }

    #[tokio::test]
    async fn missing_title_is_a_structural_failure() {
        let fetcher = ScriptedFetcher::new();
        // Body container present (page renders), title element absent
        fetcher.stub(
            "exibenormativo",
            ScriptedResponse::html(
                "<html><body><div class=\"corpoNormativo\"><span>text</span></div></body></html>",
            ),
        );

        let err = extractor()
            .extract(&fetcher, "https://registry.example/exibenormativo?n=2")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Extraction(ExtractionError::MissingTitle { .. })
        ));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn missing_body_elements_are_a_structural_failure() {
        let config = Arc::new(Config {
            document: crate::config::DocumentConfig {
                // Rendered-page marker that matches even without the body
                // container, so absence of content is structural not a
                // readiness timeout
                readiness_marker: ".titulo-pagina".to_string(),
                ..Default::default()
            },
            ..Default::default()
        });
        let extractor = DocumentExtractor::new(config, RequestLimiter::new(None));

        let fetcher = ScriptedFetcher::new();
        fetcher.stub(
            "exibenormativo",
            ScriptedResponse::html(document_page_without_body("Resolução sem corpo")),
        );

        let err = extractor
            .extract(&fetcher, "https://registry.example/exibenormativo?n=3")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Extraction(ExtractionError::MissingBody { .. })
        ));
    }

    #[tokio::test]
    async fn body_that_never_renders_times_out_as_transient() {
        let fetcher = ScriptedFetcher::new();
        fetcher.stub(
            "exibenormativo",
            ScriptedResponse::html(document_page_without_body("Resolução incompleta")),
        );

        // Default readiness marker is the body container itself
        let err = extractor()
            .extract(&fetcher, "https://registry.example/exibenormativo?n=4")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::FetchTimeout { .. }));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn transient_fetch_failure_is_retried() {
        let config = Arc::new(Config {
            retry: crate::config::RetryConfig {
                max_attempts: 2,
                initial_delay: std::time::Duration::from_millis(1),
                jitter: false,
                ..Default::default()
            },
            ..Default::default()
        });
        let extractor = DocumentExtractor::new(config, RequestLimiter::new(None));

        let fetcher = ScriptedFetcher::new();
        fetcher.stub_sequence(
            "exibenormativo",
            vec![
                ScriptedResponse::Timeout,
                ScriptedResponse::html(document_page_html(
                    "Resolução BCB n° 5 de 02/02/2024",
                    &["corpo"],
                )),
            ],
        );

        let resolution = extractor
            .extract(&fetcher, "https://registry.example/exibenormativo?n=5")
            .await
            .unwrap();

        assert_eq!(resolution.publication_date, "02/02/2024");
        assert_eq!(fetcher.fetch_log().len(), 2);
    }

    #[test]
    fn title_suffix_date_accepts_only_real_calendar_dates() {
        let strategy = TitleSuffixDate::default();

        assert_eq!(
            strategy.publication_date("Resolução BCB n° 1 de 01/01/2024"),
            Some("01/01/2024".to_string())
        );
        assert_eq!(strategy.publication_date("Resolução de 31/02/2024"), None);
        assert_eq!(strategy.publication_date("Resolução sem data"), None);
        assert_eq!(strategy.publication_date("curta"), None);
    }

    #[tokio::test]
    async fn undatable_title_gets_the_unknown_sentinel() {
        let fetcher = ScriptedFetcher::new();
        fetcher.stub(
            "exibenormativo",
            ScriptedResponse::html(document_page_html("Resolução sem data no título", &["corpo"])),
        );

        let resolution = extractor()
            .extract(&fetcher, "https://registry.example/exibenormativo?n=6")
            .await
            .unwrap();

        assert_eq!(resolution.publication_date, UNKNOWN_DATE);
    }
}
