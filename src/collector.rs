//! Run orchestration
//!
//! [`ResolutionCollector`] drives one full collection run: enumerate the
//! search result pages, extract each document, persist the batch, then
//! validate the processed text artifacts. Per-document failures are
//! contained and tallied; only session setup and persistence failures
//! abort a run.

use crate::attachments::AttachmentDownloader;
use crate::client::{BrowserSessionFactory, PageFetcher, SessionFactory};
use crate::config::Config;
use crate::enumerator::PageEnumerator;
use crate::error::{Error, Result};
use crate::extractor::{DateStrategy, DocumentExtractor, TitleSuffixDate};
use crate::pdf_text::PdfTextExtractor;
use crate::rate_limiter::RequestLimiter;
use crate::store::ResolutionStore;
use crate::types::{
    CollectedBatch, Event, FailureCategory, Resolution, RunStage, RunSummary, ValidationResult,
};
use crate::validator::ContentValidator;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use url::Url;

const EVENT_CHANNEL_CAPACITY: usize = 100;

/// Orchestrates collection runs against one configured registry.
///
/// Generic over the session factory so tests can substitute scripted
/// sessions for the default headless browser.
pub struct ResolutionCollector<S: SessionFactory = BrowserSessionFactory> {
    config: Arc<Config>,
    factory: S,
    limiter: RequestLimiter,
    event_tx: broadcast::Sender<Event>,
    date_strategy: Arc<dyn DateStrategy>,
}

impl ResolutionCollector<BrowserSessionFactory> {
    /// Collector backed by headless browser sessions
    pub fn new(config: Config) -> Self {
        let factory = BrowserSessionFactory::new(config.fetch.clone());
        Self::with_factory(config, factory)
    }
}

impl<S: SessionFactory> ResolutionCollector<S> {
    /// Collector backed by a caller-supplied session factory
    pub fn with_factory(config: Config, factory: S) -> Self {
        let limiter = RequestLimiter::new(config.fetch.requests_per_second);
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            config: Arc::new(config),
            factory,
            limiter,
            event_tx,
            date_strategy: Arc::new(TitleSuffixDate::default()),
        }
    }

    /// Replace the publication-date strategy
    pub fn with_date_strategy(mut self, strategy: Arc<dyn DateStrategy>) -> Self {
        self.date_strategy = strategy;
        self
    }

    /// Subscribe to run progress events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Shared request limiter; the rate can be adjusted mid-run
    pub fn limiter(&self) -> &RequestLimiter {
        &self.limiter
    }

    fn emit(&self, event: Event) {
        // Delivery is best effort; a run without subscribers is normal
        self.event_tx.send(event).ok();
    }

    fn set_stage(&self, stage: RunStage) {
        tracing::debug!(?stage, "Run stage changed");
        self.emit(Event::StageChanged { stage });
    }

    /// Execute one full run.
    ///
    /// Cancellation is honored between document extractions, never mid
    /// fetch. Whatever was collected before the cut is still persisted and
    /// the summary marks the run as cancelled.
    pub async fn run(&self, cancel: CancellationToken) -> Result<RunSummary> {
        self.config.validate()?;
        let mut summary = RunSummary::default();

        // A session that cannot even be created is fatal: nothing further
        // can produce meaningful results.
        self.set_stage(RunStage::Enumerating);
        let mut session = self.factory.create().await?;

        let enumerator = PageEnumerator::new(self.config.clone(), self.limiter.clone());
        let outcome = enumerator.enumerate(session.as_ref(), &self.event_tx).await;
        summary.pages_enumerated = outcome.pages_fetched;
        summary.enumeration_anomaly = outcome.anomaly;

        if self.config.storage.download_attachments {
            if let Some(page) = &outcome.first_page {
                self.download_attachments(page).await;
            }
        }

        self.set_stage(RunStage::Extracting);
        let urls = outcome.urls;
        let workers = self.config.fetch.max_concurrent_extractions.max(1);
        let records = if workers == 1 {
            let records = self
                .extract_sequential(session.as_ref(), &urls, &cancel, &mut summary)
                .await;
            session.close().await;
            records
        } else {
            // Pool workers each own a fresh session; the enumeration
            // session is done.
            session.close().await;
            self.extract_pooled(workers, &urls, &cancel, &mut summary)
                .await?
        };

        let batch = CollectedBatch::new(records);
        let store = ResolutionStore::new(self.config.artifact_path());
        store.persist(&batch).await?;
        self.emit(Event::BatchPersisted {
            records: batch.len(),
            path: store.artifact_path().to_path_buf(),
        });
        self.set_stage(RunStage::Persisted);

        // Attachment texts land in the processed directory, so convert
        // before validation scans it.
        if self.config.storage.download_attachments {
            let pdf_text = PdfTextExtractor::new(
                &self.config.storage.attachments_dir,
                &self.config.storage.processed_dir,
            );
            match pdf_text.extract_all().await {
                Ok(converted) => {
                    tracing::info!(converted, "Attachment text extraction finished");
                }
                Err(e) => tracing::warn!(error = %e, "Attachment text extraction failed"),
            }
        }

        self.set_stage(RunStage::Validating);
        let report = self.validate_artifacts().await?;
        for result in report.values().filter(|r| !r.is_valid()) {
            tracing::warn!(
                file = %result.file_name,
                errors = ?result.validation_errors,
                "Artifact failed validation"
            );
        }
        summary.validation_passed = report.values().filter(|r| r.is_valid()).count();
        summary.validation_failed = report.len() - summary.validation_passed;
        self.emit(Event::ValidationCompleted {
            passed: summary.validation_passed,
            failed: summary.validation_failed,
        });

        self.set_stage(RunStage::Reported);
        tracing::info!(
            pages = summary.pages_enumerated,
            attempted = summary.documents_attempted,
            succeeded = summary.documents_succeeded,
            transient_failures = summary.transient_failures,
            structural_failures = summary.structural_failures,
            validation_passed = summary.validation_passed,
            validation_failed = summary.validation_failed,
            cancelled = summary.cancelled,
            "Collection run finished"
        );
        Ok(summary)
    }

    /// Validate the processed-text directory on its own.
    ///
    /// Independent of collection: works against artifacts produced by any
    /// earlier run.
    pub async fn validate_artifacts(&self) -> Result<BTreeMap<String, ValidationResult>> {
        let validator = ContentValidator::new(self.config.validation.min_content_length);
        validator.validate(&self.config.storage.processed_dir).await
    }

    async fn extract_sequential(
        &self,
        session: &dyn PageFetcher,
        urls: &[String],
        cancel: &CancellationToken,
        summary: &mut RunSummary,
    ) -> Vec<Resolution> {
        let extractor = DocumentExtractor::with_date_strategy(
            self.config.clone(),
            self.limiter.clone(),
            self.date_strategy.clone(),
        );

        let mut records = Vec::new();
        for url in urls {
            if cancel.is_cancelled() {
                tracing::info!("Cancellation requested, stopping extraction");
                summary.cancelled = true;
                break;
            }
            summary.documents_attempted += 1;
            match extractor.extract(session, url).await {
                Ok(resolution) => {
                    self.emit(Event::DocumentExtracted {
                        url: resolution.url.clone(),
                    });
                    records.push(resolution);
                }
                Err(e) => self.record_failure(url, &e, summary),
            }
        }
        summary.documents_succeeded = records.len();
        records
    }

    async fn extract_pooled(
        &self,
        workers: usize,
        urls: &[String],
        cancel: &CancellationToken,
        summary: &mut RunSummary,
    ) -> Result<Vec<Resolution>> {
        let queue: Arc<Mutex<VecDeque<(usize, String)>>> = Arc::new(Mutex::new(
            urls.iter().cloned().enumerate().collect(),
        ));
        let (result_tx, mut result_rx) =
            mpsc::channel::<(usize, String, Result<Resolution>)>(urls.len().max(1));

        let mut handles = Vec::with_capacity(workers);
        for worker_id in 0..workers {
            let session = match self.factory.create().await {
                Ok(session) => session,
                Err(e) => {
                    tracing::warn!(worker_id, error = %e, "Could not start extraction worker");
                    continue;
                }
            };
            let extractor = DocumentExtractor::with_date_strategy(
                self.config.clone(),
                self.limiter.clone(),
                self.date_strategy.clone(),
            );
            let queue = queue.clone();
            let result_tx = result_tx.clone();
            let cancel = cancel.clone();

            handles.push(tokio::spawn(async move {
                let mut session = session;
                loop {
                    if cancel.is_cancelled() {
                        break;
                    }
                    let next = queue.lock().await.pop_front();
                    let Some((index, url)) = next else { break };
                    let outcome = extractor.extract(session.as_ref(), &url).await;
                    if result_tx.send((index, url, outcome)).await.is_err() {
                        break;
                    }
                }
                session.close().await;
                tracing::debug!(worker_id, "Extraction worker finished");
            }));
        }
        drop(result_tx);

        if handles.is_empty() && !urls.is_empty() {
            return Err(Error::Session(
                "no extraction workers could be started".to_string(),
            ));
        }

        // Slots keyed by enumeration index so completion order cannot
        // reorder the batch.
        let mut slots: Vec<Option<Resolution>> = (0..urls.len()).map(|_| None).collect();
        while let Some((index, url, outcome)) = result_rx.recv().await {
            summary.documents_attempted += 1;
            match outcome {
                Ok(resolution) => {
                    self.emit(Event::DocumentExtracted { url });
                    slots[index] = Some(resolution);
                }
                Err(e) => self.record_failure(&url, &e, summary),
            }
        }

        for handle in handles {
            handle.await.ok();
        }

        if cancel.is_cancelled() && summary.documents_attempted < urls.len() {
            summary.cancelled = true;
        }

        let records: Vec<Resolution> = slots.into_iter().flatten().collect();
        summary.documents_succeeded = records.len();
        Ok(records)
    }

    fn record_failure(&self, url: &str, error: &Error, summary: &mut RunSummary) {
        let category = match error {
            Error::Extraction(_) => FailureCategory::Structural,
            _ => FailureCategory::Transient,
        };
        match category {
            FailureCategory::Structural => summary.structural_failures += 1,
            FailureCategory::Transient => summary.transient_failures += 1,
        }
        tracing::warn!(url, error = %error, ?category, "Document skipped");
        self.emit(Event::DocumentFailed {
            url: url.to_string(),
            category,
        });
    }

    async fn download_attachments(&self, page: &crate::client::RenderedPage) {
        let base = match Url::parse(&self.config.search.base_url) {
            Ok(base) => base,
            Err(e) => {
                tracing::warn!(error = %e, "Invalid base URL, skipping attachments");
                return;
            }
        };
        let downloader = AttachmentDownloader::new(&self.config.storage.attachments_dir);
        match downloader.download_from(page, &base).await {
            Ok(saved) => tracing::info!(saved, "Attachment pass finished"),
            Err(e) => tracing::warn!(error = %e, "Attachment pass failed"),
        }
    }
}
