//! # resolution-collector
//!
//! Backend library for collecting regulatory resolution documents from a
//! paginated public registry whose pages are populated by client-side
//! rendering.
//!
//! ## Design Philosophy
//!
//! resolution-collector is designed to be:
//! - **Resilient** - Per-document failures are contained, retried where
//!   transient, and tallied instead of aborting the run
//! - **Sensible defaults** - Works out of the box against the registry it
//!   was built for, with every selector and parameter configurable
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Event-driven** - Consumers subscribe to run progress events, no
//!   polling required
//!
//! ## Quick Start
//!
//! ```no_run
//! use resolution_collector::{Config, ResolutionCollector};
//! use resolution_collector::config::SearchConfig;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config {
//!         search: SearchConfig {
//!             start_date: "01/01/2023".to_string(),
//!             end_date: "31/12/2023".to_string(),
//!             ..Default::default()
//!         },
//!         ..Default::default()
//!     };
//!
//!     let collector = ResolutionCollector::new(config);
//!
//!     // Subscribe to events
//!     let mut events = collector.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let summary = collector.run(CancellationToken::new()).await?;
//!     println!("Collected {} documents", summary.documents_succeeded);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// PDF attachment download
pub mod attachments;
/// Rendered-page fetching sessions
pub mod client;
/// Run orchestration
pub mod collector;
/// Configuration types
pub mod config;
/// Search-result page enumeration
pub mod enumerator;
/// Error types
pub mod error;
/// Single-document extraction
pub mod extractor;
/// Attachment text extraction
pub mod pdf_text;
/// Request rate limiting with token bucket
pub mod rate_limiter;
/// Retry logic with exponential backoff
pub mod retry;
/// Batch persistence
pub mod store;
/// Core types and events
pub mod types;
/// Persisted-text validation
pub mod validator;

#[cfg(test)]
pub(crate) mod test_helpers;

// Re-export commonly used types
pub use client::{BrowserClient, BrowserSessionFactory, PageFetcher, RenderedPage, SessionFactory};
pub use collector::ResolutionCollector;
pub use config::Config;
pub use error::{Error, ExtractionError, PersistenceError, Result};
pub use extractor::{DateStrategy, DocumentExtractor, TitleSuffixDate, UNKNOWN_DATE};
pub use pdf_text::PdfTextExtractor;
pub use rate_limiter::RequestLimiter;
pub use store::ResolutionStore;
pub use types::{
    CollectedBatch, Event, FailureCategory, Resolution, RunStage, RunSummary, ValidationResult,
};
pub use validator::ContentValidator;

/// Helper function to run a collection with graceful signal handling.
///
/// Starts the run, and cancels it if a termination signal arrives first;
/// whatever was collected before the signal is still persisted.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use resolution_collector::{Config, ResolutionCollector, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let collector = ResolutionCollector::new(Config::default());
///     let summary = run_with_shutdown(&collector).await?;
///     println!("{} documents collected", summary.documents_succeeded);
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown<S: client::SessionFactory>(
    collector: &ResolutionCollector<S>,
) -> Result<types::RunSummary> {
    let cancel = tokio_util::sync::CancellationToken::new();
    let signal_cancel = cancel.clone();
    let signal_task = tokio::spawn(async move {
        wait_for_signal().await;
        signal_cancel.cancel();
    });

    let summary = collector.run(cancel).await;
    signal_task.abort();
    summary
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
