//! Core types for resolution-collector

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One collected regulatory resolution.
///
/// Created only by the document extractor on a successful parse and never
/// mutated afterwards. `url` is the natural (non-enforced) identity key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    /// Title as rendered on the source page
    pub title: String,
    /// Body text: sub-element texts joined with newlines in document order.
    /// May be empty at capture time; adequacy is a validation-stage concern.
    pub content: String,
    /// Canonical source address
    pub url: String,
    /// Publication date text derived from the title by the active
    /// [`DateStrategy`](crate::extractor::DateStrategy); the `"unknown"`
    /// sentinel when the title carries no recognizable date
    pub publication_date: String,
    /// RFC 3339 timestamp assigned once at extraction time
    pub collection_date: String,
}

/// The complete, ordered set of resolutions produced by one collection run.
///
/// Serialized as a bare JSON array so the artifact stays a plain list of
/// records for downstream consumers.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollectedBatch {
    /// Resolutions in enumeration order
    pub resolutions: Vec<Resolution>,
}

impl CollectedBatch {
    /// Create a batch from already-collected resolutions
    pub fn new(resolutions: Vec<Resolution>) -> Self {
        Self { resolutions }
    }

    /// Number of resolutions in the batch
    pub fn len(&self) -> usize {
        self.resolutions.len()
    }

    /// True when the batch holds no resolutions
    pub fn is_empty(&self) -> bool {
        self.resolutions.is_empty()
    }

    /// Iterate the resolutions in enumeration order
    pub fn iter(&self) -> std::slice::Iter<'_, Resolution> {
        self.resolutions.iter()
    }
}

impl IntoIterator for CollectedBatch {
    type Item = Resolution;
    type IntoIter = std::vec::IntoIter<Resolution>;

    fn into_iter(self) -> Self::IntoIter {
        self.resolutions.into_iter()
    }
}

impl<'a> IntoIterator for &'a CollectedBatch {
    type Item = &'a Resolution;
    type IntoIter = std::slice::Iter<'a, Resolution>;

    fn into_iter(self) -> Self::IntoIter {
        self.resolutions.iter()
    }
}

/// Per-file outcome of a validation pass.
///
/// Transient report record: created fresh on every pass, never persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    /// Name of the validated file (not its full path)
    pub file_name: String,
    /// Human-readable reasons the file failed, in check order.
    /// Empty means the file passed.
    pub validation_errors: Vec<String>,
}

impl ValidationResult {
    /// Derived validity: a file is valid iff no errors accumulated
    pub fn is_valid(&self) -> bool {
        self.validation_errors.is_empty()
    }
}

/// Phases of a collection run, in order
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStage {
    /// Run constructed, nothing started
    Idle,
    /// Walking search result pages
    Enumerating,
    /// Extracting enumerated documents one at a time (or via the pool)
    Extracting,
    /// Batch committed to disk
    Persisted,
    /// Scanning persisted text artifacts
    Validating,
    /// Final summary produced
    Reported,
}

/// Category of a contained per-document failure
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureCategory {
    /// Network/timeout condition that survived bounded retry
    Transient,
    /// Expected markup absent on a rendered page
    Structural,
}

/// Events emitted over the collector's broadcast channel.
///
/// Consumers subscribe via
/// [`ResolutionCollector::subscribe`](crate::collector::ResolutionCollector::subscribe);
/// events are dropped silently when nobody is listening.
#[derive(Clone, Debug)]
pub enum Event {
    /// The run moved to a new stage
    StageChanged {
        /// Stage just entered
        stage: RunStage,
    },
    /// One search result page was fetched and scanned for links
    PageEnumerated {
        /// Row offset the page was requested at
        offset: u64,
        /// Document links found on the page
        links: usize,
    },
    /// One document was extracted successfully
    DocumentExtracted {
        /// Source URL of the document
        url: String,
    },
    /// One document failed and was skipped
    DocumentFailed {
        /// Source URL of the document
        url: String,
        /// Whether the failure was transient or structural
        category: FailureCategory,
    },
    /// The collected batch was committed to disk
    BatchPersisted {
        /// Number of records written
        records: usize,
        /// Final artifact path
        path: PathBuf,
    },
    /// The post-hoc validation pass finished
    ValidationCompleted {
        /// Files that passed
        passed: usize,
        /// Files that failed
        failed: usize,
    },
}

/// End-of-run accounting, returned by
/// [`ResolutionCollector::run`](crate::collector::ResolutionCollector::run).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Search result pages fetched during enumeration (including the final
    /// empty page that terminated the walk)
    pub pages_enumerated: u64,
    /// Set when enumeration halted because a page failed rather than
    /// because the result set was exhausted. Distinguishes "no more data"
    /// from "data access failed".
    pub enumeration_anomaly: Option<String>,
    /// Documents whose extraction was attempted
    pub documents_attempted: usize,
    /// Documents that produced a [`Resolution`]
    pub documents_succeeded: usize,
    /// Documents skipped after retries were exhausted
    pub transient_failures: usize,
    /// Documents skipped because expected markup was absent
    pub structural_failures: usize,
    /// Text artifacts that passed validation
    pub validation_passed: usize,
    /// Text artifacts that failed validation
    pub validation_failed: usize,
    /// True when the run was cut short by its cancellation token.
    /// Records collected before the cut are still persisted.
    pub cancelled: bool,
}

impl RunSummary {
    /// Documents that neither succeeded nor are still pending
    pub fn documents_failed(&self) -> usize {
        self.transient_failures + self.structural_failures
    }
}
