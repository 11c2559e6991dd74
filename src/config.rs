//! Configuration types for resolution-collector

use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Search endpoint configuration (base URL, date range, pagination)
///
/// Query parameter names are configurable because the remote registry does
/// not advertise its API shape; defaults match the registry this pipeline
/// was built against. Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Base URL of the paginated search endpoint
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Lower bound of the publication date range (as the registry expects it)
    #[serde(default = "default_start_date")]
    pub start_date: String,

    /// Upper bound of the publication date range
    #[serde(default = "default_end_date")]
    pub end_date: String,

    /// Document type filter value
    #[serde(default = "default_document_type")]
    pub document_type: String,

    /// Rows per result page (default: 15). Client-side assumption, not
    /// advertised by the server — revisit if the server changes behavior.
    #[serde(default = "default_page_size")]
    pub page_size: u64,

    /// Query parameter name for the start date
    #[serde(default = "default_start_date_param")]
    pub start_date_param: String,

    /// Query parameter name for the end date
    #[serde(default = "default_end_date_param")]
    pub end_date_param: String,

    /// Query parameter name for the document type
    #[serde(default = "default_document_type_param")]
    pub document_type_param: String,

    /// Query parameter name for the pagination row offset
    #[serde(default = "default_offset_param")]
    pub offset_param: String,

    /// CSS selector whose presence marks a result page as fully rendered
    #[serde(default = "default_result_marker")]
    pub result_marker: String,

    /// CSS selector matching document links on a result page
    #[serde(default = "default_link_selector")]
    pub link_selector: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            start_date: default_start_date(),
            end_date: default_end_date(),
            document_type: default_document_type(),
            page_size: default_page_size(),
            start_date_param: default_start_date_param(),
            end_date_param: default_end_date_param(),
            document_type_param: default_document_type_param(),
            offset_param: default_offset_param(),
            result_marker: default_result_marker(),
            link_selector: default_link_selector(),
        }
    }
}

/// Document page selectors
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DocumentConfig {
    /// CSS selector whose presence marks a document page as fully rendered
    #[serde(default = "default_body_marker")]
    pub readiness_marker: String,

    /// CSS selector for the document title element
    #[serde(default = "default_title_selector")]
    pub title_selector: String,

    /// CSS selector for the ordered body-content elements
    #[serde(default = "default_content_selector")]
    pub content_selector: String,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            readiness_marker: default_body_marker(),
            title_selector: default_title_selector(),
            content_selector: default_content_selector(),
        }
    }
}

/// Fetch behavior (timeouts, concurrency, rate limiting)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FetchConfig {
    /// How long a fetch waits for the readiness marker (default: 20 seconds)
    #[serde(default = "default_readiness_timeout", with = "duration_serde")]
    pub readiness_timeout: Duration,

    /// Interval between readiness re-checks while waiting (default: 250 ms)
    #[serde(default = "default_poll_interval", with = "duration_millis_serde")]
    pub poll_interval: Duration,

    /// Worker pool size for document extraction (default: 1 = sequential,
    /// single session). Each worker above 1 owns its own browser session.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_extractions: usize,

    /// Request rate cap shared across all sessions, in fetches per second
    /// (None = unlimited)
    #[serde(default)]
    pub requests_per_second: Option<u32>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            readiness_timeout: default_readiness_timeout(),
            poll_interval: default_poll_interval(),
            max_concurrent_extractions: default_max_concurrent(),
            requests_per_second: None,
        }
    }
}

/// Retry configuration for transient fetch failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 30 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

/// Artifact locations
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory for the raw JSON artifact (default: "data/raw")
    #[serde(default = "default_raw_dir")]
    pub raw_dir: PathBuf,

    /// Directory of processed `.txt` artifacts scanned by the validator
    /// (default: "data/processed")
    #[serde(default = "default_processed_dir")]
    pub processed_dir: PathBuf,

    /// File name of the batch artifact under `raw_dir`
    #[serde(default = "default_artifact_name")]
    pub artifact_name: String,

    /// Download `.pdf` attachments linked from the first result page
    #[serde(default)]
    pub download_attachments: bool,

    /// Directory for downloaded attachments (default: "data/attachments")
    #[serde(default = "default_attachments_dir")]
    pub attachments_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            raw_dir: default_raw_dir(),
            processed_dir: default_processed_dir(),
            artifact_name: default_artifact_name(),
            download_attachments: false,
            attachments_dir: default_attachments_dir(),
        }
    }
}

/// Content validation thresholds
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Minimum character count for a resolution text to be valid
    /// (default: 100)
    #[serde(default = "default_min_content_length")]
    pub min_content_length: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_content_length: default_min_content_length(),
        }
    }
}

/// Main configuration for the collection pipeline
///
/// Fields are organized into logical sub-configs:
/// - [`search`](SearchConfig) — search endpoint, date range, pagination
/// - [`document`](DocumentConfig) — document page selectors
/// - [`fetch`](FetchConfig) — timeouts, concurrency, rate limiting
/// - [`retry`](RetryConfig) — transient failure retry policy
/// - [`storage`](StorageConfig) — artifact locations
/// - [`validation`](ValidationConfig) — content thresholds
///
/// Sub-config fields are flattened for serialization so the on-disk format
/// stays a single flat document; `retry` keeps its own table.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Search endpoint settings
    #[serde(flatten)]
    pub search: SearchConfig,

    /// Document page selectors
    #[serde(flatten)]
    pub document: DocumentConfig,

    /// Fetch behavior
    #[serde(flatten)]
    pub fetch: FetchConfig,

    /// Retry policy for transient fetch failures
    #[serde(default)]
    pub retry: RetryConfig,

    /// Artifact locations
    #[serde(flatten)]
    pub storage: StorageConfig,

    /// Validation thresholds
    #[serde(flatten)]
    pub validation: ValidationConfig,
}

impl Config {
    /// Full path of the batch artifact
    pub fn artifact_path(&self) -> PathBuf {
        self.storage.raw_dir.join(&self.storage.artifact_name)
    }

    /// Check the configuration for values that would break a run.
    ///
    /// Called before any session is created; a zero page size in
    /// particular would pin enumeration to one offset forever.
    pub fn validate(&self) -> Result<(), crate::error::Error> {
        use crate::error::Error;

        url::Url::parse(&self.search.base_url).map_err(|e| Error::Config {
            message: format!("base_url is not a valid URL: {e}"),
            key: Some("base_url".to_string()),
        })?;

        if self.search.page_size == 0 {
            return Err(Error::Config {
                message: "page_size must be at least 1".to_string(),
                key: Some("page_size".to_string()),
            });
        }

        if self.validation.min_content_length == 0 {
            return Err(Error::Config {
                message: "min_content_length must be at least 1".to_string(),
                key: Some("min_content_length".to_string()),
            });
        }

        for (key, selector) in [
            ("result_marker", &self.search.result_marker),
            ("link_selector", &self.search.link_selector),
            ("readiness_marker", &self.document.readiness_marker),
            ("title_selector", &self.document.title_selector),
            ("content_selector", &self.document.content_selector),
        ] {
            crate::client::parse_selector(selector).map_err(|e| Error::Config {
                message: format!("{key} is not a valid CSS selector: {e}"),
                key: Some(key.to_string()),
            })?;
        }

        Ok(())
    }
}

fn default_base_url() -> String {
    "https://www.bcb.gov.br/estabilidadefinanceira/buscanormas".into()
}

fn default_start_date() -> String {
    "01/01/2020".into()
}

fn default_end_date() -> String {
    "31/12/2024".into()
}

fn default_document_type() -> String {
    "Resolução BCB".into()
}

fn default_page_size() -> u64 {
    15
}

fn default_start_date_param() -> String {
    "dataInicioBusca".into()
}

fn default_end_date_param() -> String {
    "dataFimBusca".into()
}

fn default_document_type_param() -> String {
    "tipoDocumento".into()
}

fn default_offset_param() -> String {
    "startRow".into()
}

fn default_result_marker() -> String {
    ".resultado-item".into()
}

fn default_link_selector() -> String {
    r#"a[href*="exibenormativo"]"#.into()
}

fn default_body_marker() -> String {
    ".corpoNormativo".into()
}

fn default_title_selector() -> String {
    ".titulo-pagina".into()
}

fn default_content_selector() -> String {
    "div.corpoNormativo span".into()
}

fn default_readiness_timeout() -> Duration {
    Duration::from_secs(20)
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(250)
}

fn default_max_concurrent() -> usize {
    1
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_true() -> bool {
    true
}

fn default_raw_dir() -> PathBuf {
    PathBuf::from("data/raw")
}

fn default_processed_dir() -> PathBuf {
    PathBuf::from("data/processed")
}

fn default_artifact_name() -> String {
    "resolutions_data.json".into()
}

fn default_attachments_dir() -> PathBuf {
    PathBuf::from("data/attachments")
}

fn default_min_content_length() -> usize {
    100
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Duration serialization helper (milliseconds, for sub-second intervals)
mod duration_millis_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
