//! Persisted-text validation
//!
//! Scans a directory of plain-text artifacts and reports, per file, the
//! rules it violates. Validation is diagnostic: every file is checked and
//! every violation accumulated, and an unreadable file becomes a finding
//! rather than an abort.

use crate::error::{Error, Result};
use crate::types::ValidationResult;
use std::collections::BTreeMap;
use std::path::Path;

/// Checks persisted `.txt` artifacts against minimum-content rules
#[derive(Debug, Clone)]
pub struct ContentValidator {
    min_content_length: usize,
}

impl ContentValidator {
    /// Validator requiring at least `min_content_length` characters per file
    pub fn new(min_content_length: usize) -> Self {
        Self { min_content_length }
    }

    /// Validate every `.txt` file under `dir`.
    ///
    /// Returns one entry per file, keyed by file name in sorted order. A
    /// missing directory yields an empty report: nothing persisted there
    /// yet, so there is nothing to fail.
    pub async fn validate(&self, dir: &Path) -> Result<BTreeMap<String, ValidationResult>> {
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(dir = %dir.display(), "Validation directory does not exist");
                return Ok(BTreeMap::new());
            }
            Err(e) => return Err(Error::Io(e)),
        };

        let mut report = BTreeMap::new();
        while let Some(entry) = entries.next_entry().await.map_err(Error::Io)? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("txt") {
                continue;
            }
            let file_name = entry.file_name().to_string_lossy().into_owned();
            let result = self.validate_file(&path, &file_name).await;
            report.insert(file_name, result);
        }
        Ok(report)
    }

    async fn validate_file(&self, path: &Path, file_name: &str) -> ValidationResult {
        let mut errors = Vec::new();

        match tokio::fs::read_to_string(path).await {
            Ok(content) => {
                if content.chars().count() < self.min_content_length {
                    errors.push(format!(
                        "content shorter than {} characters",
                        self.min_content_length
                    ));
                }
                if content.trim().is_empty() {
                    errors.push("content is empty or whitespace-only".to_string());
                }
            }
            Err(e) => {
                errors.push(format!("file could not be read: {e}"));
            }
        }

        ValidationResult {
            file_name: file_name.to_string(),
            validation_errors: errors,
        }
    }
}
