//! Attachment text extraction
//!
//! Converts downloaded PDF attachments into the plain-text artifacts the
//! validation pass consumes: one `.txt` per `.pdf`, named by the PDF's
//! file stem. Conversion is diagnostic-friendly like the rest of the
//! pipeline: a PDF that cannot be parsed is logged and skipped, and the
//! remaining files still convert.

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

/// Converts a directory of `.pdf` attachments into `.txt` artifacts
#[derive(Debug, Clone)]
pub struct PdfTextExtractor {
    source_dir: PathBuf,
    dest_dir: PathBuf,
}

impl PdfTextExtractor {
    /// Extractor reading PDFs from `source_dir` and writing text into
    /// `dest_dir`
    pub fn new(source_dir: impl Into<PathBuf>, dest_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
            dest_dir: dest_dir.into(),
        }
    }

    /// Convert every `.pdf` under the source directory.
    ///
    /// Returns how many files were converted. A missing source directory
    /// means no attachments were downloaded, so there is nothing to do.
    pub async fn extract_all(&self) -> Result<usize> {
        let mut entries = match tokio::fs::read_dir(&self.source_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(dir = %self.source_dir.display(), "No attachment directory");
                return Ok(0);
            }
            Err(e) => return Err(Error::Io(e)),
        };

        tokio::fs::create_dir_all(&self.dest_dir).await?;

        let mut converted = 0;
        while let Some(entry) = entries.next_entry().await.map_err(Error::Io)? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("pdf") {
                continue;
            }
            match self.extract_one(&path).await {
                Ok(dest) => {
                    tracing::info!(
                        source = %path.display(),
                        dest = %dest.display(),
                        "Converted attachment to text"
                    );
                    converted += 1;
                }
                Err(e) => {
                    tracing::warn!(source = %path.display(), error = %e, "Attachment conversion skipped");
                }
            }
        }
        Ok(converted)
    }

    async fn extract_one(&self, path: &Path) -> Result<PathBuf> {
        let bytes = tokio::fs::read(path).await?;

        // PDF parsing is CPU-bound; keep it off the async workers
        let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
            .await
            .map_err(|e| Error::PdfText {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?
            .map_err(|e| Error::PdfText {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .ok_or_else(|| Error::PdfText {
                path: path.to_path_buf(),
                reason: "attachment has no file stem".to_string(),
            })?;
        let dest = self.dest_dir.join(format!("{stem}.txt"));
        tokio::fs::write(&dest, text.trim()).await?;
        Ok(dest)
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::minimal_pdf;

    #[tokio::test]
    async fn converts_a_pdf_into_a_text_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("attachments");
        let dest = dir.path().join("processed");
        tokio::fs::create_dir_all(&source).await.unwrap();
        tokio::fs::write(source.join("norma_1.pdf"), minimal_pdf("Resolucao numero um"))
            .await
            .unwrap();

        let extractor = PdfTextExtractor::new(&source, &dest);
        let converted = extractor.extract_all().await.unwrap();

        assert_eq!(converted, 1);
        let text = tokio::fs::read_to_string(dest.join("norma_1.txt"))
            .await
            .unwrap();
        assert!(text.contains("Resolucao"), "extracted text was: {text:?}");
    }

    #[tokio::test]
    async fn an_unparseable_pdf_does_not_stop_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("attachments");
        let dest = dir.path().join("processed");
        tokio::fs::create_dir_all(&source).await.unwrap();
        tokio::fs::write(source.join("broken.pdf"), b"not a pdf at all")
            .await
            .unwrap();
        tokio::fs::write(source.join("ok.pdf"), minimal_pdf("Conteudo valido"))
            .await
            .unwrap();

        let extractor = PdfTextExtractor::new(&source, &dest);
        let converted = extractor.extract_all().await.unwrap();

        assert_eq!(converted, 1);
        assert!(dest.join("ok.txt").exists());
        assert!(!dest.join("broken.txt").exists());
    }

    #[tokio::test]
    async fn missing_attachment_directory_converts_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = PdfTextExtractor::new(
            dir.path().join("never-downloaded"),
            dir.path().join("processed"),
        );

        let converted = extractor.extract_all().await.unwrap();

        assert_eq!(converted, 0);
        assert!(!dir.path().join("processed").exists());
    }

    #[tokio::test]
    async fn non_pdf_files_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("attachments");
        tokio::fs::create_dir_all(&source).await.unwrap();
        tokio::fs::write(source.join("readme.txt"), "not an attachment")
            .await
            .unwrap();

        let extractor = PdfTextExtractor::new(&source, dir.path().join("processed"));
        let converted = extractor.extract_all().await.unwrap();

        assert_eq!(converted, 0);
    }
}
