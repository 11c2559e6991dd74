//! PDF attachment download
//!
//! Some result pages link directly to PDF attachments alongside the
//! document pages. When enabled, the collector scans the first rendered
//! result page for `.pdf` links and downloads them over plain HTTP; the
//! rendering session is not needed for binary content.

use crate::client::RenderedPage;
use crate::error::Result;
use std::path::PathBuf;
use url::Url;

/// Downloads PDF links found on a rendered page into a local directory
pub struct AttachmentDownloader {
    client: reqwest::Client,
    dest_dir: PathBuf,
}

impl AttachmentDownloader {
    /// Downloader saving into `dest_dir`
    pub fn new(dest_dir: impl Into<PathBuf>) -> Self {
        Self {
            client: reqwest::Client::new(),
            dest_dir: dest_dir.into(),
        }
    }

    /// Download every `.pdf` link on `page`, resolving relative links
    /// against `base`.
    ///
    /// Failures are contained per attachment: a broken link is logged and
    /// skipped. Returns how many attachments were saved.
    pub async fn download_from(&self, page: &RenderedPage, base: &Url) -> Result<usize> {
        let hrefs = page.attr_values(r#"a[href$=".pdf"]"#, "href")?;
        if hrefs.is_empty() {
            return Ok(0);
        }

        tokio::fs::create_dir_all(&self.dest_dir).await?;

        let mut saved = 0;
        for (index, href) in hrefs.iter().enumerate() {
            let url = match base.join(href) {
                Ok(url) => url,
                Err(e) => {
                    tracing::warn!(href = %href, error = %e, "Skipping unresolvable attachment link");
                    continue;
                }
            };

            match self.download_one(&url, index).await {
                Ok(path) => {
                    tracing::info!(url = %url, path = %path.display(), "Saved attachment");
                    saved += 1;
                }
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "Attachment download failed");
                }
            }
        }
        Ok(saved)
    }

    async fn download_one(&self, url: &Url, index: usize) -> Result<PathBuf> {
        let response = self.client.get(url.clone()).send().await?.error_for_status()?;
        let bytes = response.bytes().await?;

        let path = self.dest_dir.join(Self::file_name(url, index));
        tokio::fs::write(&path, &bytes).await?;
        Ok(path)
    }

    /// Last path segment of the URL, or a positional fallback name
    fn file_name(url: &Url, index: usize) -> String {
        url.path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("attachment_{index}.pdf"))
    }

    #[cfg(test)]
    fn dest_dir(&self) -> &std::path::Path {
        &self.dest_dir
    }
}
