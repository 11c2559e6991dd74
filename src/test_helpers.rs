//! Shared test doubles for the fetch seam.
//!
//! `ScriptedFetcher` implements [`PageFetcher`](crate::client::PageFetcher)
//! over canned HTML keyed by URL substring, so enumeration, extraction and
//! orchestration tests run without a browser.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use crate::client::{PageFetcher, RenderedPage, SessionFactory};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One scripted answer to a fetch
#[derive(Clone)]
pub(crate) enum ScriptedResponse {
    /// Serve this HTML. The readiness marker is still honored: if the
    /// marker does not match the HTML, the fetch times out immediately.
    Html(String),
    /// Fail as if the readiness wait expired
    Timeout,
    /// Fail as if navigation itself broke
    NavigationError(String),
}

impl ScriptedResponse {
    pub(crate) fn html(html: impl Into<String>) -> Self {
        Self::Html(html.into())
    }
}

#[derive(Default)]
struct ScriptState {
    // Keyed by URL substring; responses are consumed front-first and the
    // last one is sticky so retries keep a stable answer.
    scripts: Vec<(String, VecDeque<ScriptedResponse>)>,
    fetch_log: Vec<String>,
}

/// In-memory [`PageFetcher`] driven by a URL-substring script.
///
/// Clones share state, so a factory can hand out "sessions" that all
/// record into one fetch log.
#[derive(Clone, Default)]
pub(crate) struct ScriptedFetcher {
    state: Arc<Mutex<ScriptState>>,
    close_count: Arc<AtomicU32>,
}

impl ScriptedFetcher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Script a single sticky response for URLs containing `key`
    pub(crate) fn stub(&self, key: &str, response: ScriptedResponse) {
        self.stub_sequence(key, vec![response]);
    }

    /// Script a sequence of responses for URLs containing `key`; the last
    /// entry repeats once the rest are consumed
    pub(crate) fn stub_sequence(&self, key: &str, responses: Vec<ScriptedResponse>) {
        let mut state = self.state.lock().unwrap();
        state
            .scripts
            .push((key.to_string(), responses.into_iter().collect()));
    }

    /// Every URL fetched, in order, across all clones
    pub(crate) fn fetch_log(&self) -> Vec<String> {
        self.state.lock().unwrap().fetch_log.clone()
    }

    /// How many sessions were closed
    pub(crate) fn close_count(&self) -> u32 {
        self.close_count.load(Ordering::SeqCst)
    }

    fn next_response(&self, url: &str) -> Option<ScriptedResponse> {
        let mut state = self.state.lock().unwrap();
        state.fetch_log.push(url.to_string());
        let (_, queue) = state
            .scripts
            .iter_mut()
            .find(|(key, _)| url.contains(key.as_str()))?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

#[async_trait]
impl PageFetcher for ScriptedFetcher {
    async fn fetch(
        &self,
        url: &str,
        readiness_marker: &str,
        timeout: Duration,
    ) -> Result<RenderedPage> {
        let response = self.next_response(url).ok_or_else(|| Error::Navigation {
            url: url.to_string(),
            reason: "no scripted response".to_string(),
        })?;

        match response {
            ScriptedResponse::Html(html) => {
                let page = RenderedPage::new(url, html);
                if page.has_match(readiness_marker)? {
                    Ok(page)
                } else {
                    Err(Error::FetchTimeout {
                        url: url.to_string(),
                        marker: readiness_marker.to_string(),
                        waited: timeout,
                    })
                }
            }
            ScriptedResponse::Timeout => Err(Error::FetchTimeout {
                url: url.to_string(),
                marker: readiness_marker.to_string(),
                waited: timeout,
            }),
            ScriptedResponse::NavigationError(reason) => Err(Error::Navigation {
                url: url.to_string(),
                reason,
            }),
        }
    }

    async fn close(&mut self) {
        self.close_count.fetch_add(1, Ordering::SeqCst);
    }
}

/// [`SessionFactory`] handing out clones of one scripted fetcher
#[derive(Clone)]
pub(crate) struct ScriptedFactory {
    fetcher: ScriptedFetcher,
    fail_creates: Arc<AtomicU32>,
    create_count: Arc<AtomicU32>,
}

impl ScriptedFactory {
    pub(crate) fn new(fetcher: ScriptedFetcher) -> Self {
        Self {
            fetcher,
            fail_creates: Arc::new(AtomicU32::new(0)),
            create_count: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Make the next `n` create() calls fail
    pub(crate) fn fail_next_creates(&self, n: u32) {
        self.fail_creates.store(n, Ordering::SeqCst);
    }

    pub(crate) fn create_count(&self) -> u32 {
        self.create_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionFactory for ScriptedFactory {
    async fn create(&self) -> Result<Box<dyn PageFetcher>> {
        if self
            .fail_creates
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(Error::Session("scripted session failure".to_string()));
        }
        self.create_count.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(self.fetcher.clone()))
    }
}

/// HTML for a search result page with one `.resultado-item` per link
pub(crate) fn result_page_html(hrefs: &[&str]) -> String {
    let items: String = hrefs
        .iter()
        .map(|href| {
            format!(
                "<div class=\"resultado-item\"><a href=\"{href}\">Resolução</a></div>"
            )
        })
        .collect();
    format!(
        "<html><body><div id=\"resultados\">{}{items}</div></body></html>",
        // The marker element must exist even on an empty page, matching the
        // rendered-but-exhausted state of the real registry.
        "<div class=\"resultado-item resultado-vazio\"></div>"
    )
}

/// HTML for a document page; `body_spans` become the joined content lines
pub(crate) fn document_page_html(title: &str, body_spans: &[&str]) -> String {
    let spans: String = body_spans
        .iter()
        .map(|s| format!("<span>{s}</span>"))
        .collect();
    format!(
        "<html><body><h1 class=\"titulo-pagina\">{title}</h1>\
         <div class=\"corpoNormativo\">{spans}</div></body></html>"
    )
}

/// Document page whose body container never rendered
pub(crate) fn document_page_without_body(title: &str) -> String {
    format!("<html><body><h1 class=\"titulo-pagina\">{title}</h1></body></html>")
}

/// A minimal but well-formed single-page PDF containing `text`.
///
/// Cross-reference offsets are computed while assembling, so the file is
/// byte-exact regardless of the text length. Keep `text` ASCII without
/// parentheses; it goes into a PDF literal string unescaped.
pub(crate) fn minimal_pdf(text: &str) -> Vec<u8> {
    let content = format!("BT /F1 12 Tf 72 720 Td ({text}) Tj ET");
    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
         /Resources << /Font << /F1 5 0 R >> >> /Contents 4 0 R >>"
            .to_string(),
        format!(
            "<< /Length {} >>\nstream\n{content}\nendstream",
            content.len()
        ),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
    ];

    let mut pdf = String::from("%PDF-1.4\n");
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.push_str(&format!("{} 0 obj\n{body}\nendobj\n", i + 1));
    }

    let xref_offset = pdf.len();
    pdf.push_str(&format!("xref\n0 {}\n", objects.len() + 1));
    pdf.push_str("0000000000 65535 f \n");
    for offset in &offsets {
        pdf.push_str(&format!("{offset:010} 00000 n \n"));
    }
    pdf.push_str(&format!(
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref_offset}\n%%EOF",
        objects.len() + 1
    ));
    pdf.into_bytes()
}
