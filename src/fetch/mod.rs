//! Page content retrieval: reader API first, direct download as fallback.

mod extractor;
mod guard;
mod local;
mod reader;

use std::time::Duration;

use reqwest::Client;
use tracing::{info, warn};

const TRUNCATION_MARKER: &str = "\n... (content truncated)";

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("invalid URL: must be HTTP(S)")]
    InvalidScheme,

    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("blocked: internal/private host not allowed")]
    InternalHost,

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("DNS resolution failed: {0}")]
    DnsResolution(String),

    #[error("request failed: status {0}")]
    Status(u16),

    #[error("response too large (>{} bytes)", local::MAX_RESPONSE_BYTES)]
    TooLarge,

    #[error("unsupported content type: {0}")]
    UnsupportedContentType(String),

    #[error("page has no readable content")]
    Empty,

    #[error("reader API failed ({reader}); direct fetch failed ({direct})")]
    AllMethodsFailed {
        reader: Box<FetchError>,
        direct: Box<FetchError>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageOrigin {
    Reader,
    Direct,
}

#[derive(Debug)]
pub struct Page {
    pub url: String,
    pub title: Option<String>,
    pub content: String,
    pub origin: PageOrigin,
}

/// Implemented by `ContentFetcher`; mocked in pipeline tests.
pub trait PageReader {
    async fn read(&self, url: &str) -> Result<Page, FetchError>;
}

#[derive(Clone)]
pub struct ContentFetcher {
    http: Client,
    reader_url: String,
    timeout: Duration,
    max_chars: usize,
    local_fallback: bool,
    allow_private_hosts: bool,
}

impl ContentFetcher {
    pub fn new(
        http: Client,
        reader_url: &str,
        timeout: Duration,
        max_chars: usize,
        local_fallback: bool,
    ) -> Self {
        Self {
            http,
            reader_url: reader_url.to_string(),
            timeout,
            max_chars,
            local_fallback,
            allow_private_hosts: false,
        }
    }

    #[cfg(test)]
    fn allowing_private_hosts(mut self) -> Self {
        self.allow_private_hosts = true;
        self
    }
}

impl PageReader for ContentFetcher {
    async fn read(&self, url: &str) -> Result<Page, FetchError> {
        let url = normalize_url(url);

        let reader_result =
            reader::read_via_api(&self.http, &self.reader_url, &url, self.timeout).await;
        let reader_err = match reader_result {
            Ok(text) => {
                return Ok(Page {
                    content: truncate_content(&text, self.max_chars),
                    url,
                    title: None,
                    origin: PageOrigin::Reader,
                });
            }
            Err(e) if !self.local_fallback => return Err(e),
            Err(e) => e,
        };

        warn!(%url, error = %reader_err, "reader API failed, fetching page directly");
        match local::fetch_direct(&self.http, &url, self.timeout, self.allow_private_hosts).await {
            Ok(page) => {
                info!(%url, "page fetched without reader API");
                Ok(Page {
                    content: truncate_content(&page.markdown, self.max_chars),
                    url,
                    title: page.title,
                    origin: PageOrigin::Direct,
                })
            }
            Err(direct) => Err(FetchError::AllMethodsFailed {
                reader: Box::new(reader_err),
                direct: Box::new(direct),
            }),
        }
    }
}

/// Search results occasionally omit the scheme.
pub fn normalize_url(url: &str) -> String {
    let url = url.trim();
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{url}")
    }
}

/// Cut to `max_chars` characters and mark the cut.
pub fn truncate_content(content: &str, max_chars: usize) -> String {
    match content.char_indices().nth(max_chars) {
        Some((end, _)) => format!("{}{TRUNCATION_MARKER}", &content[..end]),
        None => content.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_adds_https_when_missing() {
        assert_eq!(normalize_url("example.com/a"), "https://example.com/a");
        assert_eq!(normalize_url(" http://example.com "), "http://example.com");
        assert_eq!(normalize_url("https://example.com"), "https://example.com");
    }

    #[test]
    fn truncate_leaves_short_content_alone() {
        assert_eq!(truncate_content("short", 10), "short");
        assert_eq!(truncate_content("exactly10!", 10), "exactly10!");
    }

    #[test]
    fn truncate_counts_characters_not_bytes() {
        let text = "é".repeat(12);
        let cut = truncate_content(&text, 10);
        assert_eq!(cut, format!("{}\n... (content truncated)", "é".repeat(10)));
    }
}
