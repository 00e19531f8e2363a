//! Direct download and Readability extraction, used when the reader API fails.

use std::time::Duration;

use encoding_rs::{Encoding, UTF_8};
use reqwest::Client;
use tracing::{debug, warn};

use super::FetchError;
use super::extractor::extract_article;
use super::guard::SystemResolver;

pub(super) const MAX_RESPONSE_BYTES: usize = 10_000_000;

#[derive(Debug)]
pub(super) struct LocalPage {
    pub title: Option<String>,
    pub markdown: String,
}

enum Body {
    Html(String),
    Text(String),
}

struct Download {
    final_url: String,
    body: Body,
}

pub(super) async fn fetch_direct(
    http: &Client,
    url: &str,
    timeout: Duration,
    allow_private_hosts: bool,
) -> Result<LocalPage, FetchError> {
    if !allow_private_hosts {
        super::guard::ensure_public(url, &SystemResolver).await?;
    }

    let download = download(http, url, timeout).await?;

    // Redirects may land somewhere the original URL did not point.
    if !allow_private_hosts && download.final_url != url {
        super::guard::ensure_public(&download.final_url, &SystemResolver).await?;
    }

    let page = match download.body {
        Body::Text(text) => LocalPage {
            title: None,
            markdown: text.trim().to_string(),
        },
        Body::Html(html) => {
            let article = extract_article(&html, Some(&download.final_url));
            if article.used_raw_fallback {
                warn!(url = %download.final_url, "no article found, converting whole page");
            }
            LocalPage {
                title: article.title,
                markdown: html2md::rewrite_html(&article.content_html, false)
                    .trim()
                    .to_string(),
            }
        }
    };

    if page.markdown.is_empty() {
        return Err(FetchError::Empty);
    }
    debug!(url = %download.final_url, chars = page.markdown.len(), "page fetched directly");
    Ok(page)
}

async fn download(http: &Client, url: &str, timeout: Duration) -> Result<Download, FetchError> {
    let response = http
        .get(url)
        .header("User-Agent", crate::USER_AGENT)
        .timeout(timeout)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status(status.as_u16()));
    }

    let final_url = response.url().to_string();
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let is_html = match content_type.as_deref().map(mime_essence) {
        None => true,
        Some(m) if m == "text/html" || m == "application/xhtml+xml" => true,
        Some(m) if m.starts_with("text/") => false,
        Some(m) => return Err(FetchError::UnsupportedContentType(m)),
    };

    if response
        .content_length()
        .is_some_and(|len| len as usize > MAX_RESPONSE_BYTES)
    {
        return Err(FetchError::TooLarge);
    }

    let mut bytes = Vec::new();
    let mut response = response;
    while let Some(chunk) = response.chunk().await? {
        bytes.extend_from_slice(&chunk);
        if bytes.len() > MAX_RESPONSE_BYTES {
            return Err(FetchError::TooLarge);
        }
    }

    let text = decode_body(&bytes, content_type.as_deref());
    let body = if is_html {
        Body::Html(text)
    } else {
        Body::Text(text)
    };
    Ok(Download { final_url, body })
}

fn mime_essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Decode using the `charset` parameter, defaulting to UTF-8. A BOM wins over both.
fn decode_body(bytes: &[u8], content_type: Option<&str>) -> String {
    let encoding = content_type
        .and_then(charset_param)
        .and_then(|label| Encoding::for_label(label.as_bytes()))
        .unwrap_or(UTF_8);
    let (text, used, had_errors) = encoding.decode(bytes);
    if had_errors {
        debug!(encoding = used.name(), "body contained malformed sequences");
    }
    text.into_owned()
}

fn charset_param(content_type: &str) -> Option<&str> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches('"'))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn charset_is_read_from_content_type() {
        assert_eq!(charset_param("text/html; charset=ISO-8859-1"), Some("ISO-8859-1"));
        assert_eq!(charset_param(r#"text/html;Charset="utf-8""#), Some("utf-8"));
        assert_eq!(charset_param("text/html"), None);
    }

    #[test]
    fn latin1_body_is_decoded() {
        let bytes = b"caf\xe9";
        assert_eq!(decode_body(bytes, Some("text/plain; charset=iso-8859-1")), "café");
    }

    #[test]
    fn unknown_charset_falls_back_to_utf8() {
        let bytes = "naïve".as_bytes();
        assert_eq!(decode_body(bytes, Some("text/html; charset=bogus")), "naïve");
    }

    #[test]
    fn mime_essence_strips_parameters() {
        assert_eq!(mime_essence("Text/HTML; charset=utf-8"), "text/html");
    }
}
