use std::time::Duration;

use reqwest::Client;
use tracing::debug;

use super::FetchError;

/// Fetch `url` through a reader-style extraction API that returns the page as
/// plain text when the target URL is appended to its base.
pub(super) async fn read_via_api(
    http: &Client,
    reader_url: &str,
    url: &str,
    timeout: Duration,
) -> Result<String, FetchError> {
    let endpoint = if reader_url.ends_with('/') {
        format!("{reader_url}{url}")
    } else {
        format!("{reader_url}/{url}")
    };

    let response = http
        .get(&endpoint)
        .header("Accept", "text/plain")
        .header("User-Agent", crate::USER_AGENT)
        .timeout(timeout)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status(status.as_u16()));
    }

    let text = response.text().await?;
    let content = text.trim();
    if content.is_empty() {
        return Err(FetchError::Empty);
    }
    debug!(%url, chars = content.len(), "reader API returned content");
    Ok(content.to_string())
}
