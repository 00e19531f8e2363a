use dom_smoothie::{Config, Readability};
use tracing::warn;

pub(super) struct ExtractedArticle {
    pub title: Option<String>,
    pub content_html: String,
    /// Readability found no article; `content_html` is the whole page.
    pub used_raw_fallback: bool,
}

/// Main-content extraction for pages downloaded without the reader API.
pub(super) fn extract_article(html: &str, url: Option<&str>) -> ExtractedArticle {
    let mut readability = match Readability::new(html, url, Some(Config::default())) {
        Ok(r) => r,
        Err(e) => {
            warn!(%e, "readability init failed, using whole page");
            return whole_page(html);
        }
    };

    if !readability.is_probably_readable() {
        return whole_page(html);
    }

    match readability.parse() {
        Ok(article) => ExtractedArticle {
            title: Some(article.title.to_string()).filter(|t| !t.trim().is_empty()),
            content_html: article.content.to_string(),
            used_raw_fallback: false,
        },
        Err(e) => {
            warn!(%e, "readability parse failed, using whole page");
            whole_page(html)
        }
    }
}

fn whole_page(html: &str) -> ExtractedArticle {
    ExtractedArticle {
        title: title_tag(html),
        content_html: html.to_string(),
        used_raw_fallback: true,
    }
}

/// `<title>` lookup by string search. Offsets come from an ASCII-lowercased
/// copy, which keeps byte positions aligned with the original.
fn title_tag(html: &str) -> Option<String> {
    let lower = html.to_ascii_lowercase();
    let open = lower.find("<title")?;
    let start = open + lower[open..].find('>')? + 1;
    let end = start + lower[start..].find("</title>")?;
    let title = html[start..end].trim();
    (!title.is_empty()).then(|| title.to_string())
}
