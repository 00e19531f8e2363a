//! Tolerant parsing of free-form model replies.

/// First non-empty line of the reply, minus a `Query:` label, quotes, and
/// markdown emphasis.
pub(super) fn clean_query(reply: &str) -> Option<String> {
    let line = reply.lines().map(str::trim).find(|l| !l.is_empty())?;
    let line = strip_markup(line);
    let line = strip_label(line, "search query")
        .or_else(|| strip_label(line, "query"))
        .unwrap_or(line);
    let query = line
        .trim()
        .trim_matches(|c| matches!(c, '"' | '\'' | '`' | '*'))
        .trim();
    (!query.is_empty()).then(|| query.to_string())
}

/// `(title, url)` from `Title: ...` and `URL: ...` lines, if both are present.
pub(super) fn parse_selection(reply: &str) -> Option<(String, String)> {
    let mut title = None;
    let mut url = None;
    for line in reply.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let line = strip_markup(line);
        if title.is_none() {
            title = strip_label(line, "title").map(field_value).filter(|v| !v.is_empty());
        }
        if url.is_none() {
            url = strip_label(line, "url").map(field_value).filter(|v| !v.is_empty());
        }
    }
    Some((title?.to_string(), url?.to_string()))
}

fn strip_markup(line: &str) -> &str {
    line.trim_start_matches(|c| matches!(c, '*' | '-' | '#' | '>' | ' '))
}

/// Case-insensitive `label:` prefix removal.
fn strip_label<'a>(line: &'a str, label: &str) -> Option<&'a str> {
    let head = line.get(..label.len())?;
    if !head.eq_ignore_ascii_case(label) {
        return None;
    }
    line[label.len()..]
        .trim_start_matches('*')
        .strip_prefix(':')
}

fn field_value(raw: &str) -> &str {
    raw.trim()
        .trim_matches(|c: char| {
            matches!(c, '*' | '[' | ']' | '<' | '>' | '"' | '`') || c.is_whitespace()
        })
}
