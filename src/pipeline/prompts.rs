use std::fmt::Write;

use crate::search::SearchHit;

const SNIPPET_CHARS: usize = 200;

pub(super) fn search_query_prompt(question: &str, year: i32) -> String {
    format!(
        r#"You are an expert at creating precise web search queries. Convert the user's question into an optimal search query that will find the most relevant results.

Guidelines:
- Use specific keywords and terms
- Remove unnecessary words like "what", "how", "can you"
- Include important context
- Keep it concise but comprehensive
- Reply with the query only

Examples:
Question: "What is the capital of France?"
Query: capital France

Question: "How do I install Docker on Ubuntu?"
Query: install Docker Ubuntu tutorial

Question: "What are the latest developments in AI?"
Query: latest AI developments {year}

User's question: {question}"#
    )
}

pub(super) fn selection_prompt(question: &str, query: &str, hits: &[SearchHit]) -> String {
    format!(
        r#"You are an expert at evaluating search results. Based on the original question, select the MOST RELEVANT result.

Original Question: {question}
Search Query: {query}

Search Results:
{}

Respond with ONLY the title and URL in this exact format:
Title: [exact title from results]
URL: [exact URL from results]"#,
        format_hits(hits)
    )
}

pub(super) fn answer_prompt(question: &str, query: &str, title: &str, content: &str) -> String {
    format!(
        r#"You are a knowledgeable assistant providing accurate information based on web content.

Original Question: {question}
Search Query: {query}
Source: {title}

Retrieved Content:
{content}

Instructions:
- Provide a comprehensive but concise answer to the user's question
- Use information from the retrieved content
- Cite specific details when relevant
- If the content doesn't fully answer the question, mention what information is available
- Format your response clearly with bullet points or sections when appropriate
- Be helpful and informative"#
    )
}

fn format_hits(hits: &[SearchHit]) -> String {
    let mut out = String::new();
    for (i, hit) in hits.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let snippet: String = hit
            .content
            .as_deref()
            .unwrap_or("No description")
            .chars()
            .take(SNIPPET_CHARS)
            .collect();
        let _ = write!(
            out,
            "{}. {} - {}\n   {snippet}...",
            i + 1,
            hit.title.as_deref().unwrap_or("No title"),
            if hit.url.is_empty() { "No URL" } else { &hit.url },
        );
    }
    out
}
