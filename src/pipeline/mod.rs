//! Question answering: query generation, search, result selection, page
//! retrieval, and the streamed final answer.

mod parse;
mod prompts;

use std::time::Duration;

use chrono::{Datelike, Local};
use futures::StreamExt;
use tracing::{debug, info, warn};

use crate::console::Console;
use crate::fetch::{FetchError, Page, PageOrigin, PageReader};
use crate::history::{History, HistoryEntry, SelectedResult};
use crate::ollama::{ChatClient, OllamaError};
use crate::search::{InstanceFailure, SearchBackend, SearchError, SearchHit};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Failed to generate search query: {0}")]
    QueryGeneration(OllamaError),

    #[error("Failed to generate search query: the model returned an empty query")]
    EmptyQuery,

    #[error("No search results found: {0}")]
    Search(#[from] SearchError),

    #[error("Could not select a result: {0}")]
    Selection(OllamaError),

    #[error("Could not select a result")]
    NoSelection,

    #[error("Could not retrieve page content: {0}")]
    Content(#[from] FetchError),

    #[error("Error during streaming: {0}")]
    Answer(OllamaError),
}

#[derive(Debug)]
pub struct Outcome {
    pub query: String,
    pub selection: SelectedResult,
    pub origin: PageOrigin,
    pub answer: String,
}

pub struct Pipeline<C, S, R> {
    chat: C,
    search: S,
    reader: R,
    console: Console,
    streaming_delay: Duration,
}

impl<C, S, R> Pipeline<C, S, R>
where
    C: ChatClient,
    S: SearchBackend,
    R: PageReader,
{
    pub fn new(chat: C, search: S, reader: R, console: Console, streaming_delay: Duration) -> Self {
        Self {
            chat,
            search,
            reader,
            console,
            streaming_delay,
        }
    }

    /// Answer one question end to end. History is written once page content
    /// is in hand, before the answer streams.
    pub async fn run(
        &self,
        question: &str,
        history: &mut History,
    ) -> Result<Outcome, PipelineError> {
        info!(%question, "answering question");

        let query = self.generate_search_query(question).await?;
        self.console.search_query(&query);

        let hits = self.browse_web(&query).await?;
        let selection = self.select_best_result(question, &query, &hits).await?;
        self.console.selected(&selection.title, &selection.url);

        let page = self.retrieve_page(&selection.url).await?;

        if let Err(e) = history.record(HistoryEntry::now(question, &query, selection.clone())) {
            warn!(error = %e, "failed to save history");
            self.console.warn(&format!("Could not save history: {e}"));
        }

        let answer = self
            .generate_final_answer(question, &query, &selection.title, &page.content)
            .await?;

        Ok(Outcome {
            query,
            selection,
            origin: page.origin,
            answer,
        })
    }

    pub async fn generate_search_query(&self, question: &str) -> Result<String, PipelineError> {
        self.console.step("🧠 Optimizing search query...");
        let prompt = prompts::search_query_prompt(question, Local::now().year());
        let reply = self
            .chat
            .chat(&prompt)
            .await
            .map_err(PipelineError::QueryGeneration)?;
        parse::clean_query(&reply).ok_or(PipelineError::EmptyQuery)
    }

    async fn browse_web(&self, query: &str) -> Result<Vec<SearchHit>, PipelineError> {
        self.console.searching(query);
        match self.search.search(query).await {
            Ok(outcome) => {
                debug!(
                    instance = %outcome.instance,
                    skipped = outcome.failures.len(),
                    "using search results"
                );
                for line in skipped_instance_lines(&outcome.failures) {
                    self.console.warn(&line);
                }
                self.console
                    .success(&format!("✅ Found {} results", outcome.hits.len()));
                Ok(outcome.hits)
            }
            Err(e) => {
                if let SearchError::Exhausted(failures) = &e {
                    for failure in failures {
                        self.console.warn(&format!(
                            "Search instance {} failed ({})",
                            failure.instance, failure.reason
                        ));
                    }
                }
                self.console.error("All search instances failed");
                Err(e.into())
            }
        }
    }

    pub async fn select_best_result(
        &self,
        question: &str,
        query: &str,
        hits: &[SearchHit],
    ) -> Result<SelectedResult, PipelineError> {
        let first = hits.first().ok_or(PipelineError::NoSelection)?;

        self.console.step("🎯 AI is selecting the best result...");
        let prompt = prompts::selection_prompt(question, query, hits);
        let reply = self
            .chat
            .chat(&prompt)
            .await
            .map_err(PipelineError::Selection)?;

        if let Some((title, url)) = parse::parse_selection(&reply) {
            return Ok(SelectedResult { title, url });
        }

        warn!(reply = %reply, "could not parse result selection");
        self.console
            .warn("Could not parse the model's choice, using the top result");
        Ok(SelectedResult {
            title: first.title.clone().unwrap_or_else(|| "Unknown".to_string()),
            url: first.url.clone(),
        })
    }

    async fn retrieve_page(&self, url: &str) -> Result<Page, PipelineError> {
        self.console.step("📄 Extracting content from webpage...");
        let page = self.reader.read(url).await?;
        debug!(
            url = %page.url,
            title = ?page.title,
            origin = ?page.origin,
            chars = page.content.len(),
            "page retrieved"
        );
        if page.origin == PageOrigin::Direct {
            self.console
                .warn("Content API unavailable, extracted the page directly");
        }
        Ok(page)
    }

    pub async fn generate_final_answer(
        &self,
        question: &str,
        query: &str,
        title: &str,
        content: &str,
    ) -> Result<String, PipelineError> {
        let prompt = prompts::answer_prompt(question, query, title, content);

        self.console.answer_start();
        let result = self.stream_answer(&prompt).await;
        self.console.answer_end();
        result
    }

    async fn stream_answer(&self, prompt: &str) -> Result<String, PipelineError> {
        let mut tokens = self
            .chat
            .chat_stream(prompt)
            .await
            .map_err(PipelineError::Answer)?;

        let mut answer = String::new();
        while let Some(token) = tokens.next().await {
            let text = token.map_err(PipelineError::Answer)?;
            self.console.token(&text);
            answer.push_str(&text);
            if !self.streaming_delay.is_zero() {
                tokio::time::sleep(self.streaming_delay).await;
            }
        }
        Ok(answer)
    }
}

/// Warning lines for instances skipped before the one that answered.
fn skipped_instance_lines(failures: &[InstanceFailure]) -> Vec<String> {
    failures
        .iter()
        .map(|f| format!("Search instance {} failed ({}), skipped", f.instance, f.reason))
        .collect()
}
