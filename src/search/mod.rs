//! Web search across a list of fallback SearxNG instances.

mod searxng;

pub use searxng::SearxClient;

#[derive(Debug, Clone)]
pub struct SearchHit {
    pub title: Option<String>,
    pub url: String,
    /// Snippet shown by the search engine.
    pub content: Option<String>,
}

#[derive(Debug, Clone)]
pub struct InstanceFailure {
    pub instance: String,
    pub reason: String,
}

#[derive(Debug)]
pub struct SearchOutcome {
    pub hits: Vec<SearchHit>,
    /// Instance that produced `hits`.
    pub instance: String,
    /// Instances tried and skipped before `instance`.
    pub failures: Vec<InstanceFailure>,
}

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("no search instances configured")]
    NoInstances,

    #[error("all {} search instances failed", .0.len())]
    Exhausted(Vec<InstanceFailure>),
}

/// Implemented by `SearxClient`; mocked in pipeline tests.
pub trait SearchBackend {
    async fn search(&self, query: &str) -> Result<SearchOutcome, SearchError>;
}
