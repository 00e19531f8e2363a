use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};
use url::Url;

use super::{InstanceFailure, SearchBackend, SearchError, SearchHit, SearchOutcome};

#[derive(Debug, Deserialize)]
struct SearxResponse {
    #[serde(default)]
    results: Vec<SearxResult>,
}

#[derive(Debug, Deserialize)]
struct SearxResult {
    title: Option<String>,
    url: Option<String>,
    content: Option<String>,
}

#[derive(Debug, thiserror::Error)]
enum InstanceError {
    #[error("invalid instance URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("status {0}")]
    Status(u16),

    #[error("invalid JSON: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("no results")]
    Empty,
}

/// Queries SearxNG instances in order until one returns results.
#[derive(Clone)]
pub struct SearxClient {
    http: Client,
    instances: Vec<String>,
    max_results: usize,
    timeout: Duration,
}

impl SearxClient {
    pub fn new(
        http: Client,
        instances: Vec<String>,
        max_results: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            http,
            instances,
            max_results: max_results.max(1),
            timeout,
        }
    }

    async fn query_instance(
        &self,
        instance: &str,
        query: &str,
    ) -> Result<Vec<SearchHit>, InstanceError> {
        let url = search_url(instance, query)?;

        let response = self
            .http
            .get(url)
            .header("Accept", "application/json")
            .header("User-Agent", crate::USER_AGENT)
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(InstanceError::Status(status.as_u16()));
        }

        let text = response.text().await?;
        let body: SearxResponse = serde_json::from_str(&text)?;

        let hits: Vec<SearchHit> = body
            .results
            .into_iter()
            .filter_map(|r| {
                let url = r.url.filter(|u| !u.trim().is_empty())?;
                Some(SearchHit {
                    title: r.title.filter(|t| !t.trim().is_empty()),
                    url,
                    content: r.content.filter(|c| !c.trim().is_empty()),
                })
            })
            .take(self.max_results)
            .collect();

        if hits.is_empty() {
            return Err(InstanceError::Empty);
        }
        Ok(hits)
    }
}

impl SearchBackend for SearxClient {
    async fn search(&self, query: &str) -> Result<SearchOutcome, SearchError> {
        if self.instances.is_empty() {
            return Err(SearchError::NoInstances);
        }

        let mut failures = Vec::new();
        for instance in &self.instances {
            match self.query_instance(instance, query).await {
                Ok(hits) => {
                    info!(%instance, hits = hits.len(), "search succeeded");
                    return Ok(SearchOutcome {
                        hits,
                        instance: instance.clone(),
                        failures,
                    });
                }
                Err(e) => {
                    warn!(%instance, error = %e, "search instance failed");
                    failures.push(InstanceFailure {
                        instance: instance.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        debug!(tried = failures.len(), "all search instances failed");
        Err(SearchError::Exhausted(failures))
    }
}

fn search_url(instance: &str, query: &str) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(instance)?;
    url.query_pairs_mut()
        .append_pair("q", query)
        .append_pair("format", "json")
        .append_pair("categories", "general");
    Ok(url)
}


#[cfg(test)]
mod http_tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn results_json(n: usize) -> serde_json::Value {
        let results: Vec<_> = (1..=n)
            .map(|i| {
                serde_json::json!({
                    "title": format!("Result {i}"),
                    "url": format!("https://site{i}.example/page"),
                    "content": format!("Snippet {i}")
                })
            })
            .collect();
        serde_json::json!({ "query": "q", "results": results })
    }

    fn client(instances: Vec<String>, max_results: usize) -> SearxClient {
        SearxClient::new(Client::new(), instances, max_results, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn first_healthy_instance_wins() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("q", "rust ownership"))
            .and(query_param("format", "json"))
            .and(query_param("categories", "general"))
            .respond_with(ResponseTemplate::new(200).set_body_json(results_json(3)))
            .mount(&server)
            .await;

        let searx = client(vec![format!("{}/search", server.uri())], 8);
        let outcome = searx.search("rust ownership").await.unwrap();

        assert_eq!(outcome.hits.len(), 3);
        assert_eq!(outcome.hits[0].title.as_deref(), Some("Result 1"));
        assert_eq!(outcome.hits[0].url, "https://site1.example/page");
        assert!(outcome.failures.is_empty());
    }

    #[tokio::test]
    async fn falls_back_past_broken_and_empty_instances() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/down/search"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/empty/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(results_json(0)))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/html/search"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>captcha</html>"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/good/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(results_json(2)))
            .mount(&server)
            .await;

        let base = server.uri();
        let searx = client(
            vec![
                format!("{base}/down/search"),
                format!("{base}/empty/search"),
                format!("{base}/html/search"),
                format!("{base}/good/search"),
            ],
            8,
        );
        let outcome = searx.search("anything").await.unwrap();

        assert_eq!(outcome.hits.len(), 2);
        assert_eq!(outcome.instance, format!("{base}/good/search"));
        assert_eq!(outcome.failures.len(), 3);
        assert!(outcome.failures[0].reason.contains("503"));
        assert!(outcome.failures[1].reason.contains("no results"));
        assert!(outcome.failures[2].reason.contains("JSON"));
    }

    #[tokio::test]
    async fn truncates_to_max_results() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(results_json(12)))
            .mount(&server)
            .await;

        let searx = client(vec![format!("{}/search", server.uri())], 8);
        let outcome = searx.search("q").await.unwrap();
        assert_eq!(outcome.hits.len(), 8);
    }

    #[tokio::test]
    async fn drops_results_without_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [
                    {"title": "No link"},
                    {"title": "", "url": "https://kept.example"}
                ]
            })))
            .mount(&server)
            .await;

        let searx = client(vec![format!("{}/search", server.uri())], 8);
        let outcome = searx.search("q").await.unwrap();
        assert_eq!(outcome.hits.len(), 1);
        assert_eq!(outcome.hits[0].url, "https://kept.example");
        assert!(outcome.hits[0].title.is_none());
    }

    #[tokio::test]
    async fn all_instances_failing_is_exhausted() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let base = server.uri();
        let searx = client(vec![format!("{base}/a"), format!("{base}/b")], 8);
        let err = searx.search("q").await.unwrap_err();
        match err {
            SearchError::Exhausted(failures) => assert_eq!(failures.len(), 2),
            other => panic!("expected Exhausted, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn no_instances_configured() {
        let searx = client(vec![], 8);
        assert!(matches!(
            searx.search("q").await,
            Err(SearchError::NoInstances)
        ));
    }
}
