//! Runtime configuration: built-in defaults overlaid by an optional JSON file.

use std::env;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

pub const DEFAULT_CONFIG_FILE: &str = "config.json";

const DEFAULT_MODEL: &str = "llama3";
const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";
const DEFAULT_READER_URL: &str = "https://r.jina.ai/";
const MIN_TIMEOUT_SECS: f64 = 1.0;
const MAX_TIMEOUT_SECS: f64 = 600.0;
const MAX_STREAMING_DELAY_SECS: f64 = 1.0;
const DEFAULT_INSTANCES: &[&str] = &[
    "https://search.inetol.net/search",
    "https://searx.be/search",
    "https://search.brave4u.com/search",
    "https://priv.au/search",
];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Parse(#[from] serde_json::Error),
}

/// Every key is optional in the file; missing keys keep their default.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub model: String,
    pub searxng_instances: Vec<String>,
    pub max_results: usize,
    /// Seconds allowed for each search or page request. Fractions allowed.
    pub timeout: f64,
    pub max_retries: u32,
    pub history_file: String,
    pub enable_colors: bool,
    /// Seconds to pause after each streamed token.
    pub streaming_delay: f64,
    pub ollama_url: String,
    pub reader_url: String,
    pub max_content_chars: usize,
    pub history_limit: usize,
    /// Download and extract the page locally when the reader API fails.
    pub local_fallback: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            searxng_instances: DEFAULT_INSTANCES.iter().map(|s| s.to_string()).collect(),
            max_results: 8,
            timeout: 10.0,
            max_retries: 3,
            history_file: "search_history.json".to_string(),
            enable_colors: true,
            streaming_delay: 0.02,
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            reader_url: DEFAULT_READER_URL.to_string(),
            max_content_chars: 10_000,
            history_limit: 50,
            local_fallback: true,
        }
    }
}

impl Config {
    /// Load `path` over the defaults. A missing file is not an error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&text)?;
        debug!(path = %path.display(), "config loaded");
        Ok(config.normalized())
    }

    /// Apply `OLLAMA_HOST`, the same variable the Ollama CLI honors.
    pub fn apply_env(&mut self) {
        if let Some(host) = env::var("OLLAMA_HOST")
            .ok()
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty())
        {
            self.ollama_url = normalize_host(&host);
        }
    }

    pub fn normalized(mut self) -> Self {
        self.max_results = self.max_results.max(1);
        self.timeout = if self.timeout.is_finite() {
            self.timeout.clamp(MIN_TIMEOUT_SECS, MAX_TIMEOUT_SECS)
        } else {
            MAX_TIMEOUT_SECS
        };
        self.max_retries = self.max_retries.max(1);
        self.history_limit = self.history_limit.max(1);
        self.streaming_delay = if self.streaming_delay.is_finite() {
            self.streaming_delay.clamp(0.0, MAX_STREAMING_DELAY_SECS)
        } else {
            0.0
        };
        self
    }

    /// Falls back to the upper bound when the value cannot be a `Duration`.
    pub fn request_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeout)
            .unwrap_or(Duration::from_secs_f64(MAX_TIMEOUT_SECS))
    }

    /// Falls back to no delay when the value cannot be a `Duration`.
    pub fn streaming_delay(&self) -> Duration {
        Duration::try_from_secs_f64(self.streaming_delay).unwrap_or(Duration::ZERO)
    }
}

fn normalize_host(host: &str) -> String {
    let with_scheme = if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("http://{host}")
    };
    with_scheme.trim_end_matches('/').to_string()
}
