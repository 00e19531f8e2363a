//! Command-line entry: startup checks, single-query mode, and the
//! interactive prompt loop.

mod args;
mod commands;

pub use args::Args;

use std::borrow::Cow;
use std::io::BufRead;
use std::process::ExitCode;
use std::time::Duration;

use reqwest::Client;
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::console::Console;
use crate::fetch::ContentFetcher;
use crate::history::History;
use crate::ollama::OllamaClient;
use crate::pipeline::{Pipeline, PipelineError};
use crate::search::SearxClient;
use commands::Command;

/// TCP connection establishment timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Maximum redirect hops before aborting.
const MAX_REDIRECTS: usize = 5;

pub async fn run(args: Args) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let (mut config, load_error) = match Config::load(&args.config_file) {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };
    config.apply_env();
    if let Some(model) = args.model {
        config.model = model;
    }

    let console = Console::new(config.enable_colors);
    if let Some(e) = load_error {
        warn!(path = %args.config_file.display(), error = %e, "config not loaded");
        console.warn(&format!(
            "Could not load {}, using defaults: {e}",
            args.config_file.display()
        ));
    }

    let mut app = App::new(config, console)?;

    if args.history {
        app.show_history();
        return Ok(ExitCode::SUCCESS);
    }
    if args.config {
        app.show_config();
        return Ok(ExitCode::SUCCESS);
    }

    console.banner();
    if !app.check_ollama().await {
        return Ok(ExitCode::FAILURE);
    }

    match args.query {
        Some(question) => Ok(app.single_query(&question).await),
        None => {
            app.interactive().await;
            Ok(ExitCode::SUCCESS)
        }
    }
}

enum Turn {
    Done,
    Interrupted,
}

struct App {
    config: Config,
    console: Console,
    ollama: OllamaClient,
    history: History,
    pipeline: Pipeline<OllamaClient, SearxClient, ContentFetcher>,
}

impl App {
    fn new(config: Config, console: Console) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()?;

        let ollama = OllamaClient::new(
            http.clone(),
            &config.ollama_url,
            &config.model,
            config.max_retries,
        );
        let search = SearxClient::new(
            http.clone(),
            config.searxng_instances.clone(),
            config.max_results,
            config.request_timeout(),
        );
        let reader = ContentFetcher::new(
            http,
            &config.reader_url,
            config.request_timeout(),
            config.max_content_chars,
            config.local_fallback,
        );
        let pipeline = Pipeline::new(
            ollama.clone(),
            search,
            reader,
            console,
            config.streaming_delay(),
        );
        let history = History::load(&config.history_file, config.history_limit);

        Ok(Self {
            config,
            console,
            ollama,
            history,
            pipeline,
        })
    }

    fn show_history(&self) {
        self.console.show_history(&self.history);
    }

    fn show_config(&self) {
        self.console.show_config(&self.config);
    }

    /// Confirms the server answers before any question is asked.
    async fn check_ollama(&self) -> bool {
        let models = match self.ollama.list_models().await {
            Ok(models) => models,
            Err(e) => {
                error!(url = %self.config.ollama_url, error = %e, "Ollama health check failed");
                self.console.error(&format!("Cannot connect to Ollama: {e}"));
                self.console.hint("Make sure Ollama is running: ollama serve");
                return false;
            }
        };

        self.console.connected(self.ollama.model());
        if !has_model(&models, self.ollama.model()) {
            warn!(model = %self.ollama.model(), available = models.len(), "model not installed");
            self.console.warn(&format!(
                "Model '{0}' is not installed. Pull it with: ollama pull {0}",
                self.ollama.model()
            ));
        }
        true
    }

    async fn single_query(&mut self, question: &str) -> ExitCode {
        self.console.notice(&format!("🔍 Single query mode: {question}"));
        match self.ask(question).await {
            Ok(Turn::Done) => ExitCode::SUCCESS,
            Ok(Turn::Interrupted) => ExitCode::from(130),
            Err(e) => {
                self.report(&e);
                ExitCode::FAILURE
            }
        }
    }

    async fn interactive(&mut self) {
        let mut lines = spawn_line_reader();
        loop {
            self.console.prompt();
            let line = tokio::select! {
                line = lines.recv() => line,
                _ = signal::ctrl_c() => {
                    println!();
                    self.console.goodbye("Goodbye!");
                    return;
                }
            };
            let Some(line) = line else {
                println!();
                self.console.goodbye("Thank you for using Ollama Web Search!");
                return;
            };

            match commands::parse(&line) {
                Command::Empty => continue,
                Command::Quit => {
                    self.console.goodbye("Thank you for using Ollama Web Search!");
                    return;
                }
                Command::History => self.show_history(),
                Command::Config => self.show_config(),
                Command::Ask(question) => match self.ask(question).await {
                    Ok(Turn::Done) => {}
                    Ok(Turn::Interrupted) => return,
                    Err(e) => self.report(&e),
                },
            }
        }
    }

    /// Runs the pipeline once; Ctrl-C abandons the run.
    async fn ask(&mut self, question: &str) -> Result<Turn, PipelineError> {
        let finished = tokio::select! {
            result = self.pipeline.run(question, &mut self.history) => Some(result),
            _ = signal::ctrl_c() => None,
        };
        match finished {
            Some(result) => result.map(|outcome| {
                info!(
                    query = %outcome.query,
                    url = %outcome.selection.url,
                    origin = ?outcome.origin,
                    chars = outcome.answer.len(),
                    "question answered"
                );
                Turn::Done
            }),
            None => {
                info!("run interrupted");
                println!();
                self.console.goodbye("Goodbye!");
                Ok(Turn::Interrupted)
            }
        }
    }

    fn report(&self, e: &PipelineError) {
        debug!(error = ?e, "question not answered");
        self.console.error(&e.to_string());
    }
}

/// Installed models carry a tag; a bare name matches `:latest`.
fn has_model(installed: &[String], model: &str) -> bool {
    installed
        .iter()
        .any(|name| name == model || name.strip_suffix(":latest") == Some(model))
}

/// Stdin lines from a detached thread; a pending read never holds up exit.
fn spawn_line_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(1);
    std::thread::spawn(move || forward_lines(std::io::stdin().lock(), tx));
    rx
}

/// Sends each input line until EOF or a read error. Invalid UTF-8 is
/// replaced, not treated as end of input.
fn forward_lines(mut input: impl BufRead, tx: mpsc::Sender<String>) {
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match input.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "failed to read from stdin");
                break;
            }
        }

        let raw = buf.strip_suffix(b"\n").unwrap_or(&buf[..]);
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
        let line = String::from_utf8_lossy(raw);
        if let Cow::Owned(_) = line {
            warn!("input line is not valid UTF-8, replacing invalid bytes");
        }
        if tx.blocking_send(line.into_owned()).is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_matching_accepts_latest_tag() {
        let installed = vec!["llama3:latest".to_string(), "mistral:7b".to_string()];
        assert!(has_model(&installed, "llama3"));
        assert!(has_model(&installed, "llama3:latest"));
        assert!(has_model(&installed, "mistral:7b"));
        assert!(!has_model(&installed, "mistral"));
        assert!(!has_model(&[], "llama3"));
    }

    #[test]
    fn invalid_utf8_line_does_not_end_input() {
        let input = std::io::Cursor::new(b"first\r\nbad \xff byte\nlast".to_vec());
        let (tx, mut rx) = mpsc::channel(8);
        forward_lines(input, tx);

        let mut lines = Vec::new();
        while let Ok(line) = rx.try_recv() {
            lines.push(line);
        }
        assert_eq!(lines, vec!["first", "bad \u{FFFD} byte", "last"]);
    }

    #[tokio::test]
    async fn health_check_fails_without_server() {
        let config = Config {
            ollama_url: "http://127.0.0.1:9".into(),
            history_file: std::env::temp_dir()
                .join(format!("ows-app-{}.json", fastrand::u64(..)))
                .display()
                .to_string(),
            ..Config::default()
        };
        let app = App::new(config, Console::new(false)).unwrap();
        assert!(!app.check_ollama().await);
    }
}
