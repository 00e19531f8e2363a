mod app;
mod config;
mod console;
mod fetch;
mod history;
mod ollama;
mod pipeline;
mod search;

/// Public SearxNG instances and some sites reject non-browser agents.
pub const USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0 Safari/537.36";

use std::process::ExitCode;

use clap::Parser;

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ollama_web_search=warn".parse()?),
        )
        .init();

    app::run(app::Args::parse()).await
}
