use std::path::PathBuf;

use clap::Parser;

use crate::config::DEFAULT_CONFIG_FILE;

/// Ask questions in plain language; answers come from a local Ollama model
/// reading the most relevant web page.
#[derive(Parser, Debug)]
#[command(name = "ollama-web-search", version, about)]
pub struct Args {
    /// Ollama model to use (overrides the config file)
    #[arg(long, value_name = "MODEL")]
    pub model: Option<String>,

    /// Answer a single question instead of starting interactive mode
    #[arg(long, value_name = "QUESTION")]
    pub query: Option<String>,

    /// Show search history and exit
    #[arg(long)]
    pub history: bool,

    /// Show current configuration and exit
    #[arg(long)]
    pub config: bool,

    /// Path to the JSON configuration file
    #[arg(long, value_name = "PATH", default_value = DEFAULT_CONFIG_FILE)]
    pub config_file: PathBuf,
}
