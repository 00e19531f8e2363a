//! Terminal presentation. All user-facing stdout output goes through here;
//! diagnostics go to stderr via `tracing`.

use std::io::{self, Write};

use colored::Colorize;

use crate::config::Config;
use crate::history::{DISPLAY_COUNT, History};

const RULE_WIDTH: usize = 60;
const TABLE_WIDTH: usize = 50;

#[derive(Clone, Copy)]
pub struct Console;

impl Console {
    /// `colors = false` strips ANSI codes from everything printed afterwards.
    pub fn new(colors: bool) -> Self {
        colored::control::set_override(colors);
        Self
    }

    pub fn banner(&self) {
        let frame = "═".repeat(62);
        println!();
        println!("{}", format!("╔{frame}╗").cyan());
        println!("{}", format!("║{:^62}║", "🔍 OLLAMA WEB SEARCH 🔍").cyan());
        println!("{}", format!("║{:^62}║", "Intelligent Information Retrieval").cyan());
        println!("{}", format!("╚{frame}╝").cyan());
        println!();
        println!("{}", "✨ Features:".yellow());
        println!("• 🧠 AI-powered query optimization");
        println!("• 🌐 Multiple search engine fallbacks");
        println!("• 📄 Smart content extraction");
        println!("• 💾 Search history tracking");
        println!();
    }

    pub fn notice(&self, message: &str) {
        println!("{}", message.cyan());
    }

    pub fn step(&self, message: &str) {
        println!("{}", message.blue());
    }

    pub fn success(&self, message: &str) {
        println!("{}", message.green());
    }

    pub fn warn(&self, message: &str) {
        println!("{}", format!("⚠️  {message}").yellow());
    }

    pub fn error(&self, message: &str) {
        println!("{}", format!("❌ {message}").red());
    }

    pub fn hint(&self, message: &str) {
        println!("{}", format!("💡 {message}").yellow());
    }

    pub fn goodbye(&self, message: &str) {
        println!("{}", format!("👋 {message}").yellow());
    }

    pub fn connected(&self, model: &str) {
        self.success("✅ Ollama connection successful");
        println!("{} {}", "🤖 Using model:".blue(), model.bold().blue());
    }

    pub fn searching(&self, query: &str) {
        println!("{} {}", "🔍 Searching the web for:".blue(), query.bold().blue());
    }

    pub fn search_query(&self, query: &str) {
        println!("{} {}", "🔍 Search Query:".green(), query.bold().green());
    }

    pub fn selected(&self, title: &str, url: &str) {
        println!();
        println!("{} {}", "📌 Selected:".green(), title.bold().green());
        println!("{}", format!("🔗 URL: {url}").blue());
    }

    pub fn prompt(&self) {
        println!();
        println!("{}", "💭 What would you like to know?".cyan());
        println!(
            "{}",
            "(Type 'history' to see recent searches, 'config' to see settings, 'quit' to exit)"
                .white()
        );
        print!("{}", "❓ Your question: ".green());
        let _ = io::stdout().flush();
    }

    pub fn answer_start(&self) {
        println!();
        println!("{}", "=".repeat(RULE_WIDTH).purple());
        print!("{} ", "🤖 Assistant:".green());
        let _ = io::stdout().flush();
    }

    pub fn token(&self, text: &str) {
        print!("{text}");
        let _ = io::stdout().flush();
    }

    pub fn answer_end(&self) {
        println!();
        println!("{}", "=".repeat(RULE_WIDTH).purple());
    }

    pub fn show_config(&self, config: &Config) {
        println!();
        println!("{}", "⚙️  Current Configuration:".cyan());
        println!("{}", "═".repeat(TABLE_WIDTH));
        for (label, value) in config_rows(config) {
            println!("{} {value}", format!("{label}:").blue());
        }
        println!("{}", "═".repeat(TABLE_WIDTH));
    }

    pub fn show_history(&self, history: &History) {
        if history.is_empty() {
            println!("{}", "📝 No search history found".yellow());
            return;
        }
        println!();
        println!("{}", "📚 Recent Search History:".cyan());
        println!("{}", "═".repeat(RULE_WIDTH));
        for (i, entry) in history.recent(DISPLAY_COUNT).iter().enumerate() {
            println!("{} {}", format!("{:2}.", i + 1).purple(), entry.summary());
        }
    }
}

fn config_rows(config: &Config) -> Vec<(&'static str, String)> {
    vec![
        ("Model", config.model.clone()),
        ("Ollama URL", config.ollama_url.clone()),
        ("Max Results", config.max_results.to_string()),
        ("Timeout", format!("{}s", config.timeout)),
        (
            "Search Engines",
            format!("{} instances", config.searxng_instances.len()),
        ),
        ("History File", config.history_file.clone()),
        ("Colors Enabled", config.enable_colors.to_string()),
    ]
}
