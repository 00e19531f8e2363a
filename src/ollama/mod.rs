//! Client for a local Ollama server: health check, one-shot chat, and streamed chat.

pub mod client;
mod stream;
mod types;

pub use client::{ChatClient, OllamaClient, OllamaError};
pub use stream::TokenStream;
