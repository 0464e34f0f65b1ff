//! OpenAI-compatible LLM backend client

mod client;

pub use client::ChatClient;
