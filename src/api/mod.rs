//! Wire types for the OpenAI-compatible chat completions API

mod openai;

pub use openai::*;
