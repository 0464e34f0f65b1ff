//! streamchain: serve LLM chains over HTTP
//!
//! Features:
//! - Chain abstraction over OpenAI-compatible chat backends
//! - SSE token streaming (raw text or JSON events) and plain JSON responses
//! - WebSocket chat sessions
//! - Optional response caching with token-stream replay

pub mod api;
pub mod cache;
pub mod chain;
pub mod config;
pub mod error;
pub mod llm;
pub mod responses;
pub mod routing;

pub use cache::ResponseCache;
pub use chain::{Chain, ChainInputs, ChainOutputs, EventSink, StreamEvent};
pub use config::{AppConfig, StreamingMode};
pub use error::Error;
pub use llm::ChatClient;
pub use responses::StreamingResponse;
pub use routing::{run_server, ChainRouter};
