//! Chain abstraction and token event plumbing
//!
//! A [`Chain`] is anything that turns a map of inputs into a map of outputs
//! while pushing incremental tokens through an [`EventSink`]. The response
//! layer runs chains through [`chain_event_stream`], which is the single
//! place where chain failures are translated into wire-safe error events.

mod llm_chain;
mod memory;
mod prompt;

pub use llm_chain::{ConversationChain, LlmChain};
pub use memory::ConversationMemory;
pub use prompt::PromptTemplate;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::error::Error;

/// Named inputs passed to a chain execution
pub type ChainInputs = HashMap<String, serde_json::Value>;

/// Named outputs produced by a chain execution
pub type ChainOutputs = HashMap<String, serde_json::Value>;

/// Channel depth between a running chain and its response stream
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// An executable chain
#[async_trait]
pub trait Chain: Send + Sync + 'static {
    /// Stable name, used in logs and cache keys
    fn name(&self) -> &str;

    /// Input keys this chain requires
    fn input_keys(&self) -> Vec<String>;

    /// Key under which the primary text output is stored
    fn output_key(&self) -> &str {
        "text"
    }

    /// Run the chain, pushing incremental tokens into `sink`
    async fn execute(&self, inputs: &ChainInputs, sink: &EventSink)
        -> Result<ChainOutputs, Error>;

    /// Check that all declared input keys are present
    fn validate_inputs(&self, inputs: &ChainInputs) -> Result<(), Error> {
        for key in self.input_keys() {
            if !inputs.contains_key(&key) {
                return Err(Error::MissingInput(key));
            }
        }
        Ok(())
    }
}

/// Event emitted during a chain execution
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Incremental token text
    Token(String),
    /// Successful completion with the chain outputs
    End { outputs: ChainOutputs },
    /// Execution failure; `detail` is already wire-safe
    Error { status_code: u16, detail: String },
}

/// Handle a chain pushes tokens through
///
/// A disabled sink (non-streaming execution) accepts and drops tokens, so
/// chain implementations do not branch on the response mode.
#[derive(Clone)]
pub struct EventSink {
    tx: Option<mpsc::Sender<StreamEvent>>,
}

impl EventSink {
    fn new(tx: mpsc::Sender<StreamEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    /// Sink that drops all tokens
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Push one token. Returns false once the receiving side is gone
    /// (client disconnect), signalling the chain to stop generating.
    pub async fn token(&self, token: &str) -> bool {
        match &self.tx {
            Some(tx) => tx
                .send(StreamEvent::Token(token.to_string()))
                .await
                .is_ok(),
            None => true,
        }
    }
}

/// Extract a required string input
pub fn input_str<'a>(inputs: &'a ChainInputs, key: &str) -> Result<&'a str, Error> {
    inputs
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::MissingInput(key.to_string()))
}

/// Run a chain on the runtime and expose its events as a stream
///
/// The returned stream yields zero or more `Token` events followed by exactly
/// one terminal event: `End` on success, `Error` on failure. The real error is
/// logged here; only a generic detail crosses the wire.
pub fn chain_event_stream(
    chain: Arc<dyn Chain>,
    inputs: ChainInputs,
) -> ReceiverStream<StreamEvent> {
    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

    tokio::spawn(async move {
        let sink = EventSink::new(tx.clone());
        match chain.execute(&inputs, &sink).await {
            Ok(outputs) => {
                if tx.send(StreamEvent::End { outputs }).await.is_err() {
                    tracing::debug!(chain = chain.name(), "client disconnected before end event");
                }
            }
            Err(e) => {
                tracing::error!(chain = chain.name(), error = %e, "chain execution error");
                let _ = tx
                    .send(StreamEvent::Error {
                        status_code: 500,
                        detail: "Internal Server Error".to_string(),
                    })
                    .await;
            }
        }
    });

    ReceiverStream::new(rx)
}
