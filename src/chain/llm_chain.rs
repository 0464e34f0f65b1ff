//! Chains backed by an OpenAI-compatible chat backend

use async_trait::async_trait;
use futures::StreamExt;

use crate::api::Message;
use crate::chain::{input_str, Chain, ChainInputs, ChainOutputs, EventSink};
use crate::chain::{ConversationMemory, PromptTemplate};
use crate::error::Error;
use crate::llm::ChatClient;

/// Stream one completion into the sink, returning the accumulated text
///
/// Generation stops early when the sink reports the client is gone; the text
/// collected so far is returned so callers can still record it.
async fn stream_to_sink(
    client: &ChatClient,
    messages: Vec<Message>,
    sink: &EventSink,
) -> Result<String, Error> {
    let stream = client.stream(messages).await?;
    futures::pin_mut!(stream);

    let mut acc = String::new();
    'outer: while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        for choice in &chunk.choices {
            if let Some(content) = &choice.delta.content {
                acc.push_str(content);
                if !sink.token(content).await {
                    tracing::debug!("client disconnected, stopping generation");
                    break 'outer;
                }
            }
        }
    }

    Ok(acc)
}

/// Single-shot chain: render a prompt template, stream the completion
pub struct LlmChain {
    name: String,
    client: ChatClient,
    prompt: PromptTemplate,
    output_key: String,
}

impl LlmChain {
    pub fn new(client: ChatClient, prompt: PromptTemplate) -> Self {
        Self {
            name: "llm_chain".to_string(),
            client,
            prompt,
            output_key: "text".to_string(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_output_key(mut self, key: impl Into<String>) -> Self {
        self.output_key = key.into();
        self
    }
}

#[async_trait]
impl Chain for LlmChain {
    fn name(&self) -> &str {
        &self.name
    }

    fn input_keys(&self) -> Vec<String> {
        self.prompt.variables()
    }

    fn output_key(&self) -> &str {
        &self.output_key
    }

    async fn execute(
        &self,
        inputs: &ChainInputs,
        sink: &EventSink,
    ) -> Result<ChainOutputs, Error> {
        let rendered = self.prompt.render(inputs)?;
        let text = stream_to_sink(&self.client, vec![Message::user(rendered)], sink).await?;

        let mut outputs = ChainOutputs::new();
        outputs.insert(self.output_key.clone(), serde_json::json!(text));
        Ok(outputs)
    }
}

/// Multi-turn chat chain with per-session history
///
/// Takes an `input` string plus an optional `session_id` (defaults to
/// `"default"`); the completed exchange is appended to the session memory.
pub struct ConversationChain {
    name: String,
    client: ChatClient,
    memory: ConversationMemory,
    system_prompt: Option<String>,
    input_key: String,
    output_key: String,
}

impl ConversationChain {
    pub fn new(client: ChatClient) -> Self {
        Self {
            name: "conversation_chain".to_string(),
            client,
            memory: ConversationMemory::default(),
            system_prompt: None,
            input_key: "input".to_string(),
            output_key: "response".to_string(),
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_memory(mut self, memory: ConversationMemory) -> Self {
        self.memory = memory;
        self
    }

    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }
}

#[async_trait]
impl Chain for ConversationChain {
    fn name(&self) -> &str {
        &self.name
    }

    fn input_keys(&self) -> Vec<String> {
        vec![self.input_key.clone()]
    }

    fn output_key(&self) -> &str {
        &self.output_key
    }

    async fn execute(
        &self,
        inputs: &ChainInputs,
        sink: &EventSink,
    ) -> Result<ChainOutputs, Error> {
        let input = input_str(inputs, &self.input_key)?;
        let session_id = inputs
            .get("session_id")
            .and_then(|v| v.as_str())
            .unwrap_or("default");

        let mut messages = Vec::new();
        if let Some(ref system) = self.system_prompt {
            messages.push(Message::system(system));
        }
        messages.extend(self.memory.history(session_id).await);
        messages.push(Message::user(input));

        let text = stream_to_sink(&self.client, messages, sink).await?;
        self.memory.append(session_id, input, &text).await;

        let mut outputs = ChainOutputs::new();
        outputs.insert(self.output_key.clone(), serde_json::json!(text));
        Ok(outputs)
    }
}
