//! Chat completions client for an OpenAI-compatible backend

use std::time::Duration;

use eventsource_stream::Eventsource;
use futures::{Stream, StreamExt};

use crate::api::{ChatCompletionRequest, ChatCompletionResponse, Message, StreamChunk};
use crate::config::LlmConfig;
use crate::error::Error;

/// SSE terminator sent by OpenAI-compatible backends
const DONE_SENTINEL: &str = "[DONE]";

/// Client for `/v1/chat/completions` and `/v1/models`
#[derive(Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

/// Build the underlying HTTP client with timeout and TLS options
fn build_http_client(config: &LlmConfig) -> Result<reqwest::Client, Error> {
    let mut builder = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_seconds))
        .pool_max_idle_per_host(10);

    if let Some(ref tls) = config.tls {
        if tls.accept_invalid_certs {
            builder = builder.danger_accept_invalid_certs(true);
            tracing::warn!("TLS: accepting invalid certificates");
        }

        if let Some(ref ca_path) = tls.ca_cert_path {
            let ca_cert = std::fs::read(ca_path)?;
            let ca_cert = reqwest::Certificate::from_pem(&ca_cert)?;
            builder = builder.add_root_certificate(ca_cert);
            tracing::info!("TLS: loaded custom CA certificate from {}", ca_path);
        }

        if let (Some(cert_path), Some(key_path)) = (&tls.client_cert_path, &tls.client_key_path) {
            let cert_pem = std::fs::read(cert_path)?;
            let key_pem = std::fs::read(key_path)?;
            let identity = reqwest::Identity::from_pem(&[cert_pem, key_pem].concat())?;
            builder = builder.identity(identity);
            tracing::info!("TLS: loaded client certificate from {} for mTLS", cert_path);
        }
    }

    Ok(builder.build()?)
}

impl ChatClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, Error> {
        Ok(Self {
            http: build_http_client(config)?,
            base_url: config.base_url().to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    /// Model this client sends with every request
    pub fn model(&self) -> &str {
        &self.model
    }

    fn chat_request(&self, messages: Vec<Message>, stream: bool) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.model.clone(),
            messages,
            temperature: self.temperature,
            top_p: None,
            max_tokens: self.max_tokens,
            stream: Some(stream),
            stop: None,
        }
    }

    async fn post_chat(&self, request: &ChatCompletionRequest) -> Result<reqwest::Response, Error> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let mut builder = self.http.post(&url).json(request);
        if let Some(ref api_key) = self.api_key {
            builder = builder.bearer_auth(api_key);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                status: status.as_u16(),
                detail,
            });
        }

        Ok(response)
    }

    /// Run a completion to the end and return the full response
    pub async fn complete(&self, messages: Vec<Message>) -> Result<ChatCompletionResponse, Error> {
        let request = self.chat_request(messages, false);
        let response = self.post_chat(&request).await?;
        Ok(response.json().await?)
    }

    /// Run a streaming completion, yielding typed chunks as they arrive
    pub async fn stream(
        &self,
        messages: Vec<Message>,
    ) -> Result<impl Stream<Item = Result<StreamChunk, Error>> + Send, Error> {
        let request = self.chat_request(messages, true);
        let response = self.post_chat(&request).await?;
        Ok(decode_chunks(response.bytes_stream().eventsource()))
    }

    /// Model ids advertised by the backend
    pub async fn models(&self) -> Result<Vec<String>, Error> {
        let url = format!("{}/v1/models", self.base_url);

        let mut builder = self.http.get(&url);
        if let Some(ref api_key) = self.api_key {
            builder = builder.bearer_auth(api_key);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                status: status.as_u16(),
                detail,
            });
        }

        let body: serde_json::Value = response.json().await?;
        let models = body
            .get("data")
            .and_then(|d| d.as_array())
            .map(|models| {
                models
                    .iter()
                    .filter_map(|m| m.get("id").and_then(|id| id.as_str()))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(models)
    }
}

/// Decode an SSE event stream into typed chunks, stopping at `[DONE]`
fn decode_chunks<S, E>(events: S) -> impl Stream<Item = Result<StreamChunk, Error>> + Send
where
    S: Stream<Item = Result<eventsource_stream::Event, eventsource_stream::EventStreamError<E>>>
        + Send,
    E: std::fmt::Display + Send,
{
    async_stream::try_stream! {
        futures::pin_mut!(events);
        while let Some(event) = events.next().await {
            let event = event.map_err(|e| Error::Stream(e.to_string()))?;
            if event.data.trim() == DONE_SENTINEL {
                break;
            }
            let chunk: StreamChunk = serde_json::from_str(&event.data)?;
            yield chunk;
        }
    }
}
