//! Router helpers for mounting chains as HTTP endpoints

mod server;
mod ws;

pub use server::run_server;

use std::sync::Arc;

use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::StreamExt;
use serde_json::json;

use crate::cache::ResponseCache;
use crate::chain::{chain_event_stream, Chain, ChainInputs, EventSink, StreamEvent};
use crate::config::StreamingMode;
use crate::responses::{replay_events, StreamingResponse};

/// Builder for an axum [`Router`] serving chains
///
/// ```ignore
/// let router = ChainRouter::with_cache(cache)
///     .chain_route("/chat", chain.clone(), StreamingMode::Text)
///     .websocket_route("/chat/ws", chain)
///     .into_router();
/// ```
pub struct ChainRouter {
    router: Router,
    cache: Option<ResponseCache>,
}

impl Default for ChainRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl ChainRouter {
    pub fn new() -> Self {
        Self {
            router: Router::new(),
            cache: None,
        }
    }

    /// Router whose chain routes consult (and populate) `cache`
    pub fn with_cache(cache: ResponseCache) -> Self {
        Self {
            router: Router::new(),
            cache: Some(cache),
        }
    }

    /// Mount a POST endpoint running `chain` in the given response mode
    ///
    /// The request body is a JSON object of chain inputs. Mode `Off` answers
    /// with `{"outputs": {...}}`; `Text` and `Json` answer with SSE.
    pub fn chain_route(mut self, path: &str, chain: Arc<dyn Chain>, mode: StreamingMode) -> Self {
        let endpoint = ChainEndpoint {
            chain,
            mode,
            cache: self.cache.clone(),
        };

        self.router = self.router.route(
            path,
            post(move |Json(inputs): Json<ChainInputs>| {
                let endpoint = endpoint.clone();
                async move { endpoint.handle(inputs).await }
            }),
        );
        self
    }

    /// Mount a GET WebSocket endpoint chatting with `chain`
    pub fn websocket_route(mut self, path: &str, chain: Arc<dyn Chain>) -> Self {
        self.router = self.router.route(
            path,
            get(move |upgrade: axum::extract::WebSocketUpgrade| {
                let chain = chain.clone();
                async move { upgrade.on_upgrade(move |socket| ws::chat_session(socket, chain)) }
            }),
        );
        self
    }

    pub fn into_router(self) -> Router {
        self.router
    }
}

/// One mounted chain endpoint
#[derive(Clone)]
struct ChainEndpoint {
    chain: Arc<dyn Chain>,
    mode: StreamingMode,
    cache: Option<ResponseCache>,
}

impl ChainEndpoint {
    async fn handle(self, inputs: ChainInputs) -> Response {
        if let Err(e) = self.chain.validate_inputs(&inputs) {
            return e.into_response();
        }

        let cache_key = self
            .cache
            .as_ref()
            .map(|_| ResponseCache::key(self.chain.name(), &inputs));

        if let (Some(cache), Some(key)) = (&self.cache, &cache_key) {
            if let Some(outputs) = cache.get(key).await {
                tracing::debug!(chain = self.chain.name(), "cache hit");
                let outputs = (*outputs).clone();
                return match self.mode {
                    StreamingMode::Off => Json(json!({ "outputs": outputs })).into_response(),
                    mode => StreamingResponse::from_events(
                        replay_events(outputs, self.chain.output_key()),
                        mode,
                    ),
                };
            }
        }

        match self.mode {
            StreamingMode::Off => {
                match self.chain.execute(&inputs, &EventSink::disabled()).await {
                    Ok(outputs) => {
                        if let (Some(cache), Some(key)) = (&self.cache, cache_key) {
                            cache.insert(key, outputs.clone()).await;
                        }
                        Json(json!({ "outputs": outputs })).into_response()
                    }
                    Err(e) => e.into_response(),
                }
            }
            mode => match (self.cache.clone(), cache_key) {
                (Some(cache), Some(key)) => {
                    let output_events =
                        chain_event_stream(self.chain.clone(), inputs).then(move |event| {
                            let cache = cache.clone();
                            let key = key.clone();
                            async move {
                                if let StreamEvent::End { outputs } = &event {
                                    cache.insert(key, outputs.clone()).await;
                                }
                                event
                            }
                        });
                    StreamingResponse::from_events(output_events, mode)
                }
                _ => StreamingResponse::from_chain(self.chain.clone(), inputs, mode),
            },
        }
    }
}
