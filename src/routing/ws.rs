//! WebSocket chat sessions
//!
//! Each incoming text frame starts one chain execution; events stream back as
//! JSON frames. A failed execution ends that exchange only, the socket stays
//! open for the next message.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::StreamExt;
use serde_json::json;
use uuid::Uuid;

use crate::chain::{chain_event_stream, Chain, ChainInputs, StreamEvent};
use crate::responses::{COMPLETION_EVENT, END_EVENT, ERROR_EVENT};

pub(crate) async fn chat_session(mut socket: WebSocket, chain: Arc<dyn Chain>) {
    // Conversation chains key their memory on "session_id"; give every
    // connection its own unless the client picks one per frame.
    let session_id = Uuid::new_v4().to_string();
    tracing::debug!(chain = chain.name(), session_id, "websocket session opened");

    while let Some(message) = socket.recv().await {
        let message = match message {
            Ok(m) => m,
            Err(e) => {
                tracing::debug!(error = %e, "websocket receive error");
                break;
            }
        };

        match message {
            Message::Text(text) => {
                let mut inputs = parse_inputs(&text, chain.as_ref());
                inputs
                    .entry("session_id".to_string())
                    .or_insert_with(|| json!(session_id));

                if let Err(e) = chain.validate_inputs(&inputs) {
                    let frame = json!({
                        "event": ERROR_EVENT,
                        "status_code": 422,
                        "detail": e.to_string(),
                    })
                    .to_string();
                    if socket.send(Message::Text(frame)).await.is_err() {
                        return;
                    }
                    continue;
                }

                let mut events = chain_event_stream(chain.clone(), inputs);
                while let Some(event) = events.next().await {
                    if socket.send(Message::Text(frame_json(&event))).await.is_err() {
                        return;
                    }
                }
            }
            Message::Close(_) => break,
            // Pings are answered by axum; binary frames are not part of the protocol
            _ => {}
        }
    }

    tracing::debug!(chain = chain.name(), session_id, "websocket session closed");
}

/// Interpret a text frame as chain inputs
///
/// A JSON object frame is taken as-is; anything else is treated as a bare
/// message bound to the chain's first input key.
fn parse_inputs(text: &str, chain: &dyn Chain) -> ChainInputs {
    if let Ok(inputs) = serde_json::from_str::<ChainInputs>(text) {
        return inputs;
    }

    let mut inputs = ChainInputs::new();
    if let Some(key) = chain.input_keys().into_iter().next() {
        inputs.insert(key, json!(text));
    }
    inputs
}

/// Serialize a chain event as a WebSocket JSON frame
fn frame_json(event: &StreamEvent) -> String {
    match event {
        StreamEvent::Token(token) => json!({
            "event": COMPLETION_EVENT,
            "data": token,
        }),
        StreamEvent::End { outputs } => json!({
            "event": END_EVENT,
            "data": outputs,
        }),
        StreamEvent::Error {
            status_code,
            detail,
        } => json!({
            "event": ERROR_EVENT,
            "status_code": status_code,
            "detail": detail,
        }),
    }
    .to_string()
}
