//! Token stream synthesis from a completed response
//!
//! Cached answers are replayed through the same event pipeline as live
//! executions, chunked so clients observe an ordinary token stream.

use futures::Stream;

use crate::chain::{ChainOutputs, StreamEvent};

/// Characters per synthesized token event
const DEFAULT_CHUNK_SIZE: usize = 50;

/// Replay cached outputs as a token stream ending with the usual `End` event
///
/// The text under `output_key` is chunked on whitespace boundaries; outputs
/// without a string at that key produce just the `End` event.
pub fn replay_events(
    outputs: ChainOutputs,
    output_key: &str,
) -> impl Stream<Item = StreamEvent> + Send {
    let text = outputs
        .get(output_key)
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();

    let mut events: Vec<StreamEvent> = if text.is_empty() {
        Vec::new()
    } else {
        chunk_text(&text, DEFAULT_CHUNK_SIZE)
            .into_iter()
            .map(StreamEvent::Token)
            .collect()
    };
    events.push(StreamEvent::End { outputs });

    futures::stream::iter(events)
}

/// Split text into chunks of approximately `max_size` characters
///
/// Prefers whitespace boundaries so words are not cut mid-stream.
fn chunk_text(text: &str, max_size: usize) -> Vec<String> {
    if text.len() <= max_size {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < text.len() {
        let mut end = (start + max_size).min(text.len());
        while !text.is_char_boundary(end) {
            end -= 1;
        }

        let chunk_end = if end < text.len() {
            text[start..end]
                .char_indices()
                .rev()
                .find(|(_, c)| c.is_whitespace())
                .map(|(i, c)| start + i + c.len_utf8())
                .unwrap_or(end)
        } else {
            end
        };

        chunks.push(text[start..chunk_end].to_string());
        start = chunk_end;
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::json;

    fn outputs_with_text(text: &str) -> ChainOutputs {
        let mut outputs = ChainOutputs::new();
        outputs.insert("text".to_string(), json!(text));
        outputs
    }

    #[test]
    fn test_chunk_text_short() {
        let chunks = chunk_text("Hello world", 50);
        assert_eq!(chunks, vec!["Hello world".to_string()]);
    }

    #[test]
    fn test_chunk_text_reconstructs_original() {
        let text = "a".repeat(150);
        let chunks = chunk_text(&text, 50);
        assert!(chunks.len() >= 3);
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_chunk_text_splits_on_whitespace() {
        let text = "Hello world this is a test of text chunking functionality";
        let chunks = chunk_text(text, 20);

        for chunk in &chunks {
            if chunk != chunks.last().unwrap() {
                assert!(chunk.ends_with(' '), "chunk {:?} cut mid-word", chunk);
            }
        }
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_chunk_text_multibyte_safe() {
        let text = "déjà vu ".repeat(20);
        let chunks = chunk_text(&text, 10);
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_chunk_text_multibyte_whitespace_split() {
        // U+00A0 non-breaking space is two bytes wide and matches
        // is_whitespace; a split right after it must stay on a boundary
        let text = format!("{}\u{a0}{}", "a".repeat(40), "b".repeat(20));
        let chunks = chunk_text(&text, 50);

        assert_eq!(chunks.concat(), text);
        assert!(chunks[0].ends_with('\u{a0}'), "chunks: {:?}", chunks);
    }

    #[tokio::test]
    async fn test_replay_ends_with_outputs() {
        let text = "word ".repeat(30);
        let events: Vec<StreamEvent> =
            replay_events(outputs_with_text(text.trim_end()), "text").collect().await;

        assert!(events.len() > 2);
        let replayed: String = events[..events.len() - 1]
            .iter()
            .map(|e| match e {
                StreamEvent::Token(t) => t.as_str(),
                other => panic!("unexpected event {:?}", other),
            })
            .collect();
        assert_eq!(replayed, text.trim_end());

        match events.last().unwrap() {
            StreamEvent::End { outputs } => {
                assert_eq!(outputs["text"], json!(text.trim_end()));
            }
            other => panic!("expected End, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_replay_without_text_output() {
        let mut outputs = ChainOutputs::new();
        outputs.insert("count".to_string(), json!(7));

        let events: Vec<StreamEvent> = replay_events(outputs, "text").collect().await;
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], StreamEvent::End { .. }));
    }
}
