//! HTTP response construction for chain executions

mod streaming;
mod synthesis;

pub use streaming::{StreamingResponse, COMPLETION_EVENT, END_EVENT, ERROR_EVENT};
pub use synthesis::replay_events;
