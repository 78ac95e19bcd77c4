//! Reply accumulation.
//!
//! The chat-completion gateway yields the assistant's reply as text
//! fragments. [`collect_reply`] folds those into the final message while
//! publishing each intermediate snapshot to a [`ProgressSink`], so callers
//! can surface partial replies (or ignore them with [`DiscardProgress`]).

use futures::StreamExt;

use crate::llm::{LlmError, ReplyStream};

/// Receives the growing reply after each fragment. Snapshots are
/// whole-reply-so-far, not deltas.
pub trait ProgressSink: Send {
    fn publish(&mut self, partial: &str);
}

/// Sink for callers that only want the completed reply.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardProgress;

impl ProgressSink for DiscardProgress {
    fn publish(&mut self, _partial: &str) {}
}

/// Drains the stream into one reply string. The first fragment error aborts
/// the whole reply; a partially accumulated reply is never returned.
pub async fn collect_reply<S: ProgressSink>(
    mut stream: ReplyStream,
    sink: &mut S,
) -> Result<String, LlmError> {
    let mut reply = String::new();
    while let Some(fragment) = stream.next().await {
        reply.push_str(&fragment?);
        sink.publish(&reply);
    }
    Ok(reply)
}
