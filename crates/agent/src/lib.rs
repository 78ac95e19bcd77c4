//! Conversation orchestration for the shipment assistant.
//!
//! This crate owns the per-turn control flow:
//! 1. **Extraction** - spot a tracking number in the user's message
//!   (`shipmate-core::extract`)
//! 2. **Resolution** - map a courier selection to a provider code
//!   (`shipmate-core::directory`)
//! 3. **Tracking pipeline** - detect / create / fetch via the tracking
//!   gateway, render with the fixed formatter, append to the conversation
//! 4. **LLM dispatch** - forward the full history to the chat-completion
//!   gateway and append the streamed reply
//!
//! The orchestrator's only ordering obligation is append-before-dispatch:
//! every message lands in the conversation before the next external call,
//! and past messages are never touched.
//!
//! The LLM gateway is behind the [`ChatCompletion`] trait; the tracking
//! gateway behind `shipmate_tracking::TrackingApi`. Both are swapped for
//! recording mocks in tests.

pub mod accumulate;
pub mod llm;
pub mod runtime;

pub use accumulate::{collect_reply, DiscardProgress, ProgressSink};
pub use llm::{ChatCompletion, ChatCompletionsClient, LlmError, ReplyStream};
pub use runtime::{AssistantRuntime, TurnError, TurnReport, FALLBACK_REPLY};
