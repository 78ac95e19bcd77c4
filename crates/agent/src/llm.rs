use std::collections::VecDeque;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::{stream, Stream, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use shipmate_core::config::LlmConfig;
use shipmate_core::domain::conversation::ChatMessage;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("llm api key is not configured")]
    MissingApiKey,
    #[error("llm request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("llm stream payload could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
}

/// A lazy, finite, non-restartable sequence of reply text fragments.
pub type ReplyStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

/// Seam to the hosted chat-completion API. The orchestrator submits the full
/// ordered message sequence and consumes the reply incrementally.
#[async_trait]
pub trait ChatCompletion: Send + Sync {
    async fn stream_chat(&self, messages: &[ChatMessage]) -> Result<ReplyStream, LlmError>;
}

/// Streaming client for an OpenAI-compatible `/chat/completions` endpoint.
/// Request configuration (model, temperature, max_tokens, top_p) is fixed
/// per client instance; replies arrive as server-sent `data:` events.
pub struct ChatCompletionsClient {
    http: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    model: String,
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
}

impl ChatCompletionsClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = config.api_key.clone().ok_or(LlmError::MissingApiKey)?;
        if api_key.expose_secret().trim().is_empty() {
            return Err(LlmError::MissingApiKey);
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(LlmError::Http)?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            top_p: config.top_p,
        })
    }
}

#[async_trait]
impl ChatCompletion for ChatCompletionsClient {
    async fn stream_chat(&self, messages: &[ChatMessage]) -> Result<ReplyStream, LlmError> {
        let body = ChatCompletionRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            top_p: self.top_p,
            stream: true,
        };

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        Ok(Box::pin(sse_fragments(response.bytes_stream().boxed())))
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Delta,
}

#[derive(Debug, Default, Deserialize)]
struct Delta {
    content: Option<String>,
}

enum SseLine {
    Fragment(Result<String, LlmError>),
    Done,
    Skip,
}

/// One SSE line: `data: <json>` carries a delta, `data: [DONE]` terminates,
/// everything else (blank keep-alive lines, comments) is skipped.
fn parse_sse_line(line: &str) -> SseLine {
    let Some(payload) = line.strip_prefix("data:") else {
        return SseLine::Skip;
    };
    let payload = payload.trim();
    if payload.is_empty() {
        return SseLine::Skip;
    }
    if payload == "[DONE]" {
        return SseLine::Done;
    }

    match serde_json::from_str::<StreamChunk>(payload) {
        Ok(chunk) => {
            let content = chunk
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.delta.content)
                .filter(|content| !content.is_empty());
            match content {
                Some(fragment) => SseLine::Fragment(Ok(fragment)),
                None => SseLine::Skip,
            }
        }
        Err(error) => SseLine::Fragment(Err(LlmError::Decode(error))),
    }
}

struct SseState<B, E> {
    inner: BoxStream<'static, Result<B, E>>,
    buffer: String,
    pending: VecDeque<Result<String, LlmError>>,
    finished: bool,
}

/// Turns a raw SSE byte stream into a stream of reply text fragments.
/// The stream ends at the `[DONE]` marker or when the transport closes.
fn sse_fragments<B, E>(
    raw: BoxStream<'static, Result<B, E>>,
) -> impl Stream<Item = Result<String, LlmError>> + Send
where
    B: AsRef<[u8]> + Send + 'static,
    E: Into<LlmError> + Send + 'static,
{
    let state =
        SseState { inner: raw, buffer: String::new(), pending: VecDeque::new(), finished: false };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.finished {
                return None;
            }

            match state.inner.next().await {
                None => {
                    state.finished = true;
                    drain_buffer(&mut state);
                }
                Some(Err(error)) => {
                    state.finished = true;
                    state.pending.push_back(Err(error.into()));
                }
                Some(Ok(chunk)) => {
                    state.buffer.push_str(&String::from_utf8_lossy(chunk.as_ref()));
                    while let Some(newline) = state.buffer.find('\n') {
                        let line =
                            state.buffer[..newline].trim_end_matches('\r').to_owned();
                        state.buffer.drain(..=newline);
                        match parse_sse_line(&line) {
                            SseLine::Fragment(item) => state.pending.push_back(item),
                            SseLine::Done => {
                                state.finished = true;
                                break;
                            }
                            SseLine::Skip => {}
                        }
                    }
                }
            }
        }
    })
}

/// A transport close without `[DONE]` can leave one unterminated line.
fn drain_buffer<B, E>(state: &mut SseState<B, E>) {
    if state.buffer.is_empty() {
        return;
    }
    let line = std::mem::take(&mut state.buffer);
    if let SseLine::Fragment(item) = parse_sse_line(line.trim_end_matches('\r')) {
        state.pending.push_back(item);
    }
}
