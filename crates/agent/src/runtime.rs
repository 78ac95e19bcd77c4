use std::sync::Arc;

use shipmate_core::directory::{CourierDirectory, CourierResolution};
use shipmate_core::domain::conversation::Conversation;
use shipmate_core::domain::tracking::TrackingQuery;
use shipmate_core::extract::TrackingNumberExtractor;
use shipmate_core::format::format_tracking_summary;
use shipmate_tracking::{TrackingApi, TrackingError};
use thiserror::Error;
use tracing::{debug, warn};

use crate::accumulate::{collect_reply, ProgressSink};
use crate::llm::{ChatCompletion, LlmError};

/// Reply appended when the LLM gateway is unavailable or fails mid-stream.
pub const FALLBACK_REPLY: &str =
    "I apologize, but I'm having trouble generating a response right now. Please try again.";

#[derive(Debug, Error)]
pub enum TurnError {
    #[error("tracking is not configured")]
    TrackingDisabled,
    #[error("tracking number must not be empty")]
    EmptyTrackingNumber,
    #[error(transparent)]
    Tracking(#[from] TrackingError),
}

/// What happened during one chat turn. The conversation itself records the
/// messages; this records the side channel (which gateway calls ran, which
/// degraded) for logging and response metadata.
#[derive(Debug, Default)]
pub struct TurnReport {
    pub tracking_number: Option<String>,
    pub tracking_appended: bool,
    pub tracking_error: Option<TurnError>,
    pub llm_error: Option<LlmError>,
    pub apology_appended: bool,
}

/// Per-process orchestrator. Holds the stateless pieces (directory,
/// extractor) and the optional gateways; per-session state lives in the
/// `Conversation` values the caller passes in.
///
/// Either gateway may be absent - the runtime degrades rather than refusing
/// to start. Without tracking, turns skip the tracking pipeline; without an
/// LLM, every turn gets the fixed fallback reply.
pub struct AssistantRuntime {
    directory: CourierDirectory,
    extractor: TrackingNumberExtractor,
    tracking: Option<Arc<dyn TrackingApi>>,
    llm: Option<Arc<dyn ChatCompletion>>,
}

impl AssistantRuntime {
    pub fn new(directory: CourierDirectory) -> Self {
        Self {
            directory,
            extractor: TrackingNumberExtractor::new(),
            tracking: None,
            llm: None,
        }
    }

    pub fn with_tracking(mut self, tracking: Arc<dyn TrackingApi>) -> Self {
        self.tracking = Some(tracking);
        self
    }

    pub fn with_llm(mut self, llm: Arc<dyn ChatCompletion>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn directory(&self) -> &CourierDirectory {
        &self.directory
    }

    pub fn tracking_enabled(&self) -> bool {
        self.tracking.is_some()
    }

    pub fn llm_enabled(&self) -> bool {
        self.llm.is_some()
    }

    /// Explicit tracking request: the user supplied a number and a courier
    /// selection directly instead of mentioning them in chat. On success the
    /// rendered summary is appended as an assistant message; on failure
    /// nothing is appended and the caller decides how to surface the error.
    pub async fn track_shipment(
        &self,
        conversation: &mut Conversation,
        tracking_number: &str,
        courier_selection: &str,
    ) -> Result<(), TurnError> {
        let tracking_number = tracking_number.trim();
        if tracking_number.is_empty() {
            return Err(TurnError::EmptyTrackingNumber);
        }
        let Some(tracking) = &self.tracking else {
            return Err(TurnError::TrackingDisabled);
        };

        let resolution = self.directory.resolve(courier_selection);
        if matches!(resolution, CourierResolution::Unknown) {
            debug!(
                event_name = "agent.courier_unresolved",
                courier_selection, "selection matched no courier, falling back to auto-detect"
            );
        }

        let (_, summary) = fetch_summary(tracking.as_ref(), tracking_number, &resolution).await?;
        conversation.push_assistant(format!(
            "Here's what I found for tracking number {tracking_number}:\n\n{summary}"
        ));
        Ok(())
    }

    /// One free-form chat turn.
    ///
    /// Appends the user message first, then (when a tracking number is
    /// spotted and the tracking gateway is up) a tracking summary, then the
    /// LLM reply. Tracking failures are non-fatal for the turn: they are
    /// recorded in the report and the LLM still runs with whatever history
    /// was appended. An LLM failure appends the fixed fallback reply so the
    /// user is never left without an assistant message.
    pub async fn chat_turn<S: ProgressSink>(
        &self,
        conversation: &mut Conversation,
        user_text: &str,
        sink: &mut S,
    ) -> TurnReport {
        let mut report = TurnReport::default();
        conversation.push_user(user_text);

        let mut query = TrackingQuery {
            raw_text: user_text.to_owned(),
            resolved_tracking_number: None,
            resolved_courier_code: None,
        };

        if let Some(found) = self.extractor.extract(user_text) {
            query.resolved_tracking_number = Some(found.number.clone());
            report.tracking_number = Some(found.number.clone());
            debug!(
                event_name = "agent.tracking_number_extracted",
                tracking_number = %found.number,
                rule = found.rule,
                "tracking number spotted in chat text"
            );

            match &self.tracking {
                Some(tracking) => {
                    match fetch_summary(
                        tracking.as_ref(),
                        &found.number,
                        &CourierResolution::AutoDetect,
                    )
                    .await
                    {
                        Ok((courier_code, summary)) => {
                            conversation.push_assistant(format!(
                                "I found tracking information for {}:\n\n{summary}",
                                found.number
                            ));
                            query.resolved_courier_code = courier_code;
                            report.tracking_appended = true;
                        }
                        Err(error) => {
                            warn!(
                                event_name = "agent.tracking_pipeline_failed",
                                tracking_number = %found.number,
                                error = %error,
                                "tracking lookup failed, continuing with llm reply"
                            );
                            report.tracking_error = Some(error);
                        }
                    }
                }
                None => {
                    debug!(
                        event_name = "agent.tracking_skipped",
                        tracking_number = %found.number,
                        "tracking gateway not configured, skipping lookup"
                    );
                    report.tracking_error = Some(TurnError::TrackingDisabled);
                }
            }
            debug!(event_name = "agent.turn_resolved", query = ?query, "tracking turn resolved");
        }

        match &self.llm {
            Some(llm) => match self.stream_reply(llm.as_ref(), conversation, sink).await {
                Ok(reply) => conversation.push_assistant(reply),
                Err(error) => {
                    warn!(
                        event_name = "agent.llm_failed",
                        error = %error,
                        "llm reply failed, appending fallback"
                    );
                    report.llm_error = Some(error);
                    report.apology_appended = true;
                    conversation.push_assistant(FALLBACK_REPLY);
                }
            },
            None => {
                report.apology_appended = true;
                conversation.push_assistant(FALLBACK_REPLY);
            }
        }

        report
    }

    async fn stream_reply<S: ProgressSink>(
        &self,
        llm: &dyn ChatCompletion,
        conversation: &Conversation,
        sink: &mut S,
    ) -> Result<String, LlmError> {
        let stream = llm.stream_chat(conversation.messages()).await?;
        collect_reply(stream, sink).await
    }
}

/// The shared tracking pipeline: resolve a courier code (detecting one when
/// the selection doesn't pin it down), register the number, fetch the
/// snapshot, render it. Registration is skipped when no code could be found;
/// the provider's "already exists" rejection is treated as success. Returns
/// the courier code that ended up being used alongside the rendered summary.
async fn fetch_summary(
    tracking: &dyn TrackingApi,
    tracking_number: &str,
    resolution: &CourierResolution,
) -> Result<(Option<String>, String), TurnError> {
    let courier_code = match resolution.code() {
        Some(code) => Some(code.to_owned()),
        None => tracking.detect_courier(tracking_number).await?,
    };

    if let Some(code) = &courier_code {
        match tracking.create_tracking(tracking_number, Some(code)).await {
            Ok(()) => {}
            Err(error) if error.is_already_tracked() => {
                debug!(
                    event_name = "agent.tracking_already_registered",
                    tracking_number, "tracking number already registered with provider"
                );
            }
            Err(error) => return Err(error.into()),
        }
    }

    let record = tracking.get_tracking_info(tracking_number).await?;
    Ok((courier_code, format_tracking_summary(record.as_ref())))
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use shipmate_core::directory::CourierDirectory;
    use shipmate_core::domain::conversation::{Conversation, Role};
    use shipmate_core::domain::tracking::{CourierEntry, TrackingRecord};
    use shipmate_core::format::NO_TRACKING_INFO;
    use shipmate_tracking::{TrackingApi, TrackingError};

    use super::{AssistantRuntime, TurnError, FALLBACK_REPLY};
    use crate::accumulate::DiscardProgress;
    use crate::llm::{ChatCompletion, LlmError, ReplyStream};

    /// Records every provider call in order; behavior is scripted per test.
    struct RecordingTracking {
        calls: Mutex<Vec<String>>,
        detect_result: Result<Option<String>, TrackingError>,
        create_result: Result<(), TrackingError>,
        record: Option<TrackingRecord>,
    }

    impl RecordingTracking {
        fn happy(detected: &str) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                detect_result: Ok(Some(detected.to_owned())),
                create_result: Ok(()),
                record: Some(TrackingRecord {
                    courier_code: Some(detected.to_owned()),
                    status: Some("transit".to_owned()),
                    ..TrackingRecord::default()
                }),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn clone_tracking_error(error: &TrackingError) -> TrackingError {
            match error {
                TrackingError::MissingApiKey => TrackingError::MissingApiKey,
                TrackingError::Api { code, message } => {
                    TrackingError::Api { code: *code, message: message.clone() }
                }
                TrackingError::Http(_) => unreachable!("tests script only Api errors"),
            }
        }
    }

    #[async_trait]
    impl TrackingApi for RecordingTracking {
        async fn list_couriers(&self) -> Result<Vec<CourierEntry>, TrackingError> {
            self.calls.lock().unwrap().push("list_couriers".to_owned());
            Ok(Vec::new())
        }

        async fn create_tracking(
            &self,
            tracking_number: &str,
            courier_code: Option<&str>,
        ) -> Result<(), TrackingError> {
            self.calls.lock().unwrap().push(format!(
                "create:{tracking_number}:{}",
                courier_code.unwrap_or("auto")
            ));
            match &self.create_result {
                Ok(()) => Ok(()),
                Err(error) => Err(Self::clone_tracking_error(error)),
            }
        }

        async fn detect_courier(
            &self,
            tracking_number: &str,
        ) -> Result<Option<String>, TrackingError> {
            self.calls.lock().unwrap().push(format!("detect:{tracking_number}"));
            match &self.detect_result {
                Ok(code) => Ok(code.clone()),
                Err(error) => Err(Self::clone_tracking_error(error)),
            }
        }

        async fn get_tracking_info(
            &self,
            tracking_number: &str,
        ) -> Result<Option<TrackingRecord>, TrackingError> {
            self.calls.lock().unwrap().push(format!("get:{tracking_number}"));
            Ok(self.record.clone())
        }
    }

    struct ScriptedLlm {
        fragments: Vec<Result<String, ()>>,
        submitted_lens: Mutex<Vec<usize>>,
    }

    impl ScriptedLlm {
        fn replying(fragments: &[&str]) -> Self {
            Self {
                fragments: fragments.iter().map(|f| Ok((*f).to_owned())).collect(),
                submitted_lens: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self { fragments: vec![Err(())], submitted_lens: Mutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl ChatCompletion for ScriptedLlm {
        async fn stream_chat(
            &self,
            messages: &[shipmate_core::domain::conversation::ChatMessage],
        ) -> Result<ReplyStream, LlmError> {
            self.submitted_lens.lock().unwrap().push(messages.len());
            let items: Vec<Result<String, LlmError>> = self
                .fragments
                .iter()
                .map(|f| f.clone().map_err(|()| LlmError::MissingApiKey))
                .collect();
            Ok(Box::pin(futures::stream::iter(items)))
        }
    }

    fn runtime_with(
        tracking: Option<Arc<RecordingTracking>>,
        llm: Option<Arc<ScriptedLlm>>,
    ) -> AssistantRuntime {
        let mut runtime = AssistantRuntime::new(CourierDirectory::new());
        if let Some(tracking) = tracking {
            runtime = runtime.with_tracking(tracking);
        }
        if let Some(llm) = llm {
            runtime = runtime.with_llm(llm);
        }
        runtime
    }

    #[tokio::test]
    async fn track_shipment_with_known_courier_skips_detection() {
        let tracking = Arc::new(RecordingTracking::happy("ups"));
        let runtime = runtime_with(Some(tracking.clone()), None);
        let mut conversation = Conversation::new();

        runtime
            .track_shipment(&mut conversation, "1Z999AA10123456784", "UPS")
            .await
            .expect("track");

        assert_eq!(
            tracking.calls(),
            ["create:1Z999AA10123456784:ups", "get:1Z999AA10123456784"]
        );
        let reply = conversation.last_assistant().expect("assistant message");
        assert!(reply.starts_with("Here's what I found for tracking number 1Z999AA10123456784:"));
        assert!(reply.contains("🚚 Courier: ups"));
    }

    #[tokio::test]
    async fn track_shipment_auto_detect_runs_detection_before_create() {
        let tracking = Arc::new(RecordingTracking::happy("fedex"));
        let runtime = runtime_with(Some(tracking.clone()), None);
        let mut conversation = Conversation::new();

        runtime
            .track_shipment(&mut conversation, "123456789012", "Auto Detect")
            .await
            .expect("track");

        assert_eq!(
            tracking.calls(),
            ["detect:123456789012", "create:123456789012:fedex", "get:123456789012"]
        );
    }

    #[tokio::test]
    async fn unknown_courier_selection_falls_back_to_detection() {
        let tracking = Arc::new(RecordingTracking::happy("yamato"));
        let runtime = runtime_with(Some(tracking.clone()), None);
        let mut conversation = Conversation::new();

        runtime
            .track_shipment(&mut conversation, "123456789012", "Pigeon Post")
            .await
            .expect("track");

        assert_eq!(tracking.calls()[0], "detect:123456789012");
    }

    #[tokio::test]
    async fn undetectable_courier_skips_registration_but_still_fetches() {
        let tracking = Arc::new(RecordingTracking {
            detect_result: Ok(None),
            ..RecordingTracking::happy("unused")
        });
        let runtime = runtime_with(Some(tracking.clone()), None);
        let mut conversation = Conversation::new();

        runtime
            .track_shipment(&mut conversation, "123456789012", "Auto Detect")
            .await
            .expect("track");

        assert_eq!(tracking.calls(), ["detect:123456789012", "get:123456789012"]);
    }

    #[tokio::test]
    async fn already_registered_tracking_is_tolerated() {
        let tracking = Arc::new(RecordingTracking {
            create_result: Err(TrackingError::Api {
                code: 4101,
                message: "Tracking already exists".to_owned(),
            }),
            ..RecordingTracking::happy("ups")
        });
        let runtime = runtime_with(Some(tracking.clone()), None);
        let mut conversation = Conversation::new();

        runtime
            .track_shipment(&mut conversation, "1Z999AA10123456784", "UPS")
            .await
            .expect("already-tracked must not fail the turn");
        assert!(conversation.last_assistant().is_some());
    }

    #[tokio::test]
    async fn hard_create_failure_appends_nothing() {
        let tracking = Arc::new(RecordingTracking {
            create_result: Err(TrackingError::Api {
                code: 4016,
                message: "Bad tracking number".to_owned(),
            }),
            ..RecordingTracking::happy("ups")
        });
        let runtime = runtime_with(Some(tracking), None);
        let mut conversation = Conversation::new();

        let result = runtime.track_shipment(&mut conversation, "1Z999AA10123456784", "UPS").await;
        assert!(matches!(result, Err(TurnError::Tracking(_))));
        assert_eq!(conversation.len(), 1);
    }

    #[tokio::test]
    async fn track_shipment_rejects_blank_numbers_and_disabled_tracking() {
        let runtime = runtime_with(Some(Arc::new(RecordingTracking::happy("ups"))), None);
        let mut conversation = Conversation::new();
        assert!(matches!(
            runtime.track_shipment(&mut conversation, "   ", "UPS").await,
            Err(TurnError::EmptyTrackingNumber)
        ));

        let disabled = runtime_with(None, None);
        assert!(matches!(
            disabled.track_shipment(&mut conversation, "123456789012", "UPS").await,
            Err(TurnError::TrackingDisabled)
        ));
        assert_eq!(conversation.len(), 1);
    }

    #[tokio::test]
    async fn not_found_record_renders_the_no_data_summary() {
        let tracking =
            Arc::new(RecordingTracking { record: None, ..RecordingTracking::happy("ups") });
        let runtime = runtime_with(Some(tracking), None);
        let mut conversation = Conversation::new();

        runtime
            .track_shipment(&mut conversation, "1Z999AA10123456784", "UPS")
            .await
            .expect("track");
        assert!(conversation.last_assistant().expect("reply").contains(NO_TRACKING_INFO));
    }

    #[tokio::test]
    async fn chat_turn_appends_user_summary_then_reply_in_order() {
        let tracking = Arc::new(RecordingTracking::happy("ups"));
        let llm = Arc::new(ScriptedLlm::replying(&["It's ", "on the way."]));
        let runtime = runtime_with(Some(tracking.clone()), Some(llm.clone()));
        let mut conversation = Conversation::new();

        let report = runtime
            .chat_turn(&mut conversation, "where is 1Z999AA10123456784?", &mut DiscardProgress)
            .await;

        assert!(report.tracking_appended);
        assert!(report.llm_error.is_none());

        let messages = conversation.messages();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[1].role, Role::User);
        assert!(messages[2].content.starts_with("I found tracking information for"));
        assert_eq!(messages[3].content, "It's on the way.");

        // The tracking summary is part of the history the LLM sees.
        assert_eq!(llm.submitted_lens.lock().unwrap().as_slice(), [3]);
    }

    #[tokio::test]
    async fn chat_turn_without_tracking_number_skips_the_pipeline() {
        let tracking = Arc::new(RecordingTracking::happy("ups"));
        let llm = Arc::new(ScriptedLlm::replying(&["Hello!"]));
        let runtime = runtime_with(Some(tracking.clone()), Some(llm));
        let mut conversation = Conversation::new();

        let report =
            runtime.chat_turn(&mut conversation, "hi there", &mut DiscardProgress).await;

        assert!(report.tracking_number.is_none());
        assert!(tracking.calls().is_empty());
        assert_eq!(conversation.last_assistant(), Some("Hello!"));
    }

    #[tokio::test]
    async fn chat_turn_tracking_failure_is_non_fatal() {
        let tracking = Arc::new(RecordingTracking {
            detect_result: Err(TrackingError::Api {
                code: 429,
                message: "Too many requests".to_owned(),
            }),
            ..RecordingTracking::happy("ups")
        });
        let llm = Arc::new(ScriptedLlm::replying(&["Sorry, try again later."]));
        let runtime = runtime_with(Some(tracking), Some(llm));
        let mut conversation = Conversation::new();

        let report = runtime
            .chat_turn(&mut conversation, "track 123456789012 please", &mut DiscardProgress)
            .await;

        assert!(!report.tracking_appended);
        assert!(report.tracking_error.is_some());
        assert_eq!(conversation.last_assistant(), Some("Sorry, try again later."));
    }

    #[tokio::test]
    async fn llm_failure_appends_the_fallback_reply() {
        let runtime = runtime_with(None, Some(Arc::new(ScriptedLlm::failing())));
        let mut conversation = Conversation::new();

        let report = runtime.chat_turn(&mut conversation, "hello", &mut DiscardProgress).await;

        assert!(report.apology_appended);
        assert!(report.llm_error.is_some());
        assert_eq!(conversation.last_assistant(), Some(FALLBACK_REPLY));
    }

    #[tokio::test]
    async fn missing_llm_gateway_appends_the_fallback_reply() {
        let runtime = runtime_with(None, None);
        let mut conversation = Conversation::new();

        let report = runtime.chat_turn(&mut conversation, "hello", &mut DiscardProgress).await;

        assert!(report.apology_appended);
        assert!(report.llm_error.is_none());
        assert_eq!(conversation.last_assistant(), Some(FALLBACK_REPLY));
    }

    #[tokio::test]
    async fn system_message_survives_many_turns() {
        let llm = Arc::new(ScriptedLlm::replying(&["ok"]));
        let runtime = runtime_with(None, Some(llm));
        let mut conversation = Conversation::new();

        for _ in 0..5 {
            runtime.chat_turn(&mut conversation, "just chatting", &mut DiscardProgress).await;
        }

        assert_eq!(conversation.messages()[0].role, Role::System);
        let system_count =
            conversation.messages().iter().filter(|m| m.role == Role::System).count();
        assert_eq!(system_count, 1);
    }
}
