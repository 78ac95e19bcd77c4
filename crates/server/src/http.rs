//! JSON API surface.
//!
//! Endpoints:
//! - `POST /api/v1/chat`     — one free-form chat turn against a session
//! - `POST /api/v1/track`    — explicit tracking lookup with a courier selection
//! - `GET  /api/v1/couriers` — courier display options for selection UIs
//!
//! Sessions are in-memory conversations keyed by a server-issued id; a
//! request without a `session_id` starts a new session and the response
//! carries the id to continue it. Each session has its own lock, so one
//! turn at a time per session while other sessions proceed; the shared map
//! lock is only held long enough to hand out a session handle. Error bodies
//! never leak internals - they carry a fixed user message plus a correlation
//! id for log lookup.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use shipmate_agent::{AssistantRuntime, DiscardProgress, TurnError};
use shipmate_core::directory::AUTO_DETECT;
use shipmate_core::domain::conversation::Conversation;
use shipmate_core::errors::{ApplicationError, InterfaceError};
use tokio::sync::Mutex;
use tracing::{error, info};
use uuid::Uuid;

/// Upper bound on live sessions. New sessions past the bound are refused;
/// existing sessions keep working.
const MAX_SESSIONS: usize = 1024;

type SessionHandle = Arc<Mutex<Conversation>>;

#[derive(Clone)]
pub struct ApiState {
    runtime: Arc<AssistantRuntime>,
    sessions: Arc<Mutex<HashMap<Uuid, SessionHandle>>>,
    max_sessions: usize,
}

impl ApiState {
    pub fn new(runtime: Arc<AssistantRuntime>) -> Self {
        Self::with_session_capacity(runtime, MAX_SESSIONS)
    }

    pub fn with_session_capacity(runtime: Arc<AssistantRuntime>, max_sessions: usize) -> Self {
        Self { runtime, sessions: Arc::new(Mutex::new(HashMap::new())), max_sessions }
    }

    /// Hands out the per-session conversation handle, creating the session
    /// when the id is unknown. The map lock is released before the caller
    /// runs the turn; only the returned session lock spans the gateway
    /// calls. `None` means the session cap is reached.
    async fn session(&self, requested: Option<Uuid>) -> Option<(Uuid, SessionHandle)> {
        let mut sessions = self.sessions.lock().await;
        let session_id = requested.unwrap_or_else(Uuid::new_v4);

        if let Some(handle) = sessions.get(&session_id) {
            return Some((session_id, handle.clone()));
        }
        if sessions.len() >= self.max_sessions {
            return None;
        }

        let handle = Arc::new(Mutex::new(Conversation::new()));
        sessions.insert(session_id, handle.clone());
        Some((session_id, handle))
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub session_id: Option<Uuid>,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub session_id: Uuid,
    pub reply: String,
    pub tracking_number: Option<String>,
    pub tracking_included: bool,
    /// User-safe notice when a spotted tracking number could not be looked
    /// up this turn. `None` when tracking succeeded or was not attempted.
    pub tracking_error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TrackRequest {
    pub session_id: Option<Uuid>,
    pub tracking_number: String,
    pub courier: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TrackResponse {
    pub session_id: Uuid,
    pub reply: String,
}

#[derive(Debug, Serialize)]
pub struct CouriersResponse {
    pub couriers: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub correlation_id: String,
}

pub fn router(runtime: Arc<AssistantRuntime>) -> Router {
    Router::new()
        .route("/api/v1/chat", post(chat))
        .route("/api/v1/track", post(track))
        .route("/api/v1/couriers", get(couriers))
        .with_state(ApiState::new(runtime))
}

type ApiError = (StatusCode, Json<ErrorBody>);

pub async fn chat(
    State(state): State<ApiState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let correlation_id = new_correlation_id();
    if request.message.trim().is_empty() {
        return Err(reject(InterfaceError::BadRequest {
            message: "chat message must not be empty".to_owned(),
            correlation_id,
        }));
    }

    let Some((session_id, handle)) = state.session(request.session_id).await else {
        return Err(reject(sessions_full(correlation_id)));
    };
    let mut conversation = handle.lock().await;

    let report =
        state.runtime.chat_turn(&mut conversation, &request.message, &mut DiscardProgress).await;
    let reply = conversation.last_assistant().map(str::to_owned).unwrap_or_default();

    info!(
        event_name = "http.chat.turn_completed",
        correlation_id = %correlation_id,
        session_id = %session_id,
        tracking_included = report.tracking_appended,
        degraded = report.apology_appended,
        "chat turn completed"
    );

    Ok(Json(ChatResponse {
        session_id,
        reply,
        tracking_number: report.tracking_number,
        tracking_included: report.tracking_appended,
        tracking_error: report.tracking_error.as_ref().map(tracking_notice),
    }))
}

pub async fn track(
    State(state): State<ApiState>,
    Json(request): Json<TrackRequest>,
) -> Result<Json<TrackResponse>, ApiError> {
    let correlation_id = new_correlation_id();
    let courier = request.courier.as_deref().unwrap_or(AUTO_DETECT);

    let Some((session_id, handle)) = state.session(request.session_id).await else {
        return Err(reject(sessions_full(correlation_id)));
    };
    let mut conversation = handle.lock().await;

    match state.runtime.track_shipment(&mut conversation, &request.tracking_number, courier).await
    {
        Ok(()) => {
            let reply = conversation.last_assistant().map(str::to_owned).unwrap_or_default();
            info!(
                event_name = "http.track.completed",
                correlation_id = %correlation_id,
                session_id = %session_id,
                "tracking lookup completed"
            );
            Ok(Json(TrackResponse { session_id, reply }))
        }
        Err(turn_error) => Err(reject(turn_error_to_interface(turn_error, correlation_id))),
    }
}

pub async fn couriers(State(state): State<ApiState>) -> Json<CouriersResponse> {
    Json(CouriersResponse { couriers: state.runtime.directory().options() })
}

fn new_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

/// Fixed user-facing notice per failure class; provider detail stays in the
/// logs only.
fn tracking_notice(error: &TurnError) -> String {
    let notice = match error {
        TurnError::TrackingDisabled => "Shipment tracking is currently unavailable.",
        TurnError::EmptyTrackingNumber | TurnError::Tracking(_) => {
            "Tracking information could not be retrieved right now. Please try again later."
        }
    };
    notice.to_owned()
}

fn sessions_full(correlation_id: String) -> InterfaceError {
    InterfaceError::ServiceUnavailable {
        message: "session capacity reached".to_owned(),
        correlation_id,
    }
}

fn turn_error_to_interface(error: TurnError, correlation_id: String) -> InterfaceError {
    match error {
        TurnError::EmptyTrackingNumber => InterfaceError::BadRequest {
            message: "tracking number must not be empty".to_owned(),
            correlation_id,
        },
        TurnError::TrackingDisabled => {
            ApplicationError::Integration("tracking is not configured".to_owned())
                .into_interface(correlation_id)
        }
        TurnError::Tracking(source) => {
            ApplicationError::Integration(source.to_string()).into_interface(correlation_id)
        }
    }
}

fn reject(interface: InterfaceError) -> ApiError {
    error!(
        event_name = "http.request.rejected",
        correlation_id = %interface.correlation_id(),
        detail = %interface,
        "request rejected"
    );

    let status = match interface {
        InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let body = ErrorBody {
        error: interface.user_message().to_owned(),
        correlation_id: interface.correlation_id().to_owned(),
    };
    (status, Json(body))
}
