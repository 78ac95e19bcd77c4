use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

#[derive(Clone, Copy)]
pub struct HealthState {
    llm_enabled: bool,
    tracking_enabled: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: &'static str,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub llm: HealthCheck,
    pub tracking: HealthCheck,
    pub checked_at: String,
}

pub fn router(llm_enabled: bool, tracking_enabled: bool) -> Router {
    Router::new()
        .route("/health", get(health))
        .with_state(HealthState { llm_enabled, tracking_enabled })
}

/// Gateway subsystems degrade rather than fail, so a degraded report still
/// answers 200: the process is serving, just with reduced capability.
pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let llm = subsystem_check(state.llm_enabled, "llm gateway configured", "llm api key missing");
    let tracking = subsystem_check(
        state.tracking_enabled,
        "tracking gateway configured",
        "tracking api key missing",
    );
    let ready = llm.status == "ready" && tracking.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck { status: "ready", detail: "shipmate-server runtime initialized" },
        llm,
        tracking,
        checked_at: Utc::now().to_rfc3339(),
    };

    (StatusCode::OK, Json(payload))
}

fn subsystem_check(
    enabled: bool,
    ready_detail: &'static str,
    degraded_detail: &'static str,
) -> HealthCheck {
    if enabled {
        HealthCheck { status: "ready", detail: ready_detail }
    } else {
        HealthCheck { status: "degraded", detail: degraded_detail }
    }
}
