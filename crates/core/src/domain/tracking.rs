use serde::{Deserialize, Serialize};

/// One courier as the provider names it. Immutable after load.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourierEntry {
    pub courier_name: String,
    pub courier_code: String,
}

/// One entry of a tracking record's event history, in provider order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingEvent {
    pub date: Option<String>,
    pub status: Option<String>,
    pub location: Option<String>,
}

/// The provider's status snapshot for one tracking number. External shape,
/// consumed not owned: every field the provider may omit is optional.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingRecord {
    pub courier_code: Option<String>,
    pub status: Option<String>,
    pub latest_event: Option<String>,
    pub estimated_delivery: Option<String>,
    #[serde(default)]
    pub events: Vec<TrackingEvent>,
}

/// Per-turn scratch value: what the user typed and what resolution made of
/// it. Discarded once the gateway call for the turn completes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackingQuery {
    pub raw_text: String,
    pub resolved_tracking_number: Option<String>,
    pub resolved_courier_code: Option<String>,
}
