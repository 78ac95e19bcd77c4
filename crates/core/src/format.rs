use crate::domain::tracking::TrackingRecord;

/// Fixed message for the empty-data path.
pub const NO_TRACKING_INFO: &str = "No tracking information available.";

/// How many history entries the summary shows, in provider order.
const HISTORY_LIMIT: usize = 5;

/// Renders a provider tracking record into the fixed human-readable summary.
///
/// The output shape never varies with which fields are present: missing
/// fields render explicit placeholders instead of being omitted. `None`
/// (the provider returned an empty data list) renders the fixed
/// no-information message.
pub fn format_tracking_summary(record: Option<&TrackingRecord>) -> String {
    let Some(record) = record else {
        return NO_TRACKING_INFO.to_owned();
    };

    let courier = record.courier_code.as_deref().unwrap_or("Unknown");
    let status = record.status.as_deref().unwrap_or("unknown");
    let latest_event = record.latest_event.as_deref().unwrap_or("No events recorded");
    let estimated_delivery = record.estimated_delivery.as_deref().unwrap_or("Not available");

    let mut history = String::from("\n\n📋 Tracking History:");
    for event in record.events.iter().take(HISTORY_LIMIT) {
        let date = event.date.as_deref().unwrap_or("No date");
        let event_status = event.status.as_deref().unwrap_or("No status");
        let location = event.location.as_deref().unwrap_or("No location");
        history.push_str(&format!("\n• {date}: {event_status} at {location}"));
    }

    format!(
        "📦 Tracking Information:\n\
         ------------------------\n\
         🚚 Courier: {courier}\n\
         📊 Status: {status}\n\
         🔄 Latest Update: {latest_event}\n\
         📅 Estimated Delivery: {estimated_delivery}\n\
         {history}"
    )
}
