use std::sync::Arc;

use shipmate_agent::{AssistantRuntime, ChatCompletionsClient};
use shipmate_core::config::{AppConfig, ConfigError, LoadOptions};
use shipmate_core::directory::CourierDirectory;
use shipmate_tracking::{TrackingApi, TrackingMoreClient};
use thiserror::Error;
use tracing::{info, warn};

pub struct Application {
    pub config: AppConfig,
    pub runtime: Arc<AssistantRuntime>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

/// Assembles the runtime from an already-loaded config.
///
/// A missing gateway key degrades that subsystem instead of failing startup:
/// without a tracking key turns skip the tracking pipeline, without an LLM
/// key every turn gets the fixed fallback reply. Both degradations are
/// logged once here so operators see them at boot, not per request.
pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let tracking = build_tracking_gateway(&config);
    let directory = build_directory(tracking.as_deref()).await;

    let mut runtime = AssistantRuntime::new(directory);
    if let Some(tracking) = tracking {
        runtime = runtime.with_tracking(tracking);
    }

    if config.llm_enabled() {
        match ChatCompletionsClient::from_config(&config.llm) {
            Ok(client) => runtime = runtime.with_llm(Arc::new(client)),
            Err(error) => {
                warn!(
                    event_name = "system.bootstrap.llm_degraded",
                    correlation_id = "bootstrap",
                    error = %error,
                    "llm gateway unavailable, replies degrade to the fallback message"
                );
            }
        }
    } else {
        warn!(
            event_name = "system.bootstrap.llm_degraded",
            correlation_id = "bootstrap",
            "llm api key not configured, replies degrade to the fallback message"
        );
    }

    info!(
        event_name = "system.bootstrap.complete",
        correlation_id = "bootstrap",
        tracking_enabled = runtime.tracking_enabled(),
        llm_enabled = runtime.llm_enabled(),
        "application bootstrap complete"
    );

    Ok(Application { config, runtime: Arc::new(runtime) })
}

fn build_tracking_gateway(config: &AppConfig) -> Option<Arc<dyn TrackingApi>> {
    if !config.tracking_enabled() {
        warn!(
            event_name = "system.bootstrap.tracking_degraded",
            correlation_id = "bootstrap",
            "tracking api key not configured, tracking lookups are disabled"
        );
        return None;
    }

    match TrackingMoreClient::from_config(&config.tracking) {
        Ok(client) => Some(Arc::new(client)),
        Err(error) => {
            warn!(
                event_name = "system.bootstrap.tracking_degraded",
                correlation_id = "bootstrap",
                error = %error,
                "tracking gateway unavailable, tracking lookups are disabled"
            );
            None
        }
    }
}

/// The courier list is fetched once at startup. A failed fetch is not fatal:
/// the directory falls back to its static well-known tier.
async fn build_directory(tracking: Option<&dyn TrackingApi>) -> CourierDirectory {
    let Some(tracking) = tracking else {
        return CourierDirectory::new();
    };

    match tracking.list_couriers().await {
        Ok(entries) => {
            info!(
                event_name = "system.bootstrap.couriers_loaded",
                correlation_id = "bootstrap",
                courier_count = entries.len(),
                "provider courier list loaded"
            );
            CourierDirectory::with_provider_entries(entries)
        }
        Err(error) => {
            warn!(
                event_name = "system.bootstrap.couriers_fallback",
                correlation_id = "bootstrap",
                error = %error,
                "courier list fetch failed, using the static courier table"
            );
            CourierDirectory::new()
        }
    }
}
