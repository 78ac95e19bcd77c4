use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use shipmate_core::config::TrackingConfig;
use shipmate_core::domain::tracking::{CourierEntry, TrackingRecord};
use thiserror::Error;
use tracing::debug;

/// Provider meta code for "tracking number already registered". Creates that
/// hit it are treated as idempotent successes by callers.
const META_CODE_ALREADY_TRACKED: u32 = 4101;

const META_CODES_OK: [u32; 2] = [200, 201];

#[derive(Debug, Error)]
pub enum TrackingError {
    #[error("tracking api key is not configured")]
    MissingApiKey,
    #[error("tracking provider request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("tracking provider rejected the request (code {code}): {message}")]
    Api { code: u32, message: String },
}

impl TrackingError {
    /// True for the provider's "tracking already exists" rejection, which
    /// callers of `create_tracking` tolerate.
    pub fn is_already_tracked(&self) -> bool {
        matches!(self, Self::Api { code, .. } if *code == META_CODE_ALREADY_TRACKED)
    }
}

/// Operations the orchestrator needs from the tracking provider.
#[async_trait]
pub trait TrackingApi: Send + Sync {
    async fn list_couriers(&self) -> Result<Vec<CourierEntry>, TrackingError>;

    async fn create_tracking(
        &self,
        tracking_number: &str,
        courier_code: Option<&str>,
    ) -> Result<(), TrackingError>;

    /// Best-guess courier for a tracking number, if the provider has one.
    async fn detect_courier(&self, tracking_number: &str)
        -> Result<Option<String>, TrackingError>;

    /// Current status snapshot; `None` when the provider has no data for
    /// the number (the not-found path, not an error).
    async fn get_tracking_info(
        &self,
        tracking_number: &str,
    ) -> Result<Option<TrackingRecord>, TrackingError>;
}

/// `reqwest`-backed client for the TrackingMore `/v4` API.
pub struct TrackingMoreClient {
    http: reqwest::Client,
    base_url: String,
    api_key: SecretString,
}

impl TrackingMoreClient {
    pub fn from_config(config: &TrackingConfig) -> Result<Self, TrackingError> {
        let api_key = config.api_key.clone().ok_or(TrackingError::MissingApiKey)?;
        if api_key.expose_secret().trim().is_empty() {
            return Err(TrackingError::MissingApiKey);
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(TrackingError::Http)?;

        Ok(Self { http, base_url: config.base_url.trim_end_matches('/').to_owned(), api_key })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Envelope<T>, TrackingError> {
        let response = self
            .http
            .get(self.endpoint(path))
            .header("Tracking-Api-Key", self.api_key.expose_secret())
            .query(query)
            .send()
            .await?
            .error_for_status()?;

        let envelope = response.json::<Envelope<T>>().await?;
        envelope.check_meta()?;
        Ok(envelope)
    }

    async fn post_json<T: serde::de::DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Envelope<T>, TrackingError> {
        let response = self
            .http
            .post(self.endpoint(path))
            .header("Tracking-Api-Key", self.api_key.expose_secret())
            .json(body)
            .send()
            .await?
            .error_for_status()?;

        let envelope = response.json::<Envelope<T>>().await?;
        envelope.check_meta()?;
        Ok(envelope)
    }
}

#[async_trait]
impl TrackingApi for TrackingMoreClient {
    async fn list_couriers(&self) -> Result<Vec<CourierEntry>, TrackingError> {
        let envelope: Envelope<Vec<CourierEntry>> = self.get_json("/couriers", &[]).await?;
        let couriers = envelope.data.unwrap_or_default();
        debug!(
            event_name = "tracking.couriers.listed",
            courier_count = couriers.len(),
            "fetched provider courier list"
        );
        Ok(couriers)
    }

    async fn create_tracking(
        &self,
        tracking_number: &str,
        courier_code: Option<&str>,
    ) -> Result<(), TrackingError> {
        let body = CreateTrackingRequest { tracking_number, courier_code };
        let _envelope: Envelope<serde_json::Value> =
            self.post_json("/trackings/create", &body).await?;
        debug!(
            event_name = "tracking.created",
            tracking_number,
            courier_code = courier_code.unwrap_or("auto"),
            "tracking registered with provider"
        );
        Ok(())
    }

    async fn detect_courier(
        &self,
        tracking_number: &str,
    ) -> Result<Option<String>, TrackingError> {
        let body = DetectCourierRequest { tracking_number };
        let envelope: Envelope<Vec<DetectedCourier>> =
            self.post_json("/couriers/detect", &body).await?;

        let detected = envelope
            .data
            .unwrap_or_default()
            .into_iter()
            .next()
            .and_then(|candidate| candidate.courier_code);
        debug!(
            event_name = "tracking.courier_detected",
            tracking_number,
            courier_code = detected.as_deref().unwrap_or("none"),
            "courier detection completed"
        );
        Ok(detected)
    }

    async fn get_tracking_info(
        &self,
        tracking_number: &str,
    ) -> Result<Option<TrackingRecord>, TrackingError> {
        let envelope: Envelope<Vec<TrackingRecord>> = self
            .get_json("/trackings/get", &[("tracking_numbers", tracking_number)])
            .await?;
        Ok(envelope.data.unwrap_or_default().into_iter().next())
    }
}

#[derive(Debug, Serialize)]
struct CreateTrackingRequest<'a> {
    tracking_number: &'a str,
    courier_code: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct DetectCourierRequest<'a> {
    tracking_number: &'a str,
}

#[derive(Debug, Deserialize)]
struct DetectedCourier {
    courier_code: Option<String>,
}

// Both fields are plain `Option`s so serde treats absence as `None` without
// putting a `Default` bound on `T`.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    meta: Option<Meta>,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct Meta {
    code: Option<u32>,
    message: Option<String>,
}

impl<T> Envelope<T> {
    fn check_meta(&self) -> Result<(), TrackingError> {
        let Some(meta) = &self.meta else {
            return Ok(());
        };
        let Some(code) = meta.code else {
            return Ok(());
        };
        if META_CODES_OK.contains(&code) {
            return Ok(());
        }
        Err(TrackingError::Api {
            code,
            message: meta.message.clone().unwrap_or_else(|| "no provider message".to_owned()),
        })
    }
}
