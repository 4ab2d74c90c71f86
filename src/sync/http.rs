//! HTTP adapter for the remote check-in service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use serde_json::json;

use super::item::ActionPayload;
use super::remote::{CheckInRemote, RemoteError};
use crate::config::RemoteConfig;
use crate::error::KioskError;

/// Header carrying the item's idempotency key.
pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// Calls the check-in API over HTTP.
pub struct HttpCheckInRemote {
    client: reqwest::Client,
    base_url: Url,
    api_token: Option<String>,
    kiosk_id: Option<String>,
}

impl HttpCheckInRemote {
    /// Build a client from the remote settings.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the base URL cannot carry a path, or `Remote` if
    /// the HTTP client cannot be constructed.
    pub fn from_config(config: &RemoteConfig) -> Result<Self, KioskError> {
        let base_url = Url::parse(config.base_url.trim())
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| {
                KioskError::Config(format!(
                    "remote.base_url is not a valid URL: {}",
                    config.base_url
                ))
            })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| KioskError::Remote(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            api_token: config.api_token.clone(),
            kiosk_id: config.kiosk_id.clone(),
        })
    }

    /// Ids are pushed as escaped path segments, never spliced into the string.
    fn endpoint(&self, payload: &ActionPayload) -> Result<Url, RemoteError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|()| {
                RemoteError::network(format!("base URL cannot carry a path: {}", self.base_url))
            })?;
            segments.pop_if_empty();
            match payload {
                ActionPayload::CompleteCheckIn(p) => {
                    segments.extend([
                        "campgrounds",
                        p.campground_id.as_str(),
                        "reservations",
                        p.reservation_id.as_str(),
                        "check-in",
                    ]);
                },
            }
        }
        Ok(url)
    }
}

#[async_trait]
impl CheckInRemote for HttpCheckInRemote {
    async fn perform_action(
        &self,
        payload: &ActionPayload,
        idempotency_key: &str,
    ) -> Result<(), RemoteError> {
        let body = match payload {
            ActionPayload::CompleteCheckIn(p) => json!({
                "addOnIds": p.add_on_ids,
                "addOnTotalCents": p.add_on_total_cents,
                "paymentReference": p.payment_reference,
            }),
        };

        let mut request = self
            .client
            .post(self.endpoint(payload)?)
            .header(IDEMPOTENCY_HEADER, idempotency_key)
            .json(&body);

        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }
        if let Some(kiosk) = &self.kiosk_id {
            request = request.header("X-Kiosk-Id", kiosk);
        }

        let response = request
            .send()
            .await
            .map_err(|e| RemoteError::network(format!("request failed: {e}")))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let text = response.text().await.unwrap_or_default();
        let message = if text.trim().is_empty() {
            status
                .canonical_reason()
                .unwrap_or("request rejected")
                .to_string()
        } else {
            text
        };

        Err(RemoteError::new(Some(status.as_u16()), message))
    }
}
