//! Default JSON HTTP binding of the CMS transport
//!
//! A minimal binding so the player runs against any CMS that speaks this
//! JSON shape; it deliberately defines no protocol beyond the method
//! surface of [`CmsTransport`]. Registration posts the display identity;
//! the remaining calls are plain GET/POST against fixed paths.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use crate::config::CmsConfig;
use crate::models::{RegistrationResult, RequiredFiles, Schedule};
use crate::store::DisplayIdentity;

use super::{CmsTransport, StatusReport, TransportError};

/// JSON HTTP implementation of [`CmsTransport`].
pub struct HttpCmsTransport {
    client: Client,
    base: String,
    server_key: String,
    device_name: String,
    identity: DisplayIdentity,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RegisterRequest<'a> {
    hardware_key: &'a str,
    server_key: &'a str,
    device_name: &'a str,
    client_version: &'a str,
}

impl HttpCmsTransport {
    pub fn new(
        config: &CmsConfig,
        device_name: impl Into<String>,
        identity: DisplayIdentity,
    ) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .gzip(true)
            .build()
            .map_err(|e| TransportError::Unreachable(e.to_string()))?;

        Ok(Self {
            client,
            base: config.address.trim_end_matches('/').to_string(),
            server_key: config.key.clone(),
            device_name: device_name.into(),
            identity,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    fn map_err(e: reqwest::Error) -> TransportError {
        if e.is_timeout() {
            TransportError::Timeout
        } else if e.is_connect() {
            TransportError::Unreachable(e.to_string())
        } else if let Some(status) = e.status() {
            TransportError::Status(status.as_u16())
        } else if e.is_decode() {
            TransportError::InvalidPayload(e.to_string())
        } else {
            TransportError::Unreachable(e.to_string())
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<T, TransportError> {
        let response = self
            .client
            .get(self.url(path))
            .query(&[("hardwareKey", self.identity.hardware_key.as_str())])
            .send()
            .await
            .map_err(Self::map_err)?
            .error_for_status()
            .map_err(Self::map_err)?;

        response.json::<T>().await.map_err(Self::map_err)
    }
}

#[async_trait]
impl CmsTransport for HttpCmsTransport {
    async fn register_display(&self) -> Result<RegistrationResult, TransportError> {
        let request = RegisterRequest {
            hardware_key: &self.identity.hardware_key,
            server_key: &self.server_key,
            device_name: &self.device_name,
            client_version: env!("CARGO_PKG_VERSION"),
        };

        let response = self
            .client
            .post(self.url("/api/display/register"))
            .json(&request)
            .send()
            .await
            .map_err(Self::map_err)?
            .error_for_status()
            .map_err(Self::map_err)?;

        response
            .json::<RegistrationResult>()
            .await
            .map_err(Self::map_err)
    }

    async fn required_files(&self) -> Result<RequiredFiles, TransportError> {
        self.get_json("/api/display/requiredFiles").await
    }

    async fn schedule(&self) -> Result<Schedule, TransportError> {
        self.get_json("/api/display/schedule").await
    }

    async fn notify_status(&self, status: &StatusReport) -> Result<(), TransportError> {
        self.client
            .post(self.url("/api/display/status"))
            .query(&[("hardwareKey", self.identity.hardware_key.as_str())])
            .json(status)
            .send()
            .await
            .map_err(Self::map_err)?
            .error_for_status()
            .map_err(Self::map_err)?;
        Ok(())
    }

    async fn media_inventory(&self, xml: &str) -> Result<(), TransportError> {
        self.client
            .post(self.url("/api/display/mediaInventory"))
            .query(&[("hardwareKey", self.identity.hardware_key.as_str())])
            .header(reqwest::header::CONTENT_TYPE, "text/xml")
            .body(xml.to_string())
            .send()
            .await
            .map_err(Self::map_err)?
            .error_for_status()
            .map_err(Self::map_err)?;
        Ok(())
    }

    async fn blacklist(
        &self,
        id: &str,
        item_type: &str,
        reason: &str,
    ) -> Result<(), TransportError> {
        self.client
            .post(self.url("/api/display/blacklist"))
            .query(&[("hardwareKey", self.identity.hardware_key.as_str())])
            .json(&serde_json::json!({
                "id": id,
                "type": item_type,
                "reason": reason,
            }))
            .send()
            .await
            .map_err(Self::map_err)?
            .error_for_status()
            .map_err(Self::map_err)?;
        Ok(())
    }

    async fn get_weather(&self) -> Result<serde_json::Value, TransportError> {
        self.get_json("/api/display/weather").await
    }
}
