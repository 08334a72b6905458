//! CMS transport contract
//!
//! The core consumes the CMS through this narrow trait; the wire protocol
//! behind it is not the core's business. Every method either returns the
//! typed result or raises a [`TransportError`], which the collection loop
//! classifies: offline-looking failures fall back to the cached snapshot,
//! everything else surfaces as a collection error.

pub mod http;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{RegistrationResult, RequiredFiles, Schedule};

pub use http::HttpCmsTransport;

/// CMS RPC failure.
#[derive(Error, Debug)]
pub enum TransportError {
    /// Request timed out
    #[error("request timed out")]
    Timeout,

    /// The CMS could not be reached at all
    #[error("network unreachable: {0}")]
    Unreachable(String),

    /// The CMS answered with a non-success HTTP status
    #[error("CMS returned status {0}")]
    Status(u16),

    /// The CMS refused the display (registration code was not READY)
    #[error("display not ready: {0}")]
    Rejected(String),

    /// The response body did not match the expected shape
    #[error("invalid response payload: {0}")]
    InvalidPayload(String),
}

impl TransportError {
    /// Whether a later cycle can plausibly succeed without operator help.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, TransportError::InvalidPayload(_))
    }

    /// Whether this failure looks like a dead network rather than a CMS
    /// problem; drives the offline-mode branch.
    pub fn is_offline(&self) -> bool {
        matches!(self, TransportError::Timeout | TransportError::Unreachable(_))
    }
}

/// Status codes reported to the CMS with each `notify_status`.
pub mod status_code {
    /// Everything downloaded and playing
    pub const OK: u8 = 1;
    /// Downloads outstanding
    pub const DOWNLOADING: u8 = 2;
    /// Faults recorded since the last report
    pub const FAULTY: u8 = 3;
}

/// Payload of `notify_status`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub current_layout_id: Option<String>,
    pub device_name: String,
    pub display_name: String,
    pub last_command_success: bool,
    /// One of [`status_code`]
    pub code: u8,
    pub last_layout_change_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

/// Asynchronous CMS RPC surface consumed by the core.
#[async_trait]
pub trait CmsTransport: Send + Sync {
    /// Register the display; returns settings, change tokens, and the
    /// command map for this cycle.
    async fn register_display(&self) -> Result<RegistrationResult, TransportError>;

    /// Fetch the required-files manifest.
    async fn required_files(&self) -> Result<RequiredFiles, TransportError>;

    /// Fetch the schedule.
    async fn schedule(&self) -> Result<Schedule, TransportError>;

    /// Report display status; callers swallow failures.
    async fn notify_status(&self, status: &StatusReport) -> Result<(), TransportError>;

    /// Submit the media inventory XML; callers treat failure as non-fatal.
    async fn media_inventory(&self, xml: &str) -> Result<(), TransportError>;

    /// Report a blacklisted item; fire-and-forget.
    async fn blacklist(&self, id: &str, item_type: &str, reason: &str)
        -> Result<(), TransportError>;

    /// Fetch the current weather snapshot.
    async fn get_weather(&self) -> Result<serde_json::Value, TransportError>;
}
