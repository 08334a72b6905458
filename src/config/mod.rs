//! Configuration management for the player
//!
//! Local configuration comes from environment variables (`MARQUEE_*`) with
//! sensible defaults; CMS-driven settings arrive later through
//! `registerDisplay` and are applied at runtime. A fixed allow-list maps
//! CMS `"key|value"` display tags onto config fields.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// CMS connection configuration
    pub cms: CmsConfig,

    /// Display identity configuration
    pub display: DisplayConfig,

    /// Local storage configuration
    pub storage: StorageConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// CMS connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CmsConfig {
    /// Base URL of the CMS
    pub address: String,

    /// CMS server key presented during registration
    pub key: String,

    /// Request timeout in seconds
    pub request_timeout_secs: u64,
}

/// Display identity configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Device name reported in status updates
    pub device_name: String,

    /// Google geocoding API key, settable via the `geoApiKey` display tag
    #[serde(default)]
    pub google_geo_api_key: Option<String>,
}

/// Local storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding offline snapshots and the display identity
    pub state_dir: PathBuf,

    /// Directory the cache component downloads layout/media files into
    pub media_dir: PathBuf,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let address =
            std::env::var("MARQUEE_CMS_ADDRESS").unwrap_or_else(|_| String::from("http://localhost:80"));

        let key = std::env::var("MARQUEE_CMS_KEY").unwrap_or_default();

        let request_timeout_secs = std::env::var("MARQUEE_REQUEST_TIMEOUT")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(30);

        let device_name = std::env::var("MARQUEE_DEVICE_NAME").unwrap_or_else(|_| {
            format!("marquee/{}", env!("CARGO_PKG_VERSION"))
        });

        let state_dir = std::env::var("MARQUEE_STATE_DIR")
            .unwrap_or_else(|_| String::from("data/state"))
            .into();

        let media_dir = std::env::var("MARQUEE_MEDIA_DIR")
            .unwrap_or_else(|_| String::from("data/media"))
            .into();

        let level = std::env::var("MARQUEE_LOG_LEVEL").unwrap_or_else(|_| String::from("info"));
        let format = std::env::var("MARQUEE_LOG_FORMAT").unwrap_or_else(|_| String::from("text"));

        Ok(Self {
            cms: CmsConfig {
                address,
                key,
                request_timeout_secs,
            },
            display: DisplayConfig {
                device_name,
                google_geo_api_key: None,
            },
            storage: StorageConfig {
                state_dir,
                media_dir,
            },
            logging: LoggingConfig { level, format },
        })
    }

    /// Apply one CMS display tag to the config.
    ///
    /// Returns true when the key was recognized. Unknown keys are ignored,
    /// matching the tag allow-list contract.
    pub fn apply_tag(&mut self, key: &str, value: &str) -> bool {
        match key {
            "geoApiKey" => {
                self.display.google_geo_api_key = Some(value.to_string());
                true
            }
            _ => false,
        }
    }
}
