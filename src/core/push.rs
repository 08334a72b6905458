//! Push-channel lifecycle
//!
//! The CMS can reach the player in real time over a WebSocket push
//! channel. The core validates the registered address, starts the channel
//! lazily on the first cycle that has a usable address, and restarts it
//! on later cycles if the connection dropped. The concrete transport is
//! injected; it talks back to the core only through a [`PushHandle`],
//! which exposes exactly the callback surface the CMS may drive.

use async_trait::async_trait;
use tracing::{info, warn};
use url::Url;

use crate::events::{PlayerEvent, PushMisconfigReason};
use crate::models::FileType;

use super::runtime::CoreMessage;
use super::PlayerCore;

/// A real-time push transport owned by the core.
#[async_trait]
pub trait PushChannel: Send + Sync {
    /// Connect to the CMS push endpoint. Implementations receive a
    /// [`PushHandle`] at construction and deliver messages through it.
    async fn start(&mut self, url: &str, cms_key: &str) -> anyhow::Result<()>;

    /// Disconnect; must be idempotent.
    async fn stop(&mut self);

    fn is_connected(&self) -> bool;
}

/// The narrow callback surface handed to push transports.
///
/// Holding a handle rather than the core itself breaks the ownership
/// cycle between the two; every method enqueues a message for the
/// runtime task and returns immediately.
#[derive(Clone)]
pub struct PushHandle {
    tx: tokio::sync::mpsc::Sender<CoreMessage>,
}

impl PushHandle {
    pub(crate) fn new(tx: tokio::sync::mpsc::Sender<CoreMessage>) -> Self {
        Self { tx }
    }

    async fn send(&self, message: CoreMessage) {
        if self.tx.send(message).await.is_err() {
            warn!("core is gone; push message dropped");
        }
    }

    pub async fn change_layout(
        &self,
        layout: String,
        duration: Option<u64>,
        change_mode: Option<String>,
    ) {
        self.send(CoreMessage::ChangeLayout {
            layout,
            duration,
            change_mode,
        })
        .await;
    }

    pub async fn overlay_layout(&self, layout: String, duration: Option<u64>) {
        self.send(CoreMessage::OverlayLayout { layout, duration }).await;
    }

    pub async fn revert_to_schedule(&self) {
        self.send(CoreMessage::RevertToSchedule).await;
    }

    pub async fn purge_all(&self) {
        self.send(CoreMessage::PurgeAll).await;
    }

    pub async fn execute_command(&self, code: String) {
        self.send(CoreMessage::ExecuteCommand { code }).await;
    }

    pub async fn trigger(&self, code: String) {
        self.send(CoreMessage::HandleTrigger { code }).await;
    }

    pub async fn screenshot(&self) {
        self.send(CoreMessage::Screenshot).await;
    }

    pub async fn report_location(&self, latitude: f64, longitude: f64) {
        self.send(CoreMessage::SetLocation {
            latitude,
            longitude,
        })
        .await;
    }

    pub async fn media_ready(&self, id: String, file_type: FileType) {
        self.send(CoreMessage::MediaReady { id, file_type }).await;
    }

    pub async fn collect_now(&self) {
        self.send(CoreMessage::Collect).await;
    }
}

/// Validate a registered push address.
pub(crate) fn validate_address(address: Option<&str>) -> Result<&str, PushMisconfigReason> {
    let address = match address {
        Some(a) if !a.trim().is_empty() => a,
        _ => return Err(PushMisconfigReason::Missing),
    };

    if address.starts_with("tcp://") {
        return Err(PushMisconfigReason::WrongProtocol);
    }

    let Ok(url) = Url::parse(address) else {
        return Err(PushMisconfigReason::WrongProtocol);
    };
    if !matches!(url.scheme(), "ws" | "wss") {
        return Err(PushMisconfigReason::WrongProtocol);
    }

    match url.host_str() {
        Some(host) if host == "example.com" || host.starts_with("example.") => {
            Err(PushMisconfigReason::Placeholder)
        }
        Some(_) => Ok(address),
        None => Err(PushMisconfigReason::WrongProtocol),
    }
}

impl PlayerCore {
    /// Step the push-channel lifecycle; called on every collection cycle.
    pub(crate) async fn manage_push_channel(&mut self) {
        let address = self.settings.xmr_web_socket_address.clone();
        let url = match validate_address(address.as_deref()) {
            Ok(url) => url.to_string(),
            Err(reason) => {
                self.bus.emit(PlayerEvent::PushMisconfigured { reason });
                return;
            }
        };

        let Some(channel) = self.push.as_mut() else {
            // no transport injected on this platform
            return;
        };

        let cms_key = self.settings.xmr_cms_key.clone().unwrap_or_default();

        if !self.push_started {
            match channel.start(&url, &cms_key).await {
                Ok(()) => {
                    info!(url = %url, "push channel connected");
                    self.push_started = true;
                    self.bus.emit(PlayerEvent::PushConnected);
                }
                Err(e) => warn!(url = %url, error = %e, "push channel start failed"),
            }
        } else if !channel.is_connected() {
            match channel.start(&url, &cms_key).await {
                Ok(()) => {
                    info!(url = %url, "push channel reconnected");
                    self.bus.emit(PlayerEvent::PushReconnected);
                }
                Err(e) => warn!(url = %url, error = %e, "push channel reconnect failed"),
            }
        }
    }

    /// Stop the channel on shutdown; safe to call repeatedly.
    pub(crate) async fn stop_push_channel(&mut self) {
        if let Some(channel) = self.push.as_mut() {
            channel.stop().await;
        }
        self.push_started = false;
    }
}
