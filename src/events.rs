//! Typed orchestration events
//!
//! The core never holds references to the renderer, cache, or platform
//! shell; it broadcasts [`PlayerEvent`] values and lets subscribers act.
//! Payload shapes are part of the public contract, so every variant is
//! serializable for platform bridges that forward events over IPC.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::models::{DataConnector, PurgeItem, RequiredFile};

/// Default bus capacity; laggy subscribers drop oldest events.
const CHANNEL_CAPACITY: usize = 256;

/// Why the push channel was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PushMisconfigReason {
    /// No address registered
    Missing,
    /// `tcp://` endpoint; only WebSocket transports are supported
    WrongProtocol,
    /// `example.*` placeholder domain left in the CMS config
    Placeholder,
}

/// Everything the orchestrator tells the outside world.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum PlayerEvent {
    // -- collection cycle ----------------------------------------------------
    CollectionStart,
    RegisterComplete {
        display_name: String,
    },
    FilesReceived {
        count: usize,
    },
    PurgeRequest {
        items: Vec<PurgeItem>,
    },
    PurgeAllRequest,
    ScheduleReceived {
        layout_count: usize,
        campaign_count: usize,
    },
    LayoutsScheduled {
        layouts: Vec<String>,
    },
    DownloadRequest {
        layout_order: Vec<String>,
        files: Vec<RequiredFile>,
        layout_dependants: Vec<String>,
    },
    CacheAnalysisRequest {
        files: Vec<RequiredFile>,
    },
    DataConnectorsChanged {
        connectors: Vec<DataConnector>,
    },
    CollectionComplete,
    CollectionError {
        message: String,
    },
    OfflineMode {
        active: bool,
    },

    // -- layout selection ----------------------------------------------------
    LayoutPrepareRequest {
        layout: String,
        change_mode: Option<String>,
    },
    LayoutAlreadyPlaying {
        layout: String,
    },
    NoLayoutsScheduled,
    OverlayLayoutRequest {
        layout: String,
    },
    RevertToSchedule,
    CheckPendingLayout {
        layout: String,
        required: Vec<String>,
    },
    SyncSignal {
        layout: String,
        is_lead: bool,
    },

    // -- blacklist -----------------------------------------------------------
    LayoutBlacklisted {
        layout: String,
        failures: u32,
        reason: String,
    },
    LayoutUnblacklisted {
        layout: String,
    },

    // -- commands ------------------------------------------------------------
    ScheduledCommand {
        code: String,
        date: String,
    },
    CommandResult {
        code: String,
        success: bool,
        status: Option<u16>,
        reason: Option<String>,
    },
    ExecuteNativeCommand {
        code: String,
        command_string: String,
    },
    ExecuteCommand {
        code: String,
    },
    NavigateToWidget {
        widget_id: String,
    },

    // -- push channel --------------------------------------------------------
    PushConnected,
    PushReconnected,
    PushMisconfigured {
        reason: PushMisconfigReason,
    },

    // -- reporting -----------------------------------------------------------
    SubmitFaultsRequest,
    SubmitStatsRequest,
    StatusNotifyFailed {
        message: String,
    },
    ScreenshotRequest,

    // -- lifecycle -----------------------------------------------------------
    CleanupComplete,
}

impl PlayerEvent {
    /// Short name used in log lines.
    pub fn name(&self) -> &'static str {
        match self {
            PlayerEvent::CollectionStart => "collection-start",
            PlayerEvent::RegisterComplete { .. } => "register-complete",
            PlayerEvent::FilesReceived { .. } => "files-received",
            PlayerEvent::PurgeRequest { .. } => "purge-request",
            PlayerEvent::PurgeAllRequest => "purge-all-request",
            PlayerEvent::ScheduleReceived { .. } => "schedule-received",
            PlayerEvent::LayoutsScheduled { .. } => "layouts-scheduled",
            PlayerEvent::DownloadRequest { .. } => "download-request",
            PlayerEvent::CacheAnalysisRequest { .. } => "cache-analysis-request",
            PlayerEvent::DataConnectorsChanged { .. } => "data-connectors-changed",
            PlayerEvent::CollectionComplete => "collection-complete",
            PlayerEvent::CollectionError { .. } => "collection-error",
            PlayerEvent::OfflineMode { .. } => "offline-mode",
            PlayerEvent::LayoutPrepareRequest { .. } => "layout-prepare-request",
            PlayerEvent::LayoutAlreadyPlaying { .. } => "layout-already-playing",
            PlayerEvent::NoLayoutsScheduled => "no-layouts-scheduled",
            PlayerEvent::OverlayLayoutRequest { .. } => "overlay-layout-request",
            PlayerEvent::RevertToSchedule => "revert-to-schedule",
            PlayerEvent::CheckPendingLayout { .. } => "check-pending-layout",
            PlayerEvent::SyncSignal { .. } => "sync-signal",
            PlayerEvent::LayoutBlacklisted { .. } => "layout-blacklisted",
            PlayerEvent::LayoutUnblacklisted { .. } => "layout-unblacklisted",
            PlayerEvent::ScheduledCommand { .. } => "scheduled-command",
            PlayerEvent::CommandResult { .. } => "command-result",
            PlayerEvent::ExecuteNativeCommand { .. } => "execute-native-command",
            PlayerEvent::ExecuteCommand { .. } => "execute-command",
            PlayerEvent::NavigateToWidget { .. } => "navigate-to-widget",
            PlayerEvent::PushConnected => "push-connected",
            PlayerEvent::PushReconnected => "push-reconnected",
            PlayerEvent::PushMisconfigured { .. } => "push-misconfigured",
            PlayerEvent::SubmitFaultsRequest => "submit-faults-request",
            PlayerEvent::SubmitStatsRequest => "submit-stats-request",
            PlayerEvent::StatusNotifyFailed { .. } => "status-notify-failed",
            PlayerEvent::ScreenshotRequest => "screenshot-request",
            PlayerEvent::CleanupComplete => "cleanup-complete",
        }
    }
}

/// Broadcast bus carrying [`PlayerEvent`]s to any number of subscribers.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<PlayerEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Subscribe to all subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.sender.subscribe()
    }

    /// Emit an event; delivery is best-effort and never blocks the core.
    pub fn emit(&self, event: PlayerEvent) {
        tracing::debug!(event = event.name(), "emit");
        let _ = self.sender.send(event);
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
