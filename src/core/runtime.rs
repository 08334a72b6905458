//! The orchestration runtime
//!
//! Every entrypoint into the core — timers, renderer callbacks, push
//! messages, CLI nudges — becomes a [`CoreMessage`] on one channel,
//! consumed by a single task. That task is the only place core state
//! mutates, which is the whole concurrency story: no locks are held
//! across suspension points because there is nothing to lock.
//!
//! Two timers live here: the collection timer, whose period the core
//! adjusts (normal interval online, backoff ladder offline), and an
//! independent faster timer that only asks the platform to submit faults.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::events::PlayerEvent;
use crate::models::FileType;

use super::PlayerCore;

/// Period of the fault-submission timer.
pub const FAULTS_INTERVAL_SECS: u64 = 60;

/// Everything the outside world can ask the core to do.
#[derive(Debug, Clone)]
pub enum CoreMessage {
    /// Run a collection cycle now
    Collect,
    /// The renderer finished the current layout
    AdvanceNext,
    /// Manual backward navigation
    AdvancePrevious,
    /// The renderer successfully started a layout
    LayoutStarted { layout: String },
    /// The renderer failed to render a layout
    LayoutFailed { layout: String, reason: String },
    /// Pushed layout override
    ChangeLayout {
        layout: String,
        duration: Option<u64>,
        change_mode: Option<String>,
    },
    /// Pushed overlay
    OverlayLayout {
        layout: String,
        duration: Option<u64>,
    },
    /// Drop any override
    RevertToSchedule,
    /// Timer-driven revert for an override generation
    AutoRevert { generation: u64 },
    /// Dispatch a trigger code
    HandleTrigger { code: String },
    /// Execute a display command
    ExecuteCommand { code: String },
    /// The cache reports a file ready
    MediaReady { id: String, file_type: FileType },
    /// The renderer is waiting for files before mounting a layout
    SetPending {
        layout: String,
        required: Vec<String>,
    },
    /// Platform or push-channel location report
    SetLocation { latitude: f64, longitude: f64 },
    /// The renderer observed a layout's real duration
    RecordLayoutDuration { layout: String, secs: u32 },
    /// Pushed purge-all
    PurgeAll,
    /// Pushed screenshot request
    Screenshot,
    /// Stop the runtime
    Shutdown,
}

/// Cloneable sender for [`CoreMessage`]s.
#[derive(Clone)]
pub struct CoreHandle {
    tx: mpsc::Sender<CoreMessage>,
}

impl CoreHandle {
    pub(crate) fn new(tx: mpsc::Sender<CoreMessage>) -> Self {
        Self { tx }
    }

    /// The raw sender, for building a [`super::push::PushHandle`].
    pub fn push_handle(&self) -> super::push::PushHandle {
        super::push::PushHandle::new(self.tx.clone())
    }

    pub async fn send(&self, message: CoreMessage) {
        if self.tx.send(message).await.is_err() {
            debug!("core runtime is gone; message dropped");
        }
    }

    pub async fn collect_now(&self) {
        self.send(CoreMessage::Collect).await;
    }

    pub async fn advance_next(&self) {
        self.send(CoreMessage::AdvanceNext).await;
    }

    pub async fn advance_previous(&self) {
        self.send(CoreMessage::AdvancePrevious).await;
    }

    pub async fn layout_started(&self, layout: impl Into<String>) {
        self.send(CoreMessage::LayoutStarted {
            layout: layout.into(),
        })
        .await;
    }

    pub async fn layout_failed(&self, layout: impl Into<String>, reason: impl Into<String>) {
        self.send(CoreMessage::LayoutFailed {
            layout: layout.into(),
            reason: reason.into(),
        })
        .await;
    }

    pub async fn change_layout(
        &self,
        layout: impl Into<String>,
        duration: Option<u64>,
        change_mode: Option<String>,
    ) {
        self.send(CoreMessage::ChangeLayout {
            layout: layout.into(),
            duration,
            change_mode,
        })
        .await;
    }

    pub async fn revert_to_schedule(&self) {
        self.send(CoreMessage::RevertToSchedule).await;
    }

    pub async fn shutdown(&self) {
        self.send(CoreMessage::Shutdown).await;
    }
}

/// Drive the core until shutdown. Consumes the core; all further access
/// goes through [`CoreHandle`] and the event bus.
pub async fn run(mut core: PlayerCore) {
    let Some(mut rx) = core.rx.take() else {
        error!("runtime started twice; refusing");
        return;
    };

    info!("player core starting");

    // first cycle immediately; it installs the periodic cadence
    let _ = core.collect().await;
    let mut next_collect_at = Instant::now() + core.next_collect_delay;

    let mut faults_timer =
        tokio::time::interval(Duration::from_secs(FAULTS_INTERVAL_SECS));
    faults_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    faults_timer.tick().await; // the immediate first tick

    loop {
        tokio::select! {
            _ = tokio::time::sleep_until(next_collect_at) => {
                let _ = core.collect().await;
                next_collect_at = Instant::now() + core.next_collect_delay;
            }

            _ = faults_timer.tick(), if core.first_cycle_done => {
                core.events().emit(PlayerEvent::SubmitFaultsRequest);
            }

            message = rx.recv() => {
                match message {
                    None | Some(CoreMessage::Shutdown) => break,
                    Some(CoreMessage::Collect) => {
                        let _ = core.collect().await;
                        next_collect_at = Instant::now() + core.next_collect_delay;
                    }
                    Some(message) => dispatch(&mut core, message).await,
                }
            }
        }
    }

    info!("player core stopping");
    // emitted before subscribers are dropped so platforms can flush
    core.events().emit(PlayerEvent::CleanupComplete);
    core.stop_push_channel().await;
}

async fn dispatch(core: &mut PlayerCore, message: CoreMessage) {
    match message {
        // handled in the select loop
        CoreMessage::Collect | CoreMessage::Shutdown => unreachable!("handled by run loop"),

        CoreMessage::AdvanceNext => core.advance_next(),
        CoreMessage::AdvancePrevious => core.advance_previous(),
        CoreMessage::LayoutStarted { layout } => core.layout_started(&layout),
        CoreMessage::LayoutFailed { layout, reason } => core.layout_failed(&layout, &reason),
        CoreMessage::ChangeLayout {
            layout,
            duration,
            change_mode,
        } => core.change_layout(&layout, duration, change_mode),
        CoreMessage::OverlayLayout { layout, duration } => {
            core.overlay_layout(&layout, duration)
        }
        CoreMessage::RevertToSchedule => core.revert_to_schedule(),
        CoreMessage::AutoRevert { generation } => core.handle_auto_revert(generation),
        CoreMessage::HandleTrigger { code } => core.handle_trigger(&code),
        CoreMessage::ExecuteCommand { code } => core.execute_command(&code).await,
        CoreMessage::MediaReady { id, file_type } => core.notify_media_ready(&id, file_type),
        CoreMessage::SetPending { layout, required } => core.set_pending(&layout, required),
        CoreMessage::SetLocation {
            latitude,
            longitude,
        } => core.set_location(latitude, longitude),
        CoreMessage::RecordLayoutDuration { layout, secs } => {
            core.record_layout_duration(&layout, secs)
        }
        CoreMessage::PurgeAll => core.events().emit(PlayerEvent::PurgeAllRequest),
        CoreMessage::Screenshot => core.events().emit(PlayerEvent::ScreenshotRequest),
    }
}
