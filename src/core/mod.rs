//! The player orchestration core
//!
//! [`PlayerCore`] owns every piece of mutable orchestration state and is
//! driven from a single task (see [`runtime`]): timers and external
//! callers alike funnel through one message channel, so no two handlers
//! ever interleave. Collaborators are reached only through capability
//! seams — the CMS through [`crate::transport::CmsTransport`], the push
//! transport through [`push::PushChannel`], everything else through
//! broadcast [`crate::events::PlayerEvent`]s.
//!
//! Submodules split the behavior:
//!
//! - [`collection`] - the periodic CMS collection cycle and offline mode
//! - [`selector`] - round-robin layout selection and override handling
//! - [`commands`] - scheduled and on-demand command execution
//! - [`push`] - push-channel validation and lifecycle
//! - [`inventory`] - media inventory report construction
//! - [`runtime`] - the message loop and timers

pub mod collection;
pub mod commands;
pub mod inventory;
pub mod push;
pub mod runtime;
pub mod selector;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::clock::{Clock, SharedClock, SystemClock};
use crate::config::Config;
use crate::events::EventBus;
use crate::models::{
    CommandDef, PlayerSettings, RegistrationResult, RequiredFiles, Schedule, SyncConfig,
};
use crate::schedule::evaluator::ResolvedLayout;
use crate::schedule::{BlacklistTracker, PlayHistory};
use crate::store::{DisplayIdentity, OfflineStore};
use crate::timeline::LayoutDurations;
use crate::transport::CmsTransport;
use crate::utils::Backoff;

use push::PushChannel;
use runtime::CoreMessage;
use selector::LayoutOverride;

/// Queue depth for core messages; senders get backpressure beyond this.
const MESSAGE_CAPACITY: usize = 64;

/// Callback the binary installs so CMS log-level changes reach the
/// tracing subscriber.
pub type LogLevelApplier = Box<dyn Fn(&str) + Send + Sync>;

/// The orchestrator. All state lives here; all mutation happens on the
/// runtime task.
pub struct PlayerCore {
    pub(crate) config: Config,
    pub(crate) clock: SharedClock,
    pub(crate) bus: EventBus,
    pub(crate) transport: Arc<dyn CmsTransport>,
    pub(crate) store: OfflineStore,
    pub(crate) http_client: reqwest::Client,

    // push channel lifecycle
    pub(crate) push: Option<Box<dyn PushChannel>>,
    pub(crate) push_started: bool,

    // evaluator inputs
    pub(crate) schedule: Schedule,
    pub(crate) weather: Option<serde_json::Value>,
    pub(crate) display_properties: HashMap<String, String>,
    pub(crate) player_location: Option<(f64, f64)>,

    // selection state
    pub(crate) active: Vec<ResolvedLayout>,
    pub(crate) current_layout_id: Option<String>,
    pub(crate) current_layout_index: usize,
    pub(crate) layout_override: Option<LayoutOverride>,
    pub(crate) override_generation: u64,
    pub(crate) pending_layouts: HashMap<String, Vec<String>>,

    // playback accounting
    pub(crate) history: PlayHistory,
    pub(crate) blacklist: BlacklistTracker,
    pub(crate) durations: LayoutDurations,
    pub(crate) media_ready: HashSet<String>,
    pub(crate) last_layout_change: Option<chrono::DateTime<chrono::Utc>>,

    // collection state
    pub(crate) collecting: bool,
    pub(crate) offline_mode: bool,
    pub(crate) backoff: Backoff,
    pub(crate) settings: PlayerSettings,
    pub(crate) sync_config: Option<SyncConfig>,
    pub(crate) commands: HashMap<String, CommandDef>,
    pub(crate) executed_commands: HashSet<String>,
    pub(crate) last_check_rf: Option<String>,
    pub(crate) last_check_schedule: Option<String>,
    pub(crate) required_files: Option<RequiredFiles>,
    pub(crate) identity: Option<DisplayIdentity>,
    pub(crate) display_name: String,
    pub(crate) last_command_success: bool,
    pub(crate) first_cycle_done: bool,
    pub(crate) next_collect_delay: Duration,

    // runtime plumbing
    pub(crate) self_tx: mpsc::Sender<CoreMessage>,
    pub(crate) rx: Option<mpsc::Receiver<CoreMessage>>,
    pub(crate) log_level_applier: Option<LogLevelApplier>,

    #[cfg(test)]
    pub(crate) mock_transport: Option<Arc<testutil::MockTransport>>,
}

impl PlayerCore {
    /// Build a core around a transport. The returned value is inert until
    /// [`runtime::run`] drives it (or a test calls its methods directly).
    pub fn new(config: Config, transport: Arc<dyn CmsTransport>) -> Self {
        Self::with_clock(config, transport, Arc::new(SystemClock))
    }

    /// Build with an injected clock.
    pub fn with_clock(
        config: Config,
        transport: Arc<dyn CmsTransport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (self_tx, rx) = mpsc::channel(MESSAGE_CAPACITY);
        let store = OfflineStore::new(&config.storage.state_dir);
        let settings = PlayerSettings::default();
        let collect_interval = Duration::from_secs(settings.collect_interval);

        Self {
            clock,
            bus: EventBus::new(),
            transport,
            store,
            http_client: reqwest::Client::new(),
            push: None,
            push_started: false,
            schedule: Schedule::default(),
            weather: None,
            display_properties: HashMap::new(),
            player_location: None,
            active: Vec::new(),
            current_layout_id: None,
            current_layout_index: 0,
            layout_override: None,
            override_generation: 0,
            pending_layouts: HashMap::new(),
            history: PlayHistory::new(),
            blacklist: BlacklistTracker::default(),
            durations: LayoutDurations::new(),
            media_ready: HashSet::new(),
            last_layout_change: None,
            collecting: false,
            offline_mode: false,
            backoff: Backoff::new(collect_interval),
            settings,
            sync_config: None,
            commands: HashMap::new(),
            executed_commands: HashSet::new(),
            last_check_rf: None,
            last_check_schedule: None,
            required_files: None,
            identity: None,
            display_name: String::new(),
            last_command_success: true,
            first_cycle_done: false,
            next_collect_delay: collect_interval,
            self_tx,
            rx: Some(rx),
            log_level_applier: None,
            #[cfg(test)]
            mock_transport: None,
            config,
        }
    }

    /// Attach a push channel implementation; lifecycle is managed by the
    /// collection cycle.
    pub fn with_push_channel(mut self, channel: Box<dyn PushChannel>) -> Self {
        self.push = Some(channel);
        self
    }

    /// Install the hook that applies CMS log-level changes.
    pub fn with_log_level_applier(mut self, applier: LogLevelApplier) -> Self {
        self.log_level_applier = Some(applier);
        self
    }

    /// The event bus collaborators subscribe on.
    pub fn events(&self) -> &EventBus {
        &self.bus
    }

    /// A cloneable handle for sending entrypoint messages to the runtime.
    pub fn handle(&self) -> runtime::CoreHandle {
        runtime::CoreHandle::new(self.self_tx.clone())
    }

    /// What the renderer is currently showing, if anything.
    pub fn current_layout(&self) -> Option<&str> {
        self.current_layout_id.as_deref()
    }

    /// Whether an override is driving selection.
    pub fn is_layout_overridden(&self) -> bool {
        self.layout_override.is_some()
    }

    /// The active override, if any.
    pub fn current_override(&self) -> Option<&selector::LayoutOverride> {
        self.layout_override.as_ref()
    }

    /// Whether the core is replaying cached data.
    pub fn is_offline(&self) -> bool {
        self.offline_mode
    }

    pub fn is_layout_blacklisted(&self, layout: &str) -> bool {
        self.blacklist.is_blacklisted(layout)
    }

    /// The duration ledger used for timeline prediction.
    pub fn durations(&self) -> &LayoutDurations {
        &self.durations
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// Update the player's reported coordinates; feeds geo fencing and
    /// status reports.
    pub fn set_location(&mut self, latitude: f64, longitude: f64) {
        tracing::debug!(latitude, longitude, "player location updated");
        self.player_location = Some((latitude, longitude));
    }

    /// Correct a layout duration from an observed play.
    pub fn record_layout_duration(&mut self, layout: &str, secs: u32) {
        self.durations.record(layout, secs);
    }

    // ------------------------------------------------------------------------
    // settings application
    // ------------------------------------------------------------------------

    /// Apply a registration result: settings, log level, sync config,
    /// tag-derived config, and the display command map.
    pub(crate) fn apply_settings(&mut self, reg: &RegistrationResult) {
        if let Some(level) = reg.settings.log_level.as_deref() {
            if self.settings.log_level.as_deref() != Some(level) {
                tracing::info!(level, "applying CMS log level");
                if let Some(applier) = &self.log_level_applier {
                    applier(level);
                }
            }
        }

        self.settings = reg.settings.clone();
        self.sync_config = reg.sync_config.clone();
        self.commands = reg.commands.clone();

        // tags double as the display property bag for criteria, and a
        // fixed allow-list of them lands in local config
        self.display_properties.clear();
        for (key, value) in reg.tag_pairs() {
            self.display_properties
                .insert(key.to_string(), value.to_string());
            if self.config.apply_tag(key, value) {
                tracing::debug!(tag = key, "applied display tag to config");
            }
        }

        let interval = Duration::from_secs(self.settings.collect_interval.max(1));
        self.backoff.set_cap(interval);
        if !self.offline_mode {
            self.next_collect_delay = interval;
        }
    }

    /// Adopt a freshly fetched schedule: replaces the predecessor
    /// atomically, drops executed-command markers, and tells the data
    /// connector poller to reconfigure.
    pub(crate) fn adopt_schedule(&mut self, schedule: Schedule) {
        self.executed_commands.clear();
        self.bus.emit(crate::events::PlayerEvent::DataConnectorsChanged {
            connectors: schedule.data_connectors.clone(),
        });
        self.schedule = schedule;
    }
}
