//! Core data structures shared across the player
//!
//! These types mirror what the CMS hands the player on each collection
//! cycle: the schedule (layouts, campaigns, actions, commands), the
//! registration result with its settings bag, and the required-files
//! manifest. Everything round-trips through serde so the offline store can
//! persist the last successful response of each kind.

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// Schedule
// ============================================================================

/// A complete schedule as delivered by the CMS.
///
/// Replaced atomically on each successful `schedule()` call; the previous
/// schedule's executed-command markers are dropped when a new one is adopted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    /// Layout shown when nothing else is active
    #[serde(default, rename = "default")]
    pub default_layout: Option<String>,

    /// Standalone scheduled layouts, in schedule order
    #[serde(default)]
    pub layouts: Vec<ScheduledLayout>,

    /// Campaigns: ordered layout groups sharing window and priority
    #[serde(default)]
    pub campaigns: Vec<Campaign>,

    /// Trigger-driven actions
    #[serde(default)]
    pub actions: Vec<Action>,

    /// Commands scheduled for a point in time
    #[serde(default)]
    pub commands: Vec<ScheduledCommand>,

    /// Real-time data polling endpoints
    #[serde(default)]
    pub data_connectors: Vec<DataConnector>,

    /// Global resource identifiers this schedule depends on
    #[serde(default)]
    pub dependants: Vec<String>,
}

impl Schedule {
    /// All layout files referenced by the schedule, campaigns first,
    /// preserving order and dropping duplicates.
    pub fn layout_files(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        let mut files = Vec::new();
        for campaign in &self.campaigns {
            for file in &campaign.layouts {
                if seen.insert(file.clone()) {
                    files.push(file.clone());
                }
            }
        }
        for layout in &self.layouts {
            if seen.insert(layout.file.clone()) {
                files.push(layout.file.clone());
            }
        }
        files
    }

    /// Find the action bound to a trigger code.
    pub fn action_for_trigger(&self, code: &str) -> Option<&Action> {
        self.actions
            .iter()
            .find(|a| a.trigger_code.as_deref() == Some(code))
    }
}

/// Scheduling rules shared by standalone layouts and campaigns.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayRules {
    /// Higher beats lower; non-negative
    #[serde(default)]
    pub priority: u32,

    /// Window start (inclusive); absent means unbounded
    #[serde(default)]
    pub fromdt: Option<DateTime<Utc>>,

    /// Window end (inclusive); absent means unbounded
    #[serde(default)]
    pub todt: Option<DateTime<Utc>>,

    /// Recurrence scheme; only weekly dayparting is defined
    #[serde(default)]
    pub recurrence_type: Option<RecurrenceType>,

    /// Comma-separated ISO weekdays (1 = Monday .. 7 = Sunday)
    #[serde(default)]
    pub recurrence_repeats_on: Option<String>,

    /// Upper bound for the recurrence, if any
    #[serde(default)]
    pub recurrence_range: Option<DateTime<Utc>>,

    /// Plays-per-hour cap; 0 means unlimited
    #[serde(default)]
    pub max_plays_per_hour: u32,

    /// AND-combined predicates; all must pass
    #[serde(default)]
    pub criteria: Vec<Criterion>,

    /// Whether the geo fence applies
    #[serde(default)]
    pub is_geo_aware: bool,

    /// `"lat,lng[,radiusMeters]"`, radius defaulting to 500 m
    #[serde(default)]
    pub geo_location: Option<String>,

    /// Part of a multi-display synchronized event
    #[serde(default)]
    pub sync_event: bool,

    /// Interrupt airtime per hour, seconds (0..=3600)
    #[serde(default)]
    pub share_of_voice: u32,

    /// Layout-specific resource identifiers
    #[serde(default)]
    pub dependants: Vec<String>,
}

impl PlayRules {
    /// ISO weekdays parsed out of `recurrence_repeats_on`.
    pub fn repeat_days(&self) -> Vec<u32> {
        self.recurrence_repeats_on
            .as_deref()
            .unwrap_or("")
            .split(',')
            .filter_map(|s| s.trim().parse::<u32>().ok())
            .filter(|d| (1..=7).contains(d))
            .collect()
    }
}

/// Recurrence scheme identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecurrenceType {
    /// Weekly dayparting: time-of-day window on selected weekdays
    Week,
    /// Anything the CMS sends that this player does not understand
    #[serde(other)]
    Unknown,
}

/// A standalone scheduled layout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScheduledLayout {
    /// Layout file identifier (e.g. `"100.xlf"`)
    pub file: String,

    #[serde(flatten)]
    pub rules: PlayRules,
}

/// An ordered group of layouts sharing window and priority.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Campaign {
    /// Campaign identifier
    pub id: String,

    /// Member layout files, in play order
    #[serde(default)]
    pub layouts: Vec<String>,

    #[serde(flatten)]
    pub rules: PlayRules,
}

// ============================================================================
// Actions and commands
// ============================================================================

/// A trigger-driven action from the schedule.
///
/// The wire shape is a loose bag keyed by `actionType`; [`Action::kind`]
/// projects it onto a tagged variant so dispatch is a `match`, and anything
/// unrecognized surfaces as [`ActionKind::Unknown`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    /// Code this action is bound to
    #[serde(default)]
    pub trigger_code: Option<String>,

    /// Raw action discriminator from the CMS
    #[serde(default)]
    pub action_type: String,

    /// Target layout for navigation actions
    #[serde(default)]
    pub layout_code: Option<String>,

    /// Target widget payload for widget navigation
    #[serde(default)]
    pub widget_id: Option<String>,

    /// Command code for command actions
    #[serde(default)]
    pub command_code: Option<String>,
}

/// Tagged view over [`Action`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionKind<'a> {
    /// Navigate the display to a layout
    NavLayout(&'a str),
    /// Navigate inside the current layout to a widget
    NavWidget(&'a Action),
    /// Execute a display command
    Command(&'a str),
    /// Unrecognized action type
    Unknown(&'a str),
}

impl Action {
    /// Project the wire fields onto a tagged variant.
    pub fn kind(&self) -> ActionKind<'_> {
        match self.action_type.as_str() {
            "navLayout" | "navigateToLayout" => match self.layout_code.as_deref() {
                Some(code) => ActionKind::NavLayout(code),
                None => ActionKind::Unknown(&self.action_type),
            },
            "navWidget" => ActionKind::NavWidget(self),
            "command" => match self.command_code.as_deref() {
                Some(code) => ActionKind::Command(code),
                None => ActionKind::Unknown(&self.action_type),
            },
            other => ActionKind::Unknown(other),
        }
    }
}

/// A command the CMS scheduled for a point in time.
///
/// The date stays a string until processing: an unparseable date skips the
/// command rather than poisoning schedule adoption.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScheduledCommand {
    /// Command code, resolved against the display's command map
    pub code: String,

    /// When to run, ISO timestamp
    pub date: String,
}

impl ScheduledCommand {
    /// Exactly-once key for the executed-commands set.
    pub fn execution_key(&self) -> String {
        format!("{}|{}", self.code, self.date)
    }

    /// Parse the scheduled time; `None` when the CMS sent garbage.
    pub fn parsed_date(&self) -> Option<DateTime<Utc>> {
        self.date.parse::<DateTime<Utc>>().ok().or_else(|| {
            chrono::NaiveDateTime::parse_from_str(&self.date, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|naive| naive.and_utc())
        })
    }
}

/// A real-time data polling endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataConnector {
    /// Source URL
    pub url: String,

    /// Connector key, used by widgets to look the feed up
    pub key: String,

    /// Polling interval in seconds
    #[serde(default)]
    pub interval: u64,
}

/// A command definition from the display's command map.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandDef {
    /// `<scheme>|<payload>[|<contentType>]`
    #[serde(default)]
    pub command_string: Option<String>,

    /// Legacy field carrying the same syntax
    #[serde(default)]
    pub value: Option<String>,
}

impl CommandDef {
    /// The effective command string, preferring `commandString`.
    pub fn effective(&self) -> Option<&str> {
        self.command_string
            .as_deref()
            .filter(|s| !s.is_empty())
            .or(self.value.as_deref().filter(|s| !s.is_empty()))
    }
}

// ============================================================================
// Registration
// ============================================================================

/// Result of `registerDisplay` for one collection cycle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationResult {
    /// `"READY"` on success; anything else aborts the cycle
    #[serde(default)]
    pub code: String,

    /// Display name as configured in the CMS
    #[serde(default)]
    pub display_name: String,

    /// `"key|value"` tag strings
    #[serde(default)]
    pub tags: Vec<String>,

    /// Display command map, keyed by command code
    #[serde(default)]
    pub commands: HashMap<String, CommandDef>,

    /// Settings bag
    #[serde(default)]
    pub settings: PlayerSettings,

    /// Required-files change token; identical value means unchanged content
    #[serde(default)]
    pub check_rf: Option<String>,

    /// Schedule change token
    #[serde(default)]
    pub check_schedule: Option<String>,

    /// Multi-display sync configuration, if this display is in a group
    #[serde(default)]
    pub sync_config: Option<SyncConfig>,
}

impl RegistrationResult {
    /// Whether the CMS accepted the display this cycle.
    pub fn is_ready(&self) -> bool {
        self.code == "READY"
    }

    /// Split `"key|value"` tags into pairs, skipping malformed entries.
    pub fn tag_pairs(&self) -> Vec<(&str, &str)> {
        self.tags
            .iter()
            .filter_map(|tag| tag.split_once('|'))
            .collect()
    }
}

/// Recognized display settings.
///
/// Unknown keys from the CMS are ignored by serde; absent keys take the
/// defaults below.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSettings {
    /// Seconds between collection cycles
    #[serde(default = "default_collect_interval")]
    pub collect_interval: u64,

    /// Push channel WebSocket address
    #[serde(default)]
    pub xmr_web_socket_address: Option<String>,

    /// Push channel CMS key
    #[serde(default)]
    pub xmr_cms_key: Option<String>,

    /// CMS server key
    #[serde(default)]
    pub server_key: Option<String>,

    /// Log level requested by the CMS (`error`..`trace`)
    #[serde(default)]
    pub log_level: Option<String>,

    /// Whether playback statistics are recorded
    #[serde(default)]
    pub stats_enabled: bool,

    /// Download window start, `"HH:MM"`; absent means always open
    #[serde(default)]
    pub download_window_start: Option<String>,

    /// Download window end, `"HH:MM"`
    #[serde(default)]
    pub download_window_end: Option<String>,
}

fn default_collect_interval() -> u64 {
    900
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            collect_interval: default_collect_interval(),
            xmr_web_socket_address: None,
            xmr_cms_key: None,
            server_key: None,
            log_level: None,
            stats_enabled: false,
            download_window_start: None,
            download_window_end: None,
        }
    }
}

impl PlayerSettings {
    /// The configured download window, if both bounds parse.
    pub fn download_window(&self) -> Option<(NaiveTime, NaiveTime)> {
        let start = self.download_window_start.as_deref()?;
        let end = self.download_window_end.as_deref()?;
        let start = NaiveTime::parse_from_str(start, "%H:%M").ok()?;
        let end = NaiveTime::parse_from_str(end, "%H:%M").ok()?;
        Some((start, end))
    }

    /// Whether `now` falls inside the download window.
    ///
    /// No window means downloads are always allowed; a window that ends
    /// before it starts wraps past midnight.
    pub fn in_download_window(&self, now: DateTime<Utc>) -> bool {
        match self.download_window() {
            None => true,
            Some((start, end)) => {
                let t = now.time();
                if start <= end {
                    t >= start && t <= end
                } else {
                    t >= start || t <= end
                }
            }
        }
    }
}

/// Multi-display synchronization settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncConfig {
    /// Group this display belongs to
    #[serde(default)]
    pub sync_group: String,

    /// Whether this display leads the group
    #[serde(default)]
    pub is_lead: bool,

    /// Delay before switching, milliseconds
    #[serde(default)]
    pub sync_switch_delay: u64,

    /// Video pause delay, milliseconds
    #[serde(default)]
    pub sync_video_pause_delay: u64,

    /// Port the lead publishes on
    #[serde(default)]
    pub sync_publisher_port: u16,
}

// ============================================================================
// Required files
// ============================================================================

/// The required-files manifest: what to download and what to purge.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequiredFiles {
    #[serde(default)]
    pub files: Vec<RequiredFile>,

    #[serde(default)]
    pub purge: Vec<PurgeItem>,
}

/// One file the display must hold.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequiredFile {
    pub id: String,

    #[serde(rename = "type")]
    pub file_type: FileType,

    #[serde(default)]
    pub path: String,

    #[serde(default)]
    pub md5: String,

    #[serde(default)]
    pub size: u64,

    #[serde(default)]
    pub dependants: Option<Vec<String>>,
}

/// Kind of a required file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    #[default]
    Media,
    Layout,
    Resource,
    Dependency,
    Widget,
}

/// A stored file the CMS wants removed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurgeItem {
    pub id: String,

    #[serde(default)]
    pub stored_as: String,
}

// ============================================================================
// Criteria
// ============================================================================

/// One scheduling predicate; all of a layout's criteria must pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Criterion {
    /// What to measure (`hour`, `weatherTemp`, a display property, ...)
    pub metric: String,

    /// Comparison operator name
    pub condition: String,

    /// `"number"` or `"string"`; anything else compares as string
    #[serde(default, rename = "type")]
    pub value_type: String,

    /// Right-hand side of the comparison
    #[serde(default)]
    pub value: String,
}
