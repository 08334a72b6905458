//! Shared fixtures for integration tests
//!
//! A scripted CMS transport, schedule builders, and event-stream helpers
//! used by the scenario suites.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

use marquee::clock::ManualClock;
use marquee::config::Config;
use marquee::core::PlayerCore;
use marquee::events::PlayerEvent;
use marquee::models::{
    PlayRules, RegistrationResult, RequiredFiles, Schedule, ScheduledLayout,
};
use marquee::transport::{CmsTransport, StatusReport, TransportError};

/// The instant every test clock starts at (a Wednesday, 12:00 UTC).
pub const T0: &str = "2024-05-01T12:00:00Z";

pub fn t0() -> DateTime<Utc> {
    T0.parse().unwrap()
}

/// Scripted CMS transport: every response is settable, every
/// fire-and-forget call is recorded.
#[derive(Default)]
pub struct ScriptedCms {
    pub registration: Mutex<RegistrationResult>,
    pub register_errors: Mutex<VecDeque<TransportError>>,
    pub schedule: Mutex<Schedule>,
    pub required_files: Mutex<RequiredFiles>,
    pub weather: Mutex<Option<serde_json::Value>>,
    pub blacklist_calls: Mutex<Vec<(String, String, String)>>,
    pub status_calls: Mutex<Vec<StatusReport>>,
    pub inventory_calls: Mutex<Vec<String>>,
    pub register_count: Mutex<u32>,
}

impl ScriptedCms {
    /// A READY CMS serving the given standalone layouts.
    pub fn ready(layout_files: &[&str]) -> Arc<Self> {
        let cms = Self::default();
        {
            let mut reg = cms.registration.lock().unwrap();
            reg.code = "READY".into();
            reg.display_name = "Integration Display".into();
            reg.check_rf = Some("rf-1".into());
            reg.check_schedule = Some("sched-1".into());
        }
        *cms.schedule.lock().unwrap() = schedule_of(layout_files);
        Arc::new(cms)
    }

    /// Queue a registration failure for the next cycle.
    pub fn fail_next_register(&self, error: TransportError) {
        self.register_errors.lock().unwrap().push_back(error);
    }

    /// Bump a change token so the next cycle re-fetches.
    pub fn bump_schedule_token(&self, token: &str) {
        self.registration.lock().unwrap().check_schedule = Some(token.into());
    }

    pub fn bump_rf_token(&self, token: &str) {
        self.registration.lock().unwrap().check_rf = Some(token.into());
    }
}

#[async_trait]
impl CmsTransport for ScriptedCms {
    async fn register_display(&self) -> Result<RegistrationResult, TransportError> {
        *self.register_count.lock().unwrap() += 1;
        if let Some(err) = self.register_errors.lock().unwrap().pop_front() {
            return Err(err);
        }
        Ok(self.registration.lock().unwrap().clone())
    }

    async fn required_files(&self) -> Result<RequiredFiles, TransportError> {
        Ok(self.required_files.lock().unwrap().clone())
    }

    async fn schedule(&self) -> Result<Schedule, TransportError> {
        Ok(self.schedule.lock().unwrap().clone())
    }

    async fn notify_status(&self, status: &StatusReport) -> Result<(), TransportError> {
        self.status_calls.lock().unwrap().push(status.clone());
        Ok(())
    }

    async fn media_inventory(&self, xml: &str) -> Result<(), TransportError> {
        self.inventory_calls.lock().unwrap().push(xml.to_string());
        Ok(())
    }

    async fn blacklist(
        &self,
        id: &str,
        item_type: &str,
        reason: &str,
    ) -> Result<(), TransportError> {
        self.blacklist_calls.lock().unwrap().push((
            id.to_string(),
            item_type.to_string(),
            reason.to_string(),
        ));
        Ok(())
    }

    async fn get_weather(&self) -> Result<serde_json::Value, TransportError> {
        self.weather
            .lock()
            .unwrap()
            .clone()
            .ok_or(TransportError::Status(404))
    }
}

/// A schedule of always-active standalone layouts at equal priority.
pub fn schedule_of(layout_files: &[&str]) -> Schedule {
    Schedule {
        layouts: layout_files.iter().map(|f| active_layout(f, 10)).collect(),
        ..Default::default()
    }
}

/// One always-active layout.
pub fn active_layout(file: &str, priority: u32) -> ScheduledLayout {
    ScheduledLayout {
        file: file.to_string(),
        rules: PlayRules {
            priority,
            fromdt: Some("2020-01-01T00:00:00Z".parse().unwrap()),
            todt: Some("2040-01-01T00:00:00Z".parse().unwrap()),
            ..Default::default()
        },
    }
}

/// A player core wired to the scripted CMS, a manual clock at [`T0`], and
/// a fresh temp state dir (leaked for the life of the test process).
pub fn player(cms: Arc<ScriptedCms>) -> (PlayerCore, Arc<ManualClock>) {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::from_env().unwrap();
    config.storage.state_dir = dir.path().join("state");
    config.storage.media_dir = dir.path().join("media");
    std::mem::forget(dir);

    let clock = Arc::new(ManualClock::new(t0()));
    let core = PlayerCore::with_clock(config, cms, clock.clone());
    (core, clock)
}

/// Pull every event currently queued on a subscription.
pub fn drain(rx: &mut broadcast::Receiver<PlayerEvent>) -> Vec<PlayerEvent> {
    let mut out = Vec::new();
    while let Ok(event) = rx.try_recv() {
        out.push(event);
    }
    out
}

/// The layouts named by `LayoutPrepareRequest` events, in order.
pub fn prepares(events: &[PlayerEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            PlayerEvent::LayoutPrepareRequest { layout, .. } => Some(layout.clone()),
            _ => None,
        })
        .collect()
}

/// Event names in order, for sequence assertions.
pub fn names(events: &[PlayerEvent]) -> Vec<&'static str> {
    events.iter().map(|e| e.name()).collect()
}

/// Assert `wanted` appear in `events` in the given relative order.
pub fn assert_sequence(events: &[PlayerEvent], wanted: &[&str]) {
    let actual = names(events);
    let mut cursor = 0;
    for want in wanted {
        match actual[cursor..].iter().position(|n| n == want) {
            Some(offset) => cursor += offset + 1,
            None => panic!("event {want} missing or out of order in {actual:?}"),
        }
    }
}
