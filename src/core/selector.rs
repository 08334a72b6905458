//! Layout selection
//!
//! Round-robin rotation over the evaluator's output, preempted by pushed
//! overrides. The selector never leaves the screen blank on purpose: an
//! empty rotation replays whatever is currently showing, and when every
//! scheduled layout is blacklisted it prepares one anyway, preferring a
//! possibly-broken render over darkness.

use tracing::{debug, warn};

use crate::events::PlayerEvent;
use crate::models::FileType;

use super::runtime::CoreMessage;
use super::PlayerCore;

/// Kind of an active override.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideKind {
    /// Replace the scheduled layout
    Change,
    /// Draw on top of it
    Overlay,
}

/// An imposed layout selection that preempts the round-robin.
#[derive(Debug, Clone)]
pub struct LayoutOverride {
    pub layout: String,
    pub kind: OverrideKind,
    /// Seconds until auto-revert; `None` or zero means manual revert only
    pub duration: Option<u64>,
    /// Forwarded to the renderer untouched
    pub change_mode: Option<String>,
}

impl PlayerCore {
    // ------------------------------------------------------------------------
    // cycle evaluation
    // ------------------------------------------------------------------------

    /// Re-run the evaluator against current state and drive the decision
    /// tree. Called by every collection cycle and after reverts.
    pub fn apply_evaluation(&mut self) {
        let now = self.clock.now();
        let ctx = crate::schedule::EvalContext {
            player_location: self.player_location,
            display_properties: Some(&self.display_properties),
            weather: self.weather.as_ref(),
        };
        let result = crate::schedule::layouts_now(&self.schedule, now, ctx, &self.history);

        self.bus.emit(PlayerEvent::LayoutsScheduled {
            layouts: result.files(),
        });
        self.active = result.layouts;

        if self.layout_override.is_some() {
            // the override keeps driving selection until reverted
            return;
        }

        self.run_decision_tree();
    }

    fn run_decision_tree(&mut self) {
        if self.active.is_empty() {
            if self.current_layout_id.is_some() && self.schedule.default_layout.is_some() {
                let default = self.schedule.default_layout.clone().unwrap_or_default();
                self.current_layout_id = None;
                self.current_layout_index = 0;
                self.emit_prepare(&default, None);
            } else {
                self.bus.emit(PlayerEvent::NoLayoutsScheduled);
            }
            return;
        }

        if let Some(current) = self.current_layout_id.clone() {
            if let Some(pos) = self.active.iter().position(|l| l.file == current) {
                self.current_layout_index = pos;
                self.bus
                    .emit(PlayerEvent::LayoutAlreadyPlaying { layout: current });
                return;
            }
        }

        self.current_layout_index = 0;
        self.prepare_from(0);
    }

    /// Prepare the first non-blacklisted layout at or after `start`;
    /// when everything is blacklisted, prepare `start` anyway.
    fn prepare_from(&mut self, start: usize) {
        let len = self.active.len();
        debug_assert!(len > 0);
        let start = start % len;

        let chosen = (0..len)
            .map(|off| (start + off) % len)
            .find(|i| !self.blacklist.is_blacklisted(&self.active[*i].file))
            .unwrap_or(start);

        self.current_layout_index = chosen;
        let file = self.active[chosen].file.clone();
        self.emit_prepare(&file, None);
    }

    fn emit_prepare(&mut self, layout: &str, change_mode: Option<String>) {
        self.bus.emit(PlayerEvent::LayoutPrepareRequest {
            layout: layout.to_string(),
            change_mode,
        });
    }

    // ------------------------------------------------------------------------
    // round-robin advancement
    // ------------------------------------------------------------------------

    /// The renderer finished a layout; rotate forward.
    pub fn advance_next(&mut self) {
        if self.layout_override.is_some() {
            debug!("advance ignored while override is active");
            return;
        }
        self.advance(1, true);
    }

    /// Manual backward navigation; local, so sync groups are not consulted.
    pub fn advance_previous(&mut self) {
        if self.layout_override.is_some() {
            debug!("advance ignored while override is active");
            return;
        }
        self.advance(-1, false);
    }

    fn advance(&mut self, direction: i64, honor_sync: bool) {
        if self.active.is_empty() {
            // never-blank guarantee: replay whatever is up
            match self.current_layout_id.clone() {
                Some(current) => self.emit_prepare(&current, None),
                None => self.bus.emit(PlayerEvent::NoLayoutsScheduled),
            }
            return;
        }

        let len = self.active.len() as i64;
        let start = ((self.current_layout_index as i64 + direction).rem_euclid(len)) as usize;

        let chosen = (0..len as usize)
            .map(|off| {
                ((start as i64 + direction * off as i64).rem_euclid(len)) as usize
            })
            .find(|i| !self.blacklist.is_blacklisted(&self.active[*i].file));

        let Some(chosen) = chosen else {
            // every rotation entry is blacklisted: replay the current
            // layout, or failing that prepare one regardless
            match self.current_layout_id.clone() {
                Some(current) => self.emit_prepare(&current, None),
                None => {
                    self.current_layout_index = start;
                    let file = self.active[start].file.clone();
                    self.emit_prepare(&file, None);
                }
            }
            return;
        };

        let resolved = self.active[chosen].clone();
        self.current_layout_index = chosen;

        if self.current_layout_id.as_deref() == Some(resolved.file.as_str()) {
            // single-layout rotation: force the renderer to remount
            self.current_layout_id = None;
        }

        if honor_sync && resolved.sync_event {
            if let Some(sync) = self.sync_config.clone() {
                self.bus.emit(PlayerEvent::SyncSignal {
                    layout: resolved.file.clone(),
                    is_lead: sync.is_lead,
                });
                if !sync.is_lead {
                    // followers wait for the lead's push
                    return;
                }
            }
        }

        self.emit_prepare(&resolved.file, None);
    }

    // ------------------------------------------------------------------------
    // overrides
    // ------------------------------------------------------------------------

    /// Impose a layout, preempting the rotation.
    pub fn change_layout(&mut self, layout: &str, duration: Option<u64>, change_mode: Option<String>) {
        self.override_generation += 1;
        self.layout_override = Some(LayoutOverride {
            layout: layout.to_string(),
            kind: OverrideKind::Change,
            duration,
            change_mode: change_mode.clone(),
        });
        self.current_layout_id = None;
        self.emit_prepare(layout, change_mode);
        self.schedule_auto_revert(duration);
    }

    /// Draw a layout on top of the scheduled one.
    pub fn overlay_layout(&mut self, layout: &str, duration: Option<u64>) {
        self.override_generation += 1;
        self.layout_override = Some(LayoutOverride {
            layout: layout.to_string(),
            kind: OverrideKind::Overlay,
            duration,
            change_mode: None,
        });
        self.bus.emit(PlayerEvent::OverlayLayoutRequest {
            layout: layout.to_string(),
        });
        self.schedule_auto_revert(duration);
    }

    /// Drop the override and return to scheduled playback.
    pub fn revert_to_schedule(&mut self) {
        self.layout_override = None;
        self.override_generation += 1;
        self.current_layout_id = None;
        self.bus.emit(PlayerEvent::RevertToSchedule);
        self.apply_evaluation();
    }

    /// Timer-driven revert; ignored when a newer override replaced the
    /// one that armed it.
    pub fn handle_auto_revert(&mut self, generation: u64) {
        if self.layout_override.is_some() && generation == self.override_generation {
            self.revert_to_schedule();
        }
    }

    fn schedule_auto_revert(&self, duration: Option<u64>) {
        let Some(secs) = duration.filter(|d| *d > 0) else {
            return;
        };
        let tx = self.self_tx.clone();
        let generation = self.override_generation;
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_secs(secs)).await;
            let _ = tx.send(CoreMessage::AutoRevert { generation }).await;
        });
    }

    // ------------------------------------------------------------------------
    // renderer callbacks
    // ------------------------------------------------------------------------

    /// The renderer reports a layout actually started.
    pub fn layout_started(&mut self, layout: &str) {
        let now = self.clock.now();
        self.current_layout_id = Some(layout.to_string());
        if let Some(pos) = self.active.iter().position(|l| l.file == layout) {
            self.current_layout_index = pos;
        }
        self.history.record_play(layout, now);
        self.last_layout_change = Some(now);
        self.pending_layouts.remove(layout);

        if self.blacklist.report_success(layout) {
            self.bus.emit(PlayerEvent::LayoutUnblacklisted {
                layout: layout.to_string(),
            });
        }
    }

    /// The renderer reports a layout failed to render.
    pub fn layout_failed(&mut self, layout: &str, reason: &str) {
        let now = self.clock.now();
        match self.blacklist.report_failure(layout, reason, now) {
            crate::schedule::blacklist::FailureOutcome::Blacklisted { failures, reason } => {
                warn!(layout, failures, "layout blacklisted");
                self.bus.emit(PlayerEvent::LayoutBlacklisted {
                    layout: layout.to_string(),
                    failures,
                    reason: reason.clone(),
                });

                // fire-and-forget CMS report
                let transport = std::sync::Arc::clone(&self.transport);
                let id = layout.to_string();
                tokio::spawn(async move {
                    if let Err(e) = transport.blacklist(&id, "layout", &reason).await {
                        warn!(layout = %id, error = %e, "blacklist report failed");
                    }
                });
            }
            outcome => {
                debug!(layout, ?outcome, "render failure counted");
            }
        }
    }

    // ------------------------------------------------------------------------
    // pending-layout gating
    // ------------------------------------------------------------------------

    /// The renderer is waiting on files before it can mount a layout.
    pub fn set_pending(&mut self, layout: &str, required: Vec<String>) {
        self.pending_layouts.insert(layout.to_string(), required);
    }

    /// The cache reports a file ready; re-check any pending layout that
    /// was waiting on it.
    pub fn notify_media_ready(&mut self, id: &str, file_type: FileType) {
        self.media_ready.insert(id.to_string());

        let matches: Vec<(String, Vec<String>)> = self
            .pending_layouts
            .iter()
            .filter(|(layout, required)| {
                (file_type == FileType::Layout && layout.as_str() == id)
                    || required.iter().any(|r| r == id)
            })
            .map(|(layout, required)| (layout.clone(), required.clone()))
            .collect();

        for (layout, required) in matches {
            self.bus
                .emit(PlayerEvent::CheckPendingLayout { layout, required });
        }
    }
}
