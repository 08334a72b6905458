//! The collection cycle
//!
//! One cycle is: register with the CMS, pull whatever manifests changed
//! (skipping unchanged ones by their CRC-like tokens), persist snapshots,
//! re-evaluate the schedule, process due commands, and report status. The
//! cycle is guarded against overlap, and any failure after a snapshot
//! exists degrades to *offline mode*: the display keeps replaying its
//! cached schedule while retries back off exponentially toward the
//! normal collection interval.

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::events::PlayerEvent;
use crate::store::DisplayIdentity;
use crate::transport::{status_code, StatusReport, TransportError};

use super::PlayerCore;

/// How a cycle body ended, before the wrapper applies error policy.
enum CycleOutcome {
    Completed,
    WentOffline,
}

impl PlayerCore {
    /// Run one collection cycle.
    ///
    /// Returns `Ok` when the display ends the cycle with something to
    /// play (including offline replay); errors mean the display has
    /// nothing at all.
    pub async fn collect(&mut self) -> Result<()> {
        if self.collecting {
            debug!("collection already in flight; skipping");
            return Ok(());
        }
        self.collecting = true;
        self.bus.emit(PlayerEvent::CollectionStart);

        let outcome = self.run_cycle().await;
        self.collecting = false;

        match outcome {
            Ok(CycleOutcome::Completed) => {
                self.first_cycle_done = true;
                self.bus.emit(PlayerEvent::CollectionComplete);
                Ok(())
            }
            Ok(CycleOutcome::WentOffline) => Ok(()),
            Err(e) => {
                warn!(error = %e, category = e.category().as_str(), "collection failed");
                self.bus.emit(PlayerEvent::CollectionError {
                    message: e.to_string(),
                });

                if !matches!(e, Error::OfflineNoCache) && self.store.has_cached_data().await {
                    self.enter_offline_mode().await;
                    return Ok(());
                }

                // nothing cached to fall back on; retry with backoff
                self.next_collect_delay = self.backoff.next_delay();
                Err(e)
            }
        }
    }

    async fn run_cycle(&mut self) -> Result<CycleOutcome> {
        // a display needs its identity before it can talk to anyone
        if self.identity.is_none() {
            let identity = DisplayIdentity::load_or_create(&self.config.storage.state_dir)
                .await
                .map_err(Error::store)?;
            self.identity = Some(identity);
        }

        let reg = match self.transport.register_display().await {
            Ok(reg) => reg,
            Err(e) if e.is_offline() => {
                info!(error = %e, "CMS unreachable");
                return if self.store.has_cached_data().await {
                    self.enter_offline_mode().await;
                    Ok(CycleOutcome::WentOffline)
                } else {
                    Err(Error::OfflineNoCache)
                };
            }
            Err(e) => return Err(e.into()),
        };

        if !reg.is_ready() {
            return Err(TransportError::Rejected(reg.code.clone()).into());
        }

        self.store.save_settings(&reg).await;

        if self.offline_mode {
            self.offline_mode = false;
            self.backoff.reset();
            self.bus.emit(PlayerEvent::OfflineMode { active: false });
        }

        self.display_name = reg.display_name.clone();
        self.bus.emit(PlayerEvent::RegisterComplete {
            display_name: reg.display_name.clone(),
        });

        self.apply_settings(&reg);
        self.manage_push_channel().await;

        // CRC skip: identical tokens mean identical content
        let rf_changed = self.last_check_rf.is_none() || reg.check_rf != self.last_check_rf;
        if rf_changed {
            // new content may fix layouts that were failing
            self.blacklist.reset();

            let manifest = self.transport.required_files().await?;
            self.store.save_required_files(&manifest).await;
            self.bus.emit(PlayerEvent::FilesReceived {
                count: manifest.files.len(),
            });
            if !manifest.purge.is_empty() {
                self.bus.emit(PlayerEvent::PurgeRequest {
                    items: manifest.purge.clone(),
                });
            }

            // drop readiness for files no longer in the manifest
            self.media_ready
                .retain(|id| manifest.files.iter().any(|f| &f.id == id));
            self.required_files = Some(manifest);
            self.last_check_rf = reg.check_rf.clone();
        } else {
            debug!("required files unchanged; skipping fetch");
        }

        let schedule_changed =
            self.last_check_schedule.is_none() || reg.check_schedule != self.last_check_schedule;
        if schedule_changed {
            let schedule = self.transport.schedule().await?;
            self.store.save_schedule(&schedule).await;
            self.bus.emit(PlayerEvent::ScheduleReceived {
                layout_count: schedule.layouts.len(),
                campaign_count: schedule.campaigns.len(),
            });
            self.adopt_schedule(schedule);
            self.last_check_schedule = reg.check_schedule.clone();
        } else {
            debug!("schedule unchanged; skipping fetch");
        }

        if let Some(manifest) = &self.required_files {
            if self.settings.in_download_window(self.clock.now()) {
                self.bus.emit(PlayerEvent::DownloadRequest {
                    layout_order: self.download_layout_order(),
                    files: manifest.files.clone(),
                    layout_dependants: self.layout_dependants(),
                });
            } else {
                debug!("outside download window; deferring downloads");
            }
            self.bus.emit(PlayerEvent::CacheAnalysisRequest {
                files: manifest.files.clone(),
            });
        }

        self.submit_media_inventory().await;

        match self.transport.get_weather().await {
            Ok(weather) => self.weather = Some(weather),
            Err(e) => warn!(error = %e, "weather fetch failed; criteria run without it"),
        }

        self.apply_evaluation();
        self.process_scheduled_commands();

        self.bus.emit(PlayerEvent::SubmitStatsRequest);
        self.notify_status().await;

        Ok(CycleOutcome::Completed)
    }

    /// Replay the cached snapshot and keep retrying with backoff.
    pub(crate) async fn enter_offline_mode(&mut self) {
        if !self.offline_mode {
            info!("entering offline mode");
            self.offline_mode = true;
            self.bus.emit(PlayerEvent::OfflineMode { active: true });
        }

        let snapshot = self.store.load().await;
        if let Some(reg) = &snapshot.settings {
            self.apply_settings(reg);
        }
        if let Some(schedule) = snapshot.schedule {
            self.schedule = schedule;
        }

        self.next_collect_delay = self.backoff.next_delay();

        self.apply_evaluation();
        self.bus.emit(PlayerEvent::CollectionComplete);
    }

    /// Scheduled layout ids rotated so the next layout to play comes
    /// first; the cache uses this to prioritize downloads.
    fn download_layout_order(&self) -> Vec<String> {
        let files = self.schedule.layout_files();
        if files.is_empty() {
            return files;
        }
        let start = self
            .current_layout_id
            .as_ref()
            .and_then(|current| files.iter().position(|f| f == current))
            .unwrap_or(self.current_layout_index % files.len());

        files[start..]
            .iter()
            .chain(files[..start].iter())
            .cloned()
            .collect()
    }

    /// Global and per-layout dependant resources, deduplicated.
    fn layout_dependants(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        let all = self
            .schedule
            .dependants
            .iter()
            .chain(self.schedule.layouts.iter().flat_map(|l| &l.rules.dependants))
            .chain(self.schedule.campaigns.iter().flat_map(|c| &c.rules.dependants));
        for dep in all {
            if seen.insert(dep.clone()) {
                out.push(dep.clone());
            }
        }
        out
    }

    /// Tell the CMS how the display is doing; failures never interrupt
    /// playback.
    async fn notify_status(&mut self) {
        let code = if !self.blacklist.is_empty() {
            status_code::FAULTY
        } else if !self.pending_layouts.is_empty() {
            status_code::DOWNLOADING
        } else {
            status_code::OK
        };

        let report = StatusReport {
            current_layout_id: self.current_layout_id.clone(),
            device_name: self.config.display.device_name.clone(),
            display_name: self.display_name.clone(),
            last_command_success: self.last_command_success,
            code,
            last_layout_change_time: self.last_layout_change,
            latitude: self.player_location.map(|(lat, _)| lat),
            longitude: self.player_location.map(|(_, lng)| lng),
        };

        if let Err(e) = self.transport.notify_status(&report).await {
            warn!(error = %e, "status notify failed");
            self.bus.emit(PlayerEvent::StatusNotifyFailed {
                message: e.to_string(),
            });
        }
    }
}
