//! Offline snapshot store
//!
//! The player keeps exactly three durable snapshots — the last successful
//! `RegistrationResult`, `Schedule`, and `RequiredFiles` — so a display
//! that boots without a network can replay its previous instructions.
//! Writes happen after each successful CMS exchange and are
//! fire-and-forget: a failed save is logged and playback continues.
//!
//! Files are written to a temporary name and renamed into place so a
//! crash mid-write never truncates the previous snapshot.

pub mod identity;

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::path::{Path, PathBuf};

use crate::models::{RegistrationResult, RequiredFiles, Schedule};

pub use identity::DisplayIdentity;

/// The three snapshot slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotKind {
    Settings,
    Schedule,
    RequiredFiles,
}

impl SnapshotKind {
    fn file_name(&self) -> &'static str {
        match self {
            SnapshotKind::Settings => "settings.json",
            SnapshotKind::Schedule => "schedule.json",
            SnapshotKind::RequiredFiles => "required_files.json",
        }
    }
}

/// Everything `load()` found on disk.
#[derive(Debug, Clone, Default)]
pub struct OfflineSnapshot {
    pub settings: Option<RegistrationResult>,
    pub schedule: Option<Schedule>,
    pub required_files: Option<RequiredFiles>,
}

/// Durable key-value store rooted at the configured state directory.
#[derive(Debug, Clone)]
pub struct OfflineStore {
    dir: PathBuf,
}

impl OfflineStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the state directory if missing.
    pub async fn ensure_dir(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("creating state dir {}", self.dir.display()))
    }

    /// One-shot hydration at startup; missing or corrupt snapshots are
    /// logged and skipped rather than failing the boot.
    pub async fn load(&self) -> OfflineSnapshot {
        OfflineSnapshot {
            settings: self.read(SnapshotKind::Settings).await,
            schedule: self.read(SnapshotKind::Schedule).await,
            required_files: self.read(SnapshotKind::RequiredFiles).await,
        }
    }

    /// True iff a schedule snapshot exists: the minimum needed to replay.
    pub async fn has_cached_data(&self) -> bool {
        tokio::fs::try_exists(self.path(SnapshotKind::Schedule))
            .await
            .unwrap_or(false)
    }

    /// Persist the registration snapshot; errors are logged, never raised.
    pub async fn save_settings(&self, value: &RegistrationResult) {
        self.save(SnapshotKind::Settings, value).await;
    }

    /// Persist the schedule snapshot.
    pub async fn save_schedule(&self, value: &Schedule) {
        self.save(SnapshotKind::Schedule, value).await;
    }

    /// Persist the required-files snapshot.
    pub async fn save_required_files(&self, value: &RequiredFiles) {
        self.save(SnapshotKind::RequiredFiles, value).await;
    }

    async fn save<T: Serialize>(&self, kind: SnapshotKind, value: &T) {
        if let Err(e) = self.write(kind, value).await {
            tracing::warn!(
                snapshot = kind.file_name(),
                error = %e,
                "failed to persist offline snapshot"
            );
        }
    }

    async fn write<T: Serialize>(&self, kind: SnapshotKind, value: &T) -> Result<()> {
        self.ensure_dir().await?;
        let path = self.path(kind);
        let tmp = path.with_extension("json.tmp");

        let json = serde_json::to_vec_pretty(value).context("serializing snapshot")?;
        tokio::fs::write(&tmp, &json)
            .await
            .with_context(|| format!("writing {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .with_context(|| format!("renaming into {}", path.display()))?;

        tracing::debug!(snapshot = kind.file_name(), bytes = json.len(), "snapshot saved");
        Ok(())
    }

    async fn read<T: DeserializeOwned>(&self, kind: SnapshotKind) -> Option<T> {
        let path = self.path(kind);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(snapshot = kind.file_name(), error = %e, "snapshot unreadable");
                return None;
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(snapshot = kind.file_name(), error = %e, "snapshot corrupt");
                None
            }
        }
    }

    fn path(&self, kind: SnapshotKind) -> PathBuf {
        self.dir.join(kind.file_name())
    }
}
