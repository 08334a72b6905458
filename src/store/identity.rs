//! Display identity
//!
//! Each display carries a stable hardware key and a channel secret used by
//! the CMS to address it. The identity is generated once, persisted beside
//! the offline snapshots, and reloaded on every boot so the CMS sees the
//! same display across restarts.

use anyhow::{Context, Result};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use uuid::Uuid;

const IDENTITY_FILE: &str = "identity.json";

/// Persisted display identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayIdentity {
    /// Stable display identifier presented at registration
    pub hardware_key: String,

    /// Secret the push channel authenticates with
    pub channel_secret: String,

    /// Identity schema version
    #[serde(default)]
    pub version: u32,
}

impl DisplayIdentity {
    /// Generate a fresh identity.
    pub fn generate() -> Self {
        let hardware_key = Uuid::new_v4().to_string();

        let mut seed = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut seed);
        let mut hasher = Sha256::new();
        hasher.update(seed);
        hasher.update(hardware_key.as_bytes());
        let channel_secret = format!("{:x}", hasher.finalize());

        Self {
            hardware_key,
            channel_secret,
            version: 1,
        }
    }

    /// Load the identity from `dir`, generating and persisting one on
    /// first boot.
    pub async fn load_or_create(dir: &Path) -> Result<Self> {
        let path = Self::path(dir);
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                serde_json::from_slice(&bytes).context("parsing persisted display identity")
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let identity = Self::generate();
                identity.persist(dir).await?;
                tracing::info!(hardware_key = %identity.hardware_key, "generated display identity");
                Ok(identity)
            }
            Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
        }
    }

    async fn persist(&self, dir: &Path) -> Result<()> {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("creating {}", dir.display()))?;
        let path = Self::path(dir);
        let json = serde_json::to_vec_pretty(self).context("serializing identity")?;
        tokio::fs::write(&path, json)
            .await
            .with_context(|| format!("writing {}", path.display()))
    }

    fn path(dir: &Path) -> PathBuf {
        dir.join(IDENTITY_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_is_unique() {
        let a = DisplayIdentity::generate();
        let b = DisplayIdentity::generate();
        assert_ne!(a.hardware_key, b.hardware_key);
        assert_ne!(a.channel_secret, b.channel_secret);
        assert_eq!(a.channel_secret.len(), 64);
    }

    #[tokio::test]
    async fn test_load_or_create_is_stable() {
        let dir = tempfile::tempdir().unwrap();

        let first = DisplayIdentity::load_or_create(dir.path()).await.unwrap();
        let second = DisplayIdentity::load_or_create(dir.path()).await.unwrap();

        assert_eq!(first.hardware_key, second.hardware_key);
        assert_eq!(first.channel_secret, second.channel_secret);
    }
}
