use anyhow::{bail, Result};
use chrono::Utc;

use marquee::config::Config;
use marquee::store::OfflineStore;
use marquee::timeline::{self, LayoutDurations, TimelineOptions};

/// Predict playback from the cached snapshots, entirely offline.
pub async fn timeline(config: Config, hours: u32, json: bool) -> Result<()> {
    let store = OfflineStore::new(&config.storage.state_dir);
    let snapshot = store.load().await;

    let Some(schedule) = snapshot.schedule else {
        bail!(
            "no cached schedule under {}; run the player at least once",
            config.storage.state_dir.display()
        );
    };

    // seed durations from whatever layout files the cache already holds
    let mut durations = LayoutDurations::new();
    for file in schedule.layout_files() {
        let path = config.storage.media_dir.join(&file);
        match tokio::fs::read_to_string(&path).await {
            Ok(xml) => match timeline::parse_layout_duration(&xml) {
                Ok(secs) => durations.set(&file, secs),
                Err(e) => tracing::warn!(layout = %file, error = %e, "unparseable layout file"),
            },
            Err(_) => tracing::debug!(layout = %file, "layout file not cached yet"),
        }
    }

    let options = TimelineOptions {
        from: Utc::now(),
        hours,
        current_layout_started_at: None,
    };
    let entries = timeline::predict(&schedule, &durations, &options);

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    println!("Predicted playback for the next {hours}h");
    println!("{:-<64}", "");
    for entry in &entries {
        let marker = if entry.hidden {
            " (hidden)"
        } else if entry.is_default {
            " (default)"
        } else {
            ""
        };
        println!(
            "{} -> {}  {:>5}s  {}{}",
            entry.start_time.format("%H:%M:%S"),
            entry.end_time.format("%H:%M:%S"),
            entry.duration_secs,
            entry.layout_file,
            marker
        );
    }
    if entries.is_empty() {
        println!("(nothing scheduled)");
    }

    Ok(())
}
