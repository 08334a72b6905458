use anyhow::Result;

use marquee::config::Config;
use marquee::store::{DisplayIdentity, OfflineStore};

/// Print the cached snapshots and display identity.
pub async fn status(config: Config) -> Result<()> {
    println!("marquee status");
    println!("{:-<40}", "");
    println!("State dir: {}", config.storage.state_dir.display());

    match DisplayIdentity::load_or_create(&config.storage.state_dir).await {
        Ok(identity) => println!("Hardware key: {}", identity.hardware_key),
        Err(e) => println!("Identity: unavailable ({e})"),
    }

    let store = OfflineStore::new(&config.storage.state_dir);
    let snapshot = store.load().await;

    match &snapshot.settings {
        Some(reg) => {
            println!("Display name: {}", reg.display_name);
            println!("Collect interval: {}s", reg.settings.collect_interval);
            println!(
                "Push address: {}",
                reg.settings
                    .xmr_web_socket_address
                    .as_deref()
                    .unwrap_or("(none)")
            );
        }
        None => println!("Settings: no snapshot"),
    }

    match &snapshot.schedule {
        Some(schedule) => {
            println!(
                "Schedule: {} layouts, {} campaigns, default {}",
                schedule.layouts.len(),
                schedule.campaigns.len(),
                schedule.default_layout.as_deref().unwrap_or("(none)")
            );
            for file in schedule.layout_files() {
                println!("  - {file}");
            }
        }
        None => println!("Schedule: no snapshot (display cannot play offline)"),
    }

    match &snapshot.required_files {
        Some(rf) => println!(
            "Required files: {} entries, {} pending purge",
            rf.files.len(),
            rf.purge.len()
        ),
        None => println!("Required files: no snapshot"),
    }

    Ok(())
}
