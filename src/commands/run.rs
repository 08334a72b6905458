use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::{registry::Registry, reload, EnvFilter};

use marquee::config::Config;
use marquee::core::{runtime, PlayerCore};
use marquee::events::PlayerEvent;
use marquee::store::DisplayIdentity;
use marquee::transport::HttpCmsTransport;

/// Run the player until interrupted.
pub async fn run(
    config: Config,
    reload_handle: reload::Handle<EnvFilter, Registry>,
) -> Result<()> {
    println!("marquee player starting");
    println!("CMS: {}", config.cms.address);
    println!("State dir: {}", config.storage.state_dir.display());

    let identity = DisplayIdentity::load_or_create(&config.storage.state_dir)
        .await
        .context("loading display identity")?;
    println!("Hardware key: {}", identity.hardware_key);

    let transport = Arc::new(
        HttpCmsTransport::new(&config.cms, config.display.device_name.clone(), identity)
            .context("building CMS transport")?,
    );

    let core = PlayerCore::new(config, transport).with_log_level_applier(Box::new(move |level| {
        match EnvFilter::try_new(level) {
            Ok(filter) => {
                if reload_handle.reload(filter).is_err() {
                    tracing::warn!("log filter reload failed");
                }
            }
            Err(_) => tracing::warn!(level, "CMS sent an unusable log level"),
        }
    }));

    let handle = core.handle();
    let mut events = core.events().subscribe();

    // surface orchestration events; a real platform mounts its renderer
    // and cache here instead
    let logger = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(PlayerEvent::LayoutPrepareRequest { layout, .. }) => {
                    tracing::info!(layout, "prepare layout");
                }
                Ok(PlayerEvent::CleanupComplete) => break,
                Ok(event) => tracing::debug!(event = event.name(), "orchestration event"),
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                Err(_) => {}
            }
        }
    });

    let runtime_task = tokio::spawn(runtime::run(core));

    tokio::signal::ctrl_c()
        .await
        .context("waiting for interrupt")?;
    println!("\nshutting down");
    handle.shutdown().await;

    runtime_task.await.context("runtime task panicked")?;
    logger.abort();
    Ok(())
}
