//! marquee - Digital Signage Player Orchestration Core
//!
//! The brain of a signage display: it keeps the display registered with
//! its CMS, collects schedules and manifests on a timer, decides which
//! layout plays next, survives offline stretches from cached snapshots,
//! and reacts to pushed overrides in real time.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration management and settings
//! - [`models`] - CMS data structures (schedule, manifests, registration)
//! - [`schedule`] - Schedule evaluation, rate limiting, blacklisting
//! - [`core`] - The orchestrator: collection loop, selector, commands
//! - [`events`] - Typed event bus consumed by renderer/cache/platform
//! - [`store`] - Offline snapshot store and display identity
//! - [`transport`] - CMS RPC contract and the default HTTP binding
//! - [`timeline`] - Playback prediction and layout duration parsing
//! - [`utils`] - Common utilities and helpers
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use marquee::config::Config;
//! use marquee::core::{runtime, PlayerCore};
//! use marquee::store::DisplayIdentity;
//! use marquee::transport::HttpCmsTransport;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let identity = DisplayIdentity::load_or_create(&config.storage.state_dir).await?;
//!     let transport = Arc::new(HttpCmsTransport::new(
//!         &config.cms,
//!         config.display.device_name.clone(),
//!         identity,
//!     )?);
//!
//!     let core = PlayerCore::new(config, transport);
//!     let mut events = core.events().subscribe();
//!     tokio::spawn(runtime::run(core));
//!
//!     while let Ok(event) = events.recv().await {
//!         println!("{}", event.name());
//!     }
//!     Ok(())
//! }
//! ```

pub mod clock;
pub mod config;
pub mod core;
pub mod error;
pub mod events;
pub mod models;
pub mod schedule;
pub mod store;
pub mod timeline;
pub mod transport;
pub mod utils;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::core::runtime::{CoreHandle, CoreMessage};
    pub use crate::core::PlayerCore;
    pub use crate::error::{Error, ErrorCategory, Result};
    pub use crate::events::{EventBus, PlayerEvent};
    pub use crate::models::{RegistrationResult, RequiredFiles, Schedule};
    pub use crate::schedule::{layouts_now, EvalContext, PlayHistory};
    pub use crate::transport::CmsTransport;
}

// Direct re-exports for convenience
pub use events::PlayerEvent;
pub use models::{RegistrationResult, RequiredFiles, Schedule};
