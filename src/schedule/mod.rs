//! Schedule evaluation
//!
//! Everything that decides which layouts are eligible *right now*:
//!
//! - [`evaluator`] - the pure predicate engine over the CMS schedule
//! - [`criteria`] - metric/condition predicates (date, weather, properties)
//! - [`geo`] - geo-fence parsing and containment
//! - [`ratelimit`] - per-layout sliding-hour play history
//! - [`blacklist`] - consecutive-failure tracking for unsafe layouts
//!
//! The evaluator is a pure function of `(schedule, now, context)`; all
//! state it consults (play history, location, weather) is passed in, so
//! the timeline predictor can replay it against simulated state.

pub mod blacklist;
pub mod criteria;
pub mod evaluator;
pub mod geo;
pub mod ratelimit;

pub use blacklist::BlacklistTracker;
pub use evaluator::{all_layouts_at, layouts_now, EvalContext, LayoutsNow, ResolvedLayout};
pub use geo::GeoFence;
pub use ratelimit::PlayHistory;
