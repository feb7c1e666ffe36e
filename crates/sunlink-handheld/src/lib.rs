//! Handheld sync agent.
//!
//! Reads the latest forecast from the local store and publishes it to the
//! paired wearable whenever the wearable asks, the forecast changes, or a
//! push is requested.

pub mod agent;
pub mod prefs;
pub mod store;
pub mod trigger;

pub use agent::{start_of_utc_day, PublishOutcome, SharedForecastStore, SyncAgent};
pub use prefs::{Preferences, StaticPreferences};
pub use store::{ForecastStore, ForecastStoreResult, SqliteForecastStore};
pub use trigger::SyncTrigger;
