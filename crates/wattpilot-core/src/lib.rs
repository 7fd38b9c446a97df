//! Core types for the Wattpilot charger integration
//!
//! This crate provides the entity configuration record, the declarative
//! platform configuration loader, and the well-known state constants shared
//! by every platform crate.

mod config;

pub use config::{
    load_platform_configs, ConfigError, EntityConfig, OptionsSpec, Platform, RawEntityConfig,
    SetType, Source,
};

/// State value for an entity that is switched on
pub const STATE_ON: &str = "on";

/// State value for an entity that is switched off
pub const STATE_OFF: &str = "off";

/// State value for an entity whose value is not known
pub const STATE_UNKNOWN: &str = "unknown";

/// Default timeout in seconds for charger operations
pub const DEFAULT_TIMEOUT: u64 = 30;

/// Default polling cadence in seconds for pull-sourced entities
pub const DEFAULT_POLL_INTERVAL: u64 = 30;

/// Render a raw property value the way the host displays states.
///
/// Strings are used as-is, everything else falls back to its JSON
/// representation ("true", "7.5", ...).
pub fn value_display(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
