//! Config entry types
//!
//! A [`ConfigEntry`] represents one configured charger. `data` holds the
//! connection configuration; `options` holds pending user changes that
//! [`crate::apply_options`] folds back into `data` on reload.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use wattpilot_core::{DEFAULT_POLL_INTERVAL, DEFAULT_TIMEOUT};

/// A configuration entry for one charger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigEntry {
    /// Unique identifier (ULID)
    pub entry_id: String,

    /// Human-readable display name
    pub title: String,

    /// Connection configuration
    #[serde(default)]
    pub data: HashMap<String, Value>,

    /// User-configurable options, applied on reload
    #[serde(default)]
    pub options: HashMap<String, Value>,

    /// Creation timestamp
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    /// Last modification timestamp
    #[serde(default = "Utc::now")]
    pub modified_at: DateTime<Utc>,
}

impl ConfigEntry {
    /// Create a new config entry
    pub fn new(title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            entry_id: ulid::Ulid::new().to_string(),
            title: title.into(),
            data: HashMap::new(),
            options: HashMap::new(),
            created_at: now,
            modified_at: now,
        }
    }

    /// Set entry data
    pub fn with_data(mut self, data: HashMap<String, Value>) -> Self {
        self.data = data;
        self
    }

    /// Set entry options
    pub fn with_options(mut self, options: HashMap<String, Value>) -> Self {
        self.options = options;
        self
    }

    /// Resolve the effective runtime parameters from the entry data
    pub fn params(&self) -> EntryParams {
        EntryParams {
            timeout: self.u64_field("timeout").unwrap_or(DEFAULT_TIMEOUT),
            poll_interval: self
                .u64_field("poll_interval")
                .unwrap_or(DEFAULT_POLL_INTERVAL),
        }
    }

    fn u64_field(&self, key: &str) -> Option<u64> {
        self.data.get(key).and_then(Value::as_u64)
    }
}

/// Runtime parameters resolved from entry data, with defaults applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryParams {
    /// Base timeout in seconds; the firmware install wait allows four
    /// times this per phase
    pub timeout: u64,
    /// Pull-poll interval in seconds
    pub poll_interval: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_params_defaults() {
        let entry = ConfigEntry::new("Garage charger");
        let params = entry.params();
        assert_eq!(params.timeout, DEFAULT_TIMEOUT);
        assert_eq!(params.poll_interval, DEFAULT_POLL_INTERVAL);
    }

    #[test]
    fn test_params_from_entry_data() {
        let entry = ConfigEntry::new("Garage charger").with_data(HashMap::from([
            ("timeout".to_string(), json!(5)),
            ("poll_interval".to_string(), json!(60)),
        ]));
        let params = entry.params();
        assert_eq!(params.timeout, 5);
        assert_eq!(params.poll_interval, 60);
    }

    #[test]
    fn test_non_numeric_timeout_falls_back_to_default() {
        let entry = ConfigEntry::new("Garage charger")
            .with_data(HashMap::from([("timeout".to_string(), json!("fast"))]));
        assert_eq!(entry.params().timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_entry_ids_are_unique() {
        let a = ConfigEntry::new("a");
        let b = ConfigEntry::new("b");
        assert_ne!(a.entry_id, b.entry_id);
    }
}
