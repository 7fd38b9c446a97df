//! Diagnostics snapshot for a loaded entry
//!
//! The snapshot is meant to be attached to bug reports, so everything that
//! identifies or unlocks the charger is redacted: connection credentials in
//! the entry data and the property keys carrying WiFi scans, certificates
//! and OCPP keys.

use serde_json::{json, Value};
use tracing::debug;

use crate::entry::ConfigEntry;
use crate::runtime::RuntimeData;

/// Entry data keys never included in clear text
const REDACT_CONFIG: &[&str] = &["ip_address", "password", "serial"];

/// Charger property keys never included in clear text
const REDACT_PROPERTIES: &[&str] = &[
    "wifis", "scan", "data", "dll", "cak", "ocppck", "ocppcc", "ocppsc",
];

const REDACTED: &str = "**REDACTED**";

fn redacted<'a, I>(entries: I, redact: &[&str]) -> Value
where
    I: IntoIterator<Item = (&'a String, &'a Value)>,
{
    let map: serde_json::Map<String, Value> = entries
        .into_iter()
        .map(|(key, value)| {
            if redact.contains(&key.as_str()) {
                (key.clone(), Value::String(REDACTED.to_string()))
            } else {
                (key.clone(), value.clone())
            }
        })
        .collect();
    Value::Object(map)
}

/// Build the diagnostics snapshot for one loaded entry
pub fn entry_diagnostics(entry: &ConfigEntry, runtime: &RuntimeData) -> Value {
    debug!(entry_id = %entry.entry_id, "collecting diagnostics");

    let charger = &runtime.charger;
    let properties = charger.all_properties();

    json!({
        "config": {
            "entry_id": entry.entry_id,
            "title": entry.title,
            "created_at": entry.created_at,
            "data": redacted(&entry.data, REDACT_CONFIG),
            "options": redacted(&entry.options, REDACT_CONFIG),
        },
        "charger_properties": redacted(&properties, REDACT_PROPERTIES),
        "charger_info": {
            "connected": charger.connected(),
            "name": charger.name(),
            "serial": REDACTED,
            "firmware": charger.firmware(),
        },
        "entities": runtime.entity_count(),
    })
}
