//! In-memory charger client used by tests across the workspace

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use dashmap::DashMap;
use indexmap::IndexMap;
use serde_json::Value;
use tokio::sync::broadcast;

use wattpilot_core::SetType;

use crate::{ChargerClient, ClientError, PropertyEvent};

/// Event channel capacity; tests never come close to this
const CHANNEL_CAPACITY: usize = 64;

/// A charger client backed by an in-memory property store.
///
/// Writes are recorded in order so tests can assert write sequences, the
/// connectivity flag can be flipped, and property events can be injected as
/// if the charger had pushed them.
pub struct MockCharger {
    serial: String,
    name: String,
    properties: DashMap<String, Value>,
    property_order: Mutex<Vec<String>>,
    option_tables: DashMap<String, IndexMap<String, String>>,
    named_values: DashMap<String, Value>,
    writes: Mutex<Vec<(String, Value)>>,
    connected: AtomicBool,
    events: broadcast::Sender<PropertyEvent>,
    fail_writes: AtomicBool,
}

impl MockCharger {
    pub fn new(serial: impl Into<String>) -> Self {
        let serial = serial.into();
        let (events, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            name: format!("Wattpilot {serial}"),
            serial,
            properties: DashMap::new(),
            property_order: Mutex::new(Vec::new()),
            option_tables: DashMap::new(),
            named_values: DashMap::new(),
            writes: Mutex::new(Vec::new()),
            connected: AtomicBool::new(true),
            events,
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Seed a property value
    pub fn with_property(self, identifier: impl Into<String>, value: Value) -> Self {
        self.insert_property(identifier.into(), value);
        self
    }

    /// Seed a named option table
    pub fn with_option_table(
        self,
        name: impl Into<String>,
        table: IndexMap<String, String>,
    ) -> Self {
        self.option_tables.insert(name.into(), table);
        self
    }

    /// Seed a named runtime value
    pub fn with_named_value(self, name: impl Into<String>, value: Value) -> Self {
        self.named_values.insert(name.into(), value);
        self
    }

    /// Flip the connectivity flag
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Make subsequent writes fail
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Update a property and push a property-changed event, as the real
    /// client does when the charger reports a change.
    pub fn push_property(&self, identifier: impl Into<String>, value: Value) {
        let identifier = identifier.into();
        self.insert_property(identifier.clone(), value.clone());
        let _ = self.events.send(PropertyEvent { identifier, value });
    }

    /// All recorded writes, in order
    pub fn writes(&self) -> Vec<(String, Value)> {
        self.writes.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn insert_property(&self, identifier: String, value: Value) {
        if self.properties.insert(identifier.clone(), value).is_none() {
            self.property_order
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(identifier);
        }
    }
}

#[async_trait]
impl ChargerClient for MockCharger {
    fn serial(&self) -> &str {
        &self.serial
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn firmware(&self) -> Option<String> {
        self.property("fwv").map(|v| wattpilot_core::value_display(&v))
    }

    fn connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn connect(&self) -> Result<(), ClientError> {
        self.set_connected(true);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), ClientError> {
        self.set_connected(false);
        Ok(())
    }

    fn property(&self, identifier: &str) -> Option<Value> {
        self.properties.get(identifier).map(|v| v.clone())
    }

    fn all_properties(&self) -> IndexMap<String, Value> {
        let order = self.property_order.lock().unwrap_or_else(|e| e.into_inner());
        order
            .iter()
            .filter_map(|id| self.property(id).map(|v| (id.clone(), v)))
            .collect()
    }

    async fn set_property(
        &self,
        identifier: &str,
        value: Value,
        _force: bool,
        _force_type: Option<SetType>,
    ) -> Result<(), ClientError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(ClientError::WriteFailed {
                identifier: identifier.to_string(),
                reason: "simulated failure".to_string(),
            });
        }
        self.writes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((identifier.to_string(), value.clone()));
        self.insert_property(identifier.to_string(), value);
        Ok(())
    }

    fn option_table(&self, name: &str) -> Option<IndexMap<String, String>> {
        self.option_tables.get(name).map(|t| t.clone())
    }

    fn named_value(&self, name: &str) -> Option<Value> {
        self.named_values.get(name).map(|v| v.clone())
    }

    fn subscribe_properties(&self) -> broadcast::Receiver<PropertyEvent> {
        self.events.subscribe()
    }
}
