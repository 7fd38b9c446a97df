//! Device client contract for the Wattpilot charger integration
//!
//! The actual wire protocol and reconnection logic live in the client
//! implementation; this crate only defines the seam the integration talks
//! through: property lookup and writes, connectivity, and a broadcast stream
//! of property-changed events.

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::broadcast;

use wattpilot_core::SetType;

pub mod testing;

/// Errors surfaced by a charger client
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    #[error("charger is not connected")]
    NotConnected,

    #[error("connecting to charger failed: {0}")]
    ConnectFailed(String),

    #[error("write to property '{identifier}' failed: {reason}")]
    WriteFailed { identifier: String, reason: String },
}

/// A property-changed notification pushed by the charger
#[derive(Debug, Clone)]
pub struct PropertyEvent {
    /// Property identifier, e.g. "amp"
    pub identifier: String,
    /// The new raw value
    pub value: Value,
}

/// The contract a charger client implementation must provide.
///
/// Option tables and named values are exposed through explicit accessors so
/// the integration never has to reach into the client by reflection.
#[async_trait]
pub trait ChargerClient: Send + Sync {
    /// Serial number of the charger
    fn serial(&self) -> &str;

    /// Friendly name of the charger
    fn name(&self) -> &str;

    /// Firmware version reported by the charger, if known
    fn firmware(&self) -> Option<String>;

    /// Whether the client currently holds a live connection
    fn connected(&self) -> bool;

    /// Establish the connection to the charger
    async fn connect(&self) -> Result<(), ClientError>;

    /// Tear down the connection to the charger
    async fn disconnect(&self) -> Result<(), ClientError>;

    /// Current value of a property, if the charger has reported it
    fn property(&self, identifier: &str) -> Option<Value>;

    /// Snapshot of all reported properties, in report order
    fn all_properties(&self) -> IndexMap<String, Value>;

    /// Write a property value to the charger.
    ///
    /// `force` writes even while a previous write is pending; `force_type`
    /// coerces the value onto the wire as the given type.
    async fn set_property(
        &self,
        identifier: &str,
        value: Value,
        force: bool,
        force_type: Option<SetType>,
    ) -> Result<(), ClientError>;

    /// A named key/display option table published by the client
    fn option_table(&self, name: &str) -> Option<IndexMap<String, String>>;

    /// A named runtime value published by the client (firmware, variant, ...)
    fn named_value(&self, name: &str) -> Option<Value>;

    /// Subscribe to property-changed events
    fn subscribe_properties(&self) -> broadcast::Receiver<PropertyEvent>;
}
