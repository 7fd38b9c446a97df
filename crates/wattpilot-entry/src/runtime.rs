//! Per-entry runtime data
//!
//! Everything a loaded entry owns at runtime lives in one explicit context
//! object: the charger handle, the push registry, the state store, the live
//! entities and the background task handles. Dropping the entry means
//! tearing this object down through [`crate::unload_entry`].

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use wattpilot_client::ChargerClient;
use wattpilot_entities::{ChargerEntity, EntityStateStore, PushRegistry};

use crate::entry::EntryParams;

/// Runtime state of one loaded config entry
pub struct RuntimeData {
    pub charger: Arc<dyn ChargerClient>,
    pub registry: Arc<PushRegistry>,
    pub store: Arc<EntityStateStore>,
    pub params: EntryParams,
    pub entities: Vec<Arc<dyn ChargerEntity>>,
    pub(crate) shutdown: watch::Sender<bool>,
    pub(crate) tasks: Vec<JoinHandle<()>>,
}

impl RuntimeData {
    /// Subscribe to the entry's shutdown signal
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    /// Number of live entities across all platforms
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }
}
