//! Push registry and the property-event dispatcher
//!
//! The registry maps a property identifier to the entities interested in it.
//! It is a multimap: more than one entity may subscribe to the same
//! identifier, and dispatch fans out to all of them. An event for an
//! identifier nobody registered is a silent no-op.

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use wattpilot_client::PropertyEvent;
use wattpilot_core::Source;

use crate::entity::ChargerEntity;

/// Maps property identifiers to the entities updated on a push for them
pub struct PushRegistry {
    subscribers: DashMap<String, Vec<Arc<dyn ChargerEntity>>>,
}

impl PushRegistry {
    pub fn new() -> Self {
        Self {
            subscribers: DashMap::new(),
        }
    }

    /// Register an entity for push updates.
    ///
    /// Only entities with a `property` source take the push path; everything
    /// else is a no-op here.
    pub fn register(&self, entity: Arc<dyn ChargerEntity>) {
        if entity.base().source() != Source::Property {
            return;
        }
        let identifier = entity.base().identifier().to_string();
        trace!(
            identifier,
            unique_id = entity.base().unique_id(),
            "registered push entity"
        );
        self.subscribers.entry(identifier).or_default().push(entity);
    }

    /// Number of entities registered for an identifier
    pub fn subscriber_count(&self, identifier: &str) -> usize {
        self.subscribers
            .get(identifier)
            .map(|v| v.len())
            .unwrap_or(0)
    }

    /// Total number of registered identifiers
    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Drop all registrations at entry teardown
    pub fn clear(&self) {
        self.subscribers.clear();
    }

    /// Route a pushed property value to every registered entity.
    ///
    /// Unknown identifiers are expected (the charger reports far more
    /// properties than we surface) and are ignored.
    pub async fn dispatch(&self, identifier: &str, value: Value) {
        let targets: Vec<Arc<dyn ChargerEntity>> = match self.subscribers.get(identifier) {
            Some(entities) => entities.clone(),
            None => {
                trace!(identifier, "no entity registered for pushed property");
                return;
            }
        };
        for entity in targets {
            entity.apply_raw(value.clone()).await;
        }
    }
}

impl Default for PushRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawn the dispatcher task draining the charger's property-event stream.
///
/// The task stops when the shutdown signal flips to `true` or the event
/// stream closes. A lagged receiver only loses events, never the task.
pub fn spawn_dispatcher(
    registry: Arc<PushRegistry>,
    mut events: broadcast::Receiver<PropertyEvent>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                event = events.recv() => match event {
                    Ok(event) => registry.dispatch(&event.identifier, event.value).await,
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(missed, "property event stream lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }
        debug!("property dispatcher stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::ChargerSensor;
    use crate::state::EntityStateStore;
    use serde_json::json;
    use wattpilot_client::testing::MockCharger;
    use wattpilot_client::ChargerClient;
    use wattpilot_core::{load_platform_configs, Platform};

    fn sensor(
        charger: &Arc<MockCharger>,
        store: &Arc<EntityStateStore>,
        yaml: &str,
    ) -> Arc<ChargerSensor> {
        let config = load_platform_configs(yaml, Platform::Sensor)
            .unwrap()
            .remove(0);
        let charger: Arc<dyn wattpilot_client::ChargerClient> = charger.clone();
        Arc::new(ChargerSensor::new("entry", charger, config, store.clone()).unwrap())
    }

    #[tokio::test]
    async fn test_dispatch_for_unregistered_identifier_is_noop() {
        let registry = PushRegistry::new();
        registry.dispatch("unknown_prop", json!(1)).await;
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_fans_out_to_all_subscribers() {
        let charger = Arc::new(MockCharger::new("12345678"));
        let store = Arc::new(EntityStateStore::new());
        let registry = PushRegistry::new();

        let first = sensor(&charger, &store, "sensor:\n  - id: amp\n    source: property\n");
        let second = sensor(
            &charger,
            &store,
            "sensor:\n  - id: amp\n    source: property\n    uid: 12345678_amp_mirror\n",
        );
        registry.register(first.clone());
        registry.register(second.clone());
        assert_eq!(registry.subscriber_count("amp"), 2);

        registry.dispatch("amp", json!(16)).await;
        assert_eq!(first.base().state().await, "16");
        assert_eq!(second.base().state().await, "16");
    }

    #[tokio::test]
    async fn test_pull_entities_are_not_push_registered() {
        let charger = Arc::new(MockCharger::new("12345678"));
        let store = Arc::new(EntityStateStore::new());
        let registry = PushRegistry::new();

        let entity = sensor(
            &charger,
            &store,
            "sensor:\n  - id: variant\n    source: attribute\n",
        );
        registry.register(entity);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_dispatcher_stops_on_shutdown() {
        let charger = Arc::new(MockCharger::new("12345678"));
        let registry = Arc::new(PushRegistry::new());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = spawn_dispatcher(registry, charger.subscribe_properties(), shutdown_rx);
        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
