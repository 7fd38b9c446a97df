//! Entity base behavior and the shared update pipeline
//!
//! Every platform entity owns an [`EntityBase`] binding one configuration
//! record to the shared charger client and the entry's state store. The
//! update pipeline is identical for the push and pull paths: raw value →
//! platform coercion → state write on success, logged no-op on failure.
//! Nothing in this module lets an error escape toward the host.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, error, info};

use wattpilot_client::ChargerClient;
use wattpilot_core::{
    load_platform_configs, value_display, EntityConfig, Platform, Source, STATE_UNKNOWN,
};

use crate::error::{CoercionError, EntityError};
use crate::registry::PushRegistry;
use crate::state::EntityStateStore;

/// Shared per-entity state: configuration, charger handle and the current
/// host-visible value.
pub struct EntityBase {
    entry_id: String,
    charger: Arc<dyn ChargerClient>,
    charger_id: String,
    config: EntityConfig,
    unique_id: String,
    name: String,
    state: RwLock<String>,
    store: Arc<EntityStateStore>,
}

impl EntityBase {
    pub fn new(
        entry_id: &str,
        charger: Arc<dyn ChargerClient>,
        config: EntityConfig,
        store: Arc<EntityStateStore>,
    ) -> Self {
        let charger_id = charger.serial().to_string();
        let unique_id = config
            .uid
            .clone()
            .unwrap_or_else(|| format!("{}_{}", charger_id, config.id));
        let name = config.name.clone().unwrap_or_else(|| config.id.clone());
        let initial = config
            .default_state
            .as_ref()
            .map(value_display)
            .unwrap_or_else(|| STATE_UNKNOWN.to_string());

        Self {
            entry_id: entry_id.to_string(),
            charger,
            charger_id,
            config,
            unique_id,
            name,
            state: RwLock::new(initial),
            store,
        }
    }

    pub fn entry_id(&self) -> &str {
        &self.entry_id
    }

    /// The charger property identifier this entity is bound to
    pub fn identifier(&self) -> &str {
        &self.config.id
    }

    pub fn source(&self) -> Source {
        self.config.source
    }

    pub fn config(&self) -> &EntityConfig {
        &self.config
    }

    pub fn charger(&self) -> &Arc<dyn ChargerClient> {
        &self.charger
    }

    /// Serial of the charger this entity belongs to, used in log context
    pub fn charger_id(&self) -> &str {
        &self.charger_id
    }

    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current host-visible state
    pub async fn state(&self) -> String {
        self.state.read().await.clone()
    }

    /// Write a new host-visible state and publish it to the state store
    pub async fn write_state(&self, new_state: String) {
        *self.state.write().await = new_state.clone();
        self.store.set(&self.unique_id, new_state);
    }

    /// Read the current raw value for this entity's source kind.
    ///
    /// `property` reads the property store directly; `attribute` resolves a
    /// named runtime value on the client; `namespace_list` picks one element
    /// (and optionally one field) out of a list-valued property.
    pub fn raw_from_source(&self) -> Option<Value> {
        match self.config.source {
            Source::Property => self.charger.property(&self.config.id),
            Source::Attribute => self.charger.named_value(&self.config.id),
            Source::NamespaceList => {
                let list = self.charger.property(&self.config.id)?;
                let index = self.config.namespace_id.unwrap_or(0);
                let element = list.as_array()?.get(index)?.clone();
                match &self.config.value_id {
                    Some(value_id) => element.get(value_id).cloned(),
                    None => Some(element),
                }
            }
            Source::None => None,
        }
    }
}

/// A live entity bound to one configuration record.
///
/// Implementors provide the platform-specific coercion rule; the update
/// pipeline and the pull path are shared.
#[async_trait]
pub trait ChargerEntity: Send + Sync {
    fn base(&self) -> &EntityBase;

    /// Platform-specific validate/transform of a raw value.
    ///
    /// `Ok(Some(state))` writes the new state, `Ok(None)` and `Err` keep the
    /// previous state (`Err` additionally logs at error level).
    fn coerce(&self, raw: Value) -> Result<Option<String>, CoercionError>;

    /// Run a raw value through the update pipeline
    async fn apply_raw(&self, raw: Value) {
        let base = self.base();
        match self.coerce(raw) {
            Ok(Some(state)) => {
                debug!(
                    charger = %base.charger_id(),
                    identifier = %base.identifier(),
                    state = %state,
                    "state updated"
                );
                base.write_state(state).await;
            }
            Ok(None) => {}
            Err(err) => {
                error!(
                    charger = %base.charger_id(),
                    identifier = %base.identifier(),
                    %err,
                    "state validation failed, keeping previous state"
                );
            }
        }
    }

    /// Pull path: read the current value from the charger and apply it
    async fn poll(&self) {
        let base = self.base();
        if base.source() == Source::None {
            return;
        }
        if let Some(raw) = base.raw_from_source() {
            self.apply_raw(raw).await;
        }
    }
}

/// Shared platform setup: load and validate the YAML definitions, build one
/// entity per record, exclude entities whose initializer failed, and register
/// push-driven entities in the push registry.
pub(crate) fn build_entities<E, F>(
    platform: Platform,
    entry_id: &str,
    yaml: &str,
    registry: &PushRegistry,
    build: F,
) -> Vec<Arc<dyn ChargerEntity>>
where
    E: ChargerEntity + 'static,
    F: Fn(EntityConfig) -> Result<E, EntityError>,
{
    debug!(entry_id, %platform, "setting up platform");

    let configs = match load_platform_configs(yaml, platform) {
        Ok(configs) => configs,
        Err(err) => {
            error!(entry_id, %platform, %err, "reading platform configuration failed");
            return Vec::new();
        }
    };

    let mut entities: Vec<Arc<dyn ChargerEntity>> = Vec::new();
    for config in configs {
        let identifier = config.id.clone();
        match build(config) {
            Ok(entity) => {
                let entity: Arc<dyn ChargerEntity> = Arc::new(entity);
                registry.register(entity.clone());
                entities.push(entity);
            }
            Err(err) => {
                error!(
                    entry_id,
                    %platform,
                    identifier,
                    %err,
                    "excluding entity after failed initialization"
                );
            }
        }
    }

    info!(entry_id, %platform, count = entities.len(), "platform entities set up");
    entities
}
