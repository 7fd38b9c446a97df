//! Select entities for the Wattpilot charger

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, error};

use wattpilot_client::ChargerClient;
use wattpilot_core::{
    value_display, EntityConfig, OptionsSpec, Platform, SetType, STATE_UNKNOWN,
};

use crate::entity::{build_entities, ChargerEntity, EntityBase};
use crate::error::{CoercionError, EntityError};
use crate::registry::PushRegistry;
use crate::state::EntityStateStore;

/// Set up the select platform from its YAML definitions
pub fn setup_platform(
    entry_id: &str,
    charger: &Arc<dyn ChargerClient>,
    store: &Arc<EntityStateStore>,
    registry: &PushRegistry,
    yaml: &str,
) -> Vec<Arc<dyn ChargerEntity>> {
    let charger = charger.clone();
    let store = store.clone();
    build_entities(Platform::Select, entry_id, yaml, registry, move |config| {
        ChargerSelect::new(entry_id, charger.clone(), config, store.clone())
    })
}

/// Select entity over an enumerated charger property.
///
/// The option table maps raw property keys to display values; it is either
/// declared literally in the configuration or fetched from a named table the
/// charger client publishes.
pub struct ChargerSelect {
    base: EntityBase,
    options: IndexMap<String, String>,
    set_type: Option<SetType>,
}

impl ChargerSelect {
    pub fn new(
        entry_id: &str,
        charger: Arc<dyn ChargerClient>,
        config: EntityConfig,
        store: Arc<EntityStateStore>,
    ) -> Result<Self, EntityError> {
        let options = match &config.options {
            Some(OptionsSpec::Table(table)) => table.clone(),
            Some(OptionsSpec::Named(name)) => charger.option_table(name).ok_or_else(|| {
                EntityError::Init(format!("option table '{name}' not available from charger"))
            })?,
            None => {
                return Err(EntityError::Init(
                    "required configuration option 'options' missing".to_string(),
                ))
            }
        };
        let set_type = config.set_type;
        let base = EntityBase::new(entry_id, charger, config, store);
        Ok(Self {
            base,
            options,
            set_type,
        })
    }

    /// The display values offered to the host, in table order
    pub fn options(&self) -> Vec<String> {
        self.options.values().cloned().collect()
    }

    /// Currently selected display value
    pub async fn current_option(&self) -> String {
        self.base.state().await
    }

    /// Change the selected option: reverse-translate the display value to
    /// its key and write the key to the charger. An unmatched option is an
    /// error and performs no write.
    pub async fn select_option(&self, option: &str) -> Result<(), EntityError> {
        let key = self
            .options
            .iter()
            .find(|(_, display)| display.as_str() == option)
            .map(|(key, _)| key.clone())
            .ok_or_else(|| CoercionError::UnknownOption {
                option: option.to_string(),
            })?;

        debug!(
            charger = %self.base.charger_id(),
            identifier = %self.base.identifier(),
            option,
            key,
            "writing selected option key"
        );
        self.base
            .charger()
            .set_property(
                self.base.identifier(),
                Value::String(key),
                false,
                self.set_type,
            )
            .await?;
        Ok(())
    }
}

impl ChargerEntity for ChargerSelect {
    fn base(&self) -> &EntityBase {
        &self.base
    }

    fn coerce(&self, raw: Value) -> Result<Option<String>, CoercionError> {
        let state = value_display(&raw);
        if let Some(display) = self.options.get(&state) {
            return Ok(Some(display.clone()));
        }
        if self.options.values().any(|display| display == &state) {
            return Ok(Some(state));
        }
        error!(
            charger = %self.base.charger_id(),
            identifier = %self.base.identifier(),
            state,
            "state not within option values"
        );
        Ok(Some(STATE_UNKNOWN.to_string()))
    }
}
