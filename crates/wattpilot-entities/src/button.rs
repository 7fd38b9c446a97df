//! Button entities for the Wattpilot charger

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use wattpilot_client::ChargerClient;
use wattpilot_core::{EntityConfig, Platform, SetType};

use crate::entity::{build_entities, ChargerEntity, EntityBase};
use crate::error::{CoercionError, EntityError};
use crate::registry::PushRegistry;
use crate::state::EntityStateStore;

/// Set up the button platform from its YAML definitions
pub fn setup_platform(
    entry_id: &str,
    charger: &Arc<dyn ChargerClient>,
    store: &Arc<EntityStateStore>,
    registry: &PushRegistry,
    yaml: &str,
) -> Vec<Arc<dyn ChargerEntity>> {
    let charger = charger.clone();
    let store = store.clone();
    build_entities(Platform::Button, entry_id, yaml, registry, move |config| {
        ChargerButton::new(entry_id, charger.clone(), config, store.clone())
    })
}

/// Stateless button: pressing it writes a fixed value to a charger property
pub struct ChargerButton {
    base: EntityBase,
    set_value: Value,
    set_type: Option<SetType>,
}

impl ChargerButton {
    pub fn new(
        entry_id: &str,
        charger: Arc<dyn ChargerClient>,
        config: EntityConfig,
        store: Arc<EntityStateStore>,
    ) -> Result<Self, EntityError> {
        let set_value = config.set_value.clone().ok_or_else(|| {
            EntityError::Init("required configuration option 'set_value' missing".to_string())
        })?;
        let set_type = config.set_type;
        let base = EntityBase::new(entry_id, charger, config, store);
        Ok(Self {
            base,
            set_value,
            set_type,
        })
    }

    /// Press the button. The write is forced so the charger acts even when
    /// the property already holds the configured value.
    pub async fn press(&self) -> Result<(), EntityError> {
        debug!(
            charger = %self.base.charger_id(),
            identifier = %self.base.identifier(),
            value = %self.set_value,
            "pressing button"
        );
        self.base
            .charger()
            .set_property(
                self.base.identifier(),
                self.set_value.clone(),
                true,
                self.set_type,
            )
            .await?;
        Ok(())
    }
}

impl ChargerEntity for ChargerButton {
    fn base(&self) -> &EntityBase {
        &self.base
    }

    // Buttons hold no state; incoming values never change what the host sees
    fn coerce(&self, _raw: Value) -> Result<Option<String>, CoercionError> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wattpilot_client::testing::MockCharger;
    use wattpilot_core::load_platform_configs;

    const REBOOT_YAML: &str = "button:\n  - id: rst\n    name: Reboot\n    set_value: true\n";

    fn make_button(yaml: &str, mock: Arc<MockCharger>) -> ChargerButton {
        let config = load_platform_configs(yaml, Platform::Button)
            .unwrap()
            .remove(0);
        let charger: Arc<dyn ChargerClient> = mock;
        ChargerButton::new("entry", charger, config, Arc::new(EntityStateStore::new())).unwrap()
    }

    #[tokio::test]
    async fn test_press_forces_the_configured_value() {
        let mock = Arc::new(MockCharger::new("12345678"));
        let button = make_button(REBOOT_YAML, mock.clone());
        button.press().await.unwrap();

        let writes = mock.writes();
        assert_eq!(writes, vec![("rst".to_string(), json!(true))]);
    }

    #[tokio::test]
    async fn test_incoming_values_never_change_state() {
        let mock = Arc::new(MockCharger::new("12345678"));
        let button = make_button(REBOOT_YAML, mock);
        let before = button.base().state().await;

        button.apply_raw(json!(true)).await;
        assert_eq!(button.base().state().await, before);
    }

    #[test]
    fn test_missing_set_value_fails_initialization() {
        let yaml = "button:\n  - id: rst\n";
        let configs = load_platform_configs(yaml, Platform::Button).unwrap();
        // The loader already rejects buttons without set_value
        assert!(configs.is_empty());
    }
}
