//! Switch entities for the Wattpilot charger

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, warn};

use wattpilot_client::ChargerClient;
use wattpilot_core::{value_display, EntityConfig, Platform, STATE_OFF, STATE_ON, STATE_UNKNOWN};

use crate::entity::{build_entities, ChargerEntity, EntityBase};
use crate::error::{CoercionError, EntityError};
use crate::registry::PushRegistry;
use crate::state::EntityStateStore;

/// Set up the switch platform from its YAML definitions
pub fn setup_platform(
    entry_id: &str,
    charger: &Arc<dyn ChargerClient>,
    store: &Arc<EntityStateStore>,
    registry: &PushRegistry,
    yaml: &str,
) -> Vec<Arc<dyn ChargerEntity>> {
    let charger = charger.clone();
    let store = store.clone();
    build_entities(Platform::Switch, entry_id, yaml, registry, move |config| {
        ChargerSwitch::new(entry_id, charger.clone(), config, store.clone())
    })
}

/// Switch entity over a boolean charger property, optionally inverted
pub struct ChargerSwitch {
    base: EntityBase,
    invert: bool,
}

impl ChargerSwitch {
    pub fn new(
        entry_id: &str,
        charger: Arc<dyn ChargerClient>,
        config: EntityConfig,
        store: Arc<EntityStateStore>,
    ) -> Result<Self, EntityError> {
        let invert = config.invert;
        let base = EntityBase::new(entry_id, charger, config, store);
        Ok(Self { base, invert })
    }

    /// Whether the switch currently shows as on
    pub async fn is_on(&self) -> bool {
        self.base.state().await == STATE_ON
    }

    /// Turn the switch on, honoring the invert flag on the wire value
    pub async fn turn_on(&self) -> Result<(), EntityError> {
        self.write(!self.invert).await
    }

    /// Turn the switch off, honoring the invert flag on the wire value
    pub async fn turn_off(&self) -> Result<(), EntityError> {
        self.write(self.invert).await
    }

    async fn write(&self, value: bool) -> Result<(), EntityError> {
        debug!(
            charger = %self.base.charger_id(),
            identifier = %self.base.identifier(),
            value,
            "writing switch property"
        );
        self.base
            .charger()
            .set_property(self.base.identifier(), json!(value), false, None)
            .await?;
        Ok(())
    }
}

impl ChargerEntity for ChargerSwitch {
    fn base(&self) -> &EntityBase {
        &self.base
    }

    fn coerce(&self, raw: Value) -> Result<Option<String>, CoercionError> {
        let text = value_display(&raw);
        let state = if text.eq_ignore_ascii_case(STATE_ON) || text.eq_ignore_ascii_case("true") {
            STATE_ON.to_string()
        } else if text.eq_ignore_ascii_case(STATE_OFF) || text.eq_ignore_ascii_case("false") {
            STATE_OFF.to_string()
        } else if text == STATE_UNKNOWN {
            text
        } else {
            warn!(
                charger = %self.base.charger_id(),
                identifier = %self.base.identifier(),
                state = %text,
                "state not valid for switch platform"
            );
            STATE_UNKNOWN.to_string()
        };

        // Inversion applies after normalization
        let state = if self.invert && state == STATE_ON {
            STATE_OFF.to_string()
        } else if self.invert && state == STATE_OFF {
            STATE_ON.to_string()
        } else {
            state
        };
        Ok(Some(state))
    }
}
