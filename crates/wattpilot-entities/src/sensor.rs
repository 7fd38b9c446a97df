//! Sensor entities for the Wattpilot charger

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;
use tracing::warn;

use wattpilot_client::ChargerClient;
use wattpilot_core::{value_display, EntityConfig, Platform, STATE_UNKNOWN};

use crate::entity::{build_entities, ChargerEntity, EntityBase};
use crate::error::{CoercionError, EntityError};
use crate::registry::PushRegistry;
use crate::state::EntityStateStore;
use crate::units::suggested_unit;

/// Set up the sensor platform from its YAML definitions
pub fn setup_platform(
    entry_id: &str,
    charger: &Arc<dyn ChargerClient>,
    store: &Arc<EntityStateStore>,
    registry: &PushRegistry,
    yaml: &str,
) -> Vec<Arc<dyn ChargerEntity>> {
    let charger = charger.clone();
    let store = store.clone();
    build_entities(Platform::Sensor, entry_id, yaml, registry, move |config| {
        ChargerSensor::new(entry_id, charger.clone(), config, store.clone())
    })
}

/// Sensor entity: displays one charger property, optionally translated
/// through an enum table or HTML-unescaped.
pub struct ChargerSensor {
    base: EntityBase,
    enum_map: Option<IndexMap<String, String>>,
    html_unescape: bool,
    unit: Option<String>,
    suggested_unit: Option<String>,
    state_class: Option<String>,
}

impl ChargerSensor {
    pub fn new(
        entry_id: &str,
        charger: Arc<dyn ChargerClient>,
        config: EntityConfig,
        store: Arc<EntityStateStore>,
    ) -> Result<Self, EntityError> {
        let base = EntityBase::new(entry_id, charger, config, store);
        let config = base.config();

        let unit = config.unit_of_measurement.clone();
        let suggested_unit =
            suggested_unit(config.device_class.as_deref(), unit.as_deref());
        let enum_map = config.enum_map.clone();
        let html_unescape = config.html_unescape;
        let state_class = config.state_class.as_deref().map(str::to_lowercase);

        Ok(Self {
            enum_map,
            html_unescape,
            unit,
            suggested_unit,
            state_class,
            base,
        })
    }

    /// Native unit of measurement, as configured
    pub fn unit_of_measurement(&self) -> Option<&str> {
        self.unit.as_deref()
    }

    /// Display unit suggested to the host, if the configured unit is valid
    /// for the entity's device class
    pub fn suggested_unit_of_measurement(&self) -> Option<&str> {
        self.suggested_unit.as_deref()
    }

    pub fn state_class(&self) -> Option<&str> {
        self.state_class.as_deref()
    }
}

impl ChargerEntity for ChargerSensor {
    fn base(&self) -> &EntityBase {
        &self.base
    }

    fn coerce(&self, raw: Value) -> Result<Option<String>, CoercionError> {
        if raw.is_null() {
            return Ok(Some(STATE_UNKNOWN.to_string()));
        }
        let state = value_display(&raw);
        if state == "None" {
            return Ok(Some(STATE_UNKNOWN.to_string()));
        }
        if self.html_unescape {
            return Ok(Some(
                html_escape::decode_html_entities(&state).into_owned(),
            ));
        }
        if let Some(enum_map) = &self.enum_map {
            if let Some(display) = enum_map.get(&state) {
                return Ok(Some(display.clone()));
            }
            if !enum_map.values().any(|display| display == &state) {
                warn!(
                    charger = %self.base.charger_id(),
                    identifier = %self.base.identifier(),
                    state,
                    "state not within enum values"
                );
            }
        }
        Ok(Some(state))
    }
}
