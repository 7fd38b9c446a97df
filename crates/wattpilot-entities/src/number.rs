//! Number entities for the Wattpilot charger

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, warn};

use wattpilot_client::ChargerClient;
use wattpilot_core::{value_display, EntityConfig, Platform, SetType};

use crate::entity::{build_entities, ChargerEntity, EntityBase};
use crate::error::{CoercionError, EntityError};
use crate::registry::PushRegistry;
use crate::state::EntityStateStore;
use crate::units::suggested_unit;

/// Set up the number platform from its YAML definitions
pub fn setup_platform(
    entry_id: &str,
    charger: &Arc<dyn ChargerClient>,
    store: &Arc<EntityStateStore>,
    registry: &PushRegistry,
    yaml: &str,
) -> Vec<Arc<dyn ChargerEntity>> {
    let charger = charger.clone();
    let store = store.clone();
    build_entities(Platform::Number, entry_id, yaml, registry, move |config| {
        ChargerNumber::new(entry_id, charger.clone(), config, store.clone())
    })
}

/// Number entity over a numeric charger property
pub struct ChargerNumber {
    base: EntityBase,
    min: Option<f64>,
    max: Option<f64>,
    step: Option<f64>,
    mode: Option<String>,
    unit: Option<String>,
    suggested_unit: Option<String>,
    set_type: Option<SetType>,
}

impl ChargerNumber {
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
        let min = config.native_min_value;
        let max = config.native_max_value;
        let step = config.native_step;
        let mode = config.mode.clone();
        let set_type = config.set_type;

        Ok(Self {
            min,
            max,
            step,
            mode,
            unit,
            suggested_unit,
            set_type,
            base,
        })
    }

    pub fn min_value(&self) -> Option<f64> {
        self.min
    }

    pub fn max_value(&self) -> Option<f64> {
        self.max
    }

    pub fn step(&self) -> Option<f64> {
        self.step
    }

    pub fn mode(&self) -> Option<&str> {
        self.mode.as_deref()
    }

    pub fn unit_of_measurement(&self) -> Option<&str> {
        self.unit.as_deref()
    }

    pub fn suggested_unit_of_measurement(&self) -> Option<&str> {
        self.suggested_unit.as_deref()
    }

    /// Current value as a number, if the state parses as one
    pub async fn native_value(&self) -> Option<f64> {
        self.base.state().await.parse().ok()
    }

    /// Write a new value to the charger.
    ///
    /// The next-trip-distance property `fte` needs a companion write of
    /// `esk=true` first to force the device into energy mode, otherwise the
    /// charger interprets the value in the wrong unit.
    pub async fn set_native_value(&self, value: f64) -> Result<(), EntityError> {
        debug!(
            charger = %self.base.charger_id(),
            identifier = %self.base.identifier(),
            value,
            "writing number property"
        );
        if self.base.identifier() == "fte" {
            debug!(
                charger = %self.base.charger_id(),
                identifier = %self.base.identifier(),
                "forcing energy mode before next trip distance write"
            );
            self.base
                .charger()
                .set_property("esk", json!(true), false, None)
                .await?;
        }
        self.base
            .charger()
            .set_property(self.base.identifier(), json!(value), false, self.set_type)
            .await?;
        Ok(())
    }
}

impl ChargerEntity for ChargerNumber {
    fn base(&self) -> &EntityBase {
        &self.base
    }

    fn coerce(&self, raw: Value) -> Result<Option<String>, CoercionError> {
        let state = value_display(&raw);
        let value: f64 = match raw.as_f64().or_else(|| state.parse().ok()) {
            Some(value) => value,
            None => {
                return Err(CoercionError::InvalidType {
                    expected: "numeric",
                    value: state,
                })
            }
        };
        if self.min.is_some_and(|min| value < min) || self.max.is_some_and(|max| value > max) {
            warn!(
                charger = %self.base.charger_id(),
                identifier = %self.base.identifier(),
                value,
                "value outside the configured bounds"
            );
        }
        Ok(Some(state))
    }
}
