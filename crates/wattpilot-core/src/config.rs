//! Entity configuration records and the declarative platform loader
//!
//! Each platform ships a YAML document describing one entity per record.
//! Records are validated individually: a record missing a required field is
//! skipped and logged, it never aborts the rest of the platform. Declaration
//! order is preserved because it determines display order.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, warn};

/// Errors for invalid entity definitions
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("entity definition has no id")]
    MissingId,

    #[error("entity definition has no source")]
    MissingSource,

    #[error("required configuration option '{field}' missing for {platform} entity '{id}'")]
    MissingField {
        platform: Platform,
        id: String,
        field: &'static str,
    },

    #[error("invalid {platform} configuration document: {reason}")]
    InvalidDocument { platform: Platform, reason: String },
}

/// How an entity obtains its value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// Push-driven: the charger announces changes for this property id
    Property,
    /// Pull-driven: read a named runtime value from the charger client
    Attribute,
    /// Pull-driven: read one element of a list-valued property
    #[serde(alias = "namespacelist")]
    NamespaceList,
    /// Stateless (buttons)
    None,
}

/// The platform kinds this integration provides
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Sensor,
    Switch,
    Select,
    Number,
    Button,
    Update,
}

impl Platform {
    /// The YAML document key and log label for this platform
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Sensor => "sensor",
            Platform::Switch => "switch",
            Platform::Select => "select",
            Platform::Number => "number",
            Platform::Button => "button",
            Platform::Update => "update",
        }
    }

    /// The source kind this platform forces on its records, if any.
    ///
    /// Sensors may use any source. Switches, selects, numbers and updates
    /// only support push-driven properties; buttons are stateless.
    pub fn forced_source(&self) -> Option<Source> {
        match self {
            Platform::Sensor => None,
            Platform::Button => Some(Source::None),
            Platform::Switch | Platform::Select | Platform::Number | Platform::Update => {
                Some(Source::Property)
            }
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a value is forced onto the wire when writing a property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SetType {
    Bool,
    Int,
    Float,
    String,
}

/// Option table for a select entity: either a literal key/display table or
/// the name of a table the charger client publishes at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionsSpec {
    Table(IndexMap<String, String>),
    Named(String),
}

fn default_true() -> bool {
    true
}

/// An entity definition exactly as it appears in the YAML document.
///
/// Everything is optional here; [`RawEntityConfig::validate`] turns a raw
/// record into a usable [`EntityConfig`] or rejects it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawEntityConfig {
    pub id: Option<String>,
    pub source: Option<Source>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub device_class: Option<String>,
    pub entity_category: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub default_state: Option<serde_json::Value>,
    #[serde(rename = "enum")]
    pub enum_map: Option<IndexMap<String, String>>,
    pub unit_of_measurement: Option<String>,
    pub state_class: Option<String>,
    pub set_type: Option<SetType>,
    pub namespace_id: Option<usize>,
    pub value_id: Option<String>,
    pub attribute_ids: Option<Vec<String>>,
    #[serde(default)]
    pub invert: bool,
    pub options: Option<OptionsSpec>,
    pub native_min_value: Option<f64>,
    pub native_max_value: Option<f64>,
    pub native_step: Option<f64>,
    pub mode: Option<String>,
    pub set_value: Option<serde_json::Value>,
    pub uid: Option<String>,
    #[serde(default)]
    pub html_unescape: bool,
    pub id_installed: Option<String>,
    pub id_trigger: Option<String>,
    pub id_status: Option<String>,
    pub firmware: Option<String>,
    pub variant: Option<String>,
    pub connection: Option<String>,
}

impl RawEntityConfig {
    /// Validate this record for the given platform.
    ///
    /// Applies the platform's forced source kind first, then checks the
    /// required fields (`id` and `source` always, plus platform-specific
    /// extras).
    pub fn validate(mut self, platform: Platform) -> Result<EntityConfig, ConfigError> {
        if let Some(source) = platform.forced_source() {
            self.source = Some(source);
        }

        let id = match self.id {
            Some(id) if !id.is_empty() => id,
            _ => return Err(ConfigError::MissingId),
        };
        let source = self.source.ok_or(ConfigError::MissingSource)?;

        let missing = |field| ConfigError::MissingField {
            platform,
            id: id.clone(),
            field,
        };
        match platform {
            Platform::Select if self.options.is_none() => return Err(missing("options")),
            Platform::Button if self.set_value.is_none() => return Err(missing("set_value")),
            Platform::Update if self.id_installed.is_none() => {
                return Err(missing("id_installed"))
            }
            Platform::Update if self.id_trigger.is_none() => return Err(missing("id_trigger")),
            _ => {}
        }

        Ok(EntityConfig {
            id,
            source,
            name: self.name,
            description: self.description,
            icon: self.icon,
            device_class: self.device_class,
            entity_category: self.entity_category,
            enabled: self.enabled,
            default_state: self.default_state,
            enum_map: self.enum_map,
            unit_of_measurement: self.unit_of_measurement,
            state_class: self.state_class,
            set_type: self.set_type,
            namespace_id: self.namespace_id,
            value_id: self.value_id,
            attribute_ids: self.attribute_ids,
            invert: self.invert,
            options: self.options,
            native_min_value: self.native_min_value,
            native_max_value: self.native_max_value,
            native_step: self.native_step,
            mode: self.mode,
            set_value: self.set_value,
            uid: self.uid,
            html_unescape: self.html_unescape,
            id_installed: self.id_installed,
            id_trigger: self.id_trigger,
            id_status: self.id_status,
            firmware: self.firmware,
            variant: self.variant,
            connection: self.connection,
        })
    }
}

/// A validated entity configuration record, immutable per entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityConfig {
    /// Key into the charger property store
    pub id: String,
    /// Update path for this entity
    pub source: Source,
    pub name: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub device_class: Option<String>,
    pub entity_category: Option<String>,
    pub enabled: bool,
    pub default_state: Option<serde_json::Value>,
    pub enum_map: Option<IndexMap<String, String>>,
    pub unit_of_measurement: Option<String>,
    pub state_class: Option<String>,
    pub set_type: Option<SetType>,
    pub namespace_id: Option<usize>,
    pub value_id: Option<String>,
    pub attribute_ids: Option<Vec<String>>,
    pub invert: bool,
    pub options: Option<OptionsSpec>,
    pub native_min_value: Option<f64>,
    pub native_max_value: Option<f64>,
    pub native_step: Option<f64>,
    pub mode: Option<String>,
    pub set_value: Option<serde_json::Value>,
    pub uid: Option<String>,
    pub html_unescape: bool,
    pub id_installed: Option<String>,
    pub id_trigger: Option<String>,
    pub id_status: Option<String>,
    pub firmware: Option<String>,
    pub variant: Option<String>,
    pub connection: Option<String>,
}

/// Document shape of a platform YAML file: platform name -> entity list
type PlatformDocument = IndexMap<String, Vec<RawEntityConfig>>;

/// Load and validate the entity definitions for one platform.
///
/// Invalid records are skipped with a logged error; only a document that
/// cannot be parsed at all is a hard failure. The returned records keep the
/// declared order.
pub fn load_platform_configs(
    yaml: &str,
    platform: Platform,
) -> Result<Vec<EntityConfig>, ConfigError> {
    let document: PlatformDocument =
        serde_yaml::from_str(yaml).map_err(|e| ConfigError::InvalidDocument {
            platform,
            reason: e.to_string(),
        })?;

    let Some(records) = document.get(platform.as_str()) else {
        warn!(%platform, "configuration document has no section for this platform");
        return Ok(Vec::new());
    };

    let mut configs = Vec::with_capacity(records.len());
    for record in records {
        match record.clone().validate(platform) {
            Ok(config) => configs.push(config),
            Err(err) => {
                error!(%platform, %err, "invalid entity definition, skipping record");
            }
        }
    }
    debug!(%platform, count = configs.len(), "loaded entity definitions");
    Ok(configs)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SENSOR_YAML: &str = r#"
sensor:
  - id: fwv
    source: property
    name: Firmware version
  - source: property
    name: Missing id
  - id: acu
    name: Missing source
  - id: car
    source: property
    enum:
      "1": Idle
      "2": Charging
"#;

    #[test]
    fn test_records_missing_id_or_source_are_skipped() {
        let configs = load_platform_configs(SENSOR_YAML, Platform::Sensor).unwrap();
        let ids: Vec<_> = configs.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["fwv", "car"]);
    }

    #[test]
    fn test_declaration_order_is_preserved() {
        let configs = load_platform_configs(SENSOR_YAML, Platform::Sensor).unwrap();
        assert_eq!(configs[0].id, "fwv");
        assert_eq!(configs[1].id, "car");
    }

    #[test]
    fn test_switch_source_is_forced_to_property() {
        let yaml = "switch:\n  - id: fup\n";
        let configs = load_platform_configs(yaml, Platform::Switch).unwrap();
        assert_eq!(configs[0].source, Source::Property);
    }

    #[test]
    fn test_button_source_is_forced_to_none() {
        let yaml = "button:\n  - id: rst\n    set_value: true\n";
        let configs = load_platform_configs(yaml, Platform::Button).unwrap();
        assert_eq!(configs[0].source, Source::None);
    }

    #[test]
    fn test_button_without_set_value_is_skipped() {
        let yaml = "button:\n  - id: rst\n";
        let configs = load_platform_configs(yaml, Platform::Button).unwrap();
        assert!(configs.is_empty());
    }

    #[test]
    fn test_select_without_options_is_skipped() {
        let yaml = "select:\n  - id: lmo\n";
        let configs = load_platform_configs(yaml, Platform::Select).unwrap();
        assert!(configs.is_empty());
    }

    #[test]
    fn test_update_requires_installed_and_trigger_ids() {
        let yaml = "update:\n  - id: onv\n    id_installed: fwv\n";
        let configs = load_platform_configs(yaml, Platform::Update).unwrap();
        assert!(configs.is_empty());

        let yaml = "update:\n  - id: onv\n    id_installed: fwv\n    id_trigger: oct\n";
        let configs = load_platform_configs(yaml, Platform::Update).unwrap();
        assert_eq!(configs.len(), 1);
    }

    #[test]
    fn test_missing_platform_section_is_empty() {
        let configs = load_platform_configs("sensor: []\n", Platform::Switch).unwrap();
        assert!(configs.is_empty());
    }

    #[test]
    fn test_options_spec_forms() {
        let yaml = r#"
select:
  - id: lmo
    options:
      "3": Default
      "4": Eco
  - id: frc
    options: forceStates
"#;
        let configs = load_platform_configs(yaml, Platform::Select).unwrap();
        assert!(matches!(configs[0].options, Some(OptionsSpec::Table(_))));
        assert_eq!(
            configs[1].options,
            Some(OptionsSpec::Named("forceStates".into()))
        );
    }

    #[test]
    fn test_invalid_document_is_rejected() {
        let err = load_platform_configs(": not yaml :", Platform::Sensor).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDocument { .. }));
    }
}
