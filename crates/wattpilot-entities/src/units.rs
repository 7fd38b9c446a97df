//! Unit registry keyed by device class
//!
//! Mirrors the host's unit-converter tables far enough to decide whether a
//! configured unit of measurement may also be suggested as the display unit.

/// Valid units for a device class, if the host converts that class
pub fn valid_units(device_class: &str) -> Option<&'static [&'static str]> {
    match device_class {
        "current" => Some(&["A", "mA"]),
        "energy" => Some(&["Wh", "kWh", "MWh", "GJ", "MJ", "cal", "kcal"]),
        "power" => Some(&["W", "kW", "MW", "GW"]),
        "voltage" => Some(&["V", "mV", "kV"]),
        "temperature" => Some(&["°C", "°F", "K"]),
        "frequency" => Some(&["Hz", "kHz", "MHz", "GHz"]),
        "distance" => Some(&["km", "m", "cm", "mm", "mi", "yd", "in"]),
        "duration" => Some(&["d", "h", "min", "s", "ms"]),
        "data_size" => Some(&["B", "kB", "MB", "GB"]),
        _ => None,
    }
}

/// Resolve the suggested display unit for an entity.
///
/// The configured unit is only suggested when the device class has a
/// converter and the unit is valid for it; otherwise the host keeps its own
/// default.
pub fn suggested_unit(device_class: Option<&str>, unit: Option<&str>) -> Option<String> {
    let device_class = device_class?;
    let unit = unit?;
    valid_units(device_class)?
        .contains(&unit)
        .then(|| unit.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_unit_is_suggested() {
        assert_eq!(
            suggested_unit(Some("energy"), Some("kWh")),
            Some("kWh".to_string())
        );
        assert_eq!(suggested_unit(Some("current"), Some("A")), Some("A".to_string()));
    }

    #[test]
    fn test_invalid_unit_is_not_suggested() {
        assert_eq!(suggested_unit(Some("energy"), Some("A")), None);
        assert_eq!(suggested_unit(Some("unknown_class"), Some("kWh")), None);
        assert_eq!(suggested_unit(None, Some("kWh")), None);
        assert_eq!(suggested_unit(Some("energy"), None), None);
    }
}
