//! Firmware version normalization and precedence ordering
//!
//! The charger reports firmware versions in loosely consistent shapes
//! ("v1.2.0", "Version 40.7", "38.5-beta1", "40.x"). Each raw string is
//! cleaned into a comparable key; the table keeps the mapping back to the
//! raw string the charger expects when an install is triggered.

use std::sync::OnceLock;

use indexmap::IndexMap;
use regex::Regex;
use semver::Version;

fn clean_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            // Alternations are preference-ordered, so longer prefix tokens
            // must come first or "version" only ever matches its leading "v"
            r"^(?:version|vers|ver|v)*\s*\.*\s*([0-9.]*)\s*-?\s*((?:alpha|beta|dev|rc|post|a|b|release)+[0-9]*)?\s*.*$",
        )
        .expect("version cleaning regex is valid")
    })
}

/// Clean a raw version string into a normalized key.
///
/// Lower-cases, maps `x` placeholders to `0`, strips prefix tokens like
/// "v"/"version" and keeps digits plus a normalized pre-release suffix.
pub fn clean_version(raw: &str) -> String {
    let lowered = raw.to_lowercase().replace('x', "0");
    match clean_re().captures(&lowered) {
        Some(caps) => {
            let digits = caps.get(1).map_or("", |m| m.as_str());
            let suffix = caps.get(2).map_or("", |m| m.as_str());
            format!("{digits}{suffix}")
        }
        None => lowered,
    }
}

/// Build a version with full precedence semantics from a cleaned key.
///
/// Missing components are padded ("2.0" compares as "2.0.0") and a trailing
/// pre-release suffix sorts below the plain release.
fn comparable(clean: &str) -> Option<Version> {
    let split = clean
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(clean.len());
    let (digits, suffix) = clean.split_at(split);
    let digits = digits.trim_matches('.');
    if digits.is_empty() {
        return None;
    }

    let mut parts: Vec<&str> = digits.split('.').filter(|p| !p.is_empty()).collect();
    while parts.len() < 3 {
        parts.push("0");
    }
    parts.truncate(3);

    let core = parts.join(".");
    let full = if suffix.is_empty() {
        core
    } else {
        format!("{core}-{suffix}")
    };
    Version::parse(&full).ok()
}

/// Ordered table of available versions, keyed by normalized version
#[derive(Debug, Default, Clone)]
pub struct VersionTable {
    versions: IndexMap<String, String>,
}

impl VersionTable {
    /// Build the table from raw version strings, keeping report order
    pub fn from_raw(raw_versions: &[String]) -> Self {
        let mut versions = IndexMap::with_capacity(raw_versions.len());
        for raw in raw_versions {
            versions.insert(clean_version(raw), raw.clone());
        }
        Self { versions }
    }

    /// The normalized key with the highest version precedence
    pub fn latest(&self) -> Option<&str> {
        self.versions
            .keys()
            .max_by(|a, b| match (comparable(a), comparable(b)) {
                (Some(a), Some(b)) => a.cmp(&b),
                (Some(_), None) => std::cmp::Ordering::Greater,
                (None, Some(_)) => std::cmp::Ordering::Less,
                (None, None) => a.cmp(b),
            })
            .map(String::as_str)
    }

    /// Resolve a normalized key back to the raw string the charger expects
    pub fn raw(&self, clean: &str) -> Option<&str> {
        self.versions.get(clean).map(String::as_str)
    }

    /// Whether the normalized key is a known version
    pub fn contains(&self, clean: &str) -> bool {
        self.versions.contains_key(clean)
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_version_prefixes_and_suffixes() {
        assert_eq!(clean_version("v1.2.0"), "1.2.0");
        assert_eq!(clean_version("V2.0"), "2.0");
        assert_eq!(clean_version("Version 40.7"), "40.7");
        assert_eq!(clean_version("ver 38.5"), "38.5");
        assert_eq!(clean_version("vers.36.3"), "36.3");
        assert_eq!(clean_version("1.10.0-beta1"), "1.10.0beta1");
        assert_eq!(clean_version("40.x"), "40.0");
    }

    #[test]
    fn test_latest_selects_highest_precedence() {
        let table = VersionTable::from_raw(&[
            "v1.2.0".to_string(),
            "1.10.0-beta1".to_string(),
            "V2.0".to_string(),
        ]);
        assert_eq!(table.latest(), Some("2.0"));
        assert_eq!(table.raw("2.0"), Some("V2.0"));
    }

    #[test]
    fn test_prerelease_sorts_below_release() {
        let table =
            VersionTable::from_raw(&["1.10.0-beta1".to_string(), "1.10.0".to_string()]);
        assert_eq!(table.latest(), Some("1.10.0"));
    }

    #[test]
    fn test_numeric_ordering_not_lexical() {
        let table = VersionTable::from_raw(&["9.0".to_string(), "10.0".to_string()]);
        assert_eq!(table.latest(), Some("10.0"));
    }

    #[test]
    fn test_raw_resolution_round_trip() {
        let raw = vec!["Version 40.7".to_string(), "v38.5".to_string()];
        let table = VersionTable::from_raw(&raw);
        assert_eq!(table.raw("40.7"), Some("Version 40.7"));
        assert_eq!(table.raw("38.5"), Some("v38.5"));
        assert_eq!(table.raw("41.0"), None);
    }
}
