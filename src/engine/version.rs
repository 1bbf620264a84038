//! Version Parser
//!
//! Extracts the version token from a driver filename and orders versions
//! numerically, component by component.

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use super::error::{DriverError, Result};

fn version_regex() -> &'static Regex {
    static VERSION_RE: OnceLock<Regex> = OnceLock::new();
    VERSION_RE.get_or_init(|| Regex::new(r"v([0-9.]+)").expect("version pattern is valid"))
}

/// A dotted version such as `2.10.1`.
///
/// Equality and ordering pad the shorter side with zeros, so `1.0` and
/// `1.0.0` are the same version.
#[derive(Debug, Clone)]
pub struct Version(Vec<u64>);

impl Version {
    pub fn new(components: Vec<u64>) -> Self {
        Self(components)
    }

    pub fn components(&self) -> &[u64] {
        &self.0
    }

    /// Parse the version carried by a driver filename
    pub fn from_file_name(file_name: &str) -> Result<Self> {
        let token = extract_token(file_name)
            .ok_or_else(|| DriverError::invalid_version(file_name, "no v<digits> token"))?;
        Self::parse_token(file_name, token)
    }

    fn parse_token(source: &str, token: &str) -> Result<Self> {
        // The match runs into the extension dot: "v2.0.exe" yields "2.0."
        let token = token.trim_end_matches('.');
        if token.is_empty() {
            return Err(DriverError::invalid_version(source, "version token has no digits"));
        }

        let components = token
            .split('.')
            .map(|part| {
                if part.is_empty() {
                    return Err(DriverError::invalid_version(source, "empty version component"));
                }
                part.parse::<u64>().map_err(|e| {
                    DriverError::invalid_version(source, format!("component {part:?}: {e}"))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self(components))
    }
}

/// Raw text of the first `v([0-9.]+)` match, before any numeric parsing
pub fn extract_token(file_name: &str) -> Option<&str> {
    version_regex()
        .captures(file_name)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Component-wise numeric comparison with zero padding
pub fn compare(a: &Version, b: &Version) -> Ordering {
    let len = a.0.len().max(b.0.len());
    (0..len)
        .map(|i| {
            let left = a.0.get(i).copied().unwrap_or(0);
            let right = b.0.get(i).copied().unwrap_or(0);
            left.cmp(&right)
        })
        .find(|ord| *ord != Ordering::Equal)
        .unwrap_or(Ordering::Equal)
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        compare(self, other)
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|c| c.to_string()).collect();
        write!(f, "{}", parts.join("."))
    }
}

impl FromStr for Version {
    type Err = DriverError;

    /// Parse a bare dotted version (`1.2.3`, optionally prefixed with `v`)
    fn from_str(s: &str) -> Result<Self> {
        Self::parse_token(s, s.trim_start_matches('v'))
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_from_file_name() {
        let version = Version::from_file_name("NVIDIA_Driver_v2.0.exe").unwrap();
        assert_eq!(version.components(), &[2, 0]);

        let version = Version::from_file_name("AMD_Driver_v23.11.1.exe").unwrap();
        assert_eq!(version.components(), &[23, 11, 1]);
        assert_eq!(version.to_string(), "23.11.1");
    }

    #[test]
    fn test_first_match_wins() {
        let version = Version::from_file_name("Intel_Driver_v3.1_v9.9.exe").unwrap();
        assert_eq!(version, v("3.1"));
    }

    #[test]
    fn test_unparseable_is_not_zero() {
        let err = Version::from_file_name("NVIDIA_Driver_vX.exe").unwrap_err();
        assert!(matches!(err, DriverError::InvalidVersion { .. }));

        assert!(Version::from_file_name("NVIDIA_Driver.exe").is_err());
        assert!(Version::from_file_name("NVIDIA_Driver_v..exe").is_err());
        assert!(Version::from_file_name("NVIDIA_Driver_v1..2.exe").is_err());
    }

    #[test]
    fn test_component_overflow_is_invalid() {
        assert!(Version::from_file_name("X_Driver_v99999999999999999999999.exe").is_err());
    }

    #[test]
    fn test_extract_token() {
        assert_eq!(extract_token("NVIDIA_Driver_v1.0.exe"), Some("1.0."));
        assert_eq!(extract_token("NVIDIA_Driver_vX.exe"), None);
    }

    #[test]
    fn test_numeric_not_lexical() {
        assert!(v("1.2") < v("1.10"));
        assert!(v("2.0") > v("1.99.99"));
        assert!(v("10") > v("9"));
    }

    #[test]
    fn test_zero_padding() {
        assert_eq!(v("1.0"), v("1.0.0"));
        assert_eq!(compare(&v("1"), &v("1.0.0.0")), Ordering::Equal);
        assert!(v("1.0.1") > v("1"));
    }

    #[test]
    fn test_total_order() {
        let mut versions = vec![v("1.10"), v("1.2"), v("0.9"), v("1.2.0"), v("2"), v("1.2.1")];
        versions.sort();
        let sorted: Vec<String> = versions.iter().map(|v| v.to_string()).collect();
        assert_eq!(sorted, vec!["0.9", "1.2", "1.2.0", "1.2.1", "1.10", "2"]);

        for a in &versions {
            for b in &versions {
                assert_eq!(compare(a, b), compare(b, a).reverse());
                for c in &versions {
                    if a <= b && b <= c {
                        assert!(a <= c);
                    }
                }
            }
        }
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&v("2.10.1")).unwrap();
        assert_eq!(json, "\"2.10.1\"");
        let back: Version = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v("2.10.1"));
    }
}
