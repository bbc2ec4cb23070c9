//! SNMP version enumeration.

use crate::error::ConfigErrorKind;

/// SNMP protocol version.
///
/// Serialized as the short management-surface form: `"1"`, `"2c"` or `"3"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[non_exhaustive]
#[derive(Default)]
pub enum Version {
    /// SNMPv1 (RFC 1157)
    #[serde(rename = "1")]
    V1,
    /// SNMPv2c (RFC 1901)
    #[default]
    #[serde(rename = "2c")]
    V2c,
    /// SNMPv3 (RFC 3411-3418)
    #[serde(rename = "3")]
    V3,
}

impl Version {
    /// Get the BER-encoded version number.
    pub const fn as_i32(self) -> i32 {
        match self {
            Version::V1 => 0,
            Version::V2c => 1,
            Version::V3 => 3,
        }
    }

    /// Whether this version authenticates with a community string.
    pub const fn uses_community(self) -> bool {
        matches!(self, Version::V1 | Version::V2c)
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Version::V1 => write!(f, "SNMPv1"),
            Version::V2c => write!(f, "SNMPv2c"),
            Version::V3 => write!(f, "SNMPv3"),
        }
    }
}

impl std::str::FromStr for Version {
    type Err = ConfigErrorKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1" | "v1" => Ok(Version::V1),
            "2c" | "v2c" | "2" => Ok(Version::V2c),
            "3" | "v3" => Ok(Version::V3),
            _ => Err(ConfigErrorKind::UnknownVersion(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_short_forms() {
        assert_eq!("1".parse::<Version>().unwrap(), Version::V1);
        assert_eq!("2c".parse::<Version>().unwrap(), Version::V2c);
        assert_eq!("V3".parse::<Version>().unwrap(), Version::V3);
        assert!("4".parse::<Version>().is_err());
    }

    #[test]
    fn test_serde_uses_short_form() {
        assert_eq!(serde_json::to_string(&Version::V2c).unwrap(), "\"2c\"");
        let v: Version = serde_json::from_str("\"3\"").unwrap();
        assert_eq!(v, Version::V3);
    }
}
