//! Per-device target configuration as entered through the management surface.

use std::time::Duration;

use super::security::Secret;
use crate::version::Version;

/// Default agent port.
pub const DEFAULT_PORT: u16 = 161;
/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1500);
/// Default retry count.
pub const DEFAULT_RETRIES: u32 = 2;
/// Default delay between poll ticks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
/// Shortest poll interval honoured; smaller values are raised to this.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Device target configuration.
///
/// Field names match the persisted state format. Protocol names are kept
/// as text so an unsupported choice can be stored and reported through the
/// device status rather than rejected on input.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    /// `host/port`
    pub address: String,
    pub version: Version,
    /// Community string (v1/v2c).
    pub community: Secret,
    /// USM security name (v3).
    pub security_name: String,
    /// `NONE`, `MD5` or `SHA`.
    pub auth_protocol: String,
    pub auth_passphrase: Secret,
    /// `NONE`, `DES`, `AES`/`AES128`, `AES192` or `AES256`.
    pub priv_protocol: String,
    pub priv_passphrase: Secret,
    /// Authoritative engine id; `0x` prefix for hex.
    pub engine_id: String,
    /// Context engine id for scoped PDUs; `0x` prefix for hex.
    pub context_engine: String,
    pub context_name: String,
    pub retries: u32,
    pub timeout_ms: u64,
    pub poll_interval_ms: u64,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            address: String::new(),
            version: Version::V2c,
            community: Secret::new("public"),
            security_name: String::new(),
            auth_protocol: "NONE".to_string(),
            auth_passphrase: Secret::default(),
            priv_protocol: "NONE".to_string(),
            priv_passphrase: Secret::default(),
            engine_id: String::new(),
            context_engine: String::new(),
            context_name: String::new(),
            retries: DEFAULT_RETRIES,
            timeout_ms: DEFAULT_TIMEOUT.as_millis() as u64,
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
        }
    }
}

impl TargetConfig {
    /// Community-based (v2c) configuration for `host` on the default port.
    pub fn community(host: &str, community: &str) -> Self {
        Self {
            address: format!("{}/{}", host, DEFAULT_PORT),
            community: Secret::new(community),
            ..Self::default()
        }
    }

    /// SNMPv3 configuration for `host` on the default port, no auth, no privacy.
    pub fn user(host: &str, security_name: &str) -> Self {
        Self {
            address: format!("{}/{}", host, DEFAULT_PORT),
            version: Version::V3,
            security_name: security_name.to_string(),
            ..Self::default()
        }
    }

    /// Set the `host/port` address.
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    /// Set the protocol version.
    pub fn with_version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    /// Set authentication protocol name and passphrase.
    pub fn with_auth(mut self, protocol: &str, passphrase: &str) -> Self {
        self.auth_protocol = protocol.to_string();
        self.auth_passphrase = Secret::new(passphrase);
        self
    }

    /// Set privacy protocol name and passphrase.
    pub fn with_privacy(mut self, protocol: &str, passphrase: &str) -> Self {
        self.priv_protocol = protocol.to_string();
        self.priv_passphrase = Secret::new(passphrase);
        self
    }

    /// Set the authoritative engine id.
    pub fn with_engine_id(mut self, engine_id: impl Into<String>) -> Self {
        self.engine_id = engine_id.into();
        self
    }

    /// Set context engine id and context name.
    pub fn with_context(mut self, engine: impl Into<String>, name: impl Into<String>) -> Self {
        self.context_engine = engine.into();
        self.context_name = name.into();
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the number of retries.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Set the delay between poll ticks.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Poll interval, raised to [`MIN_POLL_INTERVAL`] if smaller.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms).max(MIN_POLL_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = TargetConfig::community("192.0.2.1", "public");
        assert_eq!(cfg.address, "192.0.2.1/161");
        assert_eq!(cfg.retries, 2);
        assert_eq!(cfg.timeout(), Duration::from_millis(1500));
        assert_eq!(cfg.poll_interval(), Duration::from_secs(5));
        assert_eq!(cfg.auth_protocol, "NONE");
    }

    #[test]
    fn test_poll_interval_floor() {
        let cfg = TargetConfig::default().with_poll_interval(Duration::ZERO);
        assert_eq!(cfg.poll_interval(), MIN_POLL_INTERVAL);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let cfg: TargetConfig =
            serde_json::from_str(r#"{"address":"10.0.0.1/161","version":"1"}"#).unwrap();
        assert_eq!(cfg.version, Version::V1);
        assert_eq!(cfg.community.expose(), "public");
        assert_eq!(cfg.poll_interval_ms, 5000);
    }
}
