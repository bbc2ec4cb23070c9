//! Target construction.
//!
//! [`build()`] turns a device's [`TargetConfig`] into an engine-ready
//! [`Target`] and a [`DeviceStatus`]. Invalid configuration never fails the
//! call: it yields no target and a `Failed` status carrying the reason.
//!
//! For SNMPv3 devices the derived USM user is registered in the shared
//! [`CredentialStore`], replacing whatever the device registered before.

mod address;
mod config;
mod credentials;
mod keys;
mod security;

pub use address::{match_key, parse_address};
pub use config::{
    DEFAULT_POLL_INTERVAL, DEFAULT_PORT, DEFAULT_RETRIES, DEFAULT_TIMEOUT, MIN_POLL_INTERVAL,
    TargetConfig,
};
pub use credentials::{CredentialStore, LocalizedUser, UsmUser};
pub use keys::{LocalizedKey, MasterKey};
pub use security::{AuthProtocol, PrivProtocol, Secret, SecurityLevel};

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use crate::error::ConfigErrorKind;
use crate::util::octets_from_text;
use crate::version::Version;

/// Community-authenticated target (v1/v2c).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommunityTarget {
    pub address: SocketAddr,
    pub version: Version,
    pub community: Secret,
    pub retries: u32,
    pub timeout: Duration,
}

/// USM target (v3). Keys live in the [`CredentialStore`] under `security_name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserTarget {
    pub address: SocketAddr,
    pub security_name: String,
    pub security_level: SecurityLevel,
    /// Authoritative engine id, when configured rather than discovered.
    pub engine_id: Option<Bytes>,
    /// Keys localized against `engine_id`; engines localize discovered ids
    /// themselves.
    pub keys: Option<Arc<LocalizedUser>>,
    pub context_engine_id: Option<Bytes>,
    pub context_name: String,
    pub retries: u32,
    pub timeout: Duration,
}

/// Engine-ready description of how to reach and authenticate to a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Community(CommunityTarget),
    User(UserTarget),
}

impl Target {
    /// Agent address.
    pub fn address(&self) -> SocketAddr {
        match self {
            Target::Community(t) => t.address,
            Target::User(t) => t.address,
        }
    }

    /// Protocol version.
    pub fn version(&self) -> Version {
        match self {
            Target::Community(t) => t.version,
            Target::User(_) => Version::V3,
        }
    }

    /// Retries after the first attempt.
    pub fn retries(&self) -> u32 {
        match self {
            Target::Community(t) => t.retries,
            Target::User(t) => t.retries,
        }
    }

    /// Per-attempt timeout.
    pub fn timeout(&self) -> Duration {
        match self {
            Target::Community(t) => t.timeout,
            Target::User(t) => t.timeout,
        }
    }
}

/// Derived device status.
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum DeviceStatus {
    /// Not built yet.
    #[default]
    Initializing,
    /// A target was built.
    Ready,
    /// Configuration is unusable; the reason is user-visible.
    Failed(String),
}

impl DeviceStatus {
    /// Whether the status is `Ready`.
    pub fn is_ready(&self) -> bool {
        matches!(self, DeviceStatus::Ready)
    }
}

impl std::fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceStatus::Initializing => write!(f, "Initializing"),
            DeviceStatus::Ready => write!(f, "Ready"),
            DeviceStatus::Failed(reason) => write!(f, "Failed({})", reason),
        }
    }
}

/// Build the target for `device` and derive its status.
///
/// Returns `(Some(target), Ready)` or `(None, Failed(reason))`; never both
/// a target and a failure.
pub fn build(
    device: &str,
    config: &TargetConfig,
    credentials: &CredentialStore,
) -> (Option<Arc<Target>>, DeviceStatus) {
    // Whatever this device registered before is stale from here on
    credentials.clear_device(device);

    match try_build(device, config, credentials) {
        Ok(target) => {
            tracing::debug!(
                snmp.device = device,
                snmp.target = %target.address(),
                snmp.version = %target.version(),
                "target built"
            );
            (Some(Arc::new(target)), DeviceStatus::Ready)
        }
        Err(kind) => {
            tracing::warn!(snmp.device = device, reason = %kind, "device configuration rejected");
            (None, DeviceStatus::Failed(kind.to_string()))
        }
    }
}

fn try_build(
    device: &str,
    config: &TargetConfig,
    credentials: &CredentialStore,
) -> Result<Target, ConfigErrorKind> {
    if config.version.uses_community() {
        let address = parse_address(&config.address)?;
        return Ok(Target::Community(CommunityTarget {
            address,
            version: config.version,
            community: config.community.clone(),
            retries: config.retries,
            timeout: config.timeout(),
        }));
    }

    // Everything is validated before credentials are touched
    let auth_protocol = AuthProtocol::from_config(&config.auth_protocol)?;
    let priv_protocol = PrivProtocol::from_config(&config.priv_protocol)?;
    let address = parse_address(&config.address)?;
    let engine_id = optional_octets(&config.engine_id)?;
    let context_engine_id = optional_octets(&config.context_engine)?;

    let user = UsmUser::derive(
        &config.security_name,
        auth_protocol,
        config.auth_passphrase.expose(),
        priv_protocol,
        config.priv_passphrase.expose(),
    );
    let security_level = user.level;
    let keys = engine_id.as_ref().map(|id| Arc::new(user.localize(id)));
    credentials.register(device, user);

    if let Some(id) = &engine_id {
        credentials.set_local_engine_id(id.clone());
    }

    Ok(Target::User(UserTarget {
        address,
        security_name: config.security_name.clone(),
        security_level,
        engine_id,
        keys,
        context_engine_id,
        context_name: config.context_name.clone(),
        retries: config.retries,
        timeout: config.timeout(),
    }))
}

fn optional_octets(text: &str) -> Result<Option<Bytes>, ConfigErrorKind> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    octets_from_text(text)
        .filter(|octets| !octets.is_empty())
        .map(|octets| Some(Bytes::from(octets)))
        .ok_or(ConfigErrorKind::InvalidEngineId)
}
