//! Fleet-wide configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::device::DEFAULT_TRAP_LOG_CAPACITY;

/// Environment variable overriding the trap listen address.
pub const LISTEN_ADDR_ENV: &str = "SNMP_FLEET_LISTEN_ADDR";

/// Default trap listen address.
pub const DEFAULT_LISTEN_ADDR: SocketAddr =
    SocketAddr::new(std::net::IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED), 162);

/// Configuration for a [`Fleet`](crate::Fleet).
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use snmp_fleet::FleetConfig;
///
/// let config = FleetConfig::default()
///     .schema_dir("/var/lib/fleet/mibs")
///     .keep_schemas_loaded(false)
///     .trap_log_capacity(500)
///     .reload_wait(Duration::from_secs(2));
/// assert_eq!(config.trap_log_capacity, 500);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct FleetConfig {
    /// Directory holding user-supplied MIB documents.
    pub schema_dir: PathBuf,
    /// Address the shared notification listener binds to.
    pub listen_addr: SocketAddr,
    /// Keep the schema set loaded with no outstanding leases.
    pub keep_schemas_loaded: bool,
    /// Records kept per device trap log; oldest are evicted.
    pub trap_log_capacity: usize,
    /// How long trap routing waits for a schema set when keep-loaded is on.
    #[serde(with = "millis")]
    pub trap_schema_wait: Duration,
    /// How long trap routing and walks wait for a reload.
    #[serde(with = "millis")]
    pub reload_wait: Duration,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            schema_dir: PathBuf::from(".mib_store"),
            listen_addr: DEFAULT_LISTEN_ADDR,
            keep_schemas_loaded: true,
            trap_log_capacity: DEFAULT_TRAP_LOG_CAPACITY,
            trap_schema_wait: Duration::from_millis(500),
            reload_wait: Duration::from_secs(5),
        }
    }
}

impl FleetConfig {
    /// Defaults with [`LISTEN_ADDR_ENV`] applied, if set and valid.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(value) = std::env::var(LISTEN_ADDR_ENV) {
            match value.trim().parse() {
                Ok(addr) => config.listen_addr = addr,
                Err(_) => tracing::warn!(
                    env = LISTEN_ADDR_ENV,
                    value = %value,
                    "ignoring invalid listen address"
                ),
            }
        }
        config
    }

    pub fn schema_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.schema_dir = dir.into();
        self
    }

    pub fn listen_addr(mut self, addr: SocketAddr) -> Self {
        self.listen_addr = addr;
        self
    }

    pub fn keep_schemas_loaded(mut self, keep: bool) -> Self {
        self.keep_schemas_loaded = keep;
        self
    }

    /// Set the per-device trap log capacity (at least 1).
    pub fn trap_log_capacity(mut self, capacity: usize) -> Self {
        self.trap_log_capacity = capacity.max(1);
        self
    }

    pub fn trap_schema_wait(mut self, wait: Duration) -> Self {
        self.trap_schema_wait = wait;
        self
    }

    pub fn reload_wait(mut self, wait: Duration) -> Self {
        self.reload_wait = wait;
        self
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
