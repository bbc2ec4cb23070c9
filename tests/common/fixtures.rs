//! Common test fixtures and constants.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use snmp_fleet::target::CredentialStore;
use snmp_fleet::{Fleet, FleetConfig, MockEngine, Oid, TargetConfig, oid};
use tempfile::TempDir;

// =============================================================================
// Standard system MIB OIDs (1.3.6.1.2.1.1.*)
// =============================================================================

pub fn sys_descr() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)
}
pub fn sys_uptime() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 1, 3, 0)
}
pub fn sys_contact() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 1, 4, 0)
}
pub fn sys_name() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 1, 5, 0)
}
pub fn sys_location() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 1, 6, 0)
}

/// System subtree root: 1.3.6.1.2.1.1
pub fn system_subtree() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 1)
}

/// snmpTrapOID.0
pub fn snmp_trap_oid() -> Oid {
    oid!(1, 3, 6, 1, 6, 3, 1, 1, 4, 1, 0)
}

/// linkDown notification
pub fn link_down() -> Oid {
    oid!(1, 3, 6, 1, 6, 3, 1, 1, 5, 3)
}

// =============================================================================
// Agents and credentials
// =============================================================================

/// Auth password for V3 devices
pub const AUTH_PASSWORD: &str = "authpass123";
/// Privacy password for V3 devices
pub const PRIV_PASSWORD: &str = "privpass123";

pub const AGENT_A: &str = "192.0.2.10";
pub const AGENT_B: &str = "192.0.2.20";

/// Socket address of an agent host on the default port.
pub fn agent(host: &str) -> SocketAddr {
    format!("{}:161", host).parse().expect("valid agent host")
}

/// A notification source on an agent host (ephemeral port).
pub fn trap_source(host: &str) -> SocketAddr {
    format!("{}:49152", host).parse().expect("valid agent host")
}

/// Mock engine with a populated system group on `host`.
pub fn engine_with_system(host: &str) -> MockEngine {
    let engine = MockEngine::new();
    let addr = agent(host);
    engine
        .set_value(addr, sys_descr(), "Test router")
        .set_value(addr, sys_uptime(), snmp_fleet::Value::TimeTicks(360_005))
        .set_value(addr, sys_contact(), "noc@example.net")
        .set_value(addr, sys_name(), "core-1")
        .set_value(addr, sys_location(), "rack 4");
    engine
}

// =============================================================================
// Fleet helpers
// =============================================================================

/// A fleet over `engine` with a private schema directory and a fixed
/// local engine id.
pub struct TestFleet {
    pub fleet: Fleet,
    pub engine: MockEngine,
    pub schema_dir: TempDir,
}

impl TestFleet {
    pub fn new(engine: MockEngine) -> Self {
        Self::with_config(engine, |config| config)
    }

    pub fn with_config(engine: MockEngine, configure: impl FnOnce(FleetConfig) -> FleetConfig) -> Self {
        let schema_dir = tempfile::tempdir().expect("tempdir");
        let config = configure(FleetConfig::default().schema_dir(schema_dir.path()));
        let fleet = Fleet::with_credentials(
            Arc::new(engine.clone()),
            Arc::new(CredentialStore::with_engine_id(&b"fleet-test"[..])),
            config,
        );
        Self {
            fleet,
            engine,
            schema_dir,
        }
    }
}

/// Community device config on `host` with the given poll interval.
pub fn community_device(host: &str, interval: Duration) -> TargetConfig {
    TargetConfig::community(host, "public").with_poll_interval(interval)
}

/// Wait until `cond` holds, polling every 10ms for up to 5s.
pub async fn eventually(mut cond: impl FnMut() -> bool) {
    for _ in 0..500 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

/// Route library logs to the test writer. Honours `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
