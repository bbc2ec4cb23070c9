//! Device records and the directory that owns them.
//!
//! Membership is guarded by the directory lock; each device's fields by the
//! device's own lock. Neither lock is held across an await.

mod traps;

pub use traps::{DEFAULT_TRAP_LOG_CAPACITY, LegacyTrap, TrapField, TrapLog, TrapRecord};

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::SystemTime;

use crate::error::{Error, Result};
use crate::oid::Oid;
use crate::target::{self, CredentialStore, DeviceStatus, Target, TargetConfig};
use crate::util;
use crate::value::{Syntax, Value};

/// A configured OID on a device.
///
/// Configured subscriptions are persisted; only observed ones are polled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Subscription {
    /// Display label, usually the resolved name.
    pub label: String,
    pub value: Option<Value>,
    /// Syntax of the last value read, used to type writes.
    pub syntax: Option<Syntax>,
    /// Failure of the most recent tick, cleared by the next success.
    pub last_error: Option<String>,
    pub updated_at: Option<SystemTime>,
    pub observed: bool,
}

impl Subscription {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Default::default()
        }
    }

    /// Record a successful read.
    pub(crate) fn record_value(&mut self, value: Value) {
        if let Some(syntax) = value.syntax() {
            self.syntax = Some(syntax);
        }
        self.value = Some(value);
        self.last_error = None;
        self.updated_at = Some(SystemTime::now());
    }

    pub(crate) fn record_error(&mut self, error: &Error) {
        self.last_error = Some(error.to_string());
        self.updated_at = Some(SystemTime::now());
    }
}

/// Mutable fields of a device.
#[derive(Debug)]
pub(crate) struct DeviceState {
    pub config: TargetConfig,
    pub target: Option<Arc<Target>>,
    pub status: DeviceStatus,
    /// Trap source match key derived from the configured address.
    pub host: Option<IpAddr>,
    pub subscriptions: BTreeMap<Oid, Subscription>,
    pub traps: TrapLog,
}

/// Point-in-time copy of a device.
#[derive(Debug, Clone)]
pub struct Device {
    pub name: String,
    pub config: TargetConfig,
    pub status: DeviceStatus,
    pub subscriptions: BTreeMap<Oid, Subscription>,
    pub trap_count: usize,
}

/// A device record shared between the directory, poll tasks and the trap
/// router.
#[derive(Debug)]
pub struct DeviceEntry {
    name: String,
    state: RwLock<DeviceState>,
    live: AtomicBool,
}

impl DeviceEntry {
    /// Create a device and build its target.
    pub(crate) fn new(
        name: &str,
        config: TargetConfig,
        credentials: &CredentialStore,
        trap_log_capacity: usize,
    ) -> Self {
        let (target, status) = target::build(name, &config, credentials);
        let host = host_key(&config);
        Self {
            name: name.to_string(),
            state: RwLock::new(DeviceState {
                config,
                target,
                status,
                host,
                subscriptions: BTreeMap::new(),
                traps: TrapLog::with_capacity(trap_log_capacity),
            }),
            live: AtomicBool::new(true),
        }
    }

    /// Seed configured subscriptions before the entry is published.
    pub(crate) fn with_subscriptions(
        self,
        subscriptions: impl IntoIterator<Item = (Oid, Subscription)>,
    ) -> Self {
        self.write().subscriptions.extend(subscriptions);
        self
    }

    /// Move this device's state into a new entry called `name`.
    ///
    /// The target, subscriptions and trap log travel with it; this entry is
    /// left with none of them.
    fn renamed(&self, name: &str) -> Self {
        let mut state = self.write();
        let capacity = state.traps.capacity();
        let moved = DeviceState {
            config: state.config.clone(),
            target: state.target.take(),
            status: state.status.clone(),
            host: state.host.take(),
            subscriptions: std::mem::take(&mut state.subscriptions),
            traps: std::mem::replace(&mut state.traps, TrapLog::with_capacity(capacity)),
        };
        Self {
            name: name.to_string(),
            state: RwLock::new(moved),
            live: AtomicBool::new(true),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Replace the configuration and rebuild the target atomically.
    pub(crate) fn reconfigure(&self, config: TargetConfig, credentials: &CredentialStore) {
        let (target, status) = target::build(&self.name, &config, credentials);
        let host = host_key(&config);
        let mut state = self.write();
        state.config = config;
        state.target = target;
        state.status = status;
        state.host = host;
    }

    pub fn status(&self) -> DeviceStatus {
        self.read().status.clone()
    }

    pub fn config(&self) -> TargetConfig {
        self.read().config.clone()
    }

    /// Current target; `None` while the configuration is invalid.
    pub fn target(&self) -> Option<Arc<Target>> {
        self.read().target.clone()
    }

    /// Whether the device is still in its directory.
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    pub(crate) fn retire(&self) {
        self.live.store(false, Ordering::Release);
    }

    pub fn subscription(&self, oid: &Oid) -> Option<Subscription> {
        self.read().subscriptions.get(oid).cloned()
    }

    pub fn snapshot(&self) -> Device {
        let state = self.read();
        Device {
            name: self.name.clone(),
            config: state.config.clone(),
            status: state.status.clone(),
            subscriptions: state.subscriptions.clone(),
            trap_count: state.traps.len(),
        }
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, DeviceState> {
        util::read(&self.state)
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, DeviceState> {
        util::write(&self.state)
    }
}

fn host_key(config: &TargetConfig) -> Option<IpAddr> {
    target::parse_address(&config.address)
        .ok()
        .map(|addr| target::match_key(&addr))
}

/// The set of devices, keyed by unique name.
#[derive(Debug, Default)]
pub struct DeviceDirectory {
    devices: RwLock<BTreeMap<String, Arc<DeviceEntry>>>,
}

impl DeviceDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a device under its name.
    ///
    /// # Errors
    ///
    /// [`Error::DuplicateDevice`] if the name is taken.
    pub fn insert(&self, entry: Arc<DeviceEntry>) -> Result<()> {
        let mut devices = util::write(&self.devices);
        if devices.contains_key(entry.name()) {
            return Err(Error::DuplicateDevice {
                name: entry.name().into(),
            });
        }
        devices.insert(entry.name().to_string(), entry);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<DeviceEntry>> {
        util::read(&self.devices).get(name).cloned()
    }

    /// Look up a device or fail with [`Error::UnknownDevice`].
    pub fn require(&self, name: &str) -> Result<Arc<DeviceEntry>> {
        self.get(name).ok_or_else(|| Error::unknown_device(name))
    }

    /// Remove a device and mark it retired.
    pub fn remove(&self, name: &str) -> Option<Arc<DeviceEntry>> {
        let entry = util::write(&self.devices).remove(name)?;
        entry.retire();
        Some(entry)
    }

    /// Re-key a device under `new_name`, retiring the old entry.
    ///
    /// Both names are checked and swapped under one lock, so no lookup sees
    /// the device under both names or under neither.
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownDevice`] if `old_name` is absent.
    /// - [`Error::DuplicateDevice`] if `new_name` is taken.
    pub fn rename(&self, old_name: &str, new_name: &str) -> Result<Arc<DeviceEntry>> {
        let mut devices = util::write(&self.devices);
        if devices.contains_key(new_name) {
            return Err(Error::DuplicateDevice {
                name: new_name.into(),
            });
        }
        let old = devices
            .remove(old_name)
            .ok_or_else(|| Error::unknown_device(old_name))?;
        old.retire();
        let entry = Arc::new(old.renamed(new_name));
        devices.insert(new_name.to_string(), entry.clone());
        Ok(entry)
    }

    pub fn contains(&self, name: &str) -> bool {
        util::read(&self.devices).contains_key(name)
    }

    /// All devices in name order.
    pub fn entries(&self) -> Vec<Arc<DeviceEntry>> {
        util::read(&self.devices).values().cloned().collect()
    }

    pub fn names(&self) -> Vec<String> {
        util::read(&self.devices).keys().cloned().collect()
    }

    /// Devices whose configured host is `ip`.
    pub fn matching(&self, ip: IpAddr) -> Vec<Arc<DeviceEntry>> {
        let ip = ip.to_canonical();
        self.entries()
            .into_iter()
            .filter(|entry| entry.read().host == Some(ip))
            .collect()
    }

    pub fn len(&self) -> usize {
        util::read(&self.devices).len()
    }

    pub fn is_empty(&self) -> bool {
        util::read(&self.devices).is_empty()
    }
}
