//! The management surface.
//!
//! [`Fleet`] ties the directory, scheduler, trap router and schema resolver
//! together behind the operations a host exposes: device management,
//! subscriptions, walks, writes, schema documents, trap logs and state
//! persistence.
//!
//! The protocol engine and the credential store are injected, so several
//! fleets can share a process without sharing state.

mod walk;

pub use walk::Walk;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio_util::sync::CancellationToken;

use crate::config::FleetConfig;
use crate::device::{Device, DeviceDirectory, DeviceEntry, Subscription, TrapRecord};
use crate::engine::ProtocolEngine;
use crate::error::{Error, Result};
use crate::oid::Oid;
use crate::poll::PollScheduler;
use crate::schema::{DocumentStore, SchemaResolver};
use crate::state::{DeviceRecord, FleetState, SubscriptionRecord};
use crate::target::{CredentialStore, DeviceStatus, TargetConfig};
use crate::trap::TrapRouter;
use crate::value::{Syntax, Value};
use crate::varbind::VarBind;

/// A managed set of devices.
///
/// Must be created inside a Tokio runtime: construction spawns the schema
/// lifecycle task.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use snmp_fleet::{Fleet, FleetConfig, MockEngine, TargetConfig, oid};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> snmp_fleet::Result<()> {
/// let dir = tempfile::tempdir().unwrap();
/// let engine = MockEngine::new();
/// engine.set_value("192.0.2.1:161".parse().unwrap(), oid!(1, 3, 6, 1, 2, 1, 1, 5, 0), "core-1");
///
/// let fleet = Fleet::new(Arc::new(engine), FleetConfig::default().schema_dir(dir.path()));
/// let status = fleet.add_device("core", TargetConfig::community("192.0.2.1", "public"))?;
/// assert!(status.is_ready());
///
/// let sysname = oid!(1, 3, 6, 1, 2, 1, 1, 5, 0);
/// fleet.add_subscription("core", sysname.clone(), None).await?;
/// fleet.start_observing("core", &sysname)?;
/// # fleet.shutdown();
/// # Ok(())
/// # }
/// ```
pub struct Fleet {
    config: FleetConfig,
    engine: Arc<dyn ProtocolEngine>,
    credentials: Arc<CredentialStore>,
    directory: Arc<DeviceDirectory>,
    scheduler: PollScheduler,
    schemas: SchemaResolver,
    router: TrapRouter,
    listening: AtomicBool,
    shutdown: CancellationToken,
}

impl std::fmt::Debug for Fleet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fleet")
            .field("devices", &self.directory.len())
            .field("scheduler", &self.scheduler)
            .field("schemas", &self.schemas)
            .finish_non_exhaustive()
    }
}

impl Fleet {
    /// Create a fleet with its own credential store.
    pub fn new(engine: Arc<dyn ProtocolEngine>, config: FleetConfig) -> Self {
        Self::with_credentials(engine, Arc::new(CredentialStore::new()), config)
    }

    /// Create a fleet registering USM users in `credentials`.
    pub fn with_credentials(
        engine: Arc<dyn ProtocolEngine>,
        credentials: Arc<CredentialStore>,
        config: FleetConfig,
    ) -> Self {
        let directory = Arc::new(DeviceDirectory::new());
        let schemas = SchemaResolver::spawn(
            DocumentStore::new(config.schema_dir.clone()),
            config.keep_schemas_loaded,
        );
        let router = TrapRouter::new(directory.clone(), schemas.clone(), &config);
        Self {
            scheduler: PollScheduler::new(engine.clone()),
            config,
            engine,
            credentials,
            directory,
            schemas,
            router,
            listening: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &FleetConfig {
        &self.config
    }

    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.credentials
    }

    pub fn directory(&self) -> &Arc<DeviceDirectory> {
        &self.directory
    }

    pub fn scheduler(&self) -> &PollScheduler {
        &self.scheduler
    }

    pub fn schemas(&self) -> &SchemaResolver {
        &self.schemas
    }

    pub fn router(&self) -> &TrapRouter {
        &self.router
    }

    // Devices

    /// Add a device and build its target.
    ///
    /// Invalid configuration is not an error: the device is added with a
    /// `Failed` status, which is returned.
    ///
    /// # Errors
    ///
    /// [`Error::DuplicateDevice`] if the name is taken.
    pub fn add_device(&self, name: &str, config: TargetConfig) -> Result<DeviceStatus> {
        self.insert_device(name, config, std::iter::empty())
    }

    /// Add a device whose subscriptions are in place before it is visible.
    fn insert_device(
        &self,
        name: &str,
        config: TargetConfig,
        subscriptions: impl IntoIterator<Item = (Oid, Subscription)>,
    ) -> Result<DeviceStatus> {
        self.ensure_running()?;
        if self.directory.contains(name) {
            return Err(Error::DuplicateDevice { name: name.into() });
        }
        let entry = DeviceEntry::new(name, config, &self.credentials, self.config.trap_log_capacity)
            .with_subscriptions(subscriptions);
        let status = entry.status();
        self.directory.insert(Arc::new(entry))?;
        tracing::debug!(snmp.device = name, status = %status, "device added");
        Ok(status)
    }

    /// Replace a device's configuration.
    ///
    /// The target is rebuilt and every observed subscription restarts at the
    /// new poll interval.
    pub fn edit_device(&self, name: &str, config: TargetConfig) -> Result<DeviceStatus> {
        let entry = self.directory.require(name)?;
        entry.reconfigure(config, &self.credentials);
        self.scheduler.reschedule_device(&entry);
        let status = entry.status();
        tracing::debug!(snmp.device = name, status = %status, "device edited");
        Ok(status)
    }

    /// Remove a device and cancel its polls. Removing an absent device is a
    /// no-op.
    pub fn remove_device(&self, name: &str) -> Result<()> {
        // Retire before cancelling: the scheduler refuses retired entries
        if self.directory.remove(name).is_none() {
            tracing::trace!(snmp.device = name, "no such device to remove");
            return Ok(());
        }
        let cancelled = self.scheduler.cancel_device(name);
        self.credentials.clear_device(name);
        tracing::debug!(snmp.device = name, cancelled, "device removed");
        Ok(())
    }

    /// Re-key a device under `new_name`.
    ///
    /// Configuration, subscriptions and the trap log move with it; observed
    /// subscriptions keep being polled under the new name.
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownDevice`] if `name` is absent.
    /// - [`Error::DuplicateDevice`] if `new_name` is taken.
    pub fn rename_device(&self, name: &str, new_name: &str) -> Result<()> {
        self.ensure_running()?;
        if name == new_name {
            return self.directory.require(name).map(|_| ());
        }
        let entry = self.directory.rename(name, new_name)?;
        self.credentials.rename_owner(name, new_name);
        let cancelled = self.scheduler.cancel_device(name);

        let observed: Vec<Oid> = entry
            .read()
            .subscriptions
            .iter()
            .filter(|(_, sub)| sub.observed)
            .map(|(oid, _)| oid.clone())
            .collect();
        let restarted = observed
            .into_iter()
            .filter(|oid| self.scheduler.register(&entry, oid.clone()))
            .count();
        tracing::debug!(
            snmp.device = new_name,
            previous = name,
            cancelled,
            restarted,
            "device renamed"
        );
        Ok(())
    }

    /// Duplicate a device's configuration and subscriptions under `new_name`.
    ///
    /// Subscriptions are copied as configured, not observed.
    pub fn copy_device(&self, name: &str, new_name: &str) -> Result<DeviceStatus> {
        let source = self.directory.require(name)?;
        let (config, subscriptions) = {
            let state = source.read();
            let subscriptions: Vec<_> = state
                .subscriptions
                .iter()
                .map(|(oid, sub)| (oid.clone(), configured(sub.label.clone(), sub.syntax)))
                .collect();
            (state.config.clone(), subscriptions)
        };
        self.insert_device(new_name, config, subscriptions)
    }

    pub fn device(&self, name: &str) -> Option<Device> {
        self.directory.get(name).map(|e| e.snapshot())
    }

    /// Snapshots of all devices in name order.
    pub fn devices(&self) -> Vec<Device> {
        self.directory.entries().iter().map(|e| e.snapshot()).collect()
    }

    // Subscriptions

    /// Configure `oid` on a device without polling it.
    ///
    /// The label defaults to the resolved name. Returns `false` if the
    /// subscription already existed.
    pub async fn add_subscription(&self, device: &str, oid: Oid, label: Option<&str>) -> Result<bool> {
        let entry = self.directory.require(device)?;
        if entry.read().subscriptions.contains_key(&oid) {
            return Ok(false);
        }
        let label = match label {
            Some(label) => label.to_string(),
            None => self.resolve(&oid).await,
        };
        let inserted = {
            let mut state = entry.write();
            match state.subscriptions.entry(oid) {
                std::collections::btree_map::Entry::Occupied(_) => false,
                std::collections::btree_map::Entry::Vacant(slot) => {
                    slot.insert(Subscription::new(label));
                    true
                }
            }
        };
        Ok(inserted)
    }

    /// Drop a subscription and its poll.
    ///
    /// Absent subscriptions, and subscriptions of absent devices, are a
    /// no-op returning `false`.
    pub fn remove_subscription(&self, device: &str, oid: &Oid) -> Result<bool> {
        let Some(entry) = self.directory.get(device) else {
            return Ok(false);
        };
        self.scheduler.deregister(device, oid);
        Ok(entry.write().subscriptions.remove(oid).is_some())
    }

    /// Relabel a subscription, optionally moving it to `new_oid`.
    ///
    /// A moved subscription keeps its observation state but starts
    /// over with no value; if observed, polling follows it to the new OID.
    /// Returns `false` and changes nothing if `new_oid` is already configured.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownSubscription`] if `oid` is not configured.
    pub fn edit_subscription(
        &self,
        device: &str,
        oid: &Oid,
        label: &str,
        new_oid: Option<Oid>,
    ) -> Result<bool> {
        let entry = self.directory.require(device)?;
        let mut state = entry.write();
        let Some(new_oid) = new_oid.filter(|new_oid| new_oid != oid) else {
            let sub = state
                .subscriptions
                .get_mut(oid)
                .ok_or_else(|| unknown_subscription(device, oid))?;
            sub.label = label.to_string();
            return Ok(true);
        };
        if !state.subscriptions.contains_key(oid) {
            return Err(unknown_subscription(device, oid));
        }
        if state.subscriptions.contains_key(&new_oid) {
            return Ok(false);
        }
        let observed = state
            .subscriptions
            .remove(oid)
            .is_some_and(|sub| sub.observed);
        let mut moved = Subscription::new(label);
        moved.observed = observed;
        state.subscriptions.insert(new_oid.clone(), moved);
        drop(state);

        self.scheduler.deregister(device, oid);
        if observed {
            self.scheduler.register(&entry, new_oid.clone());
        }
        tracing::debug!(snmp.device = device, snmp.oid = %new_oid, previous = %oid, "subscription moved");
        Ok(true)
    }

    /// Start polling a configured subscription.
    ///
    /// Returns `false` if it was already being polled.
    pub fn start_observing(&self, device: &str, oid: &Oid) -> Result<bool> {
        let entry = self.directory.require(device)?;
        {
            let mut state = entry.write();
            let sub = state
                .subscriptions
                .get_mut(oid)
                .ok_or_else(|| unknown_subscription(device, oid))?;
            sub.observed = true;
        }
        Ok(self.scheduler.register(&entry, oid.clone()))
    }

    /// Stop polling; the subscription stays configured.
    pub fn stop_observing(&self, device: &str, oid: &Oid) -> Result<bool> {
        let entry = self.directory.require(device)?;
        if let Some(sub) = entry.write().subscriptions.get_mut(oid) {
            sub.observed = false;
        }
        Ok(self.scheduler.deregister(device, oid))
    }

    /// Walk the subtree under `prefix`, materialising results as
    /// subscriptions.
    ///
    /// An empty prefix walks the whole agent. The walk holds a schema lease
    /// so results are labelled by name when a set can be loaded in time.
    pub async fn walk(&self, device: &str, prefix: Oid) -> Result<Walk> {
        let entry = self.directory.require(device)?;
        let target = entry.target().ok_or_else(|| Error::NoTarget {
            device: device.into(),
        })?;
        let lease = self.schemas.lease();
        let schema = lease.schema(self.config.reload_wait).await;
        tracing::debug!(snmp.device = device, snmp.oid = %prefix, "walk started");
        Ok(Walk::new(
            self.engine.clone(),
            target,
            entry,
            schema,
            lease,
            prefix,
        ))
    }

    /// Write `text` to a subscribed OID using its last known syntax.
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownSubscription`] if the OID is not configured.
    /// - [`Error::InvalidValue`] if the subscription has no usable syntax or
    ///   `text` does not parse as it.
    /// - [`Error::NoTarget`] if the device configuration is invalid.
    /// - Engine errors from the SET itself.
    pub async fn set_value(&self, device: &str, oid: &Oid, text: &str) -> Result<Value> {
        let entry = self.directory.require(device)?;
        let (syntax, target) = {
            let state = entry.read();
            let sub = state
                .subscriptions
                .get(oid)
                .ok_or_else(|| unknown_subscription(device, oid))?;
            (sub.syntax, state.target.clone())
        };
        let value = Value::parse_as(syntax.unwrap_or(Syntax::Null), text)?;
        let target = target.ok_or_else(|| Error::NoTarget {
            device: device.into(),
        })?;

        let echoed = self.engine.set(&target, VarBind::new(oid.clone(), value)).await?;
        tracing::debug!(snmp.device = device, snmp.oid = %oid, value = %echoed.value, "value set");

        if entry.is_live()
            && let Some(sub) = entry.write().subscriptions.get_mut(oid)
        {
            sub.record_value(echoed.value.clone());
        }
        Ok(echoed.value)
    }

    // Traps

    /// Trap records of a device, oldest first.
    pub fn trap_log(&self, device: &str) -> Result<Vec<TrapRecord>> {
        let entry = self.directory.require(device)?;
        let state = entry.read();
        Ok(state.traps.records().cloned().collect())
    }

    /// Trap log as a JSON array.
    pub fn trap_log_json(&self, device: &str) -> Result<serde_json::Value> {
        let entry = self.directory.require(device)?;
        let json = entry.read().traps.to_json();
        Ok(json)
    }

    pub fn clear_trap_log(&self, device: &str) -> Result<()> {
        let entry = self.directory.require(device)?;
        entry.write().traps.clear();
        Ok(())
    }

    /// Bind the shared notification listener and start routing.
    ///
    /// A bind failure is logged once and returned; polling is unaffected.
    /// Calling this again after a successful start does nothing.
    pub async fn start_trap_listener(&self) -> Result<()> {
        self.ensure_running()?;
        if self.listening.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let addr = self.config.listen_addr;
        match self.engine.listen(addr).await {
            Ok(stream) => {
                tracing::debug!(snmp.listen = %addr, "trap listener started");
                let router = self.router.clone();
                let shutdown = self.shutdown.child_token();
                tokio::spawn(async move { router.run(stream, shutdown).await });
                Ok(())
            }
            Err(e) => {
                self.listening.store(false, Ordering::Release);
                tracing::error!(snmp.listen = %addr, error = %e, "failed to start trap listener");
                Err(e)
            }
        }
    }

    // Schemas

    /// Store a MIB document and merge it into the schema set.
    pub fn add_schema_document(&self, text: &str) -> Result<String> {
        self.schemas.add_document(text)
    }

    /// Unload a MIB document and delete it from storage.
    pub fn remove_schema_document(&self, name: &str) {
        self.schemas.remove_document(name);
    }

    pub fn schema_documents(&self) -> Result<Vec<String>> {
        self.schemas.documents()
    }

    pub fn set_keep_schemas_loaded(&self, keep: bool) {
        self.schemas.set_keep_loaded(keep);
    }

    pub fn keep_schemas_loaded(&self) -> bool {
        self.schemas.keep_loaded()
    }

    /// Resolve an OID to its name, loading the schema set if needed.
    pub async fn resolve(&self, oid: &Oid) -> String {
        let lease = self.schemas.lease();
        match lease.schema(self.config.reload_wait).await {
            Some(set) => set.resolve(oid),
            None => oid.to_string(),
        }
    }

    // Persistence

    /// Snapshot of the persisted fields.
    pub fn save_state(&self) -> FleetState {
        let devices = self
            .directory
            .entries()
            .iter()
            .map(|entry| {
                let state = entry.read();
                let record = DeviceRecord {
                    config: state.config.clone(),
                    subscriptions: state
                        .subscriptions
                        .iter()
                        .map(|(oid, sub)| SubscriptionRecord {
                            oid: oid.clone(),
                            label: sub.label.clone(),
                            syntax: sub.syntax,
                        })
                        .collect(),
                };
                (entry.name().to_string(), record)
            })
            .collect();
        FleetState {
            keep_schemas_loaded: self.keep_schemas_loaded(),
            devices,
        }
    }

    /// Add every device of `state`. Devices whose name is already present
    /// are skipped. Returns the number restored.
    ///
    /// Restored subscriptions are configured but not observed; devices with
    /// invalid configuration come back `Failed`.
    pub fn restore(&self, state: FleetState) -> Result<usize> {
        self.ensure_running()?;
        self.set_keep_schemas_loaded(state.keep_schemas_loaded);

        let mut restored = 0;
        for (name, record) in state.devices {
            let subscriptions = record
                .subscriptions
                .into_iter()
                .map(|sub| (sub.oid, configured(sub.label, sub.syntax)));
            match self.insert_device(&name, record.config, subscriptions) {
                Ok(_) => restored += 1,
                Err(Error::DuplicateDevice { .. }) => {
                    tracing::warn!(snmp.device = %name, "device already present, not restored");
                }
                Err(e) => return Err(e),
            }
        }
        tracing::debug!(restored, "fleet state restored");
        Ok(restored)
    }

    /// Stop polling, trap routing and the schema lifecycle.
    ///
    /// Further mutating operations fail with [`Error::Shutdown`].
    pub fn shutdown(&self) {
        if self.shutdown.is_cancelled() {
            return;
        }
        self.shutdown.cancel();
        self.scheduler.shutdown();
        self.schemas.shutdown();
        tracing::debug!("fleet shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    fn ensure_running(&self) -> Result<()> {
        if self.shutdown.is_cancelled() {
            Err(Error::Shutdown)
        } else {
            Ok(())
        }
    }
}

impl Drop for Fleet {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// A configured, unobserved subscription carrying a known syntax.
fn configured(label: String, syntax: Option<Syntax>) -> Subscription {
    let mut sub = Subscription::new(label);
    sub.syntax = syntax;
    sub
}

fn unknown_subscription(device: &str, oid: &Oid) -> Error {
    Error::UnknownSubscription {
        device: device.into(),
        oid: oid.clone(),
    }
}
