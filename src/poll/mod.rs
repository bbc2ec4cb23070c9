//! Subscription-driven polling.
//!
//! Each observed `(device, oid)` pair owns one Tokio task that GETs the OID,
//! writes the result back to the device's subscription and then sleeps for
//! the device's poll interval (fixed delay, measured from the end of the
//! tick). The registry maps pairs to the [`CancellationToken`] of their task;
//! the lock is never held across a tick.
//!
//! Cancelling a task stops future ticks. A tick already awaiting the engine
//! runs to completion and applies its result only if the device is still
//! live and the OID still configured.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::device::DeviceEntry;
use crate::engine::ProtocolEngine;
use crate::oid::Oid;
use crate::util;

type Key = (String, Oid);

/// Registry of per-subscription poll tasks.
pub struct PollScheduler {
    engine: Arc<dyn ProtocolEngine>,
    tasks: Mutex<HashMap<Key, CancellationToken>>,
}

impl std::fmt::Debug for PollScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollScheduler")
            .field("active", &self.active_count())
            .finish_non_exhaustive()
    }
}

impl PollScheduler {
    pub fn new(engine: Arc<dyn ProtocolEngine>) -> Self {
        Self {
            engine,
            tasks: Mutex::new(HashMap::new()),
        }
    }

    /// Start polling `oid` on `device` at the device's current interval.
    ///
    /// Returns `false` without doing anything if the pair is already
    /// scheduled or the device has been retired.
    pub fn register(&self, device: &Arc<DeviceEntry>, oid: Oid) -> bool {
        let mut tasks = util::lock(&self.tasks);
        // Checked under the registry lock: retirement precedes cancel_device
        if !device.is_live() {
            return false;
        }
        let key = (device.name().to_string(), oid);
        if tasks.contains_key(&key) {
            return false;
        }
        let token = self.spawn(device, key.1.clone());
        tasks.insert(key, token);
        true
    }

    /// Stop polling `oid` on `device`. Returns `false` if it was not scheduled.
    pub fn deregister(&self, device: &str, oid: &Oid) -> bool {
        let key = (device.to_string(), oid.clone());
        match util::lock(&self.tasks).remove(&key) {
            Some(token) => {
                token.cancel();
                tracing::debug!(snmp.device = device, snmp.oid = %oid, "poll deregistered");
                true
            }
            None => false,
        }
    }

    /// Restart every scheduled subscription of `device` so that the current
    /// poll interval applies. Returns the number restarted.
    pub fn reschedule_device(&self, device: &Arc<DeviceEntry>) -> usize {
        let mut tasks = util::lock(&self.tasks);
        let mut restarted = 0;
        for ((name, oid), token) in tasks.iter_mut() {
            if name != device.name() {
                continue;
            }
            token.cancel();
            *token = self.spawn(device, oid.clone());
            restarted += 1;
        }
        if restarted > 0 {
            tracing::debug!(snmp.device = device.name(), restarted, "polls rescheduled");
        }
        restarted
    }

    /// Cancel every subscription of `device`. Returns the number cancelled.
    pub fn cancel_device(&self, device: &str) -> usize {
        let mut tasks = util::lock(&self.tasks);
        let before = tasks.len();
        tasks.retain(|(name, _), token| {
            if name == device {
                token.cancel();
                false
            } else {
                true
            }
        });
        before - tasks.len()
    }

    pub fn is_scheduled(&self, device: &str, oid: &Oid) -> bool {
        util::lock(&self.tasks).contains_key(&(device.to_string(), oid.clone()))
    }

    /// Number of scheduled subscriptions across all devices.
    pub fn active_count(&self) -> usize {
        util::lock(&self.tasks).len()
    }

    /// Cancel everything.
    pub fn shutdown(&self) {
        for (_, token) in util::lock(&self.tasks).drain() {
            token.cancel();
        }
    }

    fn spawn(&self, device: &Arc<DeviceEntry>, oid: Oid) -> CancellationToken {
        let token = CancellationToken::new();
        let interval = device.config().poll_interval();
        tracing::debug!(
            snmp.device = device.name(),
            snmp.oid = %oid,
            interval_ms = interval.as_millis() as u64,
            "poll scheduled"
        );
        tokio::spawn(poll_loop(
            self.engine.clone(),
            Arc::downgrade(device),
            oid,
            interval,
            token.clone(),
        ));
        token
    }
}

async fn poll_loop(
    engine: Arc<dyn ProtocolEngine>,
    device: Weak<DeviceEntry>,
    oid: Oid,
    interval: Duration,
    cancel: CancellationToken,
) {
    loop {
        if cancel.is_cancelled() {
            break;
        }
        let Some(entry) = device.upgrade().filter(|d| d.is_live()) else {
            break;
        };
        tick(engine.as_ref(), &entry, &oid).await;
        drop(entry);

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }
}

/// One fetch of `oid`, applied to the subscription after a liveness check.
pub(crate) async fn tick(engine: &dyn ProtocolEngine, device: &DeviceEntry, oid: &Oid) {
    let target = {
        let state = device.read();
        if !state.subscriptions.contains_key(oid) {
            return;
        }
        state.target.clone()
    };
    let Some(target) = target else {
        tracing::trace!(snmp.device = device.name(), snmp.oid = %oid, "no target, tick skipped");
        return;
    };

    let result = engine.get(&target, oid).await;

    if !device.is_live() {
        return;
    }
    let mut state = device.write();
    let Some(subscription) = state.subscriptions.get_mut(oid) else {
        return;
    };
    match result {
        Ok(varbind) => {
            tracing::trace!(
                snmp.device = device.name(),
                snmp.oid = %oid,
                value = %varbind.value,
                "poll result"
            );
            subscription.record_value(varbind.value);
        }
        Err(e) => {
            tracing::warn!(snmp.device = device.name(), snmp.oid = %oid, error = %e, "poll failed");
            subscription.record_error(&e);
        }
    }
}
