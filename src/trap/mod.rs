//! Inbound notification routing.
//!
//! One listener serves the whole fleet. Each notification is matched to
//! every device whose configured host equals the source IP, its varbinds are
//! named through the schema set, and one [`TrapRecord`] is appended to each
//! matching device's log. Notifications are handled one at a time, so a
//! device log is always in receipt order.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio_util::sync::CancellationToken;

use crate::config::FleetConfig;
use crate::device::{DeviceDirectory, LegacyTrap, TrapField, TrapRecord};
use crate::engine::{InboundNotification, NotificationPdu, NotificationStream};
use crate::oid::Oid;
use crate::schema::{SchemaResolver, SchemaSet};

/// Routes notifications to device trap logs.
#[derive(Debug, Clone)]
pub struct TrapRouter {
    directory: Arc<DeviceDirectory>,
    schemas: SchemaResolver,
    short_wait: Duration,
    reload_wait: Duration,
}

impl TrapRouter {
    pub fn new(directory: Arc<DeviceDirectory>, schemas: SchemaResolver, config: &FleetConfig) -> Self {
        Self {
            directory,
            schemas,
            short_wait: config.trap_schema_wait,
            reload_wait: config.reload_wait,
        }
    }

    /// Append `notification` to every matching device.
    ///
    /// Returns the number of devices that received it. Unmatched
    /// notifications are dropped. If no schema set becomes available within
    /// the wait bound, the record keeps numeric OIDs.
    pub async fn route(&self, notification: &InboundNotification) -> usize {
        let source = notification.source;
        let devices = self.directory.matching(source.ip());
        if devices.is_empty() {
            tracing::trace!(snmp.source = %source, "notification from unknown source dropped");
            return 0;
        }

        let lease = self.schemas.lease();
        let wait = if self.schemas.keep_loaded() {
            self.short_wait
        } else {
            self.reload_wait
        };
        let schema = lease.schema(wait).await;
        if schema.is_none() {
            tracing::debug!(snmp.source = %source, "schema set unavailable, trap left numeric");
        }
        let record = build_record(&notification.pdu, schema.as_deref());
        drop(lease);

        let mut delivered = 0;
        for device in devices {
            if !device.is_live() {
                continue;
            }
            device.write().traps.push(record.clone());
            delivered += 1;
            tracing::debug!(
                snmp.device = device.name(),
                snmp.source = %source,
                snmp.request_id = record.request_id,
                "trap recorded"
            );
        }
        delivered
    }

    /// Route notifications until the stream ends or `shutdown` fires.
    pub async fn run(&self, mut notifications: NotificationStream, shutdown: CancellationToken) {
        loop {
            let notification = tokio::select! {
                _ = shutdown.cancelled() => break,
                received = notifications.recv() => match received {
                    Some(notification) => notification,
                    None => break,
                },
            };
            self.route(&notification).await;
        }
        tracing::debug!("trap router stopped");
    }
}

fn name(schema: Option<&SchemaSet>, oid: &Oid) -> String {
    match schema {
        Some(set) => set.resolve(oid),
        None => oid.to_string(),
    }
}

fn build_record(pdu: &NotificationPdu, schema: Option<&SchemaSet>) -> TrapRecord {
    let fields = pdu
        .varbinds()
        .iter()
        .map(|vb| TrapField {
            name: name(schema, &vb.oid),
            oid: vb.oid.clone(),
            value: vb.value.clone(),
        })
        .collect();

    let legacy = match pdu {
        NotificationPdu::TrapV1 {
            enterprise,
            generic_trap,
            specific_trap,
            timestamp,
            ..
        } => Some(LegacyTrap {
            timestamp: *timestamp,
            enterprise: name(schema, enterprise),
            generic_trap: *generic_trap,
            specific_trap: *specific_trap,
        }),
        NotificationPdu::Notification { .. } => None,
    };

    TrapRecord {
        received_at: SystemTime::now(),
        request_id: pdu.request_id(),
        legacy,
        fields,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid;
    use crate::value::Value;
    use crate::varbind::VarBind;

    #[test]
    fn test_build_record_v2() {
        let set = SchemaSet::from_symbols([("1.3.6.1.2.1.1.3", "sysUpTime")]);
        let pdu = NotificationPdu::Notification {
            request_id: 77,
            varbinds: vec![
                VarBind::new(oid!(1, 3, 6, 1, 2, 1, 1, 3, 0), Value::TimeTicks(100)),
                VarBind::new(oid!(1, 3, 6, 1, 4, 1, 1), Value::Integer(5)),
            ],
        };
        let record = build_record(&pdu, Some(&set));
        assert_eq!(record.request_id, 77);
        assert!(record.legacy.is_none());
        assert_eq!(record.fields[0].name, "sysUpTime.0");
        assert_eq!(record.fields[1].name, "1.3.6.1.4.1.1");
    }

    #[test]
    fn test_build_record_v1_numeric() {
        let pdu = NotificationPdu::TrapV1 {
            enterprise: oid!(1, 3, 6, 1, 4, 1, 9),
            agent_addr: [192, 0, 2, 1],
            generic_trap: 6,
            specific_trap: 3,
            timestamp: 4200,
            varbinds: vec![VarBind::new(oid!(1, 3, 6, 1, 4, 1, 9, 1), Value::from("x"))],
        };
        let record = build_record(&pdu, None);
        assert_eq!(record.request_id, 0);
        let legacy = record.legacy.unwrap();
        assert_eq!(legacy.enterprise, "1.3.6.1.4.1.9");
        assert_eq!(legacy.generic_trap, 6);
        assert_eq!(legacy.specific_trap, 3);
        assert_eq!(legacy.timestamp, 4200);
        assert_eq!(record.fields[0].name, "1.3.6.1.4.1.9.1");
    }
}
