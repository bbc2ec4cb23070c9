//! Bounded per-device trap log.

use std::collections::VecDeque;
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::{Map, Value as Json, json};

use crate::oid::Oid;
use crate::value::Value;

/// Records kept per device unless configured otherwise.
pub const DEFAULT_TRAP_LOG_CAPACITY: usize = 100;

/// SNMPv1 trap header fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyTrap {
    /// Agent sysUpTime in hundredths of seconds.
    pub timestamp: u32,
    /// Enterprise OID, resolved when a schema was available.
    pub enterprise: String,
    pub generic_trap: i32,
    pub specific_trap: i32,
}

/// One varbind of a received trap, with its name resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrapField {
    pub name: String,
    pub oid: Oid,
    pub value: Value,
}

/// A trap as appended to a device log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrapRecord {
    pub received_at: SystemTime,
    pub request_id: i32,
    /// Present for SNMPv1 traps only.
    pub legacy: Option<LegacyTrap>,
    pub fields: Vec<TrapField>,
}

impl TrapRecord {
    /// Value of the first field named `name`.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|f| f.name == name).map(|f| &f.value)
    }

    /// JSON object with `requestId`, the v1 header when present, and one
    /// key per field.
    pub fn to_json(&self) -> Json {
        let mut obj = Map::new();
        let received_ms = self
            .received_at
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        obj.insert("receivedAt".into(), json!(received_ms));
        obj.insert("requestId".into(), json!(self.request_id));
        if let Some(legacy) = &self.legacy {
            obj.insert("timestamp".into(), json!(legacy.timestamp));
            obj.insert("enterprise".into(), json!(legacy.enterprise));
            obj.insert("genericTrap".into(), json!(legacy.generic_trap));
            obj.insert("specificTrap".into(), json!(legacy.specific_trap));
        }
        for field in &self.fields {
            obj.insert(field.name.clone(), field.value.to_json());
        }
        Json::Object(obj)
    }
}

/// FIFO of trap records; the oldest record is evicted when full.
#[derive(Debug, Clone)]
pub struct TrapLog {
    capacity: usize,
    records: VecDeque<TrapRecord>,
}

impl Default for TrapLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_TRAP_LOG_CAPACITY)
    }
}

impl TrapLog {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            records: VecDeque::with_capacity(capacity.min(DEFAULT_TRAP_LOG_CAPACITY)),
        }
    }

    pub fn push(&mut self, record: TrapRecord) {
        while self.records.len() >= self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    /// Records in receipt order, oldest first.
    pub fn records(&self) -> impl Iterator<Item = &TrapRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// JSON array of [`TrapRecord::to_json`] objects, oldest first.
    pub fn to_json(&self) -> Json {
        Json::Array(self.records.iter().map(TrapRecord::to_json).collect())
    }
}
