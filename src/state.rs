//! Persisted fleet state.
//!
//! The host saves and restores the fleet through [`FleetState`], a plain
//! serde document. Passphrases are stored as entered.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::oid::Oid;
use crate::target::TargetConfig;
use crate::value::Syntax;

/// A subscription as persisted: identity and typing, no live value.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SubscriptionRecord {
    pub oid: Oid,
    #[serde(default)]
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub syntax: Option<Syntax>,
}

/// A device as persisted.
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct DeviceRecord {
    #[serde(flatten)]
    pub config: TargetConfig,
    #[serde(default)]
    pub subscriptions: Vec<SubscriptionRecord>,
}

/// Everything needed to rebuild a fleet.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FleetState {
    #[serde(default = "default_keep_loaded")]
    pub keep_schemas_loaded: bool,
    #[serde(default)]
    pub devices: BTreeMap<String, DeviceRecord>,
}

fn default_keep_loaded() -> bool {
    true
}

impl Default for FleetState {
    fn default() -> Self {
        Self {
            keep_schemas_loaded: default_keep_loaded(),
            devices: BTreeMap::new(),
        }
    }
}

impl FleetState {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Read a state file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref()).map_err(Error::io)?;
        Self::from_json(&text)
    }

    /// Write a state file, replacing it atomically where the platform allows.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = self.to_json()?;
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, json).map_err(Error::io)?;
        fs::rename(&tmp, path).map_err(Error::io)?;
        tracing::debug!(path = %path.display(), devices = self.devices.len(), "fleet state saved");
        Ok(())
    }
}
