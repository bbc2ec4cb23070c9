//! Shared SNMPv3 credential store.
//!
//! One store is shared by every device of a fleet (and handed to the
//! protocol engine), keyed by security name. It also holds the local
//! engine id, which is global to the store: the last device to supply one
//! wins.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use bytes::Bytes;

use super::keys::{LocalizedKey, MasterKey};
use super::security::{AuthProtocol, PrivProtocol, SecurityLevel};
use crate::util::{read, write};

/// A USM user entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsmUser {
    /// Security name the entry is keyed by.
    pub security_name: String,
    /// Level derived from the configured passphrases.
    pub level: SecurityLevel,
    /// Authentication protocol and master key, present from `AuthNoPriv` up.
    pub auth: Option<(AuthProtocol, MasterKey)>,
    /// Privacy protocol and master key (derived with the auth hash), `AuthPriv` only.
    pub privacy: Option<(PrivProtocol, MasterKey)>,
}

impl UsmUser {
    /// Derive a user entry from configured passphrases.
    ///
    /// A missing auth protocol with a non-empty passphrase falls back to
    /// MD5, and a missing priv protocol to DES, matching common agent
    /// defaults.
    pub fn derive(
        security_name: &str,
        auth_protocol: Option<AuthProtocol>,
        auth_passphrase: &str,
        priv_protocol: Option<PrivProtocol>,
        priv_passphrase: &str,
    ) -> Self {
        let level = SecurityLevel::derive(auth_passphrase, priv_passphrase);
        let auth_protocol = auth_protocol.unwrap_or(AuthProtocol::Md5);

        let auth = (level >= SecurityLevel::AuthNoPriv).then(|| {
            (
                auth_protocol,
                MasterKey::from_password(auth_protocol, auth_passphrase.as_bytes()),
            )
        });
        let privacy = (level == SecurityLevel::AuthPriv).then(|| {
            (
                priv_protocol.unwrap_or(PrivProtocol::Des),
                MasterKey::from_password(auth_protocol, priv_passphrase.as_bytes()),
            )
        });

        Self {
            security_name: security_name.to_string(),
            level,
            auth,
            privacy,
        }
    }
}

/// A user's keys bound to one authoritative engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalizedUser {
    pub auth: Option<(AuthProtocol, LocalizedKey)>,
    /// Privacy key cut to the cipher's key length.
    pub privacy: Option<(PrivProtocol, LocalizedKey)>,
}

impl UsmUser {
    /// Localize this user's keys against `engine_id`.
    pub fn localize(&self, engine_id: &[u8]) -> LocalizedUser {
        let auth = self
            .auth
            .as_ref()
            .map(|(protocol, key)| (*protocol, key.localize(engine_id)));
        let privacy = self.privacy.as_ref().map(|(protocol, key)| {
            if !key.protocol().is_compatible_with(*protocol) {
                tracing::warn!(
                    snmp.security_name = %self.security_name,
                    auth_protocol = %key.protocol(),
                    priv_protocol = %protocol,
                    key_len = key.protocol().digest_len(),
                    required = protocol.key_len(),
                    "privacy key shorter than the cipher needs"
                );
            }
            (*protocol, key.localize(engine_id).truncated(protocol.key_len()))
        });
        LocalizedUser { auth, privacy }
    }
}

#[derive(Default)]
struct Entries {
    users: HashMap<String, Arc<UsmUser>>,
    /// device name -> security name it registered
    owners: HashMap<String, String>,
    local_engine_id: Bytes,
}

/// Credential store shared across devices.
pub struct CredentialStore {
    entries: RwLock<Entries>,
}

impl CredentialStore {
    /// Create an empty store with a freshly generated local engine id.
    pub fn new() -> Self {
        Self::with_engine_id(generate_engine_id())
    }

    /// Create an empty store with a fixed local engine id.
    pub fn with_engine_id(engine_id: impl Into<Bytes>) -> Self {
        Self {
            entries: RwLock::new(Entries {
                local_engine_id: engine_id.into(),
                ..Entries::default()
            }),
        }
    }

    /// Register `user` on behalf of `device`, replacing whatever that device
    /// registered before.
    pub fn register(&self, device: &str, user: UsmUser) {
        let mut entries = write(&self.entries);
        remove_owned(&mut entries, device);
        tracing::debug!(
            snmp.device = device,
            snmp.security_name = %user.security_name,
            snmp.security_level = %user.level,
            "registering USM user"
        );
        entries
            .owners
            .insert(device.to_string(), user.security_name.clone());
        entries
            .users
            .insert(user.security_name.clone(), Arc::new(user));
    }

    /// Drop the entry `device` registered, if any.
    ///
    /// The user itself is kept while another device still refers to the
    /// same security name.
    pub fn clear_device(&self, device: &str) {
        remove_owned(&mut write(&self.entries), device);
    }

    /// Transfer whatever `old_device` registered to `new_device`.
    pub fn rename_owner(&self, old_device: &str, new_device: &str) {
        let mut entries = write(&self.entries);
        if let Some(name) = entries.owners.remove(old_device) {
            entries.owners.insert(new_device.to_string(), name);
        }
    }

    /// Look up a user by security name.
    pub fn user(&self, security_name: &str) -> Option<Arc<UsmUser>> {
        read(&self.entries).users.get(security_name).cloned()
    }

    /// Security name registered by `device`, if any.
    pub fn owned_by(&self, device: &str) -> Option<String> {
        read(&self.entries).owners.get(device).cloned()
    }

    /// Number of distinct users.
    pub fn len(&self) -> usize {
        read(&self.entries).users.len()
    }

    /// Whether the store has no users.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The locally known engine id.
    pub fn local_engine_id(&self) -> Bytes {
        read(&self.entries).local_engine_id.clone()
    }

    /// Replace the locally known engine id for the whole store.
    pub fn set_local_engine_id(&self, engine_id: impl Into<Bytes>) {
        let engine_id = engine_id.into();
        tracing::debug!(
            snmp.engine_id = %crate::util::encode_hex(&engine_id),
            "local engine id replaced"
        );
        write(&self.entries).local_engine_id = engine_id;
    }
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let entries = read(&self.entries);
        f.debug_struct("CredentialStore")
            .field("users", &entries.users.len())
            .field("devices", &entries.owners.len())
            .finish()
    }
}

fn remove_owned(entries: &mut Entries, device: &str) {
    let Some(name) = entries.owners.remove(device) else {
        return;
    };
    if !entries.owners.values().any(|other| *other == name) {
        entries.users.remove(&name);
    }
}

/// RFC 3411 engine id: enterprise with the format bit set, format 5
/// (octets), then 8 random bytes.
fn generate_engine_id() -> Bytes {
    const ENTERPRISE: u32 = 0x8000_0000 | 8072;

    let mut id = Vec::with_capacity(13);
    id.extend_from_slice(&ENTERPRISE.to_be_bytes());
    id.push(5);

    let mut random = [0u8; 8];
    if let Err(e) = getrandom::fill(&mut random) {
        tracing::warn!(error = %e, "no OS randomness for local engine id; using process id");
        random[..4].copy_from_slice(&std::process::id().to_be_bytes());
    }
    id.extend_from_slice(&random);
    Bytes::from(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v3_user(name: &str) -> UsmUser {
        UsmUser::derive(name, Some(AuthProtocol::Sha1), "authpass123", None, "")
    }

    #[test]
    fn test_register_replaces_device_entry() {
        let store = CredentialStore::with_engine_id(Bytes::from_static(b"local"));
        store.register("r1", v3_user("alice"));
        store.register("r1", v3_user("bob"));

        assert!(store.user("alice").is_none());
        assert!(store.user("bob").is_some());
        assert_eq!(store.owned_by("r1").as_deref(), Some("bob"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_shared_security_name_survives_one_owner() {
        let store = CredentialStore::with_engine_id(Bytes::new());
        store.register("r1", v3_user("ops"));
        store.register("r2", v3_user("ops"));

        store.clear_device("r1");
        assert!(store.user("ops").is_some());

        store.clear_device("r2");
        assert!(store.user("ops").is_none());
        assert!(store.is_empty());

        // Clearing an unknown device is a no-op
        store.clear_device("ghost");
    }

    #[test]
    fn test_rename_owner_keeps_user() {
        let store = CredentialStore::with_engine_id(Bytes::new());
        store.register("r1", v3_user("ops"));
        store.rename_owner("r1", "r2");

        assert_eq!(store.owned_by("r1"), None);
        assert_eq!(store.owned_by("r2").as_deref(), Some("ops"));
        assert!(store.user("ops").is_some());

        // The old name no longer owns anything to clear
        store.clear_device("r1");
        assert!(store.user("ops").is_some());
        store.clear_device("r2");
        assert!(store.is_empty());
    }

    #[test]
    fn test_derive_levels() {
        let none = UsmUser::derive("u", None, "", None, "");
        assert_eq!(none.level, SecurityLevel::NoAuthNoPriv);
        assert!(none.auth.is_none() && none.privacy.is_none());

        let full = UsmUser::derive(
            "u",
            Some(AuthProtocol::Md5),
            "authpass123",
            Some(PrivProtocol::Aes256),
            "privpass123",
        );
        assert_eq!(full.level, SecurityLevel::AuthPriv);
        let (priv_proto, priv_key) = full.privacy.as_ref().unwrap();
        assert_eq!(*priv_proto, PrivProtocol::Aes256);
        assert_eq!(priv_key.protocol(), AuthProtocol::Md5);
    }

    #[test]
    fn test_localize_against_engine() {
        // RFC 3414 Appendix A.3.1 engine id and passphrase
        let engine_id = [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 2];
        let user = UsmUser::derive(
            "u",
            Some(AuthProtocol::Sha1),
            "maplesyrup",
            Some(PrivProtocol::Aes128),
            "maplesyrup",
        );
        let keys = user.localize(&engine_id);

        let (auth_proto, auth_key) = keys.auth.as_ref().unwrap();
        assert_eq!(*auth_proto, AuthProtocol::Sha1);
        assert_eq!(
            crate::util::encode_hex(auth_key.as_bytes()),
            "6695febc9288e36282235fc7151f128497b38f3f"
        );
        let (priv_proto, priv_key) = keys.privacy.as_ref().unwrap();
        assert_eq!(*priv_proto, PrivProtocol::Aes128);
        assert_eq!(priv_key.as_bytes(), &auth_key.as_bytes()[..16]);

        let none = UsmUser::derive("u", None, "", None, "").localize(&engine_id);
        assert!(none.auth.is_none() && none.privacy.is_none());
    }

    #[test]
    fn test_engine_id_last_writer_wins() {
        let store = CredentialStore::new();
        assert_eq!(store.local_engine_id().len(), 13);
        assert_eq!(store.local_engine_id()[4], 5);

        store.set_local_engine_id(Bytes::from_static(b"first"));
        store.set_local_engine_id(Bytes::from_static(b"second"));
        assert_eq!(&store.local_engine_id()[..], b"second");
    }
}
