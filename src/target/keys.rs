//! USM key derivation (RFC 3414 Section A.2).
//!
//! Credentials are stored as master keys so passphrases do not outlive
//! target construction. Engines localize them once the agent's engine id
//! is known.

use digest::{Digest, OutputSizeUser};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::security::AuthProtocol;

/// Passwords shorter than this are accepted but logged.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Master key: the hash of the 1MB password expansion.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct MasterKey {
    key: Vec<u8>,
    #[zeroize(skip)]
    protocol: AuthProtocol,
}

impl MasterKey {
    /// Derive a master key from a passphrase.
    ///
    /// Empty passphrases give an all-zero key of the digest length.
    pub fn from_password(protocol: AuthProtocol, password: &[u8]) -> Self {
        if password.len() < MIN_PASSWORD_LENGTH {
            tracing::warn!(
                password_len = password.len(),
                min_len = MIN_PASSWORD_LENGTH,
                "SNMPv3 password is shorter than recommended minimum"
            );
        }
        let key = match protocol {
            AuthProtocol::Md5 => password_to_key::<md5::Md5>(password),
            AuthProtocol::Sha1 => password_to_key::<sha1::Sha1>(password),
        };
        Self { key, protocol }
    }

    /// Get the protocol this key is for.
    pub fn protocol(&self) -> AuthProtocol {
        self.protocol
    }

    /// Get the raw key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.key
    }

    /// Bind this key to an engine: `H(Ku || engineID || Ku)`.
    pub fn localize(&self, engine_id: &[u8]) -> LocalizedKey {
        let key = match self.protocol {
            AuthProtocol::Md5 => localize::<md5::Md5>(&self.key, engine_id),
            AuthProtocol::Sha1 => localize::<sha1::Sha1>(&self.key, engine_id),
        };
        LocalizedKey {
            key,
            protocol: self.protocol,
        }
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterKey")
            .field("protocol", &self.protocol)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// Key bound to a specific authoritative engine.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct LocalizedKey {
    key: Vec<u8>,
    #[zeroize(skip)]
    protocol: AuthProtocol,
}

impl LocalizedKey {
    /// Get the protocol this key is for.
    pub fn protocol(&self) -> AuthProtocol {
        self.protocol
    }

    /// Keep the first `len` bytes, as privacy keys use.
    pub fn truncated(mut self, len: usize) -> Self {
        if len < self.key.len() {
            self.key[len..].zeroize();
            self.key.truncate(len);
        }
        self
    }

    /// Get the raw key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.key
    }
}

impl std::fmt::Debug for LocalizedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalizedKey")
            .field("protocol", &self.protocol)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

fn password_to_key<D>(password: &[u8]) -> Vec<u8>
where
    D: Digest + Default,
{
    const EXPANSION_SIZE: usize = 1_048_576;

    if password.is_empty() {
        return vec![0u8; <D as OutputSizeUser>::output_size()];
    }

    let mut hasher = D::new();

    // Hash the repeated password in 64-byte chunks
    let mut buf = [0u8; 64];
    let mut index = 0;
    let mut count = 0;

    while count < EXPANSION_SIZE {
        for byte in &mut buf {
            *byte = password[index];
            index = (index + 1) % password.len();
        }
        hasher.update(buf);
        count += 64;
    }

    buf.zeroize();
    hasher.finalize().to_vec()
}

fn localize<D>(master_key: &[u8], engine_id: &[u8]) -> Vec<u8>
where
    D: Digest + Default,
{
    let mut hasher = D::new();
    hasher.update(master_key);
    hasher.update(engine_id);
    hasher.update(master_key);
    hasher.finalize().to_vec()
}
