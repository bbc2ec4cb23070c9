//! SNMPv3 security parameters as they appear in device configuration.

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::ConfigErrorKind;

/// Authentication protocol identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthProtocol {
    /// HMAC-MD5-96 (RFC 3414)
    Md5,
    /// HMAC-SHA-96 (RFC 3414)
    Sha1,
}

impl AuthProtocol {
    /// Resolve a configured auth protocol name.
    ///
    /// `NONE` (or an empty name) means no authentication. Matching is
    /// case-insensitive.
    pub fn from_config(name: &str) -> Result<Option<Self>, ConfigErrorKind> {
        match name.trim().to_ascii_uppercase().as_str() {
            "" | "NONE" => Ok(None),
            "MD5" => Ok(Some(Self::Md5)),
            "SHA" | "SHA1" | "SHA-1" => Ok(Some(Self::Sha1)),
            _ => Err(ConfigErrorKind::UnsupportedAuthProtocol(name.to_string())),
        }
    }

    /// Get the digest output length in bytes.
    pub fn digest_len(self) -> usize {
        match self {
            Self::Md5 => 16,
            Self::Sha1 => 20,
        }
    }

    /// Whether a localized key of this protocol is long enough for `privacy`.
    ///
    /// Key extension is not supported, so MD5 and SHA keys cover DES and
    /// AES-128 only.
    pub fn is_compatible_with(self, privacy: PrivProtocol) -> bool {
        self.digest_len() >= privacy.key_len()
    }
}

impl std::fmt::Display for AuthProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Md5 => write!(f, "MD5"),
            Self::Sha1 => write!(f, "SHA"),
        }
    }
}

/// Privacy protocol identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrivProtocol {
    /// DES-CBC (RFC 3414).
    Des,
    /// AES-128-CFB (RFC 3826)
    Aes128,
    /// AES-192-CFB
    Aes192,
    /// AES-256-CFB
    Aes256,
}

impl PrivProtocol {
    /// Resolve a configured privacy protocol name.
    ///
    /// `AES` is an alias for `AES128`; dashed spellings (`AES-256`) are accepted.
    pub fn from_config(name: &str) -> Result<Option<Self>, ConfigErrorKind> {
        match name.trim().to_ascii_uppercase().as_str() {
            "" | "NONE" => Ok(None),
            "DES" => Ok(Some(Self::Des)),
            "AES" | "AES128" | "AES-128" => Ok(Some(Self::Aes128)),
            "AES192" | "AES-192" => Ok(Some(Self::Aes192)),
            "AES256" | "AES-256" => Ok(Some(Self::Aes256)),
            _ => Err(ConfigErrorKind::UnsupportedPrivProtocol(name.to_string())),
        }
    }

    /// Get the key length in bytes.
    pub fn key_len(self) -> usize {
        match self {
            Self::Des => 16, // 8 key + 8 pre-IV
            Self::Aes128 => 16,
            Self::Aes192 => 24,
            Self::Aes256 => 32,
        }
    }
}

impl std::fmt::Display for PrivProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Des => write!(f, "DES"),
            Self::Aes128 => write!(f, "AES"),
            Self::Aes192 => write!(f, "AES-192"),
            Self::Aes256 => write!(f, "AES-256"),
        }
    }
}

/// SNMPv3 security level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SecurityLevel {
    /// No authentication, no privacy
    NoAuthNoPriv,
    /// Authentication only
    AuthNoPriv,
    /// Authentication and privacy
    AuthPriv,
}

impl SecurityLevel {
    /// Derive the level from which passphrases are present.
    ///
    /// A privacy passphrase without an authentication passphrase does not
    /// raise the level.
    pub fn derive(auth_passphrase: &str, priv_passphrase: &str) -> Self {
        if auth_passphrase.is_empty() {
            Self::NoAuthNoPriv
        } else if priv_passphrase.is_empty() {
            Self::AuthNoPriv
        } else {
            Self::AuthPriv
        }
    }
}

impl std::fmt::Display for SecurityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoAuthNoPriv => write!(f, "noAuthNoPriv"),
            Self::AuthNoPriv => write!(f, "authNoPriv"),
            Self::AuthPriv => write!(f, "authPriv"),
        }
    }
}

/// A configured secret (community string or passphrase).
///
/// Cleared from memory on drop and redacted from `Debug` output. Saved
/// state stores it as plain text.
#[derive(Clone, Default, PartialEq, Eq, Zeroize, ZeroizeOnDrop, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    /// Wrap a secret value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Expose the secret text.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Whether the secret is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.is_empty() {
            f.write_str("Secret(\"\")")
        } else {
            f.write_str("Secret([REDACTED])")
        }
    }
}
