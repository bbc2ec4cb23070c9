//! SNMP value types and the syntax hints used to write them back.

use std::net::Ipv4Addr;

use bytes::Bytes;

use crate::error::{Error, Result};
use crate::oid::Oid;
use crate::util::{decode_hex, encode_hex, octets_from_text};

/// SNMP value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    /// INTEGER (ASN.1 primitive, signed 32-bit)
    Integer(i32),
    /// OCTET STRING (arbitrary bytes).
    OctetString(Bytes),
    /// NULL
    Null,
    /// OBJECT IDENTIFIER
    ObjectIdentifier(Oid),
    /// IpAddress (4 bytes, big-endian)
    IpAddress([u8; 4]),
    /// Counter32 (unsigned 32-bit, wrapping)
    Counter32(u32),
    /// Gauge32 / Unsigned32 (unsigned 32-bit, non-wrapping)
    Gauge32(u32),
    /// TimeTicks (hundredths of seconds)
    TimeTicks(u32),
    /// Opaque (legacy, arbitrary bytes)
    Opaque(Bytes),
    /// Counter64 (unsigned 64-bit, wrapping). SNMPv2c/v3 only.
    Counter64(u64),
    /// noSuchObject exception
    NoSuchObject,
    /// noSuchInstance exception
    NoSuchInstance,
    /// endOfMibView exception
    EndOfMibView,
}

impl Value {
    /// Check if this is an exception value (NoSuchObject, NoSuchInstance, EndOfMibView).
    pub fn is_exception(&self) -> bool {
        matches!(
            self,
            Value::NoSuchObject | Value::NoSuchInstance | Value::EndOfMibView
        )
    }

    /// The syntax of this value, or `None` for exceptions.
    pub fn syntax(&self) -> Option<Syntax> {
        Some(match self {
            Value::Integer(_) => Syntax::Integer,
            Value::OctetString(_) => Syntax::OctetString,
            Value::Null => Syntax::Null,
            Value::ObjectIdentifier(_) => Syntax::ObjectIdentifier,
            Value::IpAddress(_) => Syntax::IpAddress,
            Value::Counter32(_) => Syntax::Counter32,
            Value::Gauge32(_) => Syntax::Gauge32,
            Value::TimeTicks(_) => Syntax::TimeTicks,
            Value::Opaque(_) => Syntax::Opaque,
            Value::Counter64(_) => Syntax::Counter64,
            Value::NoSuchObject | Value::NoSuchInstance | Value::EndOfMibView => return None,
        })
    }

    /// Numeric reading for INTEGER, Counter32, Gauge32 and Counter64 values.
    pub fn as_i128(&self) -> Option<i128> {
        match self {
            Value::Integer(v) => Some(i128::from(*v)),
            Value::Counter32(v) | Value::Gauge32(v) => Some(i128::from(*v)),
            Value::Counter64(v) => Some(i128::from(*v)),
            _ => None,
        }
    }

    /// JSON form: numeric syntaxes become numbers, everything else its display string.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Integer(v) => (*v).into(),
            Value::Counter32(v) | Value::Gauge32(v) => (*v).into(),
            Value::Counter64(v) => (*v).into(),
            other => other.to_string().into(),
        }
    }

    /// Build a value of `syntax` from user-supplied text.
    ///
    /// Octet strings accept `0x` hex; IP addresses use dotted-quad form.
    /// NULL cannot be written.
    ///
    /// # Examples
    ///
    /// ```
    /// use snmp_fleet::{Syntax, Value};
    ///
    /// assert_eq!(Value::parse_as(Syntax::Gauge32, "42").unwrap(), Value::Gauge32(42));
    /// assert!(Value::parse_as(Syntax::Integer, "forty-two").is_err());
    /// ```
    pub fn parse_as(syntax: Syntax, text: &str) -> Result<Value> {
        let invalid = || Error::InvalidValue {
            syntax,
            input: text.into(),
        };
        let trimmed = text.trim();

        let value = match syntax {
            Syntax::Integer => Value::Integer(trimmed.parse().map_err(|_| invalid())?),
            Syntax::OctetString => {
                Value::OctetString(Bytes::from(octets_from_text(text).ok_or_else(invalid)?))
            }
            Syntax::ObjectIdentifier => {
                Value::ObjectIdentifier(Oid::parse(trimmed).map_err(|_| invalid())?)
            }
            Syntax::IpAddress => {
                let addr: Ipv4Addr = trimmed.parse().map_err(|_| invalid())?;
                Value::IpAddress(addr.octets())
            }
            Syntax::Counter32 => Value::Counter32(trimmed.parse().map_err(|_| invalid())?),
            Syntax::Gauge32 => Value::Gauge32(trimmed.parse().map_err(|_| invalid())?),
            Syntax::TimeTicks => Value::TimeTicks(trimmed.parse().map_err(|_| invalid())?),
            Syntax::Opaque => Value::Opaque(Bytes::from(decode_hex(trimmed).ok_or_else(invalid)?)),
            Syntax::Counter64 => Value::Counter64(trimmed.parse().map_err(|_| invalid())?),
            Syntax::Null => return Err(invalid()),
        };
        Ok(value)
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Integer(v) => write!(f, "{}", v),
            Value::OctetString(data) => match std::str::from_utf8(data) {
                Ok(s) if !s.chars().any(|c| c.is_control() && c != '\n' && c != '\r' && c != '\t') => {
                    write!(f, "{}", s)
                }
                _ => write!(f, "0x{}", encode_hex(data)),
            },
            Value::Null => write!(f, "NULL"),
            Value::ObjectIdentifier(oid) => write!(f, "{}", oid),
            Value::IpAddress(addr) => {
                write!(f, "{}.{}.{}.{}", addr[0], addr[1], addr[2], addr[3])
            }
            Value::Counter32(v) => write!(f, "{}", v),
            Value::Gauge32(v) => write!(f, "{}", v),
            Value::TimeTicks(v) => {
                let centis = v % 100;
                let secs = v / 100;
                let days = secs / 86400;
                let hours = (secs % 86400) / 3600;
                let mins = (secs % 3600) / 60;
                let s = secs % 60;
                match days {
                    0 => {}
                    1 => write!(f, "1 day, ")?,
                    n => write!(f, "{} days, ", n)?,
                }
                write!(f, "{}:{:02}:{:02}.{:02}", hours, mins, s, centis)
            }
            Value::Opaque(data) => write!(f, "Opaque(0x{})", encode_hex(data)),
            Value::Counter64(v) => write!(f, "{}", v),
            Value::NoSuchObject => write!(f, "noSuchObject"),
            Value::NoSuchInstance => write!(f, "noSuchInstance"),
            Value::EndOfMibView => write!(f, "endOfMibView"),
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::OctetString(Bytes::copy_from_slice(s.as_bytes()))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::OctetString(Bytes::from(s))
    }
}

impl From<Oid> for Value {
    fn from(oid: Oid) -> Self {
        Value::ObjectIdentifier(oid)
    }
}

/// SMI syntax of a value.
///
/// Remembered per subscription (and persisted) so that writes and value
/// typing work without rediscovering the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Syntax {
    #[serde(rename = "INTEGER")]
    Integer,
    #[serde(rename = "OCTET STRING")]
    OctetString,
    #[serde(rename = "NULL")]
    Null,
    #[serde(rename = "OBJECT IDENTIFIER")]
    ObjectIdentifier,
    #[serde(rename = "IpAddress")]
    IpAddress,
    #[serde(rename = "Counter32")]
    Counter32,
    #[serde(rename = "Gauge32")]
    Gauge32,
    #[serde(rename = "TimeTicks")]
    TimeTicks,
    #[serde(rename = "Opaque")]
    Opaque,
    #[serde(rename = "Counter64")]
    Counter64,
}

impl Syntax {
    /// Whether values of this syntax read as numbers.
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            Syntax::Integer | Syntax::Counter32 | Syntax::Gauge32 | Syntax::Counter64
        )
    }
}

impl std::fmt::Display for Syntax {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Syntax::Integer => "INTEGER",
            Syntax::OctetString => "OCTET STRING",
            Syntax::Null => "NULL",
            Syntax::ObjectIdentifier => "OBJECT IDENTIFIER",
            Syntax::IpAddress => "IpAddress",
            Syntax::Counter32 => "Counter32",
            Syntax::Gauge32 => "Gauge32",
            Syntax::TimeTicks => "TimeTicks",
            Syntax::Opaque => "Opaque",
            Syntax::Counter64 => "Counter64",
        };
        f.write_str(name)
    }
}
