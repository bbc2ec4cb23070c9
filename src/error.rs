//! Error types for snmp-fleet.
//!
//! All errors are `#[non_exhaustive]` to allow adding new variants without breaking changes.

use std::net::SocketAddr;
use std::time::Duration;

/// Result type alias using the library's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Device configuration error kinds.
///
/// The `Display` form of each kind is what ends up in a device's
/// `Failed(reason)` status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigErrorKind {
    /// Address is not of the form `host/port`, or the host does not resolve.
    InvalidAddress,
    /// Authentication protocol name is not one of NONE, MD5, SHA.
    UnsupportedAuthProtocol(String),
    /// Privacy protocol name is not one of NONE, DES, AES128, AES192, AES256.
    UnsupportedPrivProtocol(String),
    /// Protocol version is not one of 1, 2c, 3.
    UnknownVersion(String),
    /// Engine id is neither raw text nor well-formed `0x` hex.
    InvalidEngineId,
}

impl std::fmt::Display for ConfigErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidAddress => write!(f, "invalid address"),
            Self::UnsupportedAuthProtocol(name) => {
                write!(f, "unsupported auth protocol: {}", name)
            }
            Self::UnsupportedPrivProtocol(name) => {
                write!(f, "unsupported priv protocol: {}", name)
            }
            Self::UnknownVersion(v) => write!(f, "unknown SNMP version: {}", v),
            Self::InvalidEngineId => write!(f, "invalid engine id"),
        }
    }
}

/// Schema (MIB) document error kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaErrorKind {
    /// Nothing left after stripping leading comment lines.
    EmptyDocument,
    /// Module name would escape the schema directory.
    InvalidName,
    /// No `Name DEFINITIONS ::= BEGIN` header.
    MissingHeader,
    /// Unexpected token while reading an assignment.
    UnexpectedToken { line: usize, found: String },
    /// Input ended inside a construct.
    UnexpectedEof,
    /// No stored document with this name.
    NotFound,
}

impl std::fmt::Display for SchemaErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyDocument => write!(f, "document is empty after removing comments"),
            Self::InvalidName => write!(f, "invalid module name"),
            Self::MissingHeader => write!(f, "missing DEFINITIONS ::= BEGIN header"),
            Self::UnexpectedToken { line, found } => {
                write!(f, "unexpected '{}' at line {}", found, line)
            }
            Self::UnexpectedEof => write!(f, "unexpected end of document"),
            Self::NotFound => write!(f, "document not found"),
        }
    }
}

/// OID validation error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OidErrorKind {
    /// Invalid arc value.
    InvalidArc,
    /// OID has too many arcs (exceeds MAX_OID_LEN).
    TooManyArcs { count: usize, max: usize },
}

impl std::fmt::Display for OidErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidArc => write!(f, "invalid arc value"),
            Self::TooManyArcs { count, max } => {
                write!(f, "OID has {} arcs, exceeds maximum {}", count, max)
            }
        }
    }
}

/// SNMP error status codes (RFC 3416).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorStatus {
    NoError,
    TooBig,
    NoSuchName,
    BadValue,
    ReadOnly,
    GenErr,
    NoAccess,
    WrongType,
    WrongLength,
    WrongEncoding,
    WrongValue,
    NoCreation,
    InconsistentValue,
    ResourceUnavailable,
    CommitFailed,
    UndoFailed,
    AuthorizationError,
    NotWritable,
    InconsistentName,
    /// Unknown/future error status code.
    Unknown(i32),
}

impl ErrorStatus {
    /// Create from raw status code.
    pub fn from_i32(value: i32) -> Self {
        match value {
            0 => Self::NoError,
            1 => Self::TooBig,
            2 => Self::NoSuchName,
            3 => Self::BadValue,
            4 => Self::ReadOnly,
            5 => Self::GenErr,
            6 => Self::NoAccess,
            7 => Self::WrongType,
            8 => Self::WrongLength,
            9 => Self::WrongEncoding,
            10 => Self::WrongValue,
            11 => Self::NoCreation,
            12 => Self::InconsistentValue,
            13 => Self::ResourceUnavailable,
            14 => Self::CommitFailed,
            15 => Self::UndoFailed,
            16 => Self::AuthorizationError,
            17 => Self::NotWritable,
            18 => Self::InconsistentName,
            other => Self::Unknown(other),
        }
    }
}

impl std::fmt::Display for ErrorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoError => write!(f, "noError"),
            Self::TooBig => write!(f, "tooBig"),
            Self::NoSuchName => write!(f, "noSuchName"),
            Self::BadValue => write!(f, "badValue"),
            Self::ReadOnly => write!(f, "readOnly"),
            Self::GenErr => write!(f, "genErr"),
            Self::NoAccess => write!(f, "noAccess"),
            Self::WrongType => write!(f, "wrongType"),
            Self::WrongLength => write!(f, "wrongLength"),
            Self::WrongEncoding => write!(f, "wrongEncoding"),
            Self::WrongValue => write!(f, "wrongValue"),
            Self::NoCreation => write!(f, "noCreation"),
            Self::InconsistentValue => write!(f, "inconsistentValue"),
            Self::ResourceUnavailable => write!(f, "resourceUnavailable"),
            Self::CommitFailed => write!(f, "commitFailed"),
            Self::UndoFailed => write!(f, "undoFailed"),
            Self::AuthorizationError => write!(f, "authorizationError"),
            Self::NotWritable => write!(f, "notWritable"),
            Self::InconsistentName => write!(f, "inconsistentName"),
            Self::Unknown(code) => write!(f, "unknown({})", code),
        }
    }
}

/// Library error type.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// I/O error (socket bind, schema directory access).
    #[error("I/O error{}: {source}", target.map(|t| format!(" communicating with {}", t)).unwrap_or_default())]
    Io {
        target: Option<SocketAddr>,
        #[source]
        source: std::io::Error,
    },

    /// Request timed out (after retries if configured).
    #[error("timeout after {elapsed:?}{} (retries={retries})", target.map(|t| format!(" waiting for {}", t)).unwrap_or_default())]
    Timeout {
        target: Option<SocketAddr>,
        elapsed: Duration,
        retries: u32,
    },

    /// SNMP protocol error returned by agent.
    #[error("SNMP error{}: {status} at index {index}", target.map(|t| format!(" from {}", t)).unwrap_or_default())]
    Snmp {
        target: Option<SocketAddr>,
        status: ErrorStatus,
        index: u32,
        oid: Option<crate::oid::Oid>,
    },

    /// A schema document could not be stored or parsed.
    #[error("schema document '{document}': {kind}")]
    Schema {
        document: Box<str>,
        kind: SchemaErrorKind,
    },

    /// Invalid OID format.
    #[error("invalid OID: {kind}")]
    InvalidOid {
        kind: OidErrorKind,
        input: Option<Box<str>>, // Only allocated when parsing string input
    },

    /// No device with this name.
    #[error("unknown device '{name}'")]
    UnknownDevice { name: Box<str> },

    /// A device with this name already exists.
    #[error("device '{name}' already exists")]
    DuplicateDevice { name: Box<str> },

    /// The device is not subscribed to this OID.
    #[error("device '{device}' has no subscription for {oid}")]
    UnknownSubscription {
        device: Box<str>,
        oid: crate::oid::Oid,
    },

    /// Device has no usable target (its status is `Failed`).
    #[error("device '{device}' has no usable target")]
    NoTarget { device: Box<str> },

    /// Text could not be converted to a value of the subscription's syntax.
    #[error("cannot write '{input}' as {syntax}")]
    InvalidValue {
        syntax: crate::value::Syntax,
        input: Box<str>,
    },

    /// Non-increasing OID detected during walk (agent misbehavior).
    ///
    /// Returned when a walk operation receives an OID that is not
    /// lexicographically greater than the previous OID, which would
    /// cause an infinite loop. This indicates a non-conformant SNMP agent.
    #[error("walk detected non-increasing OID: {previous} >= {current}")]
    NonIncreasingOid {
        previous: crate::oid::Oid,
        current: crate::oid::Oid,
    },

    /// Saved state could not be read or written.
    #[error("state file: {source}")]
    Persist {
        #[source]
        source: serde_json::Error,
    },

    /// The fleet has been shut down.
    #[error("fleet is shut down")]
    Shutdown,
}

impl Error {
    /// Create a schema document error.
    pub fn schema(document: impl Into<Box<str>>, kind: SchemaErrorKind) -> Self {
        Self::Schema {
            document: document.into(),
            kind,
        }
    }

    /// Create an I/O error with no target.
    pub fn io(source: std::io::Error) -> Self {
        Self::Io {
            target: None,
            source,
        }
    }

    /// Create an unknown device error.
    pub fn unknown_device(name: impl Into<Box<str>>) -> Self {
        Self::UnknownDevice { name: name.into() }
    }

    /// Create an invalid OID error from a kind (no input string).
    pub fn invalid_oid(kind: OidErrorKind) -> Self {
        Self::InvalidOid { kind, input: None }
    }

    /// Create an invalid OID error with the input string that failed.
    pub fn invalid_oid_with_input(kind: OidErrorKind, input: impl Into<Box<str>>) -> Self {
        Self::InvalidOid {
            kind,
            input: Some(input.into()),
        }
    }

    /// Get the target address if this error has one.
    pub fn target(&self) -> Option<SocketAddr> {
        match self {
            Self::Io { target, .. } => *target,
            Self::Timeout { target, .. } => *target,
            Self::Snmp { target, .. } => *target,
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(source: serde_json::Error) -> Self {
        Self::Persist { source }
    }
}
