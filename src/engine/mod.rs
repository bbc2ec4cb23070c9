//! Protocol engine seam.
//!
//! The fleet never encodes PDUs or owns sockets. It drives a
//! [`ProtocolEngine`] with [`Target`]s and receives inbound notifications
//! through the stream returned by [`ProtocolEngine::listen`].
//!
//! [`MockEngine`] is a scriptable in-memory engine used by the test suite
//! and handy for dry runs.

mod mock;

pub use mock::{MockEngine, RecordedRequest, RequestKind};

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;

use tokio::sync::mpsc;

use crate::error::Result;
use crate::oid::Oid;
use crate::target::Target;
use crate::varbind::VarBind;

/// Type alias for boxed async return type (dyn-compatible).
///
/// Engine methods return `BoxFuture` so that an engine can be held as
/// `Arc<dyn ProtocolEngine>` and shared between the scheduler, walks and
/// the trap listener.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Receiving half of the engine's notification listener.
///
/// The listener stops when the engine drops its sender.
pub type NotificationStream = mpsc::Receiver<InboundNotification>;

/// Request/response operations plus the shared notification listener.
///
/// # Errors
///
/// Transport failures (no reply within `timeout x (retries + 1)`) are
/// reported as [`Error::Timeout`](crate::Error::Timeout); agent error
/// statuses as [`Error::Snmp`](crate::Error::Snmp).
///
/// # Bounds
///
/// Engines are stored as `Arc<dyn ProtocolEngine>` for the lifetime of a
/// fleet, hence `Send + Sync + 'static`.
pub trait ProtocolEngine: Send + Sync + 'static {
    /// GET a single OID. Exceptions (`noSuchObject` and friends) come back
    /// as values, not errors.
    fn get<'a>(&'a self, target: &'a Target, oid: &'a Oid) -> BoxFuture<'a, Result<VarBind>>;

    /// GETNEXT. `None` means the agent reported the end of its MIB view.
    fn get_next<'a>(
        &'a self,
        target: &'a Target,
        oid: &'a Oid,
    ) -> BoxFuture<'a, Result<Option<VarBind>>>;

    /// SET a single varbind, returning the agent's echo.
    fn set<'a>(&'a self, target: &'a Target, varbind: VarBind) -> BoxFuture<'a, Result<VarBind>>;

    /// Bind the notification listener.
    ///
    /// Called once per fleet. Bind failures are returned as
    /// [`Error::Io`](crate::Error::Io).
    fn listen(&self, addr: SocketAddr) -> BoxFuture<'_, Result<NotificationStream>>;
}

/// Notification PDU contents relevant to routing and logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationPdu {
    /// SNMPv1 Trap-PDU.
    TrapV1 {
        enterprise: Oid,
        agent_addr: [u8; 4],
        generic_trap: i32,
        specific_trap: i32,
        /// sysUpTime at the agent, in hundredths of seconds
        timestamp: u32,
        varbinds: Vec<VarBind>,
    },
    /// SNMPv2c/v3 trap or inform. Varbinds include `sysUpTime.0` and
    /// `snmpTrapOID.0` as sent.
    Notification {
        request_id: i32,
        varbinds: Vec<VarBind>,
    },
}

impl NotificationPdu {
    /// Request id; v1 traps have none and report 0.
    pub fn request_id(&self) -> i32 {
        match self {
            NotificationPdu::TrapV1 { .. } => 0,
            NotificationPdu::Notification { request_id, .. } => *request_id,
        }
    }

    /// Variable bindings in PDU order.
    pub fn varbinds(&self) -> &[VarBind] {
        match self {
            NotificationPdu::TrapV1 { varbinds, .. } => varbinds,
            NotificationPdu::Notification { varbinds, .. } => varbinds,
        }
    }
}

/// A notification together with the address it arrived from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundNotification {
    pub source: SocketAddr,
    pub pdu: NotificationPdu,
}

impl InboundNotification {
    /// Wrap a v2c/v3 notification.
    pub fn v2(source: SocketAddr, request_id: i32, varbinds: Vec<VarBind>) -> Self {
        Self {
            source,
            pdu: NotificationPdu::Notification {
                request_id,
                varbinds,
            },
        }
    }
}
