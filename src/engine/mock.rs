//! Scriptable in-memory engine.

use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::ops::Bound;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;

use super::{BoxFuture, InboundNotification, NotificationStream, ProtocolEngine};
use crate::error::{Error, ErrorStatus, Result};
use crate::oid::Oid;
use crate::target::Target;
use crate::util::lock;
use crate::value::Value;
use crate::varbind::VarBind;

/// Request type recorded by [`MockEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Get,
    GetNext,
    Set,
}

/// A request as seen by the mock, timestamped when it was issued.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub kind: RequestKind,
    pub target: SocketAddr,
    pub oid: Oid,
    pub at: Instant,
}

#[derive(Default)]
struct Inner {
    agents: HashMap<SocketAddr, BTreeMap<Oid, Value>>,
    delay: Duration,
    requests: Vec<RecordedRequest>,
    in_flight: HashMap<(SocketAddr, Oid), usize>,
    max_in_flight: usize,
    listener: Option<mpsc::Sender<InboundNotification>>,
    listen_addr: Option<SocketAddr>,
    fail_listen: bool,
}

/// Mock protocol engine.
///
/// Agents are value tables keyed by address. Requests to an address with
/// no agent time out. Every request is recorded, and the number of
/// concurrent requests per (agent, OID) is tracked so tests can assert
/// that polling never overlaps itself.
///
/// Clones share state.
#[derive(Clone, Default)]
pub struct MockEngine {
    inner: Arc<Mutex<Inner>>,
}

impl MockEngine {
    /// Create an engine with no agents.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an (empty) agent answering at `addr`.
    pub fn add_agent(&self, addr: SocketAddr) -> &Self {
        lock(&self.inner).agents.entry(addr).or_default();
        self
    }

    /// Remove an agent; later requests to it time out.
    pub fn remove_agent(&self, addr: SocketAddr) {
        lock(&self.inner).agents.remove(&addr);
    }

    /// Set a value on an agent, creating the agent if needed.
    pub fn set_value(&self, addr: SocketAddr, oid: Oid, value: impl Into<Value>) -> &Self {
        lock(&self.inner)
            .agents
            .entry(addr)
            .or_default()
            .insert(oid, value.into());
        self
    }

    /// Current value held by an agent.
    pub fn value(&self, addr: SocketAddr, oid: &Oid) -> Option<Value> {
        lock(&self.inner).agents.get(&addr)?.get(oid).cloned()
    }

    /// Delay every response by `delay`.
    pub fn set_delay(&self, delay: Duration) {
        lock(&self.inner).delay = delay;
    }

    /// Make the next `listen` call fail as if the port were taken.
    pub fn fail_listen(&self) {
        lock(&self.inner).fail_listen = true;
    }

    /// Address the listener was bound to, if `listen` succeeded.
    pub fn listen_addr(&self) -> Option<SocketAddr> {
        lock(&self.inner).listen_addr
    }

    /// Deliver a notification to the listener.
    ///
    /// Returns `false` if nothing is listening.
    pub async fn inject(&self, notification: InboundNotification) -> bool {
        let sender = lock(&self.inner).listener.clone();
        match sender {
            Some(tx) => tx.send(notification).await.is_ok(),
            None => false,
        }
    }

    /// Close the listener, ending the notification stream.
    pub fn close_listener(&self) {
        lock(&self.inner).listener = None;
    }

    /// All requests recorded so far.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.inner).requests.clone()
    }

    /// Issue times of GET requests for one OID on one agent.
    pub fn get_times(&self, addr: SocketAddr, oid: &Oid) -> Vec<Instant> {
        lock(&self.inner)
            .requests
            .iter()
            .filter(|r| r.kind == RequestKind::Get && r.target == addr && &r.oid == oid)
            .map(|r| r.at)
            .collect()
    }

    /// Highest number of simultaneous requests seen for any single (agent, OID).
    pub fn max_in_flight(&self) -> usize {
        lock(&self.inner).max_in_flight
    }

    /// Forget recorded requests.
    pub fn clear_requests(&self) {
        lock(&self.inner).requests.clear();
    }

    fn begin(&self, kind: RequestKind, target: &Target, oid: &Oid) -> InFlight {
        let addr = target.address();
        let mut inner = lock(&self.inner);
        inner.requests.push(RecordedRequest {
            kind,
            target: addr,
            oid: oid.clone(),
            at: Instant::now(),
        });
        let count = inner.in_flight.entry((addr, oid.clone())).or_default();
        *count += 1;
        let count = *count;
        inner.max_in_flight = inner.max_in_flight.max(count);
        InFlight {
            engine: self.clone(),
            key: (addr, oid.clone()),
            delay: inner.delay,
        }
    }

    fn with_agent<T>(
        &self,
        target: &Target,
        f: impl FnOnce(&mut BTreeMap<Oid, Value>) -> Result<T>,
    ) -> Result<T> {
        let mut inner = lock(&self.inner);
        match inner.agents.get_mut(&target.address()) {
            Some(table) => f(table),
            None => Err(Error::Timeout {
                target: Some(target.address()),
                elapsed: target.timeout() * (target.retries() + 1),
                retries: target.retries(),
            }),
        }
    }
}

impl std::fmt::Debug for MockEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = lock(&self.inner);
        f.debug_struct("MockEngine")
            .field("agents", &inner.agents.len())
            .field("requests", &inner.requests.len())
            .finish()
    }
}

/// Decrements the in-flight count when the request finishes or is dropped.
struct InFlight {
    engine: MockEngine,
    key: (SocketAddr, Oid),
    delay: Duration,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        let mut inner = lock(&self.engine.inner);
        if let Some(count) = inner.in_flight.get_mut(&self.key) {
            *count = count.saturating_sub(1);
        }
    }
}

impl ProtocolEngine for MockEngine {
    fn get<'a>(&'a self, target: &'a Target, oid: &'a Oid) -> BoxFuture<'a, Result<VarBind>> {
        Box::pin(async move {
            let guard = self.begin(RequestKind::Get, target, oid);
            tokio::time::sleep(guard.delay).await;
            self.with_agent(target, |table| {
                let value = table.get(oid).cloned().unwrap_or(Value::NoSuchObject);
                Ok(VarBind::new(oid.clone(), value))
            })
        })
    }

    fn get_next<'a>(
        &'a self,
        target: &'a Target,
        oid: &'a Oid,
    ) -> BoxFuture<'a, Result<Option<VarBind>>> {
        Box::pin(async move {
            let guard = self.begin(RequestKind::GetNext, target, oid);
            tokio::time::sleep(guard.delay).await;
            self.with_agent(target, |table| {
                Ok(table
                    .range::<Oid, _>((Bound::Excluded(oid), Bound::Unbounded))
                    .next()
                    .map(|(oid, value)| VarBind::new(oid.clone(), value.clone())))
            })
        })
    }

    fn set<'a>(&'a self, target: &'a Target, varbind: VarBind) -> BoxFuture<'a, Result<VarBind>> {
        Box::pin(async move {
            let guard = self.begin(RequestKind::Set, target, &varbind.oid);
            tokio::time::sleep(guard.delay).await;
            self.with_agent(target, |table| {
                let snmp_error = |status| Error::Snmp {
                    target: Some(target.address()),
                    status,
                    index: 1,
                    oid: Some(varbind.oid.clone()),
                };
                let Some(current) = table.get_mut(&varbind.oid) else {
                    return Err(snmp_error(ErrorStatus::NoCreation));
                };
                if current.syntax() != varbind.value.syntax() {
                    return Err(snmp_error(ErrorStatus::WrongType));
                }
                *current = varbind.value.clone();
                Ok(varbind.clone())
            })
        })
    }

    fn listen(&self, addr: SocketAddr) -> BoxFuture<'_, Result<NotificationStream>> {
        Box::pin(async move {
            let mut inner = lock(&self.inner);
            if std::mem::take(&mut inner.fail_listen) {
                return Err(Error::Io {
                    target: Some(addr),
                    source: std::io::Error::new(
                        std::io::ErrorKind::AddrInUse,
                        "address already in use",
                    ),
                });
            }
            let (tx, rx) = mpsc::channel(64);
            inner.listener = Some(tx);
            inner.listen_addr = Some(addr);
            Ok(rx)
        })
    }
}
