//! Subtree walk stream.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;

use crate::device::{DeviceEntry, Subscription};
use crate::engine::{BoxFuture, ProtocolEngine};
use crate::error::{Error, Result};
use crate::oid::Oid;
use crate::schema::{SchemaLease, SchemaSet};
use crate::target::Target;
use crate::value::Value;
use crate::varbind::VarBind;

/// Async stream walking a device subtree with GETNEXT.
///
/// Every varbind yielded is also recorded on the device as a configured
/// subscription, labelled with its resolved name. The stream holds a schema
/// lease until dropped.
///
/// Created by [`Fleet::walk()`](super::Fleet::walk).
pub struct Walk {
    engine: Arc<dyn ProtocolEngine>,
    target: Arc<Target>,
    device: Arc<DeviceEntry>,
    schema: Option<Arc<SchemaSet>>,
    base_oid: Oid,
    current_oid: Oid,
    /// Last OID returned to the caller, for detecting agents that loop.
    last_returned_oid: Option<Oid>,
    done: bool,
    pending: Option<BoxFuture<'static, Result<Option<VarBind>>>>,
    _lease: SchemaLease,
}

impl Walk {
    pub(crate) fn new(
        engine: Arc<dyn ProtocolEngine>,
        target: Arc<Target>,
        device: Arc<DeviceEntry>,
        schema: Option<Arc<SchemaSet>>,
        lease: SchemaLease,
        oid: Oid,
    ) -> Self {
        Self {
            engine,
            target,
            device,
            schema,
            base_oid: oid.clone(),
            current_oid: oid,
            last_returned_oid: None,
            done: false,
            pending: None,
            _lease: lease,
        }
    }

    fn materialize(&self, vb: &VarBind) {
        if !self.device.is_live() {
            return;
        }
        let label = match &self.schema {
            Some(set) => set.resolve(&vb.oid),
            None => vb.oid.to_string(),
        };
        let mut state = self.device.write();
        let subscription = state
            .subscriptions
            .entry(vb.oid.clone())
            .or_insert_with(|| Subscription::new(label.clone()));
        subscription.label = label;
        subscription.record_value(vb.value.clone());
    }
}

impl Stream for Walk {
    type Item = Result<VarBind>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }

        let pending = this.pending.get_or_insert_with(|| {
            let engine = this.engine.clone();
            let target = this.target.clone();
            let oid = this.current_oid.clone();
            let fut: BoxFuture<'static, _> = Box::pin(async move { engine.get_next(&target, &oid).await });
            fut
        });

        let result = match pending.as_mut().poll(cx) {
            Poll::Pending => return Poll::Pending,
            Poll::Ready(result) => result,
        };
        this.pending = None;

        match result {
            Ok(Some(vb)) => {
                if matches!(vb.value, Value::EndOfMibView) || !vb.oid.starts_with(&this.base_oid) {
                    this.done = true;
                    return Poll::Ready(None);
                }

                // Agents that loop would otherwise walk forever
                if let Some(last_oid) = this.last_returned_oid.take()
                    && vb.oid <= last_oid
                {
                    this.done = true;
                    return Poll::Ready(Some(Err(Error::NonIncreasingOid {
                        previous: last_oid,
                        current: vb.oid,
                    })));
                }

                this.materialize(&vb);
                this.current_oid = vb.oid.clone();
                this.last_returned_oid = Some(vb.oid.clone());
                Poll::Ready(Some(Ok(vb)))
            }
            Ok(None) => {
                this.done = true;
                Poll::Ready(None)
            }
            Err(e) => {
                tracing::warn!(
                    snmp.device = this.device.name(),
                    snmp.oid = %this.current_oid,
                    error = %e,
                    "walk aborted"
                );
                this.done = true;
                Poll::Ready(Some(Err(e)))
            }
        }
    }
}
