// Error carries OIDs inline; boxing them buys little.
#![allow(clippy::result_large_err)]

//! # snmp-fleet
//!
//! Async management of a fleet of SNMP devices.
//!
//! ## Features
//!
//! - Per-device target configuration for SNMPv1, v2c and v3 (USM
//!   noAuthNoPriv, authNoPriv and authPriv)
//! - Subscription-driven polling with one cancellable task per observed OID
//! - A shared trap listener that fans notifications out to device logs
//! - MIB parsing and OID-to-name resolution with lease-counted hot reload
//! - JSON state persistence
//!
//! PDU encoding and transport are left to a [`ProtocolEngine`]
//! implementation. [`MockEngine`] is a scriptable in-memory engine.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use snmp_fleet::{Fleet, FleetConfig, MockEngine, TargetConfig, oid};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), snmp_fleet::Error> {
//!     let fleet = Fleet::new(Arc::new(MockEngine::new()), FleetConfig::from_env());
//!
//!     fleet.add_device("core", TargetConfig::community("192.168.1.1", "public"))?;
//!     fleet.add_device(
//!         "edge",
//!         TargetConfig::user("192.168.1.2", "admin")
//!             .with_auth("SHA", "authpass123")
//!             .with_privacy("AES", "privpass123"),
//!     )?;
//!
//!     let sysname = oid!(1, 3, 6, 1, 2, 1, 1, 5, 0);
//!     fleet.add_subscription("core", sysname.clone(), None).await?;
//!     fleet.start_observing("core", &sysname)?;
//!
//!     if let Err(e) = fleet.start_trap_listener().await {
//!         eprintln!("traps unavailable: {e}");
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod device;
pub mod engine;
pub mod error;
pub mod fleet;
pub mod oid;
pub mod poll;
pub mod prelude;
pub mod schema;
pub mod state;
pub mod target;
pub mod trap;
pub mod value;
pub mod varbind;
pub mod version;

pub(crate) mod util;

#[cfg(feature = "cli")]
pub mod cli;

pub use config::FleetConfig;
pub use device::{Device, DeviceDirectory, Subscription, TrapLog, TrapRecord};
pub use engine::{InboundNotification, MockEngine, NotificationPdu, ProtocolEngine};
pub use error::{Error, ErrorStatus, Result};
pub use fleet::{Fleet, Walk};
pub use oid::Oid;
pub use poll::PollScheduler;
pub use schema::{SchemaResolver, SchemaSet};
pub use state::FleetState;
pub use target::{DeviceStatus, SecurityLevel, Target, TargetConfig};
pub use trap::TrapRouter;
pub use value::{Syntax, Value};
pub use varbind::VarBind;
pub use version::Version;
