//! Prelude module for convenient imports.
//!
//! ```rust,no_run
//! use snmp_fleet::prelude::*;
//! ```
//!
//! This imports:
//! - The facade: [`Fleet`], [`FleetConfig`], [`TargetConfig`]
//! - Core types: [`Oid`], [`Value`], [`VarBind`], [`Syntax`]
//! - Error handling: [`Error`], [`Result`]
//! - The [`ProtocolEngine`] seam
//! - The [`oid!`] macro for compile-time OID construction

pub use crate::config::FleetConfig;
pub use crate::engine::ProtocolEngine;
pub use crate::error::{Error, Result};
pub use crate::fleet::Fleet;
pub use crate::oid::Oid;
pub use crate::target::{DeviceStatus, TargetConfig};
pub use crate::value::{Syntax, Value};
pub use crate::varbind::VarBind;
pub use crate::version::Version;

#[doc(no_inline)]
pub use crate::oid;
