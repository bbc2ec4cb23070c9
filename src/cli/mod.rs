//! Support code for the `fleet-check` utility.
//!
//! This module is only available with the `cli` feature.

pub mod args;
pub mod output;
