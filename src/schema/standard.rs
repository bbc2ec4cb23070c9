//! Modules compiled into the binary and present in every loaded set.

use std::sync::Arc;

use super::parser::{MibModule, parse_module};

const STANDARD_DOCUMENTS: &[(&str, &str)] = &[
    ("SNMPv2-SMI", include_str!("../../mibs/SNMPv2-SMI.txt")),
    ("SNMPv2-MIB", include_str!("../../mibs/SNMPv2-MIB.txt")),
    ("IF-MIB", include_str!("../../mibs/IF-MIB.txt")),
];

/// Parse the embedded standard modules.
///
/// A module that fails to parse is logged and left out.
pub fn standard_modules() -> Vec<Arc<MibModule>> {
    STANDARD_DOCUMENTS
        .iter()
        .filter_map(|(name, text)| match parse_module(text) {
            Ok(module) => Some(Arc::new(module)),
            Err(e) => {
                tracing::warn!(schema.document = *name, error = %e, "standard schema skipped");
                None
            }
        })
        .collect()
}
