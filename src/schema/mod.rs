//! MIB schemas: parsing, storage and the reference-counted resolver.
//!
//! A [`SchemaSet`] maps numeric OIDs to symbolic names. The embedded
//! standard modules are always part of a loaded set; user documents live in
//! a [`DocumentStore`] directory and can be added or removed at runtime.
//! [`SchemaResolver`] owns the set and loads or unloads it in the background
//! according to the number of outstanding [`SchemaLease`]s.

mod lexer;
mod parser;
mod resolver;
mod set;
mod standard;
mod store;

pub use parser::{Definition, MibModule, parse_module};
pub use resolver::{SchemaLease, SchemaResolver, SchemaState};
pub use set::{SchemaSet, Symbol};
pub use standard::standard_modules;
pub use store::{DocumentStore, document_name, strip_leading_comments};
