//! Resolved symbol table.

use std::collections::HashMap;
use std::sync::Arc;

use super::parser::MibModule;
use crate::oid::Oid;

/// Roots every module may refer to without importing.
const ROOTS: &[(&str, u32)] = &[("ccitt", 0), ("iso", 1), ("joint-iso-ccitt", 2)];

/// A named OID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    /// Module that defined it.
    pub module: String,
}

/// Immutable set of loaded symbols.
///
/// Built in one go from a list of modules and never mutated afterwards;
/// loading a different set of documents builds a new `SchemaSet`.
#[derive(Debug, Default)]
pub struct SchemaSet {
    modules: Vec<Arc<MibModule>>,
    by_oid: HashMap<Oid, Symbol>,
    by_name: HashMap<String, Oid>,
}

impl SchemaSet {
    /// Resolve every definition of `modules` to a numeric OID.
    ///
    /// Definitions may refer to names from any module in the list,
    /// regardless of order. When two definitions share a name or an OID,
    /// the first one (in module order) wins. Definitions whose parent never
    /// resolves are dropped.
    pub fn build(modules: &[MibModule]) -> Self {
        Self::from_shared(modules.iter().cloned().map(Arc::new).collect())
    }

    pub(crate) fn from_shared(modules: Vec<Arc<MibModule>>) -> Self {
        let mut names: HashMap<String, Oid> = ROOTS
            .iter()
            .map(|(name, arc)| (name.to_string(), Oid::from_slice(&[*arc])))
            .collect();
        let mut by_oid = HashMap::new();
        let mut by_name = HashMap::new();

        let mut pending: Vec<(&MibModule, usize)> = modules
            .iter()
            .flat_map(|m| (0..m.definitions.len()).map(move |i| (m.as_ref(), i)))
            .collect();

        // Each pass resolves at least one definition or stops
        loop {
            let before = pending.len();
            pending.retain(|(module, index)| {
                let def = &module.definitions[*index];
                let base = match &def.parent {
                    None => Oid::empty(),
                    Some(parent) => match names.get(parent) {
                        Some(oid) => oid.clone(),
                        None => return true,
                    },
                };
                let oid = base.join(&def.arcs);
                if oid.is_empty() {
                    return false;
                }
                if !names.contains_key(&def.name) {
                    names.insert(def.name.clone(), oid.clone());
                    by_name.insert(def.name.clone(), oid.clone());
                    by_oid.entry(oid).or_insert_with(|| Symbol {
                        name: def.name.clone(),
                        module: module.name.clone(),
                    });
                }
                false
            });
            if pending.is_empty() || pending.len() == before {
                break;
            }
        }

        if !pending.is_empty() {
            tracing::debug!(
                unresolved = pending.len(),
                "schema definitions with unknown parents dropped"
            );
        }

        Self {
            modules,
            by_oid,
            by_name,
        }
    }

    /// Build directly from `(oid, name)` pairs.
    pub fn from_symbols<'a>(symbols: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut set = Self::default();
        for (oid, name) in symbols {
            let Ok(oid) = Oid::parse(oid) else { continue };
            set.by_name.entry(name.to_string()).or_insert_with(|| oid.clone());
            set.by_oid.entry(oid).or_insert_with(|| Symbol {
                name: name.to_string(),
                module: String::new(),
            });
        }
        set
    }

    /// Longest-prefix resolution: `1.3.6.1.2.1.1.5.0` becomes `sysName.0`.
    ///
    /// OIDs with no loaded prefix come back in dotted form.
    pub fn resolve(&self, oid: &Oid) -> String {
        let arcs = oid.arcs();
        for len in (1..=arcs.len()).rev() {
            if let Some(symbol) = self.by_oid.get(&Oid::from_slice(&arcs[..len])) {
                let mut out = symbol.name.clone();
                for arc in &arcs[len..] {
                    out.push('.');
                    out.push_str(&arc.to_string());
                }
                return out;
            }
        }
        oid.to_string()
    }

    /// OID of a symbol by name.
    pub fn lookup(&self, name: &str) -> Option<&Oid> {
        self.by_name.get(name)
    }

    /// Symbol defined at exactly `oid`.
    pub fn symbol(&self, oid: &Oid) -> Option<&Symbol> {
        self.by_oid.get(oid)
    }

    /// Inverse of [`resolve`](Self::resolve): accepts dotted numbers or
    /// `name[.arcs]`.
    pub fn parse_name(&self, text: &str) -> Option<Oid> {
        let text = text.trim();
        if let Ok(oid) = Oid::parse(text) {
            return Some(oid);
        }
        let (name, rest) = match text.split_once('.') {
            Some((name, rest)) => (name, rest),
            None => (text, ""),
        };
        let base = self.lookup(name)?;
        let suffix = Oid::parse(rest).ok()?;
        Some(base.join(suffix.arcs()))
    }

    /// Names of the modules this set was built from.
    pub fn module_names(&self) -> impl Iterator<Item = &str> {
        self.modules.iter().map(|m| m.name.as_str())
    }

    pub(crate) fn modules(&self) -> &[Arc<MibModule>] {
        &self.modules
    }

    /// Number of resolved symbols.
    pub fn len(&self) -> usize {
        self.by_oid.len()
    }

    /// Whether no symbols resolved.
    pub fn is_empty(&self) -> bool {
        self.by_oid.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid;
    use crate::schema::parse_module;
    use proptest::prelude::*;

    #[test]
    fn test_longest_prefix() {
        let set = SchemaSet::from_symbols([("1.3.6.1.2.1", "mib2"), ("1.3.6.1.2.1.1", "system")]);
        assert_eq!(set.resolve(&oid!(1, 3, 6, 1, 2, 1, 1, 5)), "system.5");
        assert_eq!(set.resolve(&oid!(1, 3, 6, 1, 2, 1, 2)), "mib2.2");
        assert_eq!(set.resolve(&oid!(1, 3, 6, 1, 2, 1, 1)), "system");
        assert_eq!(set.resolve(&oid!(9, 9, 9)), "9.9.9");
        assert_eq!(set.resolve(&Oid::empty()), "");
    }

    #[test]
    fn test_build_resolves_across_modules_out_of_order() {
        let child = parse_module(
            "CHILD-MIB DEFINITIONS ::= BEGIN\n\
             sysName OBJECT IDENTIFIER ::= { system 5 }\n\
             END",
        )
        .unwrap();
        let parent = parse_module(
            "PARENT-MIB DEFINITIONS ::= BEGIN\n\
             mib-2 OBJECT IDENTIFIER ::= { iso 3 6 1 2 1 }\n\
             system OBJECT IDENTIFIER ::= { mib-2 1 }\n\
             orphan OBJECT IDENTIFIER ::= { nowhere 1 }\n\
             END",
        )
        .unwrap();

        let set = SchemaSet::build(&[child, parent]);
        assert_eq!(set.lookup("sysName"), Some(&oid!(1, 3, 6, 1, 2, 1, 1, 5)));
        assert_eq!(set.resolve(&oid!(1, 3, 6, 1, 2, 1, 1, 5, 0)), "sysName.0");
        assert_eq!(set.symbol(&oid!(1, 3, 6, 1, 2, 1, 1)).unwrap().module, "PARENT-MIB");
        assert!(set.lookup("orphan").is_none());
        // Roots anchor values but do not resolve on their own
        assert_eq!(set.resolve(&oid!(1, 2)), "1.2");
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_first_definition_wins() {
        let a = parse_module("A DEFINITIONS ::= BEGIN x OBJECT IDENTIFIER ::= { 1 3 } END").unwrap();
        let b = parse_module("B DEFINITIONS ::= BEGIN x OBJECT IDENTIFIER ::= { 1 4 } y OBJECT IDENTIFIER ::= { 1 3 } END").unwrap();
        let set = SchemaSet::build(&[a, b]);
        assert_eq!(set.lookup("x"), Some(&oid!(1, 3)));
        assert_eq!(set.resolve(&oid!(1, 3)), "x");
        assert_eq!(set.lookup("y"), Some(&oid!(1, 3)));
    }

    #[test]
    fn test_parse_name() {
        let set = SchemaSet::from_symbols([("1.3.6.1.2.1.1.5", "sysName")]);
        assert_eq!(set.parse_name("sysName.0"), Some(oid!(1, 3, 6, 1, 2, 1, 1, 5, 0)));
        assert_eq!(set.parse_name("sysName"), Some(oid!(1, 3, 6, 1, 2, 1, 1, 5)));
        assert_eq!(set.parse_name(".1.3.6"), Some(oid!(1, 3, 6)));
        assert_eq!(set.parse_name("unknown.0"), None);
        assert_eq!(set.parse_name("sysName.x"), None);
    }

    proptest! {
        #[test]
        fn prop_resolve_round_trips(suffix in proptest::collection::vec(0u32..100_000, 0..6)) {
            let set = SchemaSet::from_symbols([("1.3.6.1.2.1", "mib2"), ("1.3.6.1.2.1.1", "system")]);
            let oid = oid!(1, 3, 6, 1, 2, 1).join(&suffix);
            let name = set.resolve(&oid);
            prop_assert!(name.starts_with("mib2") || name.starts_with("system"));
            prop_assert_eq!(set.parse_name(&name), Some(oid));
        }

        #[test]
        fn prop_unmatched_stays_numeric(arcs in proptest::collection::vec(0u32..1000, 1..8)) {
            let set = SchemaSet::from_symbols([("1.3.6.1.2.1", "mib2")]);
            let oid = Oid::new(arcs);
            prop_assume!(!oid.starts_with(&oid!(1, 3, 6, 1, 2, 1)));
            prop_assert_eq!(set.resolve(&oid), oid.to_string());
        }
    }
}
