//! Lenient MIB module parser.
//!
//! Extracts the OID assignments of a module and ignores everything else:
//! type assignments, textual conventions, macro definitions, imports.

use super::lexer::{Token, TokenKind, tokenize};
use crate::error::{Error, Result, SchemaErrorKind};

/// Macros whose invocations assign an OID value.
const VALUE_MACROS: &[&str] = &[
    "OBJECT-TYPE",
    "OBJECT-IDENTITY",
    "MODULE-IDENTITY",
    "NOTIFICATION-TYPE",
    "TRAP-TYPE",
    "OBJECT-GROUP",
    "NOTIFICATION-GROUP",
    "MODULE-COMPLIANCE",
    "AGENT-CAPABILITIES",
];

/// One parsed MIB module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MibModule {
    pub name: String,
    pub definitions: Vec<Definition>,
}

/// An OID assignment: `name ::= { parent arcs... }`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Definition {
    pub name: String,
    /// Symbolic base the arcs hang off, `None` when the value is fully numeric.
    pub parent: Option<String>,
    pub arcs: Vec<u32>,
}

/// Parse a MIB module.
///
/// Fails with [`SchemaErrorKind::MissingHeader`] if there is no
/// `Name DEFINITIONS ::= BEGIN` header, or on a malformed OID value.
pub fn parse_module(source: &str) -> Result<MibModule> {
    let tokens = tokenize(source);
    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        module: String::new(),
    };
    parser.module()
}

struct Parser<'t, 'a> {
    tokens: &'t [Token<'a>],
    pos: usize,
    module: String,
}

impl<'a> Parser<'_, 'a> {
    fn peek(&self) -> Option<TokenKind<'a>> {
        self.tokens.get(self.pos).map(|t| t.kind)
    }

    fn peek_at(&self, offset: usize) -> Option<TokenKind<'a>> {
        self.tokens.get(self.pos + offset).map(|t| t.kind)
    }

    fn next(&mut self) -> Option<TokenKind<'a>> {
        let kind = self.peek()?;
        self.pos += 1;
        Some(kind)
    }

    fn error(&self, kind: SchemaErrorKind) -> Error {
        let name = if self.module.is_empty() {
            "<unnamed>"
        } else {
            self.module.as_str()
        };
        Error::schema(name, kind)
    }

    fn unexpected(&self) -> Error {
        match self.tokens.get(self.pos) {
            Some(token) => self.error(SchemaErrorKind::UnexpectedToken {
                line: token.line,
                found: token.kind.to_string(),
            }),
            None => self.error(SchemaErrorKind::UnexpectedEof),
        }
    }

    fn expect(&mut self, kind: TokenKind<'a>) -> Result<()> {
        if self.peek() == Some(kind) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn module(&mut self) -> Result<MibModule> {
        let Some(TokenKind::Ident(name)) = self.next() else {
            return Err(self.error(SchemaErrorKind::MissingHeader));
        };
        self.module = name.to_string();

        // Optional module OID: Name { iso ... } DEFINITIONS
        if self.peek() == Some(TokenKind::LBrace) {
            self.skip_braces()?;
        }
        if self.next() != Some(TokenKind::Ident("DEFINITIONS")) {
            return Err(self.error(SchemaErrorKind::MissingHeader));
        }
        // Tag defaults (IMPLICIT TAGS etc.) may sit before ::=
        loop {
            match self.next() {
                Some(TokenKind::Assign) => break,
                Some(TokenKind::Ident(_)) => {}
                _ => return Err(self.error(SchemaErrorKind::MissingHeader)),
            }
        }
        if self.next() != Some(TokenKind::Ident("BEGIN")) {
            return Err(self.error(SchemaErrorKind::MissingHeader));
        }

        let mut definitions = Vec::new();
        while let Some(kind) = self.peek() {
            match kind {
                TokenKind::Ident("END") => break,
                TokenKind::Ident("IMPORTS" | "EXPORTS") => self.skip_past_semicolon(),
                TokenKind::Ident(_) if self.peek_at(1) == Some(TokenKind::Ident("MACRO")) => {
                    self.skip_macro_definition()?
                }
                TokenKind::Ident(name) if starts_lowercase(name) => {
                    if let Some(def) = self.definition(name)? {
                        definitions.push(def);
                    }
                }
                _ => self.pos += 1,
            }
        }

        Ok(MibModule {
            name: self.module.clone(),
            definitions,
        })
    }

    /// Try to read a definition starting at `name`. Consumes at least one token.
    fn definition(&mut self, name: &'a str) -> Result<Option<Definition>> {
        self.pos += 1;
        match self.peek() {
            Some(TokenKind::Ident("OBJECT"))
                if self.peek_at(1) == Some(TokenKind::Ident("IDENTIFIER"))
                    && self.peek_at(2) == Some(TokenKind::Assign) =>
            {
                self.pos += 3;
                let (parent, arcs) = self.oid_value()?;
                Ok(Some(Definition {
                    name: name.to_string(),
                    parent,
                    arcs,
                }))
            }
            Some(TokenKind::Ident("TRAP-TYPE")) => {
                self.pos += 1;
                let enterprise = self.skip_to_assign(Some("ENTERPRISE"))?;
                let number = self.number()?;
                let Some(enterprise) = enterprise else {
                    return Err(self.unexpected());
                };
                // RFC 3584: enterprise.0.specific
                Ok(Some(Definition {
                    name: name.to_string(),
                    parent: Some(enterprise),
                    arcs: vec![0, number],
                }))
            }
            Some(TokenKind::Ident(kw)) if VALUE_MACROS.contains(&kw) => {
                self.pos += 1;
                self.skip_to_assign(None)?;
                let (parent, arcs) = self.oid_value()?;
                Ok(Some(Definition {
                    name: name.to_string(),
                    parent,
                    arcs,
                }))
            }
            _ => Ok(None),
        }
    }

    /// `{ parent 1 2 }`, `{ 1 3 6 }` or `{ iso(1) org(3) }`.
    fn oid_value(&mut self) -> Result<(Option<String>, Vec<u32>)> {
        self.expect(TokenKind::LBrace)?;
        let mut parent = None;
        let mut arcs = Vec::new();
        let mut first = true;

        loop {
            match self.peek() {
                Some(TokenKind::RBrace) => {
                    self.pos += 1;
                    break;
                }
                Some(TokenKind::Number(_)) => arcs.push(self.number()?),
                Some(TokenKind::Ident(ident)) => {
                    self.pos += 1;
                    if self.peek() == Some(TokenKind::LParen) {
                        self.pos += 1;
                        arcs.push(self.number()?);
                        self.expect(TokenKind::RParen)?;
                    } else if first {
                        parent = Some(ident.to_string());
                    } else {
                        self.pos -= 1;
                        return Err(self.unexpected());
                    }
                }
                _ => return Err(self.unexpected()),
            }
            first = false;
        }

        Ok((parent, arcs))
    }

    fn number(&mut self) -> Result<u32> {
        match self.peek() {
            Some(TokenKind::Number(text)) => {
                let value = text.parse().map_err(|_| self.unexpected())?;
                self.pos += 1;
                Ok(value)
            }
            _ => Err(self.unexpected()),
        }
    }

    /// Skip macro clauses up to and including the `::=` at brace depth 0.
    ///
    /// Returns the identifier following `capture` if that keyword was seen.
    fn skip_to_assign(&mut self, capture: Option<&str>) -> Result<Option<String>> {
        let mut captured = None;
        loop {
            match self.next() {
                Some(TokenKind::Assign) => return Ok(captured),
                Some(TokenKind::LBrace) => {
                    self.pos -= 1;
                    self.skip_braces()?;
                }
                Some(TokenKind::Ident(kw)) if Some(kw) == capture => {
                    if let Some(TokenKind::Ident(value)) = self.peek() {
                        captured = Some(value.to_string());
                    }
                }
                Some(_) => {}
                None => return Err(self.error(SchemaErrorKind::UnexpectedEof)),
            }
        }
    }

    fn skip_braces(&mut self) -> Result<()> {
        self.expect(TokenKind::LBrace)?;
        let mut depth = 1usize;
        while depth > 0 {
            match self.next() {
                Some(TokenKind::LBrace) => depth += 1,
                Some(TokenKind::RBrace) => depth -= 1,
                Some(_) => {}
                None => return Err(self.error(SchemaErrorKind::UnexpectedEof)),
            }
        }
        Ok(())
    }

    fn skip_past_semicolon(&mut self) {
        while let Some(kind) = self.next() {
            if kind == TokenKind::Semicolon {
                break;
            }
        }
    }

    fn skip_macro_definition(&mut self) -> Result<()> {
        while let Some(kind) = self.next() {
            if kind == TokenKind::Ident("END") {
                return Ok(());
            }
        }
        Err(self.error(SchemaErrorKind::UnexpectedEof))
    }
}

fn starts_lowercase(name: &str) -> bool {
    name.as_bytes().first().is_some_and(|b| b.is_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn def(name: &str, parent: Option<&str>, arcs: &[u32]) -> Definition {
        Definition {
            name: name.to_string(),
            parent: parent.map(str::to_string),
            arcs: arcs.to_vec(),
        }
    }

    #[test]
    fn test_minimal_module() {
        let module = parse_module(
            "TEST-MIB DEFINITIONS ::= BEGIN\n\
             IMPORTS mib-2 FROM SNMPv2-SMI;\n\
             system OBJECT IDENTIFIER ::= { mib-2 1 }\n\
             END",
        )
        .unwrap();
        assert_eq!(module.name, "TEST-MIB");
        assert_eq!(module.definitions, vec![def("system", Some("mib-2"), &[1])]);
    }

    #[test]
    fn test_object_type_with_clauses() {
        let module = parse_module(
            r#"IF-TEST DEFINITIONS ::= BEGIN
            ifAdminStatus OBJECT-TYPE
                SYNTAX  INTEGER { up(1), down(2), testing(3) }
                MAX-ACCESS  read-write
                STATUS      current
                DESCRIPTION "The desired state ::= { not this }"
                DEFVAL { up }
                ::= { ifEntry 7 }
            IfEntry ::= SEQUENCE { ifIndex InterfaceIndex, ifOid OBJECT IDENTIFIER }
            END"#,
        )
        .unwrap();
        assert_eq!(module.definitions, vec![def("ifAdminStatus", Some("ifEntry"), &[7])]);
    }

    #[test]
    fn test_named_numbers_and_module_oid() {
        let module = parse_module(
            "RFC1155-SMI { iso 3 } DEFINITIONS IMPLICIT TAGS ::= BEGIN\n\
             internet OBJECT IDENTIFIER ::= { iso(1) org(3) dod(6) 1 }\n\
             END",
        )
        .unwrap();
        assert_eq!(module.definitions, vec![def("internet", None, &[1, 3, 6, 1])]);
    }

    #[test]
    fn test_trap_type() {
        let module = parse_module(
            "RFC1215-TEST DEFINITIONS ::= BEGIN\n\
             linkDownV1 TRAP-TYPE\n\
                 ENTERPRISE snmp\n\
                 VARIABLES { ifIndex }\n\
                 ::= 2\n\
             END",
        )
        .unwrap();
        assert_eq!(module.definitions, vec![def("linkDownV1", Some("snmp"), &[0, 2])]);
    }

    #[test]
    fn test_macro_definitions_skipped() {
        let module = parse_module(
            "SMI DEFINITIONS ::= BEGIN\n\
             OBJECT-TYPE MACRO ::= BEGIN TYPE NOTATION ::= \"SYNTAX\" type(ObjectSyntax) VALUE NOTATION ::= value(VALUE ObjectName) END\n\
             org OBJECT IDENTIFIER ::= { iso 3 }\n\
             END",
        )
        .unwrap();
        assert_eq!(module.definitions, vec![def("org", Some("iso"), &[3])]);
    }

    #[test]
    fn test_missing_header() {
        let err = parse_module("sysName OBJECT IDENTIFIER ::= { system 5 }").unwrap_err();
        assert!(matches!(
            err,
            Error::Schema {
                kind: SchemaErrorKind::MissingHeader,
                ..
            }
        ));
        assert!(parse_module("").is_err());
    }

    #[test]
    fn test_bad_value_reports_line() {
        let err = parse_module("M DEFINITIONS ::= BEGIN\nfoo OBJECT IDENTIFIER ::= { bar baz }\nEND")
            .unwrap_err();
        match err {
            Error::Schema {
                document,
                kind: SchemaErrorKind::UnexpectedToken { line, found },
            } => {
                assert_eq!(&*document, "M");
                assert_eq!(line, 2);
                assert_eq!(found, "baz");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unterminated_macro_body() {
        let err = parse_module("M DEFINITIONS ::= BEGIN\nfoo OBJECT-TYPE SYNTAX INTEGER").unwrap_err();
        assert!(matches!(
            err,
            Error::Schema {
                kind: SchemaErrorKind::UnexpectedEof,
                ..
            }
        ));
    }
}
