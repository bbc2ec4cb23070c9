//! File-backed store of user-supplied MIB documents.
//!
//! Documents are saved verbatim under the schema directory, one file per
//! module, named after the module.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result, SchemaErrorKind};

/// Drop leading lines that hold nothing but comments.
///
/// A line like `-- note -- MY-MIB DEFINITIONS` keeps what follows the
/// closing `--`. Returns an empty string if nothing but comments and blank
/// lines remain.
pub fn strip_leading_comments(text: &str) -> &str {
    let mut rest = text;
    while !rest.is_empty() {
        let (line, after) = match rest.find('\n') {
            Some(i) => (&rest[..i], &rest[i + 1..]),
            None => (rest, ""),
        };
        let mut remaining = line.trim();
        while !remaining.is_empty() {
            let Some(comment) = remaining.strip_prefix("--") else {
                // `remaining` borrows from `text`
                let start = remaining.as_ptr() as usize - text.as_ptr() as usize;
                return &text[start..];
            };
            remaining = match comment.find("--") {
                Some(end) => comment[end + 2..].trim(),
                None => "",
            };
        }
        rest = after;
    }
    ""
}

/// Module name of a document: the first word after leading comments.
pub fn document_name(text: &str) -> Result<String> {
    let stripped = strip_leading_comments(text);
    let name = stripped
        .split_whitespace()
        .next()
        .ok_or_else(|| Error::schema("<unnamed>", SchemaErrorKind::EmptyDocument))?;
    validate_name(name)?;
    Ok(name.to_string())
}

fn validate_name(name: &str) -> Result<()> {
    let bad = name.is_empty()
        || name.starts_with('.')
        || name.contains(['/', '\\', '\0'])
        || name.contains("..");
    if bad {
        return Err(Error::schema(name, SchemaErrorKind::InvalidName));
    }
    Ok(())
}

/// Directory of saved documents.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    dir: PathBuf,
}

impl DocumentStore {
    /// Use `dir` for storage. The directory is created on first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The storage directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Save a document, replacing any stored document of the same name.
    ///
    /// Returns the module name.
    pub fn save(&self, text: &str) -> Result<String> {
        let name = document_name(text)?;
        fs::create_dir_all(&self.dir).map_err(Error::io)?;
        fs::write(self.dir.join(&name), text).map_err(Error::io)?;
        tracing::debug!(schema.document = %name, dir = %self.dir.display(), "schema document saved");
        Ok(name)
    }

    /// Read a stored document.
    pub fn read(&self, name: &str) -> Result<String> {
        validate_name(name)?;
        match fs::read_to_string(self.dir.join(name)) {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(Error::schema(name, SchemaErrorKind::NotFound))
            }
            Err(e) => Err(Error::io(e)),
        }
    }

    /// Delete a stored document. Missing documents are not an error.
    pub fn delete(&self, name: &str) -> Result<()> {
        validate_name(name)?;
        match fs::remove_file(self.dir.join(name)) {
            Ok(()) => {
                tracing::debug!(schema.document = name, "schema document deleted");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::io(e)),
        }
    }

    /// Names of stored documents, sorted. A missing directory lists as empty.
    pub fn list(&self) -> Result<Vec<String>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::io(e)),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(Error::io)?;
            if !entry.file_type().map_err(Error::io)?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str()
                && validate_name(name).is_ok()
            {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}
