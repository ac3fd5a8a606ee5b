//! Release metadata kept in the repository itself.
//!
//! Two files carry it: a single-line version marker (`VERSION`) and a
//! companion TOML file whose top-level `branch` field mirrors the active
//! release branch. Both are ordinary tracked content.

use crate::domain::SemanticVersion;
use crate::error::{ReleaseError, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use toml_edit::{DocumentMut, Item, Value};
use tracing::debug;

/// Read a file that may legitimately be absent
pub fn read_optional(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(contents) => Ok(Some(contents)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Parse version marker contents; `Ok(None)` when blank
pub fn parse_version_marker(contents: &str) -> Result<Option<SemanticVersion>> {
    let trimmed = contents.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    SemanticVersion::parse(trimmed).map(Some)
}

/// Read the recorded version; `Ok(None)` when the marker is absent or blank
pub fn read_version_marker(path: &Path) -> Result<Option<SemanticVersion>> {
    match read_optional(path)? {
        Some(contents) => parse_version_marker(&contents),
        None => Ok(None),
    }
}

/// Write the version marker; returns whether the file changed
pub fn write_version_marker(path: &Path, version: &SemanticVersion) -> Result<bool> {
    if read_version_marker(path)?.as_ref() == Some(version) {
        return Ok(false);
    }

    fs::write(path, format!("{}\n", version))?;
    debug!(path = %path.display(), %version, "wrote version marker");
    Ok(true)
}

fn parse_document(contents: &str, origin: &Path) -> Result<DocumentMut> {
    contents.parse::<DocumentMut>().map_err(|e| {
        ReleaseError::config(format!("Failed to parse {}: {}", origin.display(), e))
    })
}

/// Value of a top-level string field in TOML `contents`
///
/// Keys inside tables (`[upstream] branch = ..`) are not top-level and read
/// as absent. `origin` only names the file in error messages.
pub fn parse_field(contents: &str, field: &str, origin: &Path) -> Result<Option<String>> {
    let doc = parse_document(contents, origin)?;

    Ok(doc.get(field).and_then(Item::as_str).map(str::to_string))
}

/// Read a top-level string field; `Ok(None)` when the field is not present
pub fn read_field(path: &Path, field: &str) -> Result<Option<String>> {
    let contents = fs::read_to_string(path)?;
    parse_field(&contents, field, path)
}

/// Rewrites a single field of a structured config file
///
/// Implementations must be idempotent (no write when the field already
/// holds the value) and must leave every other byte of the file intact.
pub trait ConfigMutator {
    /// Set `field` to `value`; returns whether the file changed
    fn set_field(&self, path: &Path, field: &str, value: &str) -> Result<bool>;
}

/// Format-preserving mutator for top-level string fields of TOML files
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldRewriter;

impl ConfigMutator for FieldRewriter {
    fn set_field(&self, path: &Path, field: &str, value: &str) -> Result<bool> {
        let contents = fs::read_to_string(path)?;
        let mut doc = parse_document(&contents, path)?;

        let current = doc
            .get_mut(field)
            .and_then(Item::as_value_mut)
            .ok_or_else(|| {
                ReleaseError::config(format!(
                    "Field '{}' not found in {}",
                    field,
                    path.display()
                ))
            })?;

        if current.as_str() == Some(value) {
            return Ok(false);
        }

        // Keep the surrounding whitespace and trailing comment
        let decor = current.decor().clone();
        *current = Value::from(value);
        *current.decor_mut() = decor;

        fs::write(path, doc.to_string())?;
        debug!(path = %path.display(), field, value, "updated companion config field");
        Ok(true)
    }
}
