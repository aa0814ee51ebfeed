//! Loading declaration documents, schema overrides, and payloads.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::decl::DeclarationSet;
use crate::error::ResolveError;
use crate::schema::Schema;

fn read_file(path: &Path) -> Result<String, ResolveError> {
    if !path.exists() {
        return Err(ResolveError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    std::fs::read_to_string(path).map_err(|source| ResolveError::ReadError {
        path: path.to_path_buf(),
        source,
    })
}

fn parse<T: DeserializeOwned>(content: &str) -> Result<T, ResolveError> {
    serde_json::from_str(content).map_err(|source| ResolveError::InvalidJson { source })
}

/// Load a declaration document from a file path.
///
/// # Errors
///
/// Returns `ResolveError::FileNotFound` if the file doesn't exist,
/// or `ResolveError::InvalidJson` if it isn't a valid declaration document
/// (including type expressions that fail to parse).
pub fn load_declarations(path: &Path) -> Result<DeclarationSet, ResolveError> {
    parse(&read_file(path)?)
}

/// Load a declaration document from a JSON string.
pub fn load_declarations_str(content: &str) -> Result<DeclarationSet, ResolveError> {
    parse(content)
}

/// Load a hand-written schema named by a `{schema: ...}` directive.
///
/// Only `.json` documents are supported.
///
/// # Errors
///
/// Returns `ResolveError::UnsupportedFormat` for any other extension,
/// before the file is read.
pub fn load_schema_override(path: &Path) -> Result<Schema, ResolveError> {
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if !is_json {
        return Err(ResolveError::UnsupportedFormat {
            path: path.to_path_buf(),
        });
    }

    parse(&read_file(path)?)
}

/// Load an arbitrary JSON document (e.g. a payload to validate).
pub fn load_json(path: &Path) -> Result<Value, ResolveError> {
    parse(&read_file(path)?)
}
