use std::fs;
use std::path::Path;

use serde_json::{Map, Value};
use thiserror::Error;

/// A parsed configuration file: string keys to loosely-typed JSON values,
/// kept in source order.
pub type Document = Map<String, Value>;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Config IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Config root is not a JSON object")]
    NotAnObject,
}

impl DocumentError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io(err) if err.kind() == std::io::ErrorKind::NotFound)
    }
}

pub fn read_config(path: &Path) -> Result<Document, DocumentError> {
    let raw = fs::read_to_string(path)?;
    match serde_json::from_str::<Value>(&raw)? {
        Value::Object(doc) => Ok(doc),
        _ => Err(DocumentError::NotAnObject),
    }
}

/// Read a config that may legitimately be missing. A missing file is `Ok(None)`;
/// anything else that goes wrong is still an error.
pub fn read_optional_config(path: &Path) -> Result<Option<Document>, DocumentError> {
    match read_config(path) {
        Ok(doc) => Ok(Some(doc)),
        Err(err) if err.is_not_found() => Ok(None),
        Err(err) => Err(err),
    }
}

/// Serialize with two-space indentation and overwrite `path`.
pub fn write_config(doc: &Document, path: &Path) -> Result<(), DocumentError> {
    let body = serde_json::to_string_pretty(doc)?;
    fs::write(path, body)?;
    Ok(())
}

pub fn object<'a>(doc: &'a Document, key: &str) -> Option<&'a Document> {
    doc.get(key).and_then(Value::as_object)
}

pub fn list<'a>(doc: &'a Document, key: &str) -> Option<&'a Vec<Value>> {
    doc.get(key).and_then(Value::as_array)
}

pub fn non_empty_str<'a>(doc: &'a Document, key: &str) -> Option<&'a str> {
    doc.get(key)
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
}

/// First non-empty string found under any of `keys`, in order.
pub fn first_non_empty_str<'a>(doc: &'a Document, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|key| non_empty_str(doc, key))
}

/// Walk nested objects, e.g. `["agents", "defaults"]`.
pub fn object_at<'a>(doc: &'a Document, path: &[&str]) -> Option<&'a Document> {
    let (first, rest) = path.split_first()?;
    let mut current = object(doc, first)?;
    for key in rest {
        current = object(current, key)?;
    }
    Some(current)
}
