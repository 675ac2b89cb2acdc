//! JSON document helpers used for record content.
//!
//! A [`Document`] is the JSON tagged union. Object key order is preserved
//! for display and projection, and never matters for comparison.

use std::path::Path;

use serde_json::Map;

pub use serde_json::Value as Document;

use crate::{Error, Result};

/// A record body that is parsed on first access and then kept.
pub struct LazyBody<'a> {
    loader: Option<Box<dyn FnOnce() -> Result<Document> + 'a>>,
    doc: Option<Document>,
}

impl<'a> LazyBody<'a> {
    /// Defer loading to `loader`, called at most once.
    pub fn new(loader: impl FnOnce() -> Result<Document> + 'a) -> Self {
        Self {
            loader: Some(Box::new(loader)),
            doc: None,
        }
    }

    /// Wrap an already loaded document.
    pub fn loaded(doc: Document) -> Self {
        Self {
            loader: None,
            doc: Some(doc),
        }
    }

    /// Load the body if needed and borrow it.
    pub fn get(&mut self) -> Result<&Document> {
        if let Some(loader) = self.loader.take() {
            let doc = loader()?;
            return Ok(self.doc.insert(doc));
        }
        self.doc
            .as_ref()
            .ok_or_else(|| Error::Storage("record body failed to load".to_string()))
    }

    /// Load the body if needed and take ownership of it.
    pub fn into_document(mut self) -> Result<Document> {
        self.get()?;
        self.doc
            .take()
            .ok_or_else(|| Error::Storage("record body failed to load".to_string()))
    }
}

impl std::fmt::Debug for LazyBody<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyBody")
            .field("loaded", &self.doc.is_some())
            .finish()
    }
}

/// Read and parse a JSON file.
pub fn from_file(path: &Path) -> Result<Document> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Look up a field by name or dotted path.
///
/// An exact top-level key wins, so keys containing dots stay reachable.
pub fn get_path<'a>(doc: &'a Document, path: &str) -> Option<&'a Document> {
    let obj = doc.as_object()?;
    if let Some(value) = obj.get(path) {
        return Some(value);
    }
    let mut current = doc;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Keep only the keys present in `template`, in the template's order.
///
/// Keys of `template` missing from `doc` are left out. A non-object on
/// either side projects to an empty object.
pub fn project_keys(doc: &Document, template: &Document) -> Document {
    let mut projected = Map::new();
    if let (Some(obj), Some(template)) = (doc.as_object(), template.as_object()) {
        for key in template.keys() {
            if let Some(value) = obj.get(key) {
                projected.insert(key.clone(), value.clone());
            }
        }
    }
    Document::Object(projected)
}

/// Build an object holding the listed paths, keyed by path.
pub fn select_paths<S: AsRef<str>>(doc: &Document, paths: &[S]) -> Document {
    let mut selected = Map::new();
    for path in paths {
        let path = path.as_ref();
        if let Some(value) = get_path(doc, path) {
            selected.insert(path.to_string(), value.clone());
        }
    }
    Document::Object(selected)
}

/// Single-line JSON rendering.
pub fn to_compact_string(value: &Document) -> String {
    value.to_string()
}

/// Render a scalar as a plain key string (strings unquoted).
pub fn to_key_string(value: &Document) -> String {
    match value {
        Document::String(s) => s.clone(),
        Document::Null => String::new(),
        other => other.to_string(),
    }
}

/// Read an epoch time from a field holding a number or numeric string.
pub fn to_epoch(value: &Document) -> Option<u64> {
    match value {
        Document::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Document::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
