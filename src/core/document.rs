//! Document model and merge helpers.

use serde_json::Value;

/// A configuration document: one JSON object, arbitrarily nested.
pub type Document = serde_json::Map<String, Value>;

/// Fold `overlay` into `target` with dict-update semantics: when the same
/// top-level key appears in both, the overlay's value wins outright. There
/// is no recursive merge of nested objects at this stage; only the
/// environment overlay reaches into nested keys.
pub(crate) fn shallow_update(target: &mut Document, overlay: &Document) {
    for (key, value) in overlay {
        target.insert(key.clone(), value.clone());
    }
}

/// Walk a dotted key path (`"db.host"`) through nested objects.
pub(crate) fn lookup_path<'a>(root: &'a Value, dotted: &str) -> Option<&'a Value> {
    let mut current = root;
    for segment in dotted.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}
