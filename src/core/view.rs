//! Read-only attribute-style view over a document.

use serde_json::Value;
use std::collections::BTreeMap;
use std::ops::Index;

static NULL_VIEW: AttrView = AttrView::Scalar(Value::Null);

/// A read-only, recursively-constructed snapshot of a document.
///
/// Every nested object becomes a [`AttrView::Map`], every array a
/// [`AttrView::List`], and everything else a [`AttrView::Scalar`]. Keyed
/// and positional indexing work at every depth; a missing key or index
/// resolves to a null view rather than panicking, mirroring
/// `serde_json::Value`.
///
/// The view is a snapshot: it does not reflect later reloads of the source
/// configuration.
///
/// # Examples
///
/// ```rust
/// use layerconf::core::AttrView;
/// use serde_json::json;
///
/// let view = AttrView::snapshot(&json!({"drive": {"max_speed": 60}}));
/// assert_eq!(view["drive"]["max_speed"].as_i64(), Some(60));
/// assert!(view["drive"]["missing"].is_null());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum AttrView {
    /// A nested object.
    Map(BTreeMap<String, AttrView>),
    /// An array.
    List(Vec<AttrView>),
    /// A leaf value: null, bool, number, or string.
    Scalar(Value),
}

impl AttrView {
    /// Build a view by recursively wrapping `value`.
    pub fn snapshot(value: &Value) -> Self {
        match value {
            Value::Object(map) => AttrView::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), AttrView::snapshot(v)))
                    .collect(),
            ),
            Value::Array(items) => AttrView::List(items.iter().map(AttrView::snapshot).collect()),
            scalar => AttrView::Scalar(scalar.clone()),
        }
    }

    /// Look up a key in a map view.
    pub fn get(&self, key: &str) -> Option<&AttrView> {
        match self {
            AttrView::Map(map) => map.get(key),
            _ => None,
        }
    }

    /// Walk a dotted key path (`"drive.max_speed"`).
    pub fn at(&self, dotted: &str) -> Option<&AttrView> {
        let mut current = self;
        for segment in dotted.split('.') {
            current = current.get(segment)?;
        }
        Some(current)
    }

    /// The keys of a map view, in sorted order.
    pub fn keys(&self) -> Vec<&str> {
        match self {
            AttrView::Map(map) => map.keys().map(String::as_str).collect(),
            _ => Vec::new(),
        }
    }

    /// Number of entries in a map or list view; `0` for scalars.
    pub fn len(&self) -> usize {
        match self {
            AttrView::Map(map) => map.len(),
            AttrView::List(items) => items.len(),
            AttrView::Scalar(_) => 0,
        }
    }

    /// Whether the view holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether this is a null scalar (also what missing lookups index to).
    pub fn is_null(&self) -> bool {
        matches!(self, AttrView::Scalar(Value::Null))
    }

    /// Boolean value of a scalar view.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttrView::Scalar(Value::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    /// Integer value of a scalar view.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttrView::Scalar(Value::Number(n)) => n.as_i64(),
            _ => None,
        }
    }

    /// Floating-point value of a scalar view (integers widen).
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrView::Scalar(Value::Number(n)) => n.as_f64(),
            _ => None,
        }
    }

    /// String value of a scalar view.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrView::Scalar(Value::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Rebuild the underlying JSON value.
    pub fn to_value(&self) -> Value {
        match self {
            AttrView::Map(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_value()))
                    .collect(),
            ),
            AttrView::List(items) => Value::Array(items.iter().map(AttrView::to_value).collect()),
            AttrView::Scalar(value) => value.clone(),
        }
    }
}

impl Index<&str> for AttrView {
    type Output = AttrView;

    fn index(&self, key: &str) -> &AttrView {
        self.get(key).unwrap_or(&NULL_VIEW)
    }
}

impl Index<usize> for AttrView {
    type Output = AttrView;

    fn index(&self, position: usize) -> &AttrView {
        match self {
            AttrView::List(items) => items.get(position).unwrap_or(&NULL_VIEW),
            _ => &NULL_VIEW,
        }
    }
}
