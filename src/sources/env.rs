//! Environment variable overlay.

use crate::core::document::Document;
use serde_json::Value;
use std::env;

/// Default prefix for override variables.
pub const DEFAULT_PREFIX: &str = "CONFIG__";

/// Reserved variable naming the prefix itself.
pub const PREFIX_VAR: &str = "CONFIG_ENV_PREFIX";

/// Environment variable overlay.
///
/// Scans variables whose name starts with a prefix and sets the
/// corresponding leaf in a document. `CONFIG__DB__HOST=localhost` sets
/// `db.host`; path segments are separated by `__` and lower-cased, and
/// missing intermediate maps are created on the way down.
///
/// Scalar values are coerced in a fixed order — boolean literal, integer,
/// float, else string. The first successful parse wins, so an override that
/// looks numeric cannot be forced to stay a string.
///
/// # Examples
///
/// ```rust
/// use layerconf::sources::EnvOverlay;
///
/// // CONFIG__SERVER__PORT=8080 -> server.port = 8080
/// let overlay = EnvOverlay::from_env();
/// ```
#[derive(Debug, Clone)]
pub struct EnvOverlay {
    prefix: String,
}

impl EnvOverlay {
    /// Create an overlay with the prefix taken from [`PREFIX_VAR`],
    /// defaulting to [`DEFAULT_PREFIX`].
    pub fn from_env() -> Self {
        let prefix = env::var(PREFIX_VAR).unwrap_or_else(|_| DEFAULT_PREFIX.to_string());
        Self { prefix }
    }

    /// Create an overlay with an explicit prefix.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// The active prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Apply every matching process environment variable to `document`.
    pub fn apply(&self, document: &mut Document) {
        self.apply_iter(document, env::vars());
    }

    /// Apply overrides from an explicit variable iterator.
    pub(crate) fn apply_iter<I>(&self, document: &mut Document, vars: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (name, raw) in vars {
            let Some(rest) = name.strip_prefix(&self.prefix) else {
                continue;
            };
            if rest.is_empty() {
                continue;
            }
            let segments: Vec<String> =
                rest.split("__").map(|s| s.to_ascii_lowercase()).collect();
            tracing::debug!(path = ?segments, value = %raw, "applying environment override");
            set_deep(document, &segments, coerce(&raw));
        }
    }
}

/// Coerce a scalar override string: bool, then integer, then float, else
/// the string itself. Non-finite float parses fall through to strings
/// because JSON numbers cannot represent them.
pub(crate) fn coerce(raw: &str) -> Value {
    if raw.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if raw.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }
    if let Ok(int) = raw.parse::<i64>() {
        return Value::Number(int.into());
    }
    if let Ok(float) = raw.parse::<f64>() {
        if let Some(number) = serde_json::Number::from_f64(float) {
            return Value::Number(number);
        }
    }
    Value::String(raw.to_owned())
}

/// Set a value at a nested key path, creating intermediate maps as needed.
/// An intermediate that currently holds a non-map value is replaced.
fn set_deep(document: &mut Document, segments: &[String], value: Value) {
    let Some((last, parents)) = segments.split_last() else {
        return;
    };
    let mut current = document;
    for segment in parents {
        let slot = current
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Document::new()));
        if !slot.is_object() {
            *slot = Value::Object(Document::new());
        }
        current = slot
            .as_object_mut()
            .expect("slot was just ensured to be an object");
    }
    current.insert(last.clone(), value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn doc(value: serde_json::Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn overrides_nested_leaf_without_clobbering_siblings() {
        let mut document = doc(json!({"db": {"host": "default", "port": 3306}}));
        let overlay = EnvOverlay::with_prefix("CONFIG__");
        overlay.apply_iter(
            &mut document,
            vec![("CONFIG__DB__HOST".to_string(), "localhost".to_string())],
        );

        assert_eq!(document["db"]["host"], "localhost");
        assert_eq!(document["db"]["port"], 3306);
    }

    #[test]
    fn creates_intermediate_levels() {
        let mut document = Document::new();
        let overlay = EnvOverlay::with_prefix("CONFIG__");
        overlay.apply_iter(
            &mut document,
            vec![("CONFIG__A__B__C".to_string(), "1".to_string())],
        );
        assert_eq!(document["a"]["b"]["c"], 1);
    }

    #[test]
    fn segments_are_lower_cased() {
        let mut document = Document::new();
        let overlay = EnvOverlay::with_prefix("CONFIG__");
        overlay.apply_iter(
            &mut document,
            vec![("CONFIG__DB__MAX_SIZE".to_string(), "10".to_string())],
        );
        assert_eq!(document["db"]["max_size"], 10);
    }

    #[test]
    fn non_matching_variables_are_ignored() {
        let mut document = doc(json!({"k": 1}));
        let overlay = EnvOverlay::with_prefix("CONFIG__");
        overlay.apply_iter(
            &mut document,
            vec![
                ("PATH".to_string(), "/usr/bin".to_string()),
                ("CONFIGX__K".to_string(), "2".to_string()),
            ],
        );
        assert_eq!(document["k"], 1);
    }

    #[test]
    fn scalar_intermediate_is_replaced_by_a_map() {
        let mut document = doc(json!({"db": "just-a-string"}));
        let overlay = EnvOverlay::with_prefix("CONFIG__");
        overlay.apply_iter(
            &mut document,
            vec![("CONFIG__DB__HOST".to_string(), "h".to_string())],
        );
        assert_eq!(document["db"]["host"], "h");
    }

    #[test]
    fn coercion_order_is_bool_int_float_string() {
        assert_eq!(coerce("true"), Value::Bool(true));
        assert_eq!(coerce("FALSE"), Value::Bool(false));
        assert_eq!(coerce("5432"), json!(5432));
        assert_eq!(coerce("-7"), json!(-7));
        assert_eq!(coerce("2.5"), json!(2.5));
        assert_eq!(coerce("hello"), json!("hello"));
        // Parseable as f64 but not representable in JSON.
        assert_eq!(coerce("inf"), json!("inf"));
        assert_eq!(coerce("NaN"), json!("NaN"));
    }

    proptest! {
        #[test]
        fn any_integer_string_coerces_to_a_number(n in any::<i64>()) {
            prop_assert_eq!(coerce(&n.to_string()), Value::Number(n.into()));
        }

        #[test]
        fn lowercase_words_stay_strings(s in "[a-z]{3,12}") {
            prop_assume!(!s.eq_ignore_ascii_case("true"));
            prop_assume!(!s.eq_ignore_ascii_case("false"));
            prop_assume!(s.parse::<f64>().is_err() || !s.parse::<f64>().unwrap().is_finite());
            prop_assert_eq!(coerce(&s), Value::String(s.clone()));
        }
    }
}
