//! Configuration validation support.
//!
//! Validation runs against the file-merged document, before merge-dependency
//! folding and before the environment overlay. A schema supplied while the
//! engine is compiled out is an error, never a silent pass.

use crate::core::document::Document;
use crate::error::Result;
use serde_json::Value;

/// Validate `document` against a JSON schema.
#[cfg(feature = "validation")]
pub(crate) fn validate_document(document: &Document, schema: &Value) -> Result<()> {
    use crate::error::ConfigError;

    let validator = jsonschema::validator_for(schema)
        .map_err(|err| ConfigError::SchemaValidation(format!("invalid schema: {err}")))?;

    let instance = Value::Object(document.clone());
    if !validator.is_valid(&instance) {
        let detail = validator
            .iter_errors(&instance)
            .map(|err| err.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        tracing::error!(error = %detail, "schema validation failed");
        return Err(ConfigError::SchemaValidation(detail));
    }
    tracing::debug!("document passed schema validation");
    Ok(())
}

/// Without the `validation` feature there is no engine to run, which must
/// surface as a distinct configuration error.
#[cfg(not(feature = "validation"))]
pub(crate) fn validate_document(_document: &Document, _schema: &Value) -> Result<()> {
    Err(crate::error::ConfigError::ValidationUnavailable)
}
