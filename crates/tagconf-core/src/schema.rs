//! Schema validation for expanded configuration
//!
//! The expanded, comment-stripped document is checked against a JSON Schema
//! before it is decoded. Every failure is collected so callers can report all
//! of them at once.

use std::path::Path;
use std::sync::Arc;

use crate::error::{Error, Result, ValidationFailure};

/// Schema for validating configuration
#[derive(Debug, Clone)]
pub struct Schema {
    /// The JSON Schema as a serde_json::Value
    schema: serde_json::Value,
    /// Compiled JSON Schema validator (wrapped in Arc for Clone)
    compiled: Arc<jsonschema::Validator>,
}

impl Schema {
    /// Load a schema from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let schema: serde_json::Value =
            serde_json::from_str(json).map_err(|e| Error::schema(e.to_string()))?;
        Self::from_value(schema)
    }

    /// Load a schema from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let schema: serde_json::Value =
            serde_yaml::from_str(yaml).map_err(|e| Error::schema(e.to_string()))?;
        Self::from_value(schema)
    }

    /// Load a schema from a file (YAML for `.yaml`/`.yml`, JSON otherwise)
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::file_not_found(path.display().to_string())
            } else {
                Error::io(path.display().to_string(), &e)
            }
        })?;

        let schema = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml(&content),
            _ => Self::from_json(&content),
        };
        schema.map_err(|e| e.with_source(path.display().to_string()))
    }

    /// Compile a schema held as a serde_json::Value
    pub fn from_value(schema: serde_json::Value) -> Result<Self> {
        let compiled = jsonschema::options()
            .should_validate_formats(true)
            .build(&schema)
            .map_err(|e| Error::schema(e.to_string()))?;
        Ok(Self {
            schema,
            compiled: Arc::new(compiled),
        })
    }

    /// Validate a JSON document and collect every failure
    ///
    /// Fails only when `data` is not JSON at all.
    pub fn validate_bytes(&self, data: &[u8]) -> Result<Vec<ValidationFailure>> {
        let instance: serde_json::Value =
            serde_json::from_slice(data).map_err(|e| Error::decode(e.to_string()))?;
        Ok(self.validate_value(&instance))
    }

    /// Validate a decoded value and collect every failure
    pub fn validate_value(&self, instance: &serde_json::Value) -> Vec<ValidationFailure> {
        self.compiled
            .iter_errors(instance)
            .map(|e| ValidationFailure {
                location: e.instance_path.to_string(),
                message: e.to_string(),
            })
            .collect()
    }

    /// Check a decoded value without collecting failures
    pub fn is_valid(&self, instance: &serde_json::Value) -> bool {
        self.compiled.is_valid(instance)
    }

    /// Get the raw schema value
    pub fn as_value(&self) -> &serde_json::Value {
        &self.schema
    }
}
