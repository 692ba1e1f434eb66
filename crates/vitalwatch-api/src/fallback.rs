//! Fallback data substituted when a read fails.

use std::collections::HashMap;
use std::path::Path;

use serde_json::Value;

use crate::error::Error;

/// A source of precomputed payloads, keyed by endpoint path.
///
/// Consulted by [`ApiClient`](crate::ApiClient) only after a GET has
/// already failed.
pub trait FallbackSource: Send + Sync {
    /// Look up the fallback payload for a resolved endpoint path.
    fn lookup(&self, path: &str) -> Option<Value>;
}

/// Immutable path-to-payload table.
#[derive(Debug, Clone, Default)]
pub struct FallbackTable {
    entries: HashMap<String, Value>,
}

impl FallbackTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with_entry(mut self, path: impl Into<String>, payload: Value) -> Self {
        self.entries.insert(path.into(), payload);
        self
    }

    /// Build a table from a JSON object whose keys are endpoint paths.
    pub fn from_json(value: Value) -> Result<Self, Error> {
        match value {
            Value::Object(map) => Ok(Self {
                entries: map.into_iter().collect(),
            }),
            other => Err(Error::Deserialization {
                message: "fallback table must be a JSON object keyed by path".into(),
                body: other.to_string(),
            }),
        }
    }

    /// Load a table from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, Error> {
        let body = std::fs::read_to_string(path).map_err(|e| Error::Deserialization {
            message: format!("failed to read {}: {e}", path.display()),
            body: String::new(),
        })?;
        let value: Value = serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: format!("{e} in {}", path.display()),
            body: body.clone(),
        })?;
        Self::from_json(value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FallbackSource for FallbackTable {
    fn lookup(&self, path: &str) -> Option<Value> {
        self.entries.get(path).cloned()
    }
}
