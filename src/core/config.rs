//! Read-only configuration lookup
//!
//! Values are addressed by `/`-separated key paths into a JSON document, e.g. `db/host`.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::error::{DatabaseError, Result};

/// Configuration document
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    root: Value,
}

impl Config {
    pub fn from_value(root: Value) -> Self {
        Self { root }
    }

    /// Parse a JSON document
    pub fn from_json_str(json: &str) -> Result<Self> {
        let root = serde_json::from_str(json)
            .map_err(|e| DatabaseError::configuration(format!("invalid configuration: {}", e)))?;
        Ok(Self { root })
    }

    /// Load a JSON document from disk
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Look up the value at `path`
    pub fn get(&self, path: &str) -> Result<&Value> {
        path.split('/')
            .filter(|segment| !segment.is_empty())
            .try_fold(&self.root, |node, segment| node.get(segment))
            .ok_or_else(|| {
                DatabaseError::configuration(format!("no configuration value found: {}", path))
            })
    }

    /// Deserialize the value at `path`
    pub fn get_as<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let value = self.get(path)?;
        T::deserialize(value).map_err(|e| {
            DatabaseError::configuration(format!("invalid configuration value at {}: {}", path, e))
        })
    }

    /// Whether a value exists at `path`
    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_ok()
    }
}
