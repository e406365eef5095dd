//! Effective configuration: persisted defaults overlaid with request fields.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::defaults::{Endpoint, PersistedConfig};
use crate::error::GenerationError;

/// Overlay `request` on `defaults`, field by field.
///
/// A request field that is present and non-null replaces the default; missing
/// or null fields inherit it. Values are replaced wholesale, never deep-merged.
pub fn merge_defaults(defaults: &Map<String, Value>, request: &Map<String, Value>) -> Map<String, Value> {
    let mut merged = defaults.clone();
    for (key, value) in request {
        if !value.is_null() {
            merged.insert(key.clone(), value.clone());
        }
    }
    merged
}

/// Resolves request payloads against the persisted defaults.
#[derive(Debug, Clone, Default)]
pub struct ConfigResolver {
    defaults: Arc<PersistedConfig>,
}

impl ConfigResolver {
    pub fn new(defaults: Arc<PersistedConfig>) -> Self {
        Self { defaults }
    }

    pub fn defaults(&self) -> &PersistedConfig {
        &self.defaults
    }

    /// The merged key/value set for `endpoint`, before typing.
    pub fn effective(
        &self,
        endpoint: Endpoint,
        payload: &Value,
    ) -> Result<Map<String, Value>, GenerationError> {
        let request = payload.as_object().ok_or_else(|| {
            GenerationError::invalid_request(format!(
                "{} request body must be a JSON object",
                endpoint.name()
            ))
        })?;
        Ok(merge_defaults(self.defaults.section(endpoint), request))
    }

    /// Merge and deserialize into the endpoint's typed parameters.
    pub fn resolve<T: DeserializeOwned>(
        &self,
        endpoint: Endpoint,
        payload: &Value,
    ) -> Result<T, GenerationError> {
        let merged = self.effective(endpoint, payload)?;
        serde_json::from_value(Value::Object(merged)).map_err(|e| {
            GenerationError::invalid_request(format!("{}: {}", endpoint.name(), e))
        })
    }
}
