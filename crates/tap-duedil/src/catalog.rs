//! Stream catalog
//!
//! `discover` builds one entry per endpoint from the schema registry. The
//! `query` and `sync` commands read a catalog back and take each stream's
//! schema from it, falling back to the registry for streams it omits.

use crate::api::endpoints::all_endpoints;
use crate::error::{Result, TapError};
use crate::schema::SchemaRegistry;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub stream: String,
    pub tap_stream_id: String,
    #[serde(default)]
    pub key_properties: Vec<String>,
    pub schema: Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub metadata: Vec<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub streams: Vec<CatalogEntry>,
}

impl Catalog {
    /// Catalog of every endpoint, schemas marked `inclusion: automatic`
    pub fn discover(registry: &SchemaRegistry) -> Result<Self> {
        let streams = all_endpoints()
            .iter()
            .map(|endpoint| -> Result<CatalogEntry> {
                let mut schema = registry.load(endpoint.id)?;
                mark_automatic(&mut schema);
                Ok(CatalogEntry {
                    stream: endpoint.id.to_string(),
                    tap_stream_id: endpoint.id.to_string(),
                    key_properties: endpoint
                        .primary_key_fields
                        .iter()
                        .map(|k| k.to_string())
                        .collect(),
                    schema,
                    metadata: Vec::new(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { streams })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            TapError::catalog(format!("cannot read '{}': {}", path.display(), e))
        })?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let catalog: Catalog =
            serde_json::from_str(content).map_err(|e| TapError::catalog(e.to_string()))?;

        for entry in &catalog.streams {
            if !entry.schema.is_object() {
                return Err(TapError::catalog(format!(
                    "schema for '{}' must be a JSON object",
                    entry.tap_stream_id
                )));
            }
        }
        Ok(catalog)
    }

    pub fn get_stream(&self, tap_stream_id: &str) -> Option<&CatalogEntry> {
        self.streams.iter().find(|e| e.tap_stream_id == tap_stream_id)
    }

    /// Schema from the catalog entry, else from the registry
    pub fn schema_for(&self, tap_stream_id: &str, registry: &SchemaRegistry) -> Result<Value> {
        match self.get_stream(tap_stream_id) {
            Some(entry) => Ok(entry.schema.clone()),
            None => registry.load(tap_stream_id),
        }
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Add `inclusion: automatic` to a schema and every nested property schema
pub fn mark_automatic(schema: &mut Value) {
    let Value::Object(map) = schema else {
        return;
    };
    map.insert("inclusion".to_string(), Value::String("automatic".to_string()));

    if let Some(Value::Object(properties)) = map.get_mut("properties") {
        properties.values_mut().for_each(mark_automatic);
    }
    if let Some(items) = map.get_mut("items") {
        mark_automatic(items);
    }
}
