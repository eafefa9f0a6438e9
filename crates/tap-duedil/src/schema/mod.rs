//! Stream schemas
//!
//! One JSON Schema document per stream, embedded in the binary or read from
//! a directory. A document may list other documents under
//! `tap_schema_dependencies`; its `$ref`s to them are inlined before use.
//! Loaded schemas are made null tolerant: every nested `"type": "<t>"` other
//! than `"null"` becomes `["<t>", "null"]`.

pub mod transform;

use crate::error::{Result, TapError};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;

pub use transform::{transform, TransformError};

const DEPENDENCIES_KEY: &str = "tap_schema_dependencies";

macro_rules! embedded_schemas {
    ($($name:literal),* $(,)?) => {
        &[$(($name, include_str!(concat!("../../schemas/", $name, ".json")))),*]
    };
}

static EMBEDDED: &[(&str, &str)] = embedded_schemas![
    "address",
    "pagination",
    "person",
    "company_query",
    "company_vitals",
    "company_industries",
    "company_addresses",
    "company_descriptions",
    "company_keywords",
    "company_telephone_numbers",
    "company_websites",
    "company_related_names",
    "company_officers",
    "company_social_media_profiles",
    "company_shareholders",
    "company_group_parents",
    "company_group_subsidiaries",
    "company_portfolio_companies",
    "company_gazette_notices",
    "company_related_companies",
    "company_fca_authorisations",
    "company_filings",
    "company_charges",
    "company_persons_of_significant_control",
    "company_financials",
];

#[derive(Debug, Clone)]
enum SchemaSource {
    Embedded,
    Directory(PathBuf),
}

/// Loads fully resolved, null tolerant stream schemas
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    source: SchemaSource,
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::embedded()
    }
}

impl SchemaRegistry {
    pub fn embedded() -> Self {
        Self {
            source: SchemaSource::Embedded,
        }
    }

    /// Read `<name>.json` documents from `dir`
    pub fn from_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            source: SchemaSource::Directory(dir.into()),
        }
    }

    /// Schema for `stream_id`, dependencies resolved and null tolerant
    pub fn load(&self, stream_id: &str) -> Result<Value> {
        let mut visiting = Vec::new();
        let resolved = self.load_resolved(stream_id, &mut visiting)?;
        Ok(make_null_tolerant(&resolved))
    }

    fn raw(&self, name: &str) -> Result<Value> {
        let text = match &self.source {
            SchemaSource::Embedded => EMBEDDED
                .iter()
                .find(|(n, _)| *n == name)
                .map(|(_, text)| text.to_string())
                .ok_or_else(|| TapError::schema(name, "no embedded schema document"))?,
            SchemaSource::Directory(dir) => {
                let path = dir.join(format!("{}.json", name));
                std::fs::read_to_string(&path).map_err(|e| {
                    TapError::schema(name, format!("cannot read '{}': {}", path.display(), e))
                })?
            },
        };
        serde_json::from_str(&text).map_err(|e| TapError::schema(name, format!("invalid JSON: {}", e)))
    }

    fn load_resolved(&self, name: &str, visiting: &mut Vec<String>) -> Result<Value> {
        if visiting.iter().any(|v| v == name) {
            return Err(TapError::schema(
                name,
                format!("circular schema dependency via {}", visiting.join(" -> ")),
            ));
        }
        visiting.push(name.to_string());

        let mut schema = self.raw(name)?;
        let dependencies = match schema.as_object_mut().and_then(|o| o.remove(DEPENDENCIES_KEY)) {
            Some(Value::Array(deps)) => deps,
            Some(other) => {
                return Err(TapError::schema(
                    name,
                    format!("{} must be an array, got {}", DEPENDENCIES_KEY, other),
                ))
            },
            None => Vec::new(),
        };

        let mut refs = BTreeMap::new();
        for dependency in dependencies {
            let Some(dep_name) = dependency.as_str() else {
                return Err(TapError::schema(name, "dependency names must be strings"));
            };
            refs.insert(dep_name.to_string(), self.load_resolved(dep_name, visiting)?);
        }
        if !refs.is_empty() {
            resolve_references(&mut schema, &refs).map_err(|msg| TapError::schema(name, msg))?;
        }

        visiting.pop();
        Ok(schema)
    }
}

/// Replace `{"$ref": "<name>[.json][#/pointer]"}` nodes with the named document
pub fn resolve_references(
    schema: &mut Value,
    refs: &BTreeMap<String, Value>,
) -> std::result::Result<(), String> {
    match schema {
        Value::Object(map) => {
            if let Some(Value::String(reference)) = map.get("$ref") {
                let target = lookup_reference(reference, refs)?;
                map.remove("$ref");
                let siblings = std::mem::take(map);
                *schema = merge_siblings(target, siblings);
                return Ok(());
            }
            for value in map.values_mut() {
                resolve_references(value, refs)?;
            }
            Ok(())
        },
        Value::Array(items) => items.iter_mut().try_for_each(|v| resolve_references(v, refs)),
        _ => Ok(()),
    }
}

fn lookup_reference(reference: &str, refs: &BTreeMap<String, Value>) -> std::result::Result<Value, String> {
    let (document, pointer) = match reference.split_once('#') {
        Some((document, pointer)) => (document, Some(pointer)),
        None => (reference, None),
    };
    let name = document.trim_end_matches(".json");
    let target = refs
        .get(name)
        .ok_or_else(|| format!("unresolved reference '{}'", reference))?;

    match pointer.filter(|p| !p.is_empty()) {
        Some(pointer) => target
            .pointer(pointer)
            .cloned()
            .ok_or_else(|| format!("reference '{}' points at nothing", reference)),
        None => Ok(target.clone()),
    }
}

/// Keys written next to a `$ref` (descriptions, mostly) override the target
fn merge_siblings(target: Value, siblings: Map<String, Value>) -> Value {
    match target {
        Value::Object(mut merged) if !siblings.is_empty() => {
            merged.extend(siblings);
            Value::Object(merged)
        },
        other => other,
    }
}

/// Allow `null` wherever a non-root node declares a single type
pub fn make_null_tolerant(schema: &Value) -> Value {
    null_tolerant_at(schema, 0)
}

fn null_tolerant_at(schema: &Value, depth: usize) -> Value {
    let Value::Object(map) = schema else {
        return schema.clone();
    };

    let tolerant = map
        .iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(t) if depth > 0 && key == "type" && t != "null" => {
                    Value::Array(vec![Value::String(t.clone()), Value::String("null".into())])
                },
                Value::Object(_) => null_tolerant_at(value, depth + 1),
                other => other.clone(),
            };
            (key.clone(), value)
        })
        .collect();

    Value::Object(tolerant)
}
