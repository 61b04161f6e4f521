use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::MappingError;

use super::types::{MapEntry, PipelineMap};

/// Top-level object entries in file order, duplicates included.
///
/// `serde_json::Map` would silently keep the last duplicate, so the object
/// is walked by hand.
struct RawEntries(Vec<(String, Value)>);

impl<'de> Deserialize<'de> for RawEntries {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = RawEntries;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a JSON object mapping source paths to artifact paths")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<RawEntries, A::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((key, value)) = map.next_entry::<String, Value>()? {
                    entries.push((key, value));
                }
                Ok(RawEntries(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor)
    }
}

/// Read and validate the pipeline map at `path`.
pub fn load_mapping(path: &Path) -> Result<PipelineMap, MappingError> {
    if !path.is_file() {
        return Err(MappingError::NotFound(path.to_path_buf()));
    }
    let raw = std::fs::read_to_string(path).map_err(|source| MappingError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let map = parse_mapping(path, &raw)?;
    tracing::debug!(path = %path.display(), entries = map.len(), "loaded pipeline map");
    Ok(map)
}

/// Validate map content. `path` is only used in diagnostics.
pub fn parse_mapping(path: &Path, raw: &str) -> Result<PipelineMap, MappingError> {
    let invalid_json = |source| MappingError::InvalidJson {
        path: path.to_path_buf(),
        source,
    };

    // Syntax and top-level type first, so errors name what was found.
    let value: Value = serde_json::from_str(raw).map_err(invalid_json)?;
    if !value.is_object() {
        return Err(MappingError::NotAnObject {
            found: json_type_name(&value),
        });
    }

    let RawEntries(raw_entries) = serde_json::from_str(raw).map_err(invalid_json)?;
    if raw_entries.is_empty() {
        return Err(MappingError::Empty(path.to_path_buf()));
    }

    let mut seen = HashSet::with_capacity(raw_entries.len());
    let mut entries = Vec::with_capacity(raw_entries.len());
    for (source, value) in raw_entries {
        let Value::String(artifact) = value else {
            return Err(MappingError::NonStringValue { key: source });
        };
        if source.trim().is_empty() {
            return Err(MappingError::EmptyPath {
                key: source,
                side: "source",
            });
        }
        if artifact.trim().is_empty() {
            return Err(MappingError::EmptyPath {
                key: source,
                side: "artifact",
            });
        }
        if !seen.insert(source.clone()) {
            return Err(MappingError::DuplicateSource(source));
        }
        entries.push(MapEntry::new(source, artifact));
    }

    Ok(PipelineMap::from_entries(entries))
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
