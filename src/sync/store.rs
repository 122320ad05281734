use crate::error::WarnCode;
use crate::sync::warn;
use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// How the stored JSON looked when a run started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PriorStatus {
    Missing,
    Empty,
    Loaded { entities: usize, raw: usize },
    Corrupt(String),
}

impl fmt::Display for PriorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => write!(f, "missing"),
            Self::Empty => write!(f, "empty"),
            Self::Loaded { entities, raw: 0 } => write!(f, "loaded({entities})"),
            Self::Loaded { entities, raw } => write!(f, "loaded({entities}, {raw} kept raw)"),
            Self::Corrupt(reason) => write!(f, "corrupt ({reason})"),
        }
    }
}

/// One stored entity: typed when it matches the record shape, otherwise the
/// JSON value exactly as it was read.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Stored<R> {
    Typed(R),
    Raw(Value),
}

impl<R: DeserializeOwned> Stored<R> {
    /// Returns the conversion error alongside a `Raw` result.
    pub fn from_value(value: Value) -> (Self, Option<String>) {
        match R::deserialize(&value) {
            Ok(record) => (Self::Typed(record), None),
            Err(err) => (Self::Raw(value), Some(err.to_string())),
        }
    }
}

#[cfg(test)]
impl<R> Stored<R> {
    pub fn typed(&self) -> Option<&R> {
        match self {
            Self::Typed(record) => Some(record),
            Self::Raw(_) => None,
        }
    }
}

/// Load the last written name → record mapping.
///
/// A missing, empty, or unparsable file yields an empty mapping; only an
/// unreadable file is an error. Entities that do not fit `R` are kept raw.
pub fn load_prior<R: DeserializeOwned>(
    path: &Path,
    stage: &str,
) -> Result<(IndexMap<String, Stored<R>>, PriorStatus)> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return Ok((IndexMap::new(), PriorStatus::Missing));
        }
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read {}", path.display()));
        }
    };
    if raw.trim().is_empty() {
        return Ok((IndexMap::new(), PriorStatus::Empty));
    }

    let parsed = match serde_json::from_str::<IndexMap<String, Value>>(&raw) {
        Ok(parsed) => parsed,
        Err(err) => {
            warn::emit(
                WarnCode::W001StateCorrupt,
                stage,
                &path.display().to_string(),
                "stored json could not be parsed; starting from an empty mapping",
                &err.to_string(),
            );
            return Ok((IndexMap::new(), PriorStatus::Corrupt(err.to_string())));
        }
    };

    let mut entities = IndexMap::with_capacity(parsed.len());
    let mut raw_count = 0usize;
    for (name, value) in parsed {
        let (stored, err) = Stored::from_value(value);
        if let Some(err) = err {
            raw_count += 1;
            warn::emit(
                WarnCode::W008RecordKeptRaw,
                stage,
                &name,
                "stored record has an unexpected shape; carried forward as-is",
                &err,
            );
        }
        entities.insert(name, stored);
    }
    let status = PriorStatus::Loaded {
        entities: entities.len(),
        raw: raw_count,
    };
    Ok((entities, status))
}

/// Overwrite `updates` on a raw object, keeping every other key and the key
/// order. Returns the patched value and the keys whose value changed.
pub fn patch_fields(
    raw: &Value,
    updates: Vec<(&'static str, Value)>,
) -> (Value, Vec<&'static str>) {
    let mut object = raw.as_object().cloned().unwrap_or_default();
    let mut changed = Vec::new();
    for (key, value) in updates {
        if object.get(key) != Some(&value) {
            changed.push(key);
        }
        object.insert(key.to_string(), value);
    }
    (Value::Object(object), changed)
}

pub fn to_json<T: Serialize>(entities: &IndexMap<String, T>) -> Result<String> {
    let data = serde_json::to_string_pretty(entities)?;
    Ok(format!("{data}\n"))
}

/// Write the mapping through a sibling temp file renamed over `path`.
pub fn save<T: Serialize>(path: &Path, entities: &IndexMap<String, T>) -> Result<()> {
    let data = to_json(entities)?;
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)
        .with_context(|| format!("failed to create {}", parent.display()))?;

    let mut tmp = NamedTempFile::new_in(parent)
        .with_context(|| format!("failed to create temp file in {}", parent.display()))?;
    tmp.write_all(data.as_bytes())
        .with_context(|| format!("failed to write temp file for {}", path.display()))?;
    tmp.persist(path)
        .map_err(|err| err.error)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}
