use std::path::PathBuf;

use serde::Serialize;

/// One declared `source -> artifact` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MapEntry {
    pub source: PathBuf,
    pub artifact: PathBuf,
}

impl MapEntry {
    pub fn new(source: impl Into<PathBuf>, artifact: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            artifact: artifact.into(),
        }
    }
}

/// Validated pipeline map. Entries keep declaration order and source paths
/// are unique.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineMap {
    entries: Vec<MapEntry>,
}

impl PipelineMap {
    pub(crate) fn from_entries(entries: Vec<MapEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[MapEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
