//! Checkpoint state
//!
//! The state document records how far a sync got: `company_index` is the
//! chunk boundary to resume from, `bookmarks` holds per-stream details.
//! Top-level keys this tap does not know about are carried through
//! unchanged. The document is always rewritten whole.

use crate::error::{Result, TapError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckpointState {
    /// First company of the chunk a resumed run starts with
    #[serde(default)]
    pub company_index: u64,

    #[serde(default)]
    pub bookmarks: BTreeMap<String, Map<String, Value>>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CheckpointState {
    /// Load from `path`; a missing file is an empty state
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(path = %path.display(), "No state file, starting from scratch");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Self::from_value(serde_json::from_str(&content)?)
    }

    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(Self::default()),
            Value::Object(_) => serde_json::from_value(value)
                .map_err(|e| TapError::checkpoint(format!("invalid state document: {}", e))),
            other => Err(TapError::checkpoint(format!(
                "state must be a JSON object, got {}",
                other
            ))),
        }
    }

    pub fn to_value(&self) -> Value {
        let mut doc = self.extra.clone();
        doc.insert("company_index".to_string(), Value::from(self.company_index));
        doc.insert(
            "bookmarks".to_string(),
            Value::Object(
                self.bookmarks
                    .iter()
                    .map(|(stream, bookmark)| (stream.clone(), Value::Object(bookmark.clone())))
                    .collect(),
            ),
        );
        Value::Object(doc)
    }

    pub fn set_bookmark(&mut self, stream: &str, key: &str, value: impl Into<Value>) {
        self.bookmarks
            .entry(stream.to_string())
            .or_default()
            .insert(key.to_string(), value.into());
    }

    pub fn bookmark(&self, stream: &str, key: &str) -> Option<&Value> {
        self.bookmarks.get(stream).and_then(|b| b.get(key))
    }
}

/// Durable destination for state documents
pub trait CheckpointStore: Send {
    fn persist(&mut self, state: &CheckpointState) -> Result<()>;
}

/// Writes the state document to a file via temp file and rename
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    path: PathBuf,
}

impl FileCheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CheckpointStore for FileCheckpointStore {
    fn persist(&mut self, state: &CheckpointState) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let mut tmp = NamedTempFile::new_in(&dir)?;
        serde_json::to_writer_pretty(&mut tmp, &state.to_value())?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| {
            TapError::checkpoint(format!("cannot replace '{}': {}", self.path.display(), e.error))
        })?;

        debug!(path = %self.path.display(), company_index = state.company_index, "State persisted");
        Ok(())
    }
}
