//! File-backed history store: one JSON document mapping correspondent to its
//! exchange array, rewritten in full on every update.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use tracing::debug;

use super::{trim_to_cap, Exchange, HistoryStore, StoreError, DEFAULT_HISTORY_CAP};

type HistoryDocument = BTreeMap<String, Vec<Exchange>>;

#[derive(Debug)]
pub struct JsonFileHistoryStore {
    path: PathBuf,
    cap: usize,
}

impl JsonFileHistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cap: DEFAULT_HISTORY_CAP,
        }
    }

    /// Overrides the per-correspondent exchange cap.
    pub fn with_cap(mut self, cap: usize) -> Self {
        self.cap = cap;
        self
    }

    fn read_document(&self) -> Result<HistoryDocument, StoreError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(HistoryDocument::new()),
            Err(err) => Err(StoreError::Io(err)),
        }
    }

    fn write_document(&self, document: &HistoryDocument) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.path, serde_json::to_string_pretty(document)?)?;
        Ok(())
    }
}

impl HistoryStore for JsonFileHistoryStore {
    fn load(&self, correspondent: &str) -> Result<Vec<Exchange>, StoreError> {
        let document = self.read_document()?;
        Ok(document.get(correspondent).cloned().unwrap_or_default())
    }

    fn append(&self, correspondent: &str, exchange: Exchange) -> Result<(), StoreError> {
        let mut document = self.read_document()?;
        let history = document.entry(correspondent.to_string()).or_default();
        history.push(exchange);
        trim_to_cap(history, self.cap);
        debug!(
            "history for {} now {} exchange(s)",
            correspondent,
            history.len()
        );
        self.write_document(&document)
    }

    fn clear(&self, correspondent: &str) -> Result<(), StoreError> {
        let mut document = self.read_document()?;
        if document.remove(correspondent).is_some() {
            self.write_document(&document)?;
        }
        Ok(())
    }
}
