//! Property catalog sources.
//!
//! The catalog is an ordered sequence of string-keyed field mappings, loaded
//! fresh on every prompt render and validated only for presence, never
//! schema. Two backings: a local JSON export of the listings spreadsheet and
//! the Firestore properties collection.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use tracing::{debug, warn};

use crate::firestore::{FirestoreClient, FirestoreError};

/// One reference listing, field name to display value.
pub type CatalogRecord = BTreeMap<String, String>;

/// Error types for catalog loading.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("firestore error: {0}")]
    Firestore(#[from] FirestoreError),
}

/// Read-only source of catalog records.
pub trait CatalogSource {
    fn load(&self) -> Result<Vec<CatalogRecord>, CatalogError>;
}

/// Local JSON catalog: an array of objects, one per listing.
#[derive(Debug)]
pub struct JsonFileCatalog {
    path: PathBuf,
}

impl JsonFileCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CatalogSource for JsonFileCatalog {
    fn load(&self) -> Result<Vec<CatalogRecord>, CatalogError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                warn!(
                    "catalog file {} not found, continuing without property context",
                    self.path.display()
                );
                return Ok(Vec::new());
            }
            Err(err) => return Err(CatalogError::Io(err)),
        };

        let rows: Vec<BTreeMap<String, serde_json::Value>> = serde_json::from_str(&contents)?;
        let records = rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|(field, value)| (field, json_display_string(&value)))
                    .collect()
            })
            .collect::<Vec<CatalogRecord>>();
        debug!("{} catalog record(s) loaded from file", records.len());
        Ok(records)
    }
}

/// Firestore-backed catalog: every document of the properties collection.
#[derive(Debug, Clone)]
pub struct FirestoreCatalog {
    client: FirestoreClient,
    collection: String,
}

impl FirestoreCatalog {
    pub fn new(client: FirestoreClient, collection: &str) -> Self {
        Self {
            client,
            collection: collection.to_string(),
        }
    }
}

impl CatalogSource for FirestoreCatalog {
    fn load(&self) -> Result<Vec<CatalogRecord>, CatalogError> {
        let documents = self.client.list_documents(&self.collection)?;
        let records = documents
            .into_iter()
            .map(|document| {
                document
                    .fields
                    .unwrap_or_default()
                    .into_iter()
                    .map(|(field, value)| (field, value.display_string()))
                    .collect()
            })
            .collect::<Vec<CatalogRecord>>();
        debug!(
            "{} catalog record(s) loaded from collection {}",
            records.len(),
            self.collection
        );
        Ok(records)
    }
}

fn json_display_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(text) => text.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}
