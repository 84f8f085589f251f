//! Minimal Firestore REST document client.
//!
//! Covers the surface the history store and catalog need: get, set and
//! delete a single document, and list a collection. Values are modeled as
//! the typed wrappers the REST API uses (`stringValue`, `arrayValue`, ...).
//!
//! Configuration:
//! - `FIRESTORE_API_BASE_URL`: API base URL override (default: `https://firestore.googleapis.com`)

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use google_auth_module::{GoogleAuth, GoogleAuthError};

/// Default Firestore API base URL.
const DEFAULT_API_BASE_URL: &str = "https://firestore.googleapis.com";

/// Error types for Firestore operations.
#[derive(Debug, thiserror::Error)]
pub enum FirestoreError {
    #[error("auth error: {0}")]
    Auth(#[from] GoogleAuthError),
    #[error("http error: {0}")]
    Http(String),
    #[error("firestore api error: HTTP {status}: {body}")]
    Api { status: u16, body: String },
    #[error("json error: {0}")]
    Json(String),
}

/// A typed Firestore value. Externally tagged serialization matches the REST
/// wire format, e.g. `{"stringValue": "x"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    #[serde(rename = "stringValue")]
    String(String),
    /// Int64, carried as a decimal string on the wire.
    #[serde(rename = "integerValue")]
    Integer(String),
    #[serde(rename = "doubleValue")]
    Double(f64),
    #[serde(rename = "booleanValue")]
    Boolean(bool),
    #[serde(rename = "timestampValue")]
    Timestamp(String),
    #[serde(rename = "arrayValue")]
    Array(ArrayValue),
    #[serde(rename = "mapValue")]
    Map(MapValue),
    #[serde(rename = "nullValue")]
    Null(()),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ArrayValue {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<Value>>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MapValue {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<BTreeMap<String, Value>>,
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(text) => Some(text),
            _ => None,
        }
    }

    /// Render a scalar value for display; containers and nulls render empty.
    pub fn display_string(&self) -> String {
        match self {
            Value::String(text) => text.clone(),
            Value::Integer(number) => number.clone(),
            Value::Double(number) => number.to_string(),
            Value::Boolean(flag) => flag.to_string(),
            Value::Timestamp(stamp) => stamp.clone(),
            Value::Array(_) | Value::Map(_) | Value::Null(()) => String::new(),
        }
    }
}

/// One Firestore document. `update_time` is server-assigned on every write.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Document {
    pub name: Option<String>,
    pub fields: Option<BTreeMap<String, Value>>,
    #[serde(rename = "createTime")]
    pub create_time: Option<String>,
    #[serde(rename = "updateTime")]
    pub update_time: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListDocumentsResponse {
    documents: Option<Vec<Document>>,
}

#[derive(Debug, Serialize)]
struct WriteDocumentRequest<'a> {
    fields: &'a BTreeMap<String, Value>,
}

/// Firestore client bound to one project's default database.
#[derive(Debug, Clone)]
pub struct FirestoreClient {
    auth: GoogleAuth,
    project: String,
}

impl FirestoreClient {
    pub fn new(auth: GoogleAuth, project: &str) -> Self {
        Self {
            auth,
            project: project.to_string(),
        }
    }

    fn documents_base(&self) -> String {
        let base =
            std::env::var("FIRESTORE_API_BASE_URL").unwrap_or_else(|_| DEFAULT_API_BASE_URL.to_string());
        format!(
            "{}/v1/projects/{}/databases/(default)/documents",
            base, self.project
        )
    }

    /// Fetch one document. A missing document is `Ok(None)`.
    pub fn get_document(
        &self,
        collection: &str,
        doc_id: &str,
    ) -> Result<Option<Document>, FirestoreError> {
        let access_token = self.auth.get_access_token()?;
        let client = reqwest::blocking::Client::new();

        let url = format!("{}/{}/{}", self.documents_base(), collection, doc_id);
        let response = client
            .get(&url)
            .header("Authorization", format!("Bearer {}", access_token))
            .send()
            .map_err(|e| FirestoreError::Http(e.to_string()))?;

        if response.status().as_u16() == 404 {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            error!(
                "failed to get document {}/{}: {} - {}",
                collection, doc_id, status, body
            );
            return Err(FirestoreError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let document: Document = response
            .json()
            .map_err(|e| FirestoreError::Json(e.to_string()))?;
        Ok(Some(document))
    }

    /// Create or replace a document. Returns the stored document with its
    /// server-assigned update time.
    pub fn set_document(
        &self,
        collection: &str,
        doc_id: &str,
        fields: &BTreeMap<String, Value>,
    ) -> Result<Document, FirestoreError> {
        let access_token = self.auth.get_access_token()?;
        let client = reqwest::blocking::Client::new();

        let url = format!("{}/{}/{}", self.documents_base(), collection, doc_id);
        let response = client
            .patch(&url)
            .header("Authorization", format!("Bearer {}", access_token))
            .json(&WriteDocumentRequest { fields })
            .send()
            .map_err(|e| FirestoreError::Http(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            error!(
                "failed to set document {}/{}: {} - {}",
                collection, doc_id, status, body
            );
            return Err(FirestoreError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let document: Document = response
            .json()
            .map_err(|e| FirestoreError::Json(e.to_string()))?;
        debug!(
            "document {}/{} written at {:?}",
            collection, doc_id, document.update_time
        );
        Ok(document)
    }

    /// Delete a document. Deleting a missing document succeeds.
    pub fn delete_document(&self, collection: &str, doc_id: &str) -> Result<(), FirestoreError> {
        let access_token = self.auth.get_access_token()?;
        let client = reqwest::blocking::Client::new();

        let url = format!("{}/{}/{}", self.documents_base(), collection, doc_id);
        let response = client
            .delete(&url)
            .header("Authorization", format!("Bearer {}", access_token))
            .send()
            .map_err(|e| FirestoreError::Http(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            error!(
                "failed to delete document {}/{}: {} - {}",
                collection, doc_id, status, body
            );
            return Err(FirestoreError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }

    /// List all documents of a collection, in document order.
    pub fn list_documents(&self, collection: &str) -> Result<Vec<Document>, FirestoreError> {
        let access_token = self.auth.get_access_token()?;
        let client = reqwest::blocking::Client::new();

        let url = format!("{}/{}", self.documents_base(), collection);
        let response = client
            .get(&url)
            .header("Authorization", format!("Bearer {}", access_token))
            .send()
            .map_err(|e| FirestoreError::Http(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            error!("failed to list collection {}: {} - {}", collection, status, body);
            return Err(FirestoreError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let list: ListDocumentsResponse = response
            .json()
            .map_err(|e| FirestoreError::Json(e.to_string()))?;
        Ok(list.documents.unwrap_or_default())
    }
}
