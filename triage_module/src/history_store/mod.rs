//! Per-correspondent conversation history persistence.
//!
//! Two backings expose identical semantics to the context builder: a local
//! JSON document rewritten in full on every update, and a Firestore document
//! per correspondent. The bounded-history invariant lives here: `append`
//! trims to the cap (oldest first) before persisting, never lazily.

mod firestore;
mod json_file;

pub use firestore::FirestoreHistoryStore;
pub use json_file::JsonFileHistoryStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::firestore::FirestoreError;

/// Maximum exchanges retained per correspondent unless configured otherwise.
pub const DEFAULT_HISTORY_CAP: usize = 5;

/// One request/response pair. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exchange {
    pub timestamp: DateTime<Utc>,
    pub incoming: String,
    pub outgoing: String,
}

/// Error types for history persistence.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("firestore error: {0}")]
    Firestore(#[from] FirestoreError),
}

/// Key-value persistence keyed by correspondent.
///
/// Implementations may be touched concurrently for different correspondents;
/// same-correspondent concurrent appends have an accepted read-then-write
/// race (single-poll usage pattern).
pub trait HistoryStore {
    /// Stored history for a correspondent, oldest first. Absent ⇒ empty.
    fn load(&self, correspondent: &str) -> Result<Vec<Exchange>, StoreError>;

    /// Append one exchange, then evict oldest entries until the stored
    /// sequence is within the cap.
    fn append(&self, correspondent: &str, exchange: Exchange) -> Result<(), StoreError>;

    /// Drop all history for a correspondent.
    fn clear(&self, correspondent: &str) -> Result<(), StoreError>;
}

/// Evict oldest entries until `history` holds at most `cap` exchanges.
pub(crate) fn trim_to_cap(history: &mut Vec<Exchange>, cap: usize) {
    if history.len() > cap {
        let excess = history.len() - cap;
        history.drain(..excess);
    }
}
