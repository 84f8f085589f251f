pub mod catalog;
pub mod context;
pub mod firestore;
pub mod history_store;
pub mod service;

pub use context::{persona_instructions, render_catalog, ContextBuilder, DEFAULT_REPLY};
pub use history_store::{Exchange, HistoryStore, StoreError};
pub use service::{PassOutcome, TriageError, TriagePoller, TriageService};
