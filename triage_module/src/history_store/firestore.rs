//! Firestore-backed history store: one document per correspondent in the
//! conversations collection, exchanges carried as an array of maps. The
//! document update time is server-assigned on every write.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::firestore::{ArrayValue, FirestoreClient, MapValue, Value};

use super::{trim_to_cap, Exchange, HistoryStore, StoreError, DEFAULT_HISTORY_CAP};

#[derive(Debug, Clone)]
pub struct FirestoreHistoryStore {
    client: FirestoreClient,
    collection: String,
    cap: usize,
}

impl FirestoreHistoryStore {
    pub fn new(client: FirestoreClient, collection: &str) -> Self {
        Self {
            client,
            collection: collection.to_string(),
            cap: DEFAULT_HISTORY_CAP,
        }
    }

    /// Overrides the per-correspondent exchange cap.
    pub fn with_cap(mut self, cap: usize) -> Self {
        self.cap = cap;
        self
    }

    fn encode_exchange(exchange: &Exchange) -> Value {
        let mut fields = BTreeMap::new();
        fields.insert(
            "timestamp".to_string(),
            Value::Timestamp(exchange.timestamp.to_rfc3339()),
        );
        fields.insert(
            "incoming".to_string(),
            Value::String(exchange.incoming.clone()),
        );
        fields.insert(
            "outgoing".to_string(),
            Value::String(exchange.outgoing.clone()),
        );
        Value::Map(MapValue {
            fields: Some(fields),
        })
    }

    fn decode_exchange(value: &Value) -> Option<Exchange> {
        let fields = match value {
            Value::Map(MapValue {
                fields: Some(fields),
            }) => fields,
            _ => return None,
        };
        let timestamp = match fields.get("timestamp") {
            Some(Value::Timestamp(raw)) | Some(Value::String(raw)) => {
                DateTime::parse_from_rfc3339(raw)
                    .ok()?
                    .with_timezone(&Utc)
            }
            _ => return None,
        };
        let incoming = fields.get("incoming")?.as_str()?.to_string();
        let outgoing = fields.get("outgoing")?.as_str()?.to_string();
        Some(Exchange {
            timestamp,
            incoming,
            outgoing,
        })
    }
}

impl HistoryStore for FirestoreHistoryStore {
    fn load(&self, correspondent: &str) -> Result<Vec<Exchange>, StoreError> {
        let document = match self.client.get_document(&self.collection, correspondent)? {
            Some(document) => document,
            None => return Ok(Vec::new()),
        };

        let values = document
            .fields
            .as_ref()
            .and_then(|fields| fields.get("exchanges"))
            .and_then(|value| match value {
                Value::Array(ArrayValue {
                    values: Some(values),
                }) => Some(values.as_slice()),
                _ => None,
            })
            .unwrap_or_default();

        let mut history = Vec::with_capacity(values.len());
        for value in values {
            match Self::decode_exchange(value) {
                Some(exchange) => history.push(exchange),
                None => warn!(
                    "skipping malformed exchange entry for {} in {}",
                    correspondent, self.collection
                ),
            }
        }
        Ok(history)
    }

    fn append(&self, correspondent: &str, exchange: Exchange) -> Result<(), StoreError> {
        let mut history = self.load(correspondent)?;
        history.push(exchange);
        trim_to_cap(&mut history, self.cap);

        let mut fields = BTreeMap::new();
        fields.insert(
            "email".to_string(),
            Value::String(correspondent.to_string()),
        );
        fields.insert(
            "exchanges".to_string(),
            Value::Array(ArrayValue {
                values: Some(history.iter().map(Self::encode_exchange).collect()),
            }),
        );

        self.client
            .set_document(&self.collection, correspondent, &fields)?;
        Ok(())
    }

    fn clear(&self, correspondent: &str) -> Result<(), StoreError> {
        self.client
            .delete_document(&self.collection, correspondent)?;
        Ok(())
    }
}
