mod live;
mod memory;
mod path;
mod schema;
mod sqlite;

#[cfg(test)]
pub(crate) mod testing;

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

pub(crate) use live::{LiveQueries, Snapshot, Subscription};
pub(crate) use memory::MemoryStore;
pub(crate) use path::{CollectionPath, DocumentPath, Scope};
pub(crate) use sqlite::SqliteStore;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub(crate) enum Value {
    Text(String),
    Number(Decimal),
    Timestamp(DateTime<Utc>),
}

pub(crate) type Fields = BTreeMap<String, Value>;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Document {
    pub(crate) id: String,
    pub(crate) fields: Fields,
}

impl Document {
    pub(crate) fn text(&self, field: &str) -> Option<&str> {
        match self.fields.get(field) {
            Some(Value::Text(s)) => Some(s),
            _ => None,
        }
    }

    pub(crate) fn number(&self, field: &str) -> Option<Decimal> {
        match self.fields.get(field) {
            Some(Value::Number(n)) => Some(*n),
            _ => None,
        }
    }

    pub(crate) fn timestamp(&self, field: &str) -> Option<DateTime<Utc>> {
        match self.fields.get(field) {
            Some(Value::Timestamp(t)) => Some(*t),
            _ => None,
        }
    }
}

/// A single field write. `ServerTimestamp` and `Increment` are resolved by
/// the store, never by the caller.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum FieldWrite {
    Set(Value),
    ServerTimestamp,
    Increment(Decimal),
}

pub(crate) type WriteSet = BTreeMap<String, FieldWrite>;

pub(crate) fn text(value: impl Into<String>) -> FieldWrite {
    FieldWrite::Set(Value::Text(value.into()))
}

pub(crate) fn number(value: Decimal) -> FieldWrite {
    FieldWrite::Set(Value::Number(value))
}

/// Fold `writes` into `fields`. Returns the names of server-timestamp fields
/// left unresolved when `now` is `None` (acknowledgement held back).
pub(crate) fn apply_writes(
    path: &DocumentPath,
    fields: &mut Fields,
    writes: WriteSet,
    now: Option<DateTime<Utc>>,
) -> Result<Vec<String>, StoreError> {
    let mut pending = Vec::new();
    for (name, write) in writes {
        match write {
            FieldWrite::Set(value) => {
                fields.insert(name, value);
            }
            FieldWrite::ServerTimestamp => match now {
                Some(now) => {
                    fields.insert(name, Value::Timestamp(now));
                }
                None => {
                    fields.remove(&name);
                    pending.push(name);
                }
            },
            FieldWrite::Increment(by) => {
                let current = match fields.get(&name) {
                    None => Decimal::ZERO,
                    Some(Value::Number(n)) => *n,
                    Some(_) => {
                        return Err(StoreError::NotANumber {
                            path: path.to_string(),
                            field: name,
                        })
                    }
                };
                let Some(total) = current.checked_add(by) else {
                    return Err(StoreError::Overflow {
                        path: path.to_string(),
                        field: name,
                    });
                };
                fields.insert(name, Value::Number(total));
            }
        }
    }
    Ok(pending)
}

/// Hierarchical document store with live queries.
///
/// Writes are not read-your-writes for subscribers: a subscription observes
/// a write only when the store publishes the next snapshot.
#[async_trait]
pub(crate) trait DocumentStore: Send + Sync {
    /// Create or overwrite the document at `doc`.
    async fn create_with_id(&self, doc: &DocumentPath, writes: WriteSet) -> Result<(), StoreError>;

    /// Create a document with a store-generated id and return that id.
    async fn create(&self, collection: &CollectionPath, writes: WriteSet)
        -> Result<String, StoreError>;

    /// Merge `writes` into an existing document. Fails with `NotFound` when
    /// the document does not exist.
    async fn update(&self, doc: &DocumentPath, writes: WriteSet) -> Result<(), StoreError>;

    /// Deleting a missing document is not an error.
    async fn delete(&self, doc: &DocumentPath) -> Result<(), StoreError>;

    async fn list(&self, collection: &CollectionPath) -> Result<Vec<Document>, StoreError>;

    /// Open a live query. The first snapshot is the collection's current
    /// state; dropping the handle unsubscribes.
    fn subscribe(&self, collection: &CollectionPath) -> Result<Subscription, StoreError>;
}
