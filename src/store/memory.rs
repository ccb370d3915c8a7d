use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use tracing::debug;

use super::{
    apply_writes, CollectionPath, Document, DocumentPath, DocumentStore, Fields, LiveQueries,
    Subscription, WriteSet,
};
use crate::error::StoreError;

#[derive(Default)]
struct MemoryState {
    collections: HashMap<CollectionPath, BTreeMap<String, Fields>>,
    hold_acks: bool,
    /// Server timestamp fields waiting for acknowledgement.
    pending: Vec<(DocumentPath, String)>,
}

impl MemoryState {
    fn documents(&self, collection: &CollectionPath) -> Vec<Document> {
        self.collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, fields)| Document {
                        id: id.clone(),
                        fields: fields.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn server_now(&self) -> Option<chrono::DateTime<Utc>> {
        (!self.hold_acks).then(Utc::now)
    }
}

/// Ephemeral in-process document store.
#[derive(Default)]
pub(crate) struct MemoryStore {
    state: Mutex<MemoryState>,
    live: LiveQueries,
}

impl MemoryStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// While held, server timestamps stay absent in published snapshots
    /// until [`MemoryStore::release_acks`] is called.
    #[cfg(test)]
    pub(crate) fn hold_acks(&self, hold: bool) {
        self.state.lock().hold_acks = hold;
    }

    /// Resolve every held server timestamp and republish the affected
    /// collections.
    #[cfg(test)]
    pub(crate) fn release_acks(&self) {
        let mut state = self.state.lock();
        let now = Utc::now();
        let pending = std::mem::take(&mut state.pending);
        let mut touched: Vec<CollectionPath> = Vec::new();
        for (doc, field) in pending {
            if let Some(fields) = state
                .collections
                .get_mut(&doc.collection)
                .and_then(|c| c.get_mut(&doc.id))
            {
                fields.insert(field, super::Value::Timestamp(now));
                if !touched.contains(&doc.collection) {
                    touched.push(doc.collection.clone());
                }
            }
        }
        for collection in touched {
            self.live.publish(&collection, state.documents(&collection));
        }
    }

    #[cfg(test)]
    pub(crate) fn live(&self) -> &LiveQueries {
        &self.live
    }

    fn write(
        &self,
        doc: &DocumentPath,
        writes: WriteSet,
        must_exist: bool,
        replace: bool,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        let now = state.server_now();
        let existing = state
            .collections
            .get(&doc.collection)
            .and_then(|c| c.get(&doc.id))
            .cloned();
        if must_exist && existing.is_none() {
            return Err(StoreError::NotFound(doc.to_string()));
        }
        let mut fields = if replace {
            Fields::new()
        } else {
            existing.unwrap_or_default()
        };
        let unresolved = apply_writes(doc, &mut fields, writes, now)?;
        state
            .pending
            .extend(unresolved.into_iter().map(|f| (doc.clone(), f)));
        state
            .collections
            .entry(doc.collection.clone())
            .or_default()
            .insert(doc.id.clone(), fields);
        self.live
            .publish(&doc.collection, state.documents(&doc.collection));
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn create_with_id(&self, doc: &DocumentPath, writes: WriteSet) -> Result<(), StoreError> {
        self.write(doc, writes, false, true)
    }

    async fn create(
        &self,
        collection: &CollectionPath,
        writes: WriteSet,
    ) -> Result<String, StoreError> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        self.write(&collection.doc(&id), writes, false, true)?;
        Ok(id)
    }

    async fn update(&self, doc: &DocumentPath, writes: WriteSet) -> Result<(), StoreError> {
        self.write(doc, writes, true, false)
    }

    async fn delete(&self, doc: &DocumentPath) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        let removed = state
            .collections
            .get_mut(&doc.collection)
            .and_then(|c| c.remove(&doc.id))
            .is_some();
        if removed {
            state.pending.retain(|(p, _)| p != doc);
            self.live
                .publish(&doc.collection, state.documents(&doc.collection));
        } else {
            debug!(%doc, "delete of missing document");
        }
        Ok(())
    }

    async fn list(&self, collection: &CollectionPath) -> Result<Vec<Document>, StoreError> {
        Ok(self.state.lock().documents(collection))
    }

    fn subscribe(&self, collection: &CollectionPath) -> Result<Subscription, StoreError> {
        let state = self.state.lock();
        Ok(self.live.register(collection, state.documents(collection)))
    }
}
