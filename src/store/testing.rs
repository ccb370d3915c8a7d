//! Store wrapper for tests: records every operation and fails the ones a
//! test picks.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{
    CollectionPath, Document, DocumentPath, DocumentStore, MemoryStore, Subscription, WriteSet,
};
use crate::error::StoreError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Op {
    CreateWithId(String),
    Create(String),
    Update(String, Vec<String>),
    Delete(String),
    List(String),
    Subscribe(String),
}

impl Op {
    pub(crate) fn path(&self) -> &str {
        match self {
            Self::CreateWithId(p)
            | Self::Create(p)
            | Self::Update(p, _)
            | Self::Delete(p)
            | Self::List(p)
            | Self::Subscribe(p) => p,
        }
    }

    pub(crate) fn is_write(&self) -> bool {
        !matches!(self, Self::List(_) | Self::Subscribe(_))
    }
}

type FailRule = Box<dyn Fn(&Op) -> bool + Send + Sync>;

pub(crate) struct RecordingStore {
    inner: Arc<MemoryStore>,
    ops: Mutex<Vec<Op>>,
    fail: Mutex<Vec<FailRule>>,
}

impl RecordingStore {
    pub(crate) fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            ops: Mutex::new(Vec::new()),
            fail: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn inner(&self) -> &Arc<MemoryStore> {
        &self.inner
    }

    /// Operations matching `rule` are still recorded but fail with
    /// `Unavailable` without reaching the inner store.
    pub(crate) fn fail_when(&self, rule: impl Fn(&Op) -> bool + Send + Sync + 'static) {
        self.fail.lock().push(Box::new(rule));
    }

    pub(crate) fn ops(&self) -> Vec<Op> {
        self.ops.lock().clone()
    }

    pub(crate) fn writes(&self) -> Vec<Op> {
        self.ops().into_iter().filter(Op::is_write).collect()
    }

    pub(crate) fn clear(&self) {
        self.ops.lock().clear();
    }

    fn record(&self, op: Op) -> Result<(), StoreError> {
        let failing = self.fail.lock().iter().any(|rule| rule(&op));
        let path = op.path().to_string();
        self.ops.lock().push(op);
        if failing {
            Err(StoreError::Unavailable(format!("injected failure on {path}")))
        } else {
            Ok(())
        }
    }
}

fn field_names(writes: &WriteSet) -> Vec<String> {
    writes.keys().cloned().collect()
}

#[async_trait]
impl DocumentStore for RecordingStore {
    async fn create_with_id(&self, doc: &DocumentPath, writes: WriteSet) -> Result<(), StoreError> {
        self.record(Op::CreateWithId(doc.to_string()))?;
        self.inner.create_with_id(doc, writes).await
    }

    async fn create(
        &self,
        collection: &CollectionPath,
        writes: WriteSet,
    ) -> Result<String, StoreError> {
        self.record(Op::Create(collection.to_string()))?;
        self.inner.create(collection, writes).await
    }

    async fn update(&self, doc: &DocumentPath, writes: WriteSet) -> Result<(), StoreError> {
        self.record(Op::Update(doc.to_string(), field_names(&writes)))?;
        self.inner.update(doc, writes).await
    }

    async fn delete(&self, doc: &DocumentPath) -> Result<(), StoreError> {
        self.record(Op::Delete(doc.to_string()))?;
        self.inner.delete(doc).await
    }

    async fn list(&self, collection: &CollectionPath) -> Result<Vec<Document>, StoreError> {
        self.record(Op::List(collection.to_string()))?;
        self.inner.list(collection).await
    }

    fn subscribe(&self, collection: &CollectionPath) -> Result<Subscription, StoreError> {
        self.record(Op::Subscribe(collection.to_string()))?;
        self.inner.subscribe(collection)
    }
}
