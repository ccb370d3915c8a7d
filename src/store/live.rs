use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::trace;

use super::{CollectionPath, Document};

/// Full current state of one collection.
#[derive(Debug, Clone)]
pub(crate) struct Snapshot {
    pub(crate) collection: CollectionPath,
    pub(crate) documents: Vec<Document>,
}

struct Listener {
    id: u64,
    tx: mpsc::UnboundedSender<Snapshot>,
}

#[derive(Default)]
struct Listeners {
    next_id: u64,
    by_collection: HashMap<CollectionPath, Vec<Listener>>,
}

impl Listeners {
    fn remove(&mut self, collection: &CollectionPath, id: u64) {
        if let Some(list) = self.by_collection.get_mut(collection) {
            list.retain(|l| l.id != id);
            if list.is_empty() {
                self.by_collection.remove(collection);
            }
        }
    }
}

/// Fan-out of collection snapshots to live subscribers.
///
/// Stores register a subscriber and publish while holding their own data
/// lock, so a subscriber never misses a write that lands between its
/// initial snapshot and its registration.
#[derive(Clone, Default)]
pub(crate) struct LiveQueries {
    inner: Arc<Mutex<Listeners>>,
}

impl LiveQueries {
    pub(crate) fn register(
        &self,
        collection: &CollectionPath,
        initial: Vec<Document>,
    ) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock();
        inner.next_id += 1;
        let id = inner.next_id;
        // Receiver is alive, the first send cannot fail.
        let _ = tx.send(Snapshot {
            collection: collection.clone(),
            documents: initial,
        });
        inner
            .by_collection
            .entry(collection.clone())
            .or_default()
            .push(Listener { id, tx });
        trace!(%collection, id, "live query registered");
        Subscription {
            collection: collection.clone(),
            id,
            rx,
            hub: Arc::downgrade(&self.inner),
        }
    }

    pub(crate) fn has_listeners(&self, collection: &CollectionPath) -> bool {
        self.inner.lock().by_collection.contains_key(collection)
    }

    pub(crate) fn publish(&self, collection: &CollectionPath, documents: Vec<Document>) {
        let mut inner = self.inner.lock();
        let Some(list) = inner.by_collection.get_mut(collection) else {
            return;
        };
        list.retain(|l| {
            l.tx.send(Snapshot {
                collection: collection.clone(),
                documents: documents.clone(),
            })
            .is_ok()
        });
        if list.is_empty() {
            inner.by_collection.remove(collection);
        }
    }

    /// Number of open subscriptions whose path ends with `suffix`.
    #[cfg(test)]
    pub(crate) fn active_matching(&self, suffix: &str) -> usize {
        self.inner
            .lock()
            .by_collection
            .iter()
            .filter(|(path, _)| path.as_str().ends_with(suffix))
            .map(|(_, list)| list.len())
            .sum()
    }

    #[cfg(test)]
    pub(crate) fn active_for(&self, collection: &CollectionPath) -> usize {
        self.inner
            .lock()
            .by_collection
            .get(collection)
            .map_or(0, Vec::len)
    }
}

/// Handle to a live query: a lazy, non-restartable sequence of snapshots.
/// Unsubscribes on drop.
pub(crate) struct Subscription {
    collection: CollectionPath,
    id: u64,
    rx: mpsc::UnboundedReceiver<Snapshot>,
    hub: Weak<Mutex<Listeners>>,
}

impl Subscription {
    pub(crate) fn collection(&self) -> &CollectionPath {
        &self.collection
    }

    /// Next snapshot, or `None` once the store has gone away.
    pub(crate) async fn next(&mut self) -> Option<Snapshot> {
        self.rx.recv().await
    }

    #[cfg(test)]
    pub(crate) fn try_next(&mut self) -> Option<Snapshot> {
        self.rx.try_recv().ok()
    }

    pub(crate) fn cancel(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.lock().remove(&self.collection, self.id);
            trace!(collection = %self.collection, id = self.id, "live query released");
        }
    }
}
