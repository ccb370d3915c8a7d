use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::models::{sort_people, Person};
use crate::store::{DocumentStore, Scope, Snapshot, Subscription};

/// Live view of the scope's `people` collection.
///
/// State is rebuilt from every snapshot; nothing outside this type writes
/// to it. Writes go through the mutation coordinator.
#[derive(Default)]
pub(crate) struct PersonRegistry {
    subscription: Option<Subscription>,
    by_id: HashMap<String, Person>,
    ordered: Vec<Person>,
}

impl PersonRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Subscribe for `scope`, releasing any previous subscription first.
    pub(crate) fn start(
        &mut self,
        store: &dyn DocumentStore,
        scope: &Scope,
    ) -> Result<(), StoreError> {
        self.stop();
        let subscription = store.subscribe(&scope.people())?;
        info!(collection = %subscription.collection(), "person registry started");
        self.subscription = Some(subscription);
        Ok(())
    }

    pub(crate) fn stop(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            info!(collection = %subscription.collection(), "person registry stopped");
            subscription.cancel();
        }
        self.by_id.clear();
        self.ordered.clear();
    }

    #[cfg(test)]
    pub(crate) fn is_active(&self) -> bool {
        self.subscription.is_some()
    }

    /// Next snapshot of the active subscription. Pending forever while
    /// inactive, so it can sit in a `select!` unconditionally.
    pub(crate) async fn next_snapshot(&mut self) -> Option<Snapshot> {
        match self.subscription.as_mut() {
            Some(subscription) => subscription.next().await,
            None => std::future::pending().await,
        }
    }

    /// Replace the whole mapping with the snapshot's contents.
    pub(crate) fn apply(&mut self, snapshot: Snapshot) {
        let Some(subscription) = &self.subscription else {
            return;
        };
        if snapshot.collection != *subscription.collection() {
            debug!(collection = %snapshot.collection, "ignoring snapshot from stale scope");
            return;
        }
        let mut by_id = HashMap::with_capacity(snapshot.documents.len());
        for doc in &snapshot.documents {
            match Person::from_document(doc) {
                Ok(person) => {
                    by_id.insert(person.id.clone(), person);
                }
                Err(err) => warn!(error = %err, "skipping undecodable person"),
            }
        }
        let mut ordered: Vec<Person> = by_id.values().cloned().collect();
        sort_people(&mut ordered);
        debug!(people = ordered.len(), "person snapshot applied");
        self.by_id = by_id;
        self.ordered = ordered;
    }

    /// People in presentation order.
    pub(crate) fn people(&self) -> &[Person] {
        &self.ordered
    }

    pub(crate) fn get(&self, id: &str) -> Option<&Person> {
        self.by_id.get(id)
    }

    pub(crate) fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    /// Lookup by id, else by case-insensitive name.
    pub(crate) fn find(&self, key: &str) -> Option<&Person> {
        self.get(key).or_else(|| {
            let lower = key.trim().to_lowercase();
            self.ordered.iter().find(|p| p.name.to_lowercase() == lower)
        })
    }
}
