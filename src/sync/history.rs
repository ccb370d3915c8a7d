use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::models::{sort_history, Transaction};
use crate::store::{DocumentStore, Scope, Snapshot, Subscription};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HistoryChange {
    Opened,
    Closed,
    Switched,
}

struct ActiveHistory {
    person_id: String,
    subscription: Subscription,
}

/// The one transaction history currently on screen.
///
/// Holds at most one live subscription. Every transition drops the old
/// handle before a new one is requested from the store.
#[derive(Default)]
pub(crate) struct TransactionLedger {
    active: Option<ActiveHistory>,
    entries: Vec<Transaction>,
}

impl TransactionLedger {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn active_person(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.person_id.as_str())
    }

    pub(crate) fn is_open_for(&self, person_id: &str) -> bool {
        self.active_person() == Some(person_id)
    }

    /// Close when `person_id` is already open, otherwise switch to it.
    pub(crate) fn toggle(
        &mut self,
        store: &dyn DocumentStore,
        scope: &Scope,
        person_id: &str,
    ) -> Result<HistoryChange, StoreError> {
        if self.is_open_for(person_id) {
            self.close();
            return Ok(HistoryChange::Closed);
        }
        let switched = self.active.is_some();
        self.open(store, scope, person_id)?;
        Ok(if switched {
            HistoryChange::Switched
        } else {
            HistoryChange::Opened
        })
    }

    pub(crate) fn open(
        &mut self,
        store: &dyn DocumentStore,
        scope: &Scope,
        person_id: &str,
    ) -> Result<(), StoreError> {
        self.close();
        let subscription = store.subscribe(&scope.transactions(person_id))?;
        info!(person_id, "history opened");
        self.active = Some(ActiveHistory {
            person_id: person_id.to_string(),
            subscription,
        });
        Ok(())
    }

    pub(crate) fn close(&mut self) {
        if let Some(active) = self.active.take() {
            info!(person_id = %active.person_id, "history closed");
            active.subscription.cancel();
        }
        self.entries.clear();
    }

    pub(crate) async fn next_snapshot(&mut self) -> Option<Snapshot> {
        match self.active.as_mut() {
            Some(active) => active.subscription.next().await,
            None => std::future::pending().await,
        }
    }

    /// Replace the list with the snapshot's contents, newest first.
    pub(crate) fn apply(&mut self, snapshot: Snapshot) {
        let Some(active) = &self.active else {
            return;
        };
        if snapshot.collection != *active.subscription.collection() {
            debug!(collection = %snapshot.collection, "ignoring snapshot from closed history");
            return;
        }
        let mut entries: Vec<Transaction> = snapshot
            .documents
            .iter()
            .filter_map(|doc| match Transaction::from_document(doc) {
                Ok(t) => Some(t),
                Err(err) => {
                    warn!(error = %err, "skipping undecodable transaction");
                    None
                }
            })
            .collect();
        sort_history(&mut entries);
        debug!(person_id = %active.person_id, entries = entries.len(), "history snapshot applied");
        self.entries = entries;
    }

    pub(crate) fn entries(&self) -> &[Transaction] {
        &self.entries
    }
}
