use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::coordinator::{DeleteFlow, MutationCoordinator, RecordedTransaction, TotalsUpdate};
use crate::error::LedgerError;
use crate::identity::{IdentityProvider, IdentitySession, IdentityStatus, RetryPolicy};
use crate::models::{format_money, parse_amount, EntryKind, Person, Transaction};
use crate::store::{DocumentStore, Scope};
use crate::sync::{HistoryChange, PersonRegistry, TransactionLedger};

#[derive(Debug, Clone, Default)]
pub(crate) struct SessionOptions {
    pub(crate) app_id: Option<String>,
    pub(crate) totals: TotalsUpdate,
    pub(crate) retry: RetryPolicy,
}

/// Result of a mutation that ran in the background.
#[derive(Debug, Clone)]
pub(crate) enum Outcome {
    PersonAdded { person_id: String, name: String },
    Recorded { person_name: String, recorded: RecordedTransaction },
    Deleted(DeleteFlow),
    Failed { action: &'static str, message: String },
}

impl Outcome {
    pub(crate) fn is_failure(&self) -> bool {
        match self {
            Self::Failed { .. } => true,
            Self::Deleted(flow) => !matches!(flow.phase(), crate::coordinator::DeletePhase::Done),
            _ => false,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PersonAdded { name, .. } => write!(f, "Added {name}"),
            Self::Recorded {
                person_name,
                recorded,
            } => write!(
                f,
                "Recorded {} {} for {person_name}",
                recorded.kind,
                format_money(recorded.amount)
            ),
            Self::Deleted(flow) => write!(
                f,
                "Delete {}: {} ({} transactions removed)",
                flow.person_name(),
                flow.phase(),
                flow.children_deleted()
            ),
            Self::Failed { action, message } => write!(f, "{action} failed: {message}"),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) enum SessionEvent {
    Identity(IdentityStatus),
    PeopleUpdated,
    HistoryUpdated,
    Completed(Outcome),
}

/// The transaction modal: which person and which side of the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TransactionDraft {
    pub(crate) person_id: String,
    pub(crate) person_name: String,
    pub(crate) kind: EntryKind,
}

/// Everything a view needs: read models plus the intents it may send.
///
/// Owns the identity session, both live views and the coordinator. All
/// state changes happen in [`LedgerSession::next_event`] or in an intent
/// method, on the caller's task.
pub(crate) struct LedgerSession {
    store: Arc<dyn DocumentStore>,
    identity: IdentitySession,
    registry: PersonRegistry,
    history: TransactionLedger,
    coordinator: MutationCoordinator,
    app_id: Option<String>,
    scope: Option<Scope>,
    draft: Option<TransactionDraft>,
    pending_delete: Option<DeleteFlow>,
    /// Confirmed deletes whose outcome has not arrived yet.
    deleting: HashSet<String>,
    outcomes_tx: mpsc::UnboundedSender<Outcome>,
    outcomes_rx: mpsc::UnboundedReceiver<Outcome>,
}

enum Incoming {
    Identity(IdentityStatus),
    People(crate::store::Snapshot),
    History(crate::store::Snapshot),
    Outcome(Outcome),
}

impl LedgerSession {
    /// Must be called inside a tokio runtime.
    pub(crate) fn start(
        store: Arc<dyn DocumentStore>,
        provider: Arc<dyn IdentityProvider>,
        options: SessionOptions,
    ) -> Self {
        Self::with_coordinator(
            MutationCoordinator::new(store, options.totals),
            provider,
            options,
        )
    }

    pub(crate) fn with_coordinator(
        coordinator: MutationCoordinator,
        provider: Arc<dyn IdentityProvider>,
        options: SessionOptions,
    ) -> Self {
        let (outcomes_tx, outcomes_rx) = mpsc::unbounded_channel();
        Self {
            store: coordinator.store().clone(),
            identity: IdentitySession::start(provider, options.retry),
            registry: PersonRegistry::new(),
            history: TransactionLedger::new(),
            coordinator,
            app_id: options.app_id,
            scope: None,
            draft: None,
            pending_delete: None,
            deleting: HashSet::new(),
            outcomes_tx,
            outcomes_rx,
        }
    }

    // ── Read models ───────────────────────────────────────────

    pub(crate) fn identity_status(&self) -> IdentityStatus {
        self.identity.status()
    }

    pub(crate) fn scope(&self) -> Option<&Scope> {
        self.scope.as_ref()
    }

    pub(crate) fn people(&self) -> &[Person] {
        self.registry.people()
    }

    pub(crate) fn person(&self, id: &str) -> Option<&Person> {
        self.registry.get(id)
    }

    pub(crate) fn find_person(&self, key: &str) -> Option<&Person> {
        self.registry.find(key)
    }

    pub(crate) fn history_person(&self) -> Option<&str> {
        self.history.active_person()
    }

    pub(crate) fn history(&self) -> &[Transaction] {
        self.history.entries()
    }

    pub(crate) fn draft(&self) -> Option<&TransactionDraft> {
        self.draft.as_ref()
    }

    pub(crate) fn pending_delete(&self) -> Option<&DeleteFlow> {
        self.pending_delete.as_ref()
    }

    // ── Event loop ────────────────────────────────────────────

    /// Wait for the next identity transition, snapshot or finished
    /// mutation and fold it into the session state.
    pub(crate) async fn next_event(&mut self) -> SessionEvent {
        // Snapshots win over outcomes so a finished mutation is reported
        // after the view already reflects it.
        let incoming = tokio::select! {
            biased;
            status = self.identity.changed() => Incoming::Identity(status),
            Some(snapshot) = self.registry.next_snapshot() => Incoming::People(snapshot),
            Some(snapshot) = self.history.next_snapshot() => Incoming::History(snapshot),
            Some(outcome) = self.outcomes_rx.recv() => Incoming::Outcome(outcome),
        };
        match incoming {
            Incoming::Identity(status) => {
                self.on_identity(&status);
                SessionEvent::Identity(status)
            }
            Incoming::People(snapshot) => {
                self.registry.apply(snapshot);
                self.prune_selection();
                SessionEvent::PeopleUpdated
            }
            Incoming::History(snapshot) => {
                self.history.apply(snapshot);
                SessionEvent::HistoryUpdated
            }
            Incoming::Outcome(outcome) => {
                if let Outcome::Deleted(flow) = &outcome {
                    self.deleting.remove(flow.person_id());
                }
                if outcome.is_failure() {
                    warn!(%outcome, "mutation finished with failure");
                } else {
                    debug!(%outcome, "mutation finished");
                }
                SessionEvent::Completed(outcome)
            }
        }
    }

    fn on_identity(&mut self, status: &IdentityStatus) {
        match status.identity() {
            Some(identity) => {
                if self.scope.as_ref().map(Scope::identity) == Some(identity) {
                    return;
                }
                self.deactivate();
                let scope = Scope::new(self.app_id.as_deref(), identity.clone());
                if let Err(err) = self.registry.start(self.store.as_ref(), &scope) {
                    error!(error = %err, "could not subscribe to people");
                    return;
                }
                self.scope = Some(scope);
            }
            None => {
                if self.scope.is_some() {
                    info!("identity lost, stopping live views");
                }
                self.deactivate();
            }
        }
    }

    fn deactivate(&mut self) {
        self.history.close();
        self.registry.stop();
        self.scope = None;
        self.draft = None;
        self.pending_delete = None;
    }

    /// Drop selections that point at people no longer in the registry.
    fn prune_selection(&mut self) {
        if let Some(person_id) = self.history.active_person() {
            if !self.registry.contains(person_id) {
                debug!(person_id, "open history's person is gone");
                self.history.close();
            }
        }
        if let Some(draft) = &self.draft {
            if !self.registry.contains(&draft.person_id) {
                self.draft = None;
            }
        }
        if let Some(flow) = &self.pending_delete {
            if !self.registry.contains(flow.person_id()) {
                self.pending_delete = None;
            }
        }
    }

    fn require_scope(&self) -> Result<Scope, LedgerError> {
        self.scope.clone().ok_or(LedgerError::NoIdentity)
    }

    fn require_person(&self, person_id: &str) -> Result<Person, LedgerError> {
        self.registry
            .get(person_id)
            .cloned()
            .ok_or_else(|| LedgerError::UnknownPerson(person_id.to_string()))
    }

    /// Like [`Self::require_person`], but refuses people with a delete in flight.
    fn require_writable(&self, person_id: &str) -> Result<Person, LedgerError> {
        let person = self.require_person(person_id)?;
        if self.deleting.contains(&person.id) {
            debug!(person_id, "person is being deleted");
            return Err(LedgerError::Deleting(person.name));
        }
        Ok(person)
    }

    // ── Intents ───────────────────────────────────────────────

    /// Fire-and-forget; the new person shows up with the next snapshot.
    pub(crate) fn add_person(&mut self, name: &str) -> Result<(), LedgerError> {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(LedgerError::EmptyName);
        }
        let scope = self.require_scope()?;
        let coordinator = self.coordinator.clone();
        let tx = self.outcomes_tx.clone();
        tokio::spawn(async move {
            let outcome = match coordinator.add_person(&scope, &name).await {
                Ok(person_id) => Outcome::PersonAdded { person_id, name },
                Err(err) => Outcome::Failed {
                    action: "Add person",
                    message: err.to_string(),
                },
            };
            let _ = tx.send(outcome);
        });
        Ok(())
    }

    pub(crate) fn open_transaction_modal(
        &mut self,
        person_id: &str,
        kind: EntryKind,
    ) -> Result<(), LedgerError> {
        let person = self.require_writable(person_id)?;
        self.draft = Some(TransactionDraft {
            person_id: person.id,
            person_name: person.name,
            kind,
        });
        Ok(())
    }

    pub(crate) fn cancel_transaction_modal(&mut self) {
        self.draft = None;
    }

    /// Invalid input keeps the modal open and writes nothing.
    pub(crate) fn confirm_transaction(&mut self, amount: &str) -> Result<(), LedgerError> {
        let draft = self.draft.clone().ok_or(LedgerError::NoDraft)?;
        if parse_amount(amount).is_none() {
            debug!(input = amount, "amount rejected");
            return Err(LedgerError::InvalidAmount(amount.to_string()));
        }
        let scope = self.require_scope()?;
        let person = match self.require_writable(&draft.person_id) {
            Ok(person) => person,
            Err(err) => {
                self.draft = None;
                return Err(err);
            }
        };
        self.draft = None;

        let amount = amount.to_string();
        let coordinator = self.coordinator.clone();
        let tx = self.outcomes_tx.clone();
        tokio::spawn(async move {
            let outcome = match coordinator
                .record_transaction(&scope, &person, draft.kind, &amount)
                .await
            {
                Ok(recorded) => Outcome::Recorded {
                    person_name: person.name,
                    recorded,
                },
                Err(err) => Outcome::Failed {
                    action: "Record transaction",
                    message: err.to_string(),
                },
            };
            let _ = tx.send(outcome);
        });
        Ok(())
    }

    pub(crate) fn toggle_history(&mut self, person_id: &str) -> Result<HistoryChange, LedgerError> {
        let scope = self.require_scope()?;
        if !self.history.is_open_for(person_id) {
            self.require_person(person_id)?;
        }
        Ok(self
            .history
            .toggle(self.store.as_ref(), &scope, person_id)?)
    }

    /// Start the confirmation step of a delete.
    pub(crate) fn request_delete(&mut self, person_id: &str) -> Result<(), LedgerError> {
        let person = self.require_writable(person_id)?;
        self.pending_delete = Some(DeleteFlow::new(&person.id, &person.name));
        Ok(())
    }

    pub(crate) fn cancel_delete(&mut self) {
        if let Some(mut flow) = self.pending_delete.take() {
            flow.cancel();
        }
    }

    pub(crate) fn confirm_delete(&mut self) -> Result<(), LedgerError> {
        let scope = self.require_scope()?;
        let Some(mut flow) = self.pending_delete.take() else {
            return Err(LedgerError::NoDraft);
        };
        self.deleting.insert(flow.person_id().to_string());
        let coordinator = self.coordinator.clone();
        let tx = self.outcomes_tx.clone();
        tokio::spawn(async move {
            // Failure is recorded in the flow's phase.
            let _ = coordinator.run_delete(&mut flow, &scope).await;
            let _ = tx.send(Outcome::Deleted(flow));
        });
        Ok(())
    }

    /// Delete a person the caller has already confirmed.
    pub(crate) fn delete_person(&mut self, person_id: &str) -> Result<(), LedgerError> {
        self.request_delete(person_id)?;
        self.confirm_delete()
    }

    // ── One-shot helpers ──────────────────────────────────────

    /// Run the event loop until the first people snapshot is in.
    pub(crate) async fn ready(&mut self) -> Result<(), LedgerError> {
        loop {
            match self.next_event().await {
                SessionEvent::PeopleUpdated => return Ok(()),
                SessionEvent::Identity(IdentityStatus::Failed(reason)) => {
                    error!(%reason, "cannot reach the ledger without an identity");
                    return Err(LedgerError::NoIdentity);
                }
                _ => {}
            }
        }
    }

    /// Run the event loop until the next background mutation finishes.
    pub(crate) async fn settle(&mut self) -> Outcome {
        loop {
            if let SessionEvent::Completed(outcome) = self.next_event().await {
                return outcome;
            }
        }
    }
}
