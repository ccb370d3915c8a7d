mod delete;

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument};

use crate::error::{DeleteError, LedgerError, StoreError};
use crate::models::{make_id, parse_amount, EntryKind, Person, Transaction};
use crate::store::{DocumentStore, FieldWrite, Scope, WriteSet};

pub(crate) use delete::{DeleteFlow, DeletePhase};

/// How Record Transaction moves a person's running total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum TotalsUpdate {
    /// Store-side increment; concurrent records never lose an update.
    #[default]
    AtomicIncrement,
    /// Writes `snapshot total + amount`. Two records issued against the
    /// same stale snapshot lose one of the amounts.
    ReadModifyWrite,
}

pub(crate) trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub(crate) struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Millisecond stamps that never repeat, so two people created with the
/// same name in the same millisecond still get distinct ids.
struct MonotonicStamp {
    clock: Arc<dyn Clock>,
    last_ms: Mutex<i64>,
}

impl MonotonicStamp {
    fn next(&self) -> DateTime<Utc> {
        let now = self.clock.now();
        let mut last = self.last_ms.lock();
        let ms = now.timestamp_millis().max(*last + 1);
        *last = ms;
        Utc.timestamp_millis_opt(ms).single().unwrap_or(now)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RecordedTransaction {
    pub(crate) person_id: String,
    pub(crate) transaction_id: String,
    pub(crate) kind: EntryKind,
    pub(crate) amount: Decimal,
}

/// Every write to the ledger goes through here.
///
/// The coordinator never reads back what it wrote; callers observe results
/// through their live subscriptions.
#[derive(Clone)]
pub(crate) struct MutationCoordinator {
    store: Arc<dyn DocumentStore>,
    totals: TotalsUpdate,
    stamp: Arc<MonotonicStamp>,
}

impl MutationCoordinator {
    pub(crate) fn new(store: Arc<dyn DocumentStore>, totals: TotalsUpdate) -> Self {
        Self::with_clock(store, totals, Arc::new(SystemClock))
    }

    pub(crate) fn with_clock(
        store: Arc<dyn DocumentStore>,
        totals: TotalsUpdate,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            totals,
            stamp: Arc::new(MonotonicStamp {
                clock,
                last_ms: Mutex::new(i64::MIN),
            }),
        }
    }

    pub(crate) fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Returns the new person's id. Calling twice with the same name creates
    /// two people.
    #[instrument(name = "ledger.add_person", skip_all, fields(identity = %scope.identity()))]
    pub(crate) async fn add_person(
        &self,
        scope: &Scope,
        name: &str,
    ) -> Result<String, LedgerError> {
        let name = name.trim();
        if name.is_empty() {
            debug!("rejected empty name");
            return Err(LedgerError::EmptyName);
        }
        let id = make_id(name, self.stamp.next());
        let person = Person::new(id.clone(), name.to_string());
        self.store
            .create_with_id(&scope.person(&id), person.to_writes())
            .await
            .inspect_err(|err| error!(error = %err, "add person failed"))?;
        info!(person_id = %id, "person added");
        Ok(id)
    }

    /// Validates `amount` and records it against `person`, whose totals are
    /// expected to come from the current registry snapshot.
    pub(crate) async fn record_transaction(
        &self,
        scope: &Scope,
        person: &Person,
        kind: EntryKind,
        amount: &str,
    ) -> Result<RecordedTransaction, LedgerError> {
        let Some(value) = parse_amount(amount) else {
            debug!(input = amount, "rejected amount");
            return Err(LedgerError::InvalidAmount(amount.to_string()));
        };
        self.record_amount(scope, person, kind, value).await
    }

    /// Two independent writes: the running total, then the history entry.
    /// There is no cross-document transaction; if the second write fails the
    /// total is ahead of the history and `HistoryAppend` says so.
    #[instrument(
        name = "ledger.record_transaction",
        skip_all,
        fields(person_id = %person.id, %kind, %amount)
    )]
    pub(crate) async fn record_amount(
        &self,
        scope: &Scope,
        person: &Person,
        kind: EntryKind,
        amount: Decimal,
    ) -> Result<RecordedTransaction, LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount(amount.to_string()));
        }
        let doc = scope.person(&person.id);
        let total = match self.totals {
            TotalsUpdate::AtomicIncrement => FieldWrite::Increment(amount),
            TotalsUpdate::ReadModifyWrite => {
                let Some(sum) = person.total(kind).checked_add(amount) else {
                    error!("total would overflow");
                    return Err(LedgerError::Store(StoreError::Overflow {
                        path: doc.to_string(),
                        field: kind.field().to_string(),
                    }));
                };
                FieldWrite::Set(crate::store::Value::Number(sum))
            }
        };
        self.store
            .update(&doc, WriteSet::from([(kind.field().to_string(), total)]))
            .await
            .inspect_err(|err| error!(error = %err, "total update failed"))?;

        let transaction_id = self
            .store
            .create(
                &scope.transactions(&person.id),
                Transaction::new_writes(amount, kind),
            )
            .await
            .map_err(|source| {
                error!(error = %source, "history append failed after total update");
                LedgerError::HistoryAppend {
                    person_id: person.id.clone(),
                    source,
                }
            })?;
        info!(%transaction_id, "transaction recorded");
        Ok(RecordedTransaction {
            person_id: person.id.clone(),
            transaction_id,
            kind,
            amount,
        })
    }

    #[instrument(name = "ledger.delete_person", skip_all, fields(person_id = %flow.person_id()))]
    pub(crate) async fn run_delete(
        &self,
        flow: &mut DeleteFlow,
        scope: &Scope,
    ) -> Result<usize, DeleteError> {
        flow.run(self.store.as_ref(), scope).await
    }
}

#[cfg(test)]
mod tests;
