#![allow(clippy::unwrap_used)]

use std::sync::atomic::{AtomicUsize, Ordering};

use rust_decimal_macros::dec;

use super::*;
use crate::error::StoreError;
use crate::identity::Identity;
use crate::store::testing::{Op, RecordingStore};
use crate::store::MemoryStore;

struct FixedClock(DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

fn scope() -> Scope {
    Scope::new(None, Identity::new("u1"))
}

fn setup(totals: TotalsUpdate) -> (Arc<RecordingStore>, MutationCoordinator) {
    let store = Arc::new(RecordingStore::new(Arc::new(MemoryStore::new())));
    let clock = Arc::new(FixedClock(Utc.timestamp_millis_opt(1_000).unwrap()));
    let coordinator = MutationCoordinator::with_clock(store.clone(), totals, clock);
    (store, coordinator)
}

async fn stored_person(store: &RecordingStore, id: &str) -> Option<Person> {
    store
        .inner()
        .list(&scope().people())
        .await
        .unwrap()
        .iter()
        .find(|doc| doc.id == id)
        .map(|doc| Person::from_document(doc).unwrap())
}

async fn history_len(store: &RecordingStore, person_id: &str) -> usize {
    store
        .inner()
        .list(&scope().transactions(person_id))
        .await
        .unwrap()
        .len()
}

// ── Add person ────────────────────────────────────────────────

#[tokio::test]
async fn test_add_person_starts_at_zero() {
    let (store, coordinator) = setup(TotalsUpdate::default());
    let id = coordinator.add_person(&scope(), "  Sam Jones ").await.unwrap();
    assert_eq!(id, "sam-jones-1000");

    let person = stored_person(&store, &id).await.unwrap();
    assert_eq!(person.name, "Sam Jones");
    assert_eq!(person.income, dec!(0));
    assert_eq!(person.due, dec!(0));
    assert_eq!(
        store.writes(),
        vec![Op::CreateWithId(format!("users/u1/people/{id}"))]
    );
}

#[tokio::test]
async fn test_add_same_name_twice_creates_two_people() {
    let (store, coordinator) = setup(TotalsUpdate::default());
    let a = coordinator.add_person(&scope(), "Sam").await.unwrap();
    let b = coordinator.add_person(&scope(), "Sam").await.unwrap();
    assert_ne!(a, b);
    assert!(stored_person(&store, &a).await.is_some());
    assert!(stored_person(&store, &b).await.is_some());
}

#[tokio::test]
async fn test_add_person_rejects_blank_name() {
    let (store, coordinator) = setup(TotalsUpdate::default());
    for name in ["", "   ", "\t\n"] {
        let err = coordinator.add_person(&scope(), name).await.unwrap_err();
        assert!(matches!(err, LedgerError::EmptyName));
        assert!(err.is_rejection());
    }
    assert!(store.ops().is_empty());
}

#[tokio::test]
async fn test_add_person_store_failure_surfaces() {
    let (store, coordinator) = setup(TotalsUpdate::default());
    store.fail_when(|op| matches!(op, Op::CreateWithId(_)));
    let err = coordinator.add_person(&scope(), "Sam").await.unwrap_err();
    assert!(matches!(err, LedgerError::Store(StoreError::Unavailable(_))));
    assert!(!err.is_rejection());
}

// ── Record transaction ────────────────────────────────────────

#[tokio::test]
async fn test_invalid_amount_makes_no_store_call() {
    let (store, coordinator) = setup(TotalsUpdate::default());
    let person = Person::new("p".into(), "Pat".into());
    for input in ["", "abc", "0", "-5", "0.001"] {
        let err = coordinator
            .record_transaction(&scope(), &person, EntryKind::Income, input)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidAmount(_)), "{input}");
    }
    assert!(store.ops().is_empty());
}

#[tokio::test]
async fn test_record_updates_total_then_appends_history() {
    let (store, coordinator) = setup(TotalsUpdate::AtomicIncrement);
    let id = coordinator.add_person(&scope(), "Sam").await.unwrap();
    store.clear();

    let person = stored_person(&store, &id).await.unwrap();
    let recorded = coordinator
        .record_transaction(&scope(), &person, EntryKind::Income, "50")
        .await
        .unwrap();
    assert_eq!(recorded.amount, dec!(50));
    assert_eq!(recorded.kind, EntryKind::Income);

    assert_eq!(
        store.writes(),
        vec![
            Op::Update(format!("users/u1/people/{id}"), vec!["income".to_string()]),
            Op::Create(format!("users/u1/people/{id}/transactions")),
        ]
    );
    let person = stored_person(&store, &id).await.unwrap();
    assert_eq!(person.income, dec!(50));
    assert_eq!(person.due, dec!(0));
    assert_eq!(history_len(&store, &id).await, 1);
}

#[tokio::test]
async fn test_record_due_moves_due_total() {
    let (store, coordinator) = setup(TotalsUpdate::AtomicIncrement);
    let id = coordinator.add_person(&scope(), "Sam").await.unwrap();
    let person = stored_person(&store, &id).await.unwrap();
    coordinator
        .record_transaction(&scope(), &person, EntryKind::Due, "20")
        .await
        .unwrap();
    let person = stored_person(&store, &id).await.unwrap();
    assert_eq!(person.due, dec!(20));
    assert_eq!(person.balance(), dec!(-20));
}

#[tokio::test]
async fn test_atomic_increment_keeps_concurrent_records() {
    let (store, coordinator) = setup(TotalsUpdate::AtomicIncrement);
    let id = coordinator.add_person(&scope(), "Sam").await.unwrap();
    let stale = stored_person(&store, &id).await.unwrap();
    coordinator
        .record_amount(&scope(), &stale, EntryKind::Income, dec!(10))
        .await
        .unwrap();
    coordinator
        .record_amount(&scope(), &stale, EntryKind::Income, dec!(20))
        .await
        .unwrap();
    assert_eq!(stored_person(&store, &id).await.unwrap().income, dec!(30));
}

#[tokio::test]
async fn test_read_modify_write_loses_update_on_stale_snapshot() {
    let (store, coordinator) = setup(TotalsUpdate::ReadModifyWrite);
    let id = coordinator.add_person(&scope(), "Sam").await.unwrap();
    let stale = stored_person(&store, &id).await.unwrap();
    coordinator
        .record_amount(&scope(), &stale, EntryKind::Income, dec!(10))
        .await
        .unwrap();
    coordinator
        .record_amount(&scope(), &stale, EntryKind::Income, dec!(20))
        .await
        .unwrap();
    assert_eq!(stored_person(&store, &id).await.unwrap().income, dec!(20));
    assert_eq!(history_len(&store, &id).await, 2);
}

#[tokio::test]
async fn test_record_against_missing_person_fails_before_history() {
    let (store, coordinator) = setup(TotalsUpdate::default());
    let ghost = Person::new("ghost".into(), "Ghost".into());
    let err = coordinator
        .record_transaction(&scope(), &ghost, EntryKind::Income, "5")
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Store(StoreError::NotFound(_))));
    assert!(!store.ops().iter().any(|op| matches!(op, Op::Create(_))));
}

#[tokio::test]
async fn test_history_append_failure_leaves_total_ahead() {
    let (store, coordinator) = setup(TotalsUpdate::default());
    let id = coordinator.add_person(&scope(), "Sam").await.unwrap();
    let person = stored_person(&store, &id).await.unwrap();
    store.fail_when(|op| matches!(op, Op::Create(_)));

    let err = coordinator
        .record_transaction(&scope(), &person, EntryKind::Income, "5")
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::HistoryAppend { ref person_id, .. } if *person_id == id));
    assert_eq!(stored_person(&store, &id).await.unwrap().income, dec!(5));
    assert_eq!(history_len(&store, &id).await, 0);
}

#[tokio::test]
async fn test_overflowing_total_is_an_error_not_a_crash() {
    for totals in [TotalsUpdate::AtomicIncrement, TotalsUpdate::ReadModifyWrite] {
        let (store, coordinator) = setup(totals);
        let id = coordinator.add_person(&scope(), "Sam").await.unwrap();
        store
            .inner()
            .update(
                &scope().person(&id),
                WriteSet::from([(
                    "income".to_string(),
                    FieldWrite::Set(crate::store::Value::Number(Decimal::MAX)),
                )]),
            )
            .await
            .unwrap();
        store.clear();

        let person = stored_person(&store, &id).await.unwrap();
        let err = coordinator
            .record_transaction(&scope(), &person, EntryKind::Income, "1")
            .await
            .unwrap_err();
        assert!(
            matches!(err, LedgerError::Store(StoreError::Overflow { .. })),
            "{totals:?}: {err}"
        );
        assert!(!store.ops().iter().any(|op| matches!(op, Op::Create(_))));
        assert_eq!(stored_person(&store, &id).await.unwrap().income, Decimal::MAX);
        assert_eq!(history_len(&store, &id).await, 0);
    }
}

#[tokio::test]
async fn test_amount_over_limit_is_rejected() {
    let (store, coordinator) = setup(TotalsUpdate::default());
    let person = Person::new("p".into(), "Pat".into());
    for input in ["79228162514264337593543950335", "4e28", "1000000000.01"] {
        let err = coordinator
            .record_transaction(&scope(), &person, EntryKind::Income, input)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidAmount(_)), "{input}");
    }
    assert!(store.ops().is_empty());
}

// ── Delete person ─────────────────────────────────────────────

async fn person_with_history(
    store: &RecordingStore,
    coordinator: &MutationCoordinator,
    entries: usize,
) -> String {
    let id = coordinator.add_person(&scope(), "Sam").await.unwrap();
    for n in 1..=entries {
        let person = stored_person(store, &id).await.unwrap();
        coordinator
            .record_amount(&scope(), &person, EntryKind::Income, Decimal::from(n))
            .await
            .unwrap();
    }
    store.clear();
    id
}

#[tokio::test]
async fn test_delete_removes_children_before_parent() {
    let (store, coordinator) = setup(TotalsUpdate::default());
    let id = person_with_history(&store, &coordinator, 3).await;

    let mut flow = DeleteFlow::new(&id, "Sam");
    let removed = coordinator.run_delete(&mut flow, &scope()).await.unwrap();
    assert_eq!(removed, 3);
    assert_eq!(flow.phase(), &DeletePhase::Done);
    assert_eq!(flow.children_deleted(), 3);

    let ops = store.ops();
    let parent = format!("users/u1/people/{id}");
    let child_prefix = format!("{parent}/transactions/");
    assert!(matches!(&ops[0], Op::List(_)));
    let deletes: Vec<&str> = ops[1..].iter().map(Op::path).collect();
    assert_eq!(deletes.len(), 4);
    assert!(deletes[..3].iter().all(|p| p.starts_with(&child_prefix)));
    assert_eq!(deletes[3], parent);

    assert!(stored_person(&store, &id).await.is_none());
    assert_eq!(history_len(&store, &id).await, 0);
}

#[tokio::test]
async fn test_delete_without_history() {
    let (store, coordinator) = setup(TotalsUpdate::default());
    let id = person_with_history(&store, &coordinator, 0).await;
    let mut flow = DeleteFlow::new(&id, "Sam");
    let removed = coordinator.run_delete(&mut flow, &scope()).await.unwrap();
    assert_eq!(removed, 0);
    assert!(stored_person(&store, &id).await.is_none());
}

#[tokio::test]
async fn test_failed_child_delete_keeps_parent() {
    let (store, coordinator) = setup(TotalsUpdate::default());
    let id = person_with_history(&store, &coordinator, 3).await;
    let seen = AtomicUsize::new(0);
    store.fail_when(move |op| {
        matches!(op, Op::Delete(path) if path.contains("/transactions/"))
            && seen.fetch_add(1, Ordering::SeqCst) == 1
    });

    let mut flow = DeleteFlow::new(&id, "Sam");
    let err = coordinator.run_delete(&mut flow, &scope()).await.unwrap_err();
    assert!(matches!(err, DeleteError::DeleteChildren { failed: 1, total: 3, .. }));
    assert!(matches!(flow.phase(), DeletePhase::Failed(_)));
    assert_eq!(flow.children_deleted(), 2);

    let parent = format!("users/u1/people/{id}");
    assert!(!store.ops().iter().any(|op| op.path() == parent));
    assert!(stored_person(&store, &id).await.is_some());
    assert_eq!(history_len(&store, &id).await, 1);
}

#[tokio::test]
async fn test_failed_listing_deletes_nothing() {
    let (store, coordinator) = setup(TotalsUpdate::default());
    let id = person_with_history(&store, &coordinator, 2).await;
    store.fail_when(|op| matches!(op, Op::List(_)));
    let mut flow = DeleteFlow::new(&id, "Sam");
    let err = coordinator.run_delete(&mut flow, &scope()).await.unwrap_err();
    assert!(matches!(err, DeleteError::ListChildren { .. }));
    assert!(store.writes().is_empty());
}

#[tokio::test]
async fn test_cancelled_delete_cannot_run() {
    let (store, coordinator) = setup(TotalsUpdate::default());
    let id = person_with_history(&store, &coordinator, 1).await;
    let mut flow = DeleteFlow::new(&id, "Sam");
    flow.cancel();
    assert_eq!(flow.phase(), &DeletePhase::Cancelled);

    let err = coordinator.run_delete(&mut flow, &scope()).await.unwrap_err();
    assert!(matches!(err, DeleteError::NotPending { .. }));
    assert!(store.ops().is_empty());
    assert!(stored_person(&store, &id).await.is_some());
}

#[tokio::test]
async fn test_finished_delete_cannot_rerun_or_cancel() {
    let (_store, coordinator) = setup(TotalsUpdate::default());
    let mut flow = DeleteFlow::new("ghost", "Ghost");
    coordinator.run_delete(&mut flow, &scope()).await.unwrap();
    flow.cancel();
    assert_eq!(flow.phase(), &DeletePhase::Done);
    let err = coordinator.run_delete(&mut flow, &scope()).await.unwrap_err();
    assert!(matches!(err, DeleteError::NotPending { .. }));
}

// ── Ids ───────────────────────────────────────────────────────

#[test]
fn test_monotonic_stamp_never_repeats() {
    let stamp = MonotonicStamp {
        clock: Arc::new(FixedClock(Utc.timestamp_millis_opt(5_000).unwrap())),
        last_ms: Mutex::new(i64::MIN),
    };
    let a = stamp.next();
    let b = stamp.next();
    let c = stamp.next();
    assert_eq!(a.timestamp_millis(), 5_000);
    assert!(a < b && b < c);
}
