#![allow(clippy::unwrap_used)]

use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::*;
use crate::store::{Document, Fields, Value};

fn person(id: &str, name: &str, income: Decimal, due: Decimal) -> Person {
    Person {
        id: id.into(),
        name: name.into(),
        income,
        due,
    }
}

fn txn(id: &str, secs: Option<i64>) -> Transaction {
    Transaction {
        id: id.into(),
        amount: dec!(1),
        kind: EntryKind::Income,
        timestamp: secs.map(|s| Utc.timestamp_opt(s, 0).unwrap()),
    }
}

// ── Balance ───────────────────────────────────────────────────

#[test]
fn test_balance_is_income_minus_due() {
    let p = person("p", "Pat", dec!(120.00), dec!(45.50));
    assert_eq!(p.balance(), dec!(74.50));
    assert_eq!(p.balance_label().to_string(), "You get: $74.50");
}

#[test]
fn test_balance_negative_shows_owe() {
    let p = person("p", "Pat", dec!(10), dec!(25.25));
    assert_eq!(p.balance_label(), Balance::YouOwe(dec!(15.25)));
    assert_eq!(p.balance_label().to_string(), "You owe: $15.25");
}

#[test]
fn test_balance_zero_is_settled() {
    let p = person("p", "Pat", dec!(30), dec!(30));
    assert_eq!(p.balance_label().to_string(), "Settled up");
}

#[test]
fn test_new_person_starts_settled() {
    let p = Person::new("sam-1".into(), "Sam".into());
    assert_eq!(p.income, Decimal::ZERO);
    assert_eq!(p.due, Decimal::ZERO);
    assert_eq!(p.balance_label(), Balance::Settled);
}

#[test]
fn test_total_by_kind() {
    let p = person("p", "Pat", dec!(3), dec!(4));
    assert_eq!(p.total(EntryKind::Income), dec!(3));
    assert_eq!(p.total(EntryKind::Due), dec!(4));
}

// ── Person ordering ───────────────────────────────────────────

#[test]
fn test_people_sorted_by_name_ignoring_case() {
    let mut people = vec![
        person("1", "bob", Decimal::ZERO, Decimal::ZERO),
        person("2", "Alice", Decimal::ZERO, Decimal::ZERO),
        person("3", "charlie", Decimal::ZERO, Decimal::ZERO),
    ];
    sort_people(&mut people);
    let names: Vec<&str> = people.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, ["Alice", "bob", "charlie"]);
}

#[test]
fn test_people_same_name_ordered_by_id() {
    let mut people = vec![
        person("sam-2", "Sam", Decimal::ZERO, Decimal::ZERO),
        person("sam-1", "sam", Decimal::ZERO, Decimal::ZERO),
    ];
    sort_people(&mut people);
    assert_eq!(people[0].id, "sam-1");
}

// ── Person documents ──────────────────────────────────────────

#[test]
fn test_person_from_document() {
    let doc = Document {
        id: "sam-1".into(),
        fields: Fields::from([
            ("name".to_string(), Value::Text("Sam".into())),
            ("income".to_string(), Value::Number(dec!(50))),
            ("due".to_string(), Value::Number(dec!(20))),
        ]),
    };
    let p = Person::from_document(&doc).unwrap();
    assert_eq!(p, person("sam-1", "Sam", dec!(50), dec!(20)));
}

#[test]
fn test_person_missing_totals_read_as_zero() {
    let doc = Document {
        id: "x".into(),
        fields: Fields::from([("name".to_string(), Value::Text("X".into()))]),
    };
    let p = Person::from_document(&doc).unwrap();
    assert_eq!(p.income, Decimal::ZERO);
    assert_eq!(p.due, Decimal::ZERO);
}

#[test]
fn test_person_without_name_rejected() {
    let doc = Document {
        id: "x".into(),
        fields: Fields::new(),
    };
    assert!(Person::from_document(&doc).is_err());
}

#[test]
fn test_person_with_text_total_rejected() {
    let doc = Document {
        id: "x".into(),
        fields: Fields::from([
            ("name".to_string(), Value::Text("X".into())),
            ("due".to_string(), Value::Text("lots".into())),
        ]),
    };
    let err = Person::from_document(&doc).unwrap_err();
    assert!(err.to_string().contains("due"));
}

// ── Transactions ──────────────────────────────────────────────

#[test]
fn test_history_newest_first() {
    let mut entries = vec![txn("a", Some(100)), txn("b", Some(300)), txn("c", Some(200))];
    sort_history(&mut entries);
    let ids: Vec<&str> = entries.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, ["b", "c", "a"]);
}

#[test]
fn test_history_pending_before_acknowledged() {
    let mut entries = vec![txn("old", Some(100)), txn("new", None), txn("mid", Some(200))];
    sort_history(&mut entries);
    assert_eq!(entries[0].id, "new");
    assert!(entries[0].is_pending());
    assert_eq!(entries[1].id, "mid");
}

#[test]
fn test_history_ties_by_id() {
    let mut entries = vec![txn("z", None), txn("a", None), txn("m", Some(5)), txn("b", Some(5))];
    sort_history(&mut entries);
    let ids: Vec<&str> = entries.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, ["a", "z", "b", "m"]);
}

#[test]
fn test_transaction_labels() {
    let income = Transaction {
        id: "1".into(),
        amount: dec!(50),
        kind: EntryKind::Income,
        timestamp: None,
    };
    assert_eq!(income.amount_label(), "+ $50.00");
    assert_eq!(income.when_label(), "pending...");

    let due = Transaction {
        kind: EntryKind::Due,
        amount: dec!(1234.5),
        ..income
    };
    assert_eq!(due.amount_label(), "- $1,234.50");
}

#[test]
fn test_transaction_from_document() {
    let at = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
    let doc = Document {
        id: "t1".into(),
        fields: Fields::from([
            ("amount".to_string(), Value::Number(dec!(12.5))),
            ("type".to_string(), Value::Text("due".into())),
            ("timestamp".to_string(), Value::Timestamp(at)),
        ]),
    };
    let t = Transaction::from_document(&doc).unwrap();
    assert_eq!(t.amount, dec!(12.5));
    assert_eq!(t.kind, EntryKind::Due);
    assert_eq!(t.timestamp, Some(at));
}

#[test]
fn test_transaction_unknown_type_rejected() {
    let doc = Document {
        id: "t1".into(),
        fields: Fields::from([
            ("amount".to_string(), Value::Number(dec!(1))),
            ("type".to_string(), Value::Text("refund".into())),
        ]),
    };
    assert!(Transaction::from_document(&doc).is_err());
}

#[test]
fn test_transaction_type_must_match_exactly() {
    for stored in ["in", "out", " DUE ", "Income", "d"] {
        let doc = Document {
            id: "t1".into(),
            fields: Fields::from([
                ("amount".to_string(), Value::Number(dec!(1))),
                ("type".to_string(), Value::Text(stored.into())),
            ]),
        };
        assert!(Transaction::from_document(&doc).is_err(), "decoded {stored:?}");
    }
    assert_eq!(EntryKind::from_stored("due"), Some(EntryKind::Due));
}

#[test]
fn test_entry_kind_parse() {
    assert_eq!(EntryKind::parse("income"), Some(EntryKind::Income));
    assert_eq!(EntryKind::parse(" DUE "), Some(EntryKind::Due));
    assert_eq!(EntryKind::parse("out"), Some(EntryKind::Due));
    assert_eq!(EntryKind::parse("transfer"), None);
}

// ── Amount input ──────────────────────────────────────────────

#[test]
fn test_parse_amount_rejects_invalid() {
    for input in ["0", "-5", "abc", "", "   ", "0.001", "NaN"] {
        assert_eq!(parse_amount(input), None, "accepted {input:?}");
    }
}

#[test]
fn test_parse_amount_accepts_positive() {
    assert_eq!(parse_amount("12.5"), Some(dec!(12.5)));
    assert_eq!(parse_amount(" 7 "), Some(dec!(7)));
}

#[test]
fn test_parse_amount_caps_size() {
    assert_eq!(parse_amount("1000000000"), Some(super::money::MAX_AMOUNT));
    assert_eq!(parse_amount("1000000000.01"), None);
    assert_eq!(parse_amount("79228162514264337593543950335"), None);
    assert_eq!(parse_amount("4e28"), None);
}

#[test]
fn test_parse_amount_rounds_to_cents() {
    assert_eq!(parse_amount("1.005"), Some(dec!(1.01)));
    assert_eq!(parse_amount("2.994"), Some(dec!(2.99)));
}

#[test]
fn test_format_money() {
    assert_eq!(format_money(dec!(0)), "$0.00");
    assert_eq!(format_money(dec!(74.5)), "$74.50");
    assert_eq!(format_money(dec!(1234567.89)), "$1,234,567.89");
    assert_eq!(format_money(dec!(-42)), "-$42.00");
}

// ── Ids ───────────────────────────────────────────────────────

#[test]
fn test_make_id_slugs_name() {
    let at = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
    assert_eq!(make_id("Mary  Ann", at), "mary-ann-1700000000000");
    assert_eq!(make_id("Sam", at), "sam-1700000000000");
}

#[test]
fn test_make_id_same_inputs_collide() {
    let at = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
    assert_eq!(make_id("Sam", at), make_id("Sam", at));
}

#[test]
fn test_make_id_differs_by_millisecond() {
    let at = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
    let next = at + chrono::Duration::milliseconds(1);
    assert_ne!(make_id("Sam", at), make_id("Sam", next));
}
