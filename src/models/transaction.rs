use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Local, Utc};
use rust_decimal::Decimal;

use super::money::format_money;
use crate::error::DecodeError;
use crate::store::{self, Document, FieldWrite, WriteSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum EntryKind {
    Income,
    Due,
}

impl EntryKind {
    /// Name of the person field holding this kind's running total, also the
    /// value stored in a transaction's `type` field.
    pub(crate) fn field(&self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Due => "due",
        }
    }

    /// Exact match on the stored `type` value.
    pub(crate) fn from_stored(s: &str) -> Option<Self> {
        match s {
            "income" => Some(Self::Income),
            "due" => Some(Self::Due),
            _ => None,
        }
    }

    /// Lenient parse for typed input.
    pub(crate) fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "income" | "in" | "i" => Some(Self::Income),
            "due" | "out" | "d" => Some(Self::Due),
            _ => None,
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Transaction {
    pub(crate) id: String,
    pub(crate) amount: Decimal,
    pub(crate) kind: EntryKind,
    /// `None` until the store acknowledges the write.
    pub(crate) timestamp: Option<DateTime<Utc>>,
}

impl Transaction {
    pub(crate) fn new_writes(amount: Decimal, kind: EntryKind) -> WriteSet {
        WriteSet::from([
            ("amount".to_string(), store::number(amount)),
            ("type".to_string(), store::text(kind.field())),
            ("timestamp".to_string(), FieldWrite::ServerTimestamp),
        ])
    }

    pub(crate) fn from_document(doc: &Document) -> Result<Self, DecodeError> {
        let amount = doc
            .number("amount")
            .ok_or_else(|| DecodeError::new(&doc.id, "missing amount"))?;
        let kind = doc
            .text("type")
            .and_then(EntryKind::from_stored)
            .ok_or_else(|| DecodeError::new(&doc.id, "missing or unknown type"))?;
        Ok(Self {
            id: doc.id.clone(),
            amount,
            kind,
            timestamp: doc.timestamp("timestamp"),
        })
    }

    pub(crate) fn is_pending(&self) -> bool {
        self.timestamp.is_none()
    }

    /// `+ $50.00` for income, `- $20.00` for due.
    pub(crate) fn amount_label(&self) -> String {
        let sign = match self.kind {
            EntryKind::Income => '+',
            EntryKind::Due => '-',
        };
        format!("{sign} {}", format_money(self.amount))
    }

    pub(crate) fn when_label(&self) -> String {
        match self.timestamp {
            Some(ts) => ts
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string(),
            None => "pending...".to_string(),
        }
    }
}

/// Most recent first. A pending entry counts as newer than any
/// acknowledged one; equal instants fall back to id order.
fn history_order(a: &Transaction, b: &Transaction) -> Ordering {
    let key = |t: &Transaction| t.timestamp.unwrap_or(DateTime::<Utc>::MAX_UTC);
    key(b).cmp(&key(a)).then_with(|| a.id.cmp(&b.id))
}

pub(crate) fn sort_history(entries: &mut [Transaction]) {
    entries.sort_by(history_order);
}
