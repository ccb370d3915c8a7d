use std::fmt;

use rust_decimal::Decimal;

use super::money::format_money;
use super::EntryKind;
use crate::error::DecodeError;
use crate::store::{self, Document, WriteSet};

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Person {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) income: Decimal,
    pub(crate) due: Decimal,
}

impl Person {
    pub(crate) fn new(id: String, name: String) -> Self {
        Self {
            id,
            name,
            income: Decimal::ZERO,
            due: Decimal::ZERO,
        }
    }

    pub(crate) fn balance(&self) -> Decimal {
        self.income - self.due
    }

    pub(crate) fn balance_label(&self) -> Balance {
        Balance::of(self.balance())
    }

    pub(crate) fn total(&self, kind: EntryKind) -> Decimal {
        match kind {
            EntryKind::Income => self.income,
            EntryKind::Due => self.due,
        }
    }

    pub(crate) fn to_writes(&self) -> WriteSet {
        WriteSet::from([
            ("id".to_string(), store::text(&self.id)),
            ("name".to_string(), store::text(&self.name)),
            (EntryKind::Income.field().to_string(), store::number(self.income)),
            (EntryKind::Due.field().to_string(), store::number(self.due)),
        ])
    }

    /// Missing totals read as zero.
    pub(crate) fn from_document(doc: &Document) -> Result<Self, DecodeError> {
        let name = doc
            .text("name")
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| DecodeError::new(&doc.id, "missing name"))?;
        let total = |kind: EntryKind| -> Result<Decimal, DecodeError> {
            match doc.fields.get(kind.field()) {
                None => Ok(Decimal::ZERO),
                Some(_) => doc
                    .number(kind.field())
                    .ok_or_else(|| DecodeError::new(&doc.id, format!("{kind} is not a number"))),
            }
        };
        Ok(Self {
            id: doc.id.clone(),
            name: name.to_string(),
            income: total(EntryKind::Income)?,
            due: total(EntryKind::Due)?,
        })
    }
}

/// Presentation order: name ascending ignoring case, then id.
pub(crate) fn sort_people(people: &mut [Person]) {
    people.sort_by(|a, b| {
        a.name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| a.id.cmp(&b.id))
    });
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Balance {
    YouGet(Decimal),
    YouOwe(Decimal),
    Settled,
}

impl Balance {
    pub(crate) fn of(balance: Decimal) -> Self {
        if balance > Decimal::ZERO {
            Self::YouGet(balance)
        } else if balance < Decimal::ZERO {
            Self::YouOwe(balance.abs())
        } else {
            Self::Settled
        }
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::YouGet(amount) => write!(f, "You get: {}", format_money(*amount)),
            Self::YouOwe(amount) => write!(f, "You owe: {}", format_money(*amount)),
            Self::Settled => write!(f, "Settled up"),
        }
    }
}
