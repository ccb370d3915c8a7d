mod id;
mod money;
mod person;
mod transaction;

pub(crate) use id::make_id;
pub(crate) use money::{format_money, parse_amount};
pub(crate) use person::{sort_people, Balance, Person};
pub(crate) use transaction::{sort_history, EntryKind, Transaction};

#[cfg(test)]
mod tests;
