mod history;
mod registry;

pub(crate) use history::{HistoryChange, TransactionLedger};
pub(crate) use registry::PersonRegistry;
