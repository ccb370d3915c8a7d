use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum StoreError {
    #[error("document not found: {0}")]
    NotFound(String),
    #[error("field '{field}' on {path} is not a number")]
    NotANumber { path: String, field: String },
    #[error("adding to '{field}' on {path} overflows")]
    Overflow { path: String, field: String },
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("document encoding: {0}")]
    Codec(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub(crate) enum IdentityError {
    #[error("anonymous sign-in denied: {0}")]
    Denied(String),
    #[error("token file: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub(crate) enum LedgerError {
    #[error("person name is empty")]
    EmptyName,
    #[error("amount '{0}' is not a valid positive amount")]
    InvalidAmount(String),
    #[error("no identity yet")]
    NoIdentity,
    #[error("no transaction in progress")]
    NoDraft,
    #[error("{0} is being deleted")]
    Deleting(String),
    #[error("unknown person: {0}")]
    UnknownPerson(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The total was written but the history entry was not.
    #[error("{person_id}: total updated but history append failed: {source}")]
    HistoryAppend {
        person_id: String,
        #[source]
        source: StoreError,
    },
}

impl LedgerError {
    /// Local input rejections. No store call was made.
    pub(crate) fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::EmptyName
                | Self::InvalidAmount(_)
                | Self::NoIdentity
                | Self::NoDraft
                | Self::UnknownPerson(_)
                | Self::Deleting(_)
        )
    }
}

#[derive(Debug, Error)]
pub(crate) enum DeleteError {
    #[error("listing transactions of {person_id}: {source}")]
    ListChildren {
        person_id: String,
        #[source]
        source: StoreError,
    },
    #[error("{failed} of {total} transactions of {person_id} could not be deleted: {source}")]
    DeleteChildren {
        person_id: String,
        failed: usize,
        total: usize,
        #[source]
        source: StoreError,
    },
    #[error("deleting person {person_id}: {source}")]
    DeleteParent {
        person_id: String,
        #[source]
        source: StoreError,
    },
    #[error("delete of {person_id} is already {phase}")]
    NotPending { person_id: String, phase: String },
}

#[derive(Debug, Error)]
#[error("document {id}: {reason}")]
pub(crate) struct DecodeError {
    pub(crate) id: String,
    pub(crate) reason: String,
}

impl DecodeError {
    pub(crate) fn new(id: &str, reason: impl Into<String>) -> Self {
        Self {
            id: id.to_string(),
            reason: reason.into(),
        }
    }
}
