use std::fmt;

use futures::future::join_all;
use tracing::{error, info};

use crate::error::{DeleteError, StoreError};
use crate::store::{DocumentPath, DocumentStore, Scope};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum DeletePhase {
    Confirming,
    DeletingChildren,
    DeletingParent,
    Done,
    Cancelled,
    Failed(String),
}

impl fmt::Display for DeletePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Confirming => write!(f, "confirming"),
            Self::DeletingChildren => write!(f, "deleting transactions"),
            Self::DeletingParent => write!(f, "deleting person"),
            Self::Done => write!(f, "done"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// Removal of one person and everything it owns.
///
/// `Confirming -> DeletingChildren -> DeletingParent -> Done`, with
/// `Cancelled` reachable only from `Confirming` and `Failed` from either
/// deleting phase. The person document is only touched after every one of
/// its transactions is gone.
#[derive(Debug, Clone)]
pub(crate) struct DeleteFlow {
    person_id: String,
    person_name: String,
    phase: DeletePhase,
    children_deleted: usize,
}

impl DeleteFlow {
    pub(crate) fn new(person_id: &str, person_name: &str) -> Self {
        Self {
            person_id: person_id.to_string(),
            person_name: person_name.to_string(),
            phase: DeletePhase::Confirming,
            children_deleted: 0,
        }
    }

    pub(crate) fn person_id(&self) -> &str {
        &self.person_id
    }

    pub(crate) fn person_name(&self) -> &str {
        &self.person_name
    }

    pub(crate) fn phase(&self) -> &DeletePhase {
        &self.phase
    }

    pub(crate) fn children_deleted(&self) -> usize {
        self.children_deleted
    }

    pub(crate) fn cancel(&mut self) {
        if self.phase == DeletePhase::Confirming {
            info!(person_id = %self.person_id, "delete cancelled");
            self.phase = DeletePhase::Cancelled;
        }
    }

    /// Drive the flow to `Done` or `Failed`. No automatic retry.
    pub(crate) async fn run(
        &mut self,
        store: &dyn DocumentStore,
        scope: &Scope,
    ) -> Result<usize, DeleteError> {
        if self.phase != DeletePhase::Confirming {
            return Err(DeleteError::NotPending {
                person_id: self.person_id.clone(),
                phase: self.phase.to_string(),
            });
        }
        let result = self.delete_all(store, scope).await;
        match &result {
            Ok(children) => {
                info!(person_id = %self.person_id, children, "person deleted");
                self.phase = DeletePhase::Done;
            }
            Err(err) => {
                error!(person_id = %self.person_id, error = %err, "delete failed");
                self.phase = DeletePhase::Failed(err.to_string());
            }
        }
        result
    }

    async fn delete_all(
        &mut self,
        store: &dyn DocumentStore,
        scope: &Scope,
    ) -> Result<usize, DeleteError> {
        self.phase = DeletePhase::DeletingChildren;
        let children = scope.transactions(&self.person_id);
        let docs = store
            .list(&children)
            .await
            .map_err(|source| DeleteError::ListChildren {
                person_id: self.person_id.clone(),
                source,
            })?;
        let total = docs.len();
        let paths: Vec<DocumentPath> = docs.iter().map(|doc| children.doc(&doc.id)).collect();
        let results = join_all(paths.iter().map(|path| store.delete(path))).await;
        let mut failures: Vec<StoreError> = results.into_iter().filter_map(Result::err).collect();
        self.children_deleted = total - failures.len();
        if !failures.is_empty() {
            let failed = failures.len();
            return Err(DeleteError::DeleteChildren {
                person_id: self.person_id.clone(),
                failed,
                total,
                source: failures.remove(0),
            });
        }

        self.phase = DeletePhase::DeletingParent;
        store
            .delete(&scope.person(&self.person_id))
            .await
            .map_err(|source| DeleteError::DeleteParent {
                person_id: self.person_id.clone(),
                source,
            })?;
        Ok(total)
    }
}
