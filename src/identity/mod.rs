mod local;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::error::IdentityError;

pub(crate) use local::LocalIdentityProvider;

/// Opaque, stable token for the signed-in local user.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct Identity(String);

impl Identity {
    pub(crate) fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub(crate) fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[async_trait]
pub(crate) trait IdentityProvider: Send + Sync {
    /// Mint a new anonymous identity. On success the provider's auth state
    /// moves to `Some`.
    async fn sign_in_anonymously(&self) -> Result<Identity, IdentityError>;

    /// Auth state stream, starting with the current state.
    fn auth_state(&self) -> watch::Receiver<Option<Identity>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum IdentityStatus {
    Unknown,
    SigningIn,
    SignedIn(Identity),
    Failed(String),
}

impl IdentityStatus {
    pub(crate) fn identity(&self) -> Option<&Identity> {
        match self {
            Self::SignedIn(identity) => Some(identity),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct RetryPolicy {
    pub(crate) attempts: u32,
    pub(crate) backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Linear backoff, saturating for huge configured values.
    pub(crate) fn delay_after(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(attempt)
    }
}

/// Keeps the local user signed in and publishes identity transitions.
///
/// A background task follows the provider's auth state; whenever it reports
/// no user, exactly one sign-in request is issued and awaited before the
/// next state is looked at.
pub(crate) struct IdentitySession {
    status: watch::Receiver<IdentityStatus>,
    task: JoinHandle<()>,
}

impl IdentitySession {
    pub(crate) fn start(provider: Arc<dyn IdentityProvider>, retry: RetryPolicy) -> Self {
        let (tx, status) = watch::channel(IdentityStatus::Unknown);
        let task = tokio::spawn(drive(provider, tx, retry));
        Self { status, task }
    }

    #[cfg(test)]
    pub(crate) fn current(&self) -> Option<Identity> {
        self.status.borrow().identity().cloned()
    }

    pub(crate) fn status(&self) -> IdentityStatus {
        self.status.borrow().clone()
    }

    /// Resolves on the next status transition. Never resolves once the
    /// session task has ended.
    pub(crate) async fn changed(&mut self) -> IdentityStatus {
        if self.status.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
        self.status.borrow_and_update().clone()
    }

    #[cfg(test)]
    pub(crate) fn watch(&self) -> watch::Receiver<IdentityStatus> {
        self.status.clone()
    }
}

impl Drop for IdentitySession {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn publish(tx: &watch::Sender<IdentityStatus>, status: IdentityStatus) {
    tx.send_if_modified(|current| {
        if *current == status {
            false
        } else {
            *current = status;
            true
        }
    });
}

async fn drive(
    provider: Arc<dyn IdentityProvider>,
    tx: watch::Sender<IdentityStatus>,
    retry: RetryPolicy,
) {
    let mut auth = provider.auth_state();
    loop {
        let state = auth.borrow_and_update().clone();
        match state {
            Some(identity) => {
                if tx.borrow().identity() != Some(&identity) {
                    info!(identity = %identity, "signed in");
                }
                publish(&tx, IdentityStatus::SignedIn(identity));
            }
            None => {
                publish(&tx, IdentityStatus::SigningIn);
                match sign_in(provider.as_ref(), retry).await {
                    // The provider's auth state carries the new identity.
                    Ok(identity) => info!(identity = %identity, "anonymous sign-in completed"),
                    Err(err) => {
                        error!(error = %err, "anonymous sign-in failed");
                        publish(&tx, IdentityStatus::Failed(err.to_string()));
                    }
                }
            }
        }
        if auth.changed().await.is_err() {
            warn!("identity provider closed its auth state");
            return;
        }
    }
}

async fn sign_in(
    provider: &dyn IdentityProvider,
    retry: RetryPolicy,
) -> Result<Identity, IdentityError> {
    let attempts = retry.attempts.max(1);
    let mut attempt = 1;
    loop {
        match provider.sign_in_anonymously().await {
            Ok(identity) => return Ok(identity),
            Err(err) if attempt < attempts => {
                warn!(attempt, error = %err, "anonymous sign-in attempt failed, retrying");
                tokio::time::sleep(retry.delay_after(attempt)).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
