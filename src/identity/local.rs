use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::debug;

use super::{Identity, IdentityProvider};
use crate::error::IdentityError;

/// Anonymous identity minted on this device. With a token file the identity
/// survives restarts; without one it lasts for the process.
pub(crate) struct LocalIdentityProvider {
    token_file: Option<PathBuf>,
    state: watch::Sender<Option<Identity>>,
}

impl LocalIdentityProvider {
    pub(crate) fn ephemeral() -> Self {
        Self {
            token_file: None,
            state: watch::Sender::new(None),
        }
    }

    /// Restores a previously stored token when the file exists.
    pub(crate) fn persistent(token_file: PathBuf) -> Result<Self, IdentityError> {
        let restored = match std::fs::read_to_string(&token_file) {
            Ok(raw) => {
                let token = raw.trim();
                (!token.is_empty()).then(|| Identity::new(token))
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
            Err(err) => return Err(err.into()),
        };
        debug!(path = %token_file.display(), restored = restored.is_some(), "identity token file");
        Ok(Self {
            token_file: Some(token_file),
            state: watch::Sender::new(restored),
        })
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentityProvider {
    async fn sign_in_anonymously(&self) -> Result<Identity, IdentityError> {
        let identity = Identity::new(uuid::Uuid::new_v4().simple().to_string());
        if let Some(path) = &self.token_file {
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(path, identity.as_str()).await?;
        }
        self.state.send_replace(Some(identity.clone()));
        Ok(identity)
    }

    fn auth_state(&self) -> watch::Receiver<Option<Identity>> {
        self.state.subscribe()
    }
}
