use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::coordinator::TotalsUpdate;
use crate::identity::RetryPolicy;
use crate::session::SessionOptions;

pub(crate) const ENV_PREFIX: &str = "TALLY_";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum StoreBackend {
    #[default]
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct StoreConfig {
    pub(crate) backend: StoreBackend,
    /// SQLite file. Defaults to `tally.db` in the data directory.
    pub(crate) path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct LedgerConfig {
    pub(crate) totals: TotalsUpdate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct IdentityConfig {
    pub(crate) sign_in_attempts: u32,
    pub(crate) retry_backoff_ms: u64,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        Self {
            sign_in_attempts: retry.attempts,
            retry_backoff_ms: retry.backoff.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct LoggingConfig {
    /// `EnvFilter` directive; `RUST_LOG` wins when set.
    pub(crate) level: String,
    /// Log file directory. Defaults to `logs/` in the data directory.
    pub(crate) directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct AppConfig {
    /// Prefixes every data path with `artifacts/{app_id}/` when set.
    pub(crate) app_id: Option<String>,
    pub(crate) store: StoreConfig,
    pub(crate) ledger: LedgerConfig,
    pub(crate) identity: IdentityConfig,
    pub(crate) logging: LoggingConfig,
}

impl AppConfig {
    /// Defaults, then the YAML file (if present), then `TALLY_*` variables.
    /// `TALLY_STORE__BACKEND=memory` maps to `store.backend`.
    pub(crate) fn load_layered(config_path: &Path) -> Result<Self> {
        Self::load_with_env(config_path, ENV_PREFIX)
    }

    fn load_with_env(config_path: &Path, env_prefix: &str) -> Result<Self> {
        use figment::{
            providers::{Env, Format, Serialized, Yaml},
            Figment,
        };

        Figment::new()
            .merge(Serialized::defaults(AppConfig::default()))
            .merge(Yaml::file(config_path))
            .merge(Env::prefixed(env_prefix).split("__"))
            .extract()
            .with_context(|| format!("Failed to load config from {}", config_path.display()))
    }

    pub(crate) fn store_path(&self, data_dir: &Path) -> PathBuf {
        self.store
            .path
            .clone()
            .unwrap_or_else(|| data_dir.join("tally.db"))
    }

    pub(crate) fn log_directory(&self, data_dir: &Path) -> PathBuf {
        self.logging
            .directory
            .clone()
            .unwrap_or_else(|| data_dir.join("logs"))
    }

    pub(crate) fn session_options(&self) -> SessionOptions {
        SessionOptions {
            app_id: self.app_id.clone().filter(|id| !id.trim().is_empty()),
            totals: self.ledger.totals,
            retry: RetryPolicy {
                attempts: self.identity.sign_in_attempts,
                backoff: Duration::from_millis(self.identity.retry_backoff_ms),
            },
        }
    }
}

pub(crate) fn data_dir() -> Result<PathBuf> {
    let proj_dirs = directories::ProjectDirs::from("com", "tally", "Tally")
        .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
    let data_dir = proj_dirs.data_dir();
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;
    Ok(data_dir.to_path_buf())
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
