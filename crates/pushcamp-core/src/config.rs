//! Campaign configuration.
//!
//! One immutable `CampaignConfig` value is constructed at startup (TOML file
//! plus CLI overrides) and passed by reference into every component. There is
//! no ambient global state.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{PushCampError, Result};

/// Run-scoped campaign parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct CampaignConfig {
    /// Text displayed in the push notification.
    #[serde(default = "default_push_text")]
    pub push_text: String,
    /// Number of accounts challenged concurrently per batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Seconds to wait between batches.
    #[serde(default = "default_batch_wait")]
    pub batch_wait_secs: u64,
    /// Push attempts per account before giving up on deny/timeout.
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    /// Seconds to wait between attempts to the same account.
    #[serde(default = "default_retry_wait")]
    pub retry_wait_secs: u64,
    /// Directory holding campaign result logs.
    #[serde(default = "default_results_dir")]
    pub results_dir: String,
}

fn default_push_text() -> String { "Login".into() }
fn default_batch_size() -> usize { 1 }
fn default_batch_wait() -> u64 { 300 }
fn default_retry_count() -> u32 { 1 }
fn default_retry_wait() -> u64 { 60 }
fn default_results_dir() -> String { "results".into() }

impl Default for CampaignConfig {
    fn default() -> Self {
        Self {
            push_text: default_push_text(),
            batch_size: default_batch_size(),
            batch_wait_secs: default_batch_wait(),
            retry_count: default_retry_count(),
            retry_wait_secs: default_retry_wait(),
            results_dir: default_results_dir(),
        }
    }
}

impl CampaignConfig {
    /// Load from a TOML file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| PushCampError::Config(format!("failed to read {}: {e}", path.display())))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| PushCampError::Config(format!("failed to parse {}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// The default config path (~/.pushcamp/config.toml).
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".pushcamp")
            .join("config.toml")
    }

    /// Reject parameter combinations the scheduler cannot honor.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(PushCampError::Config("batch size must be at least 1".into()));
        }
        if self.retry_count == 0 {
            return Err(PushCampError::Config("retry count must be at least 1".into()));
        }
        Ok(())
    }

    pub fn batch_wait(&self) -> Duration {
        Duration::from_secs(self.batch_wait_secs)
    }

    pub fn retry_wait(&self) -> Duration {
        Duration::from_secs(self.retry_wait_secs)
    }
}

/// One integration-key / secret-key pair for a provider role.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiCredentials {
    pub ikey: String,
    pub skey: String,
}

impl ApiCredentials {
    pub fn is_empty(&self) -> bool {
        self.ikey.is_empty() || self.skey.is_empty()
    }
}
